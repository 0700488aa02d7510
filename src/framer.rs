//! Incremental SSE chunk framer.
//!
//! Turns a stream of raw HTTP body fragments into complete `data: {...}`
//! JSON payloads. Grounded on the character-scanning state machine in
//! the harness this crate descends from (`push_chunks`/`ChunkStates` in
//! its curl transport): look for the `"data: "` prefix, then for the
//! first `"}\n"` that closes the JSON object. Two differences from that
//! original: this version is a standalone state machine callable across
//! an arbitrary number of `feed()` calls rather than once per HTTP write
//! callback, and an unterminated tail at the end of one `feed()` is kept
//! and completed by the next rather than discarded. It also recognizes
//! the `data: [DONE]` sentinel some completion APIs send to mark the end
//! of a stream.

const CHUNK_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// One complete `data: { ... }` payload, with the prefix stripped
    /// and the trailing newline removed.
    Chunk(String),
    /// A `data: [DONE]` sentinel was seen.
    Done,
}

/// Stateful SSE-ish framer. Owns whatever trailing, not-yet-terminated
/// bytes were left over from the previous `feed()` call.
#[derive(Default)]
pub struct ChunkFramer {
    tail: String,
}

impl ChunkFramer {
    pub fn new() -> Self {
        Self { tail: String::new() }
    }

    /// Feeds one more fragment of the HTTP body and returns every
    /// complete event it produced. Any unterminated `data: ` prefix at
    /// the end of `bytes` is retained and completed by a later call.
    pub fn feed(&mut self, bytes: &str) -> Vec<FramerEvent> {
        self.tail.push_str(bytes);
        let mut events = Vec::new();
        let mut cursor = 0usize;

        loop {
            let buf = &self.tail[cursor..];
            let Some(prefix_rel) = buf.find(CHUNK_PREFIX) else {
                break;
            };
            let payload_start = cursor + prefix_rel + CHUNK_PREFIX.len();

            if self.tail[payload_start..].starts_with(DONE_PAYLOAD) {
                events.push(FramerEvent::Done);
                cursor = payload_start + DONE_PAYLOAD.len();
                continue;
            }

            match self.tail[payload_start..].find("}\n") {
                Some(end_rel) => {
                    let end = payload_start + end_rel + 1; // include the '}'
                    events.push(FramerEvent::Chunk(self.tail[payload_start..end].to_string()));
                    cursor = end + 1; // skip the '\n'
                }
                None => {
                    // Incomplete payload: keep everything from this
                    // prefix onward as the tail for the next feed().
                    cursor = cursor + prefix_rel;
                    break;
                }
            }
        }

        self.tail.drain(..cursor);
        events
    }

    /// Signals end of stream. Any leftover tail that never completed a
    /// payload is diagnostic only, never fatal; the caller decides
    /// whether to record it.
    pub fn feed_eof(&mut self) -> Option<String> {
        if self.tail.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.tail))
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// However a well-formed SSE body is chopped into `feed()` calls,
    /// the framer must reassemble the same ordered chunk payloads --
    /// the whole point of carrying a tail across invocations.
    fn build_body(payloads: &[String]) -> String {
        payloads.iter().map(|p| format!("data: {{\"v\":\"{p}\"}}\n\n")).collect()
    }

    proptest! {
        #[test]
        fn split_point_never_changes_the_reassembled_chunks(
            payloads in prop::collection::vec("[a-z]{1,6}", 1..6),
            split_seed in any::<u8>(),
        ) {
            let body = build_body(&payloads);
            let split_at = (split_seed as usize) % (body.len() + 1);
            let (first, second) = body.split_at(split_at);

            let mut framer = ChunkFramer::new();
            let mut events = framer.feed(first);
            events.extend(framer.feed(second));

            let expected: Vec<FramerEvent> =
                payloads.iter().map(|p| FramerEvent::Chunk(format!("{{\"v\":\"{p}\"}}"))).collect();
            prop_assert_eq!(events, expected);
            prop_assert!(framer.feed_eof().is_none());
        }
    }
}
