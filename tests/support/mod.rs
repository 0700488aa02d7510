//! Shared `Transport` test double for the integration tests in this
//! directory: a `FakeTransport` replaying scripted chunk buffers with
//! configurable inter-event delay, used in place of a real network
//! dependency.

use std::time::Duration;

use scale_bench::result::RequestParameters;
use scale_bench::streaming::StreamingResponse;
use scale_bench::transport::Transport;

/// Emits `num_events` completion chunks (all with the same `text`),
/// sleeping `jitter` between each, then finalizes.
pub struct FakeTransport {
    pub num_events: usize,
    pub jitter: Duration,
    pub text: String,
}

impl FakeTransport {
    pub fn new(num_events: usize, jitter: Duration, text: impl Into<String>) -> Self {
        Self { num_events, jitter, text: text.into() }
    }
}

impl Transport for FakeTransport {
    fn run_stream(&self, _req: &RequestParameters, response: &StreamingResponse) {
        for i in 0..self.num_events {
            let event = format!(
                r#"{{"id":"cmpl-{i}","object":"text_completion","created":1,"choices":[{{"text":"{}","index":0,"finish_reason":"stop","logprobs":{{"tokens":[],"token_logprobs":[],"top_logprobs":[]}}}}]}}"#,
                self.text
            );
            response.push(event);
            if !self.jitter.is_zero() {
                std::thread::sleep(self.jitter);
            }
        }
        response.finalize();
    }
}

/// Never pushes anything before finalizing -- the "transport times out
/// with an empty backlog" / zero-event scenario.
pub struct SilentTransport;

impl Transport for SilentTransport {
    fn run_stream(&self, _req: &RequestParameters, response: &StreamingResponse) {
        response.finalize();
    }
}
