//! The streaming completions transport.
//!
//! Grounded on `curl.hpp`/`curl.cpp` (`original_source`): one blocking
//! HTTP POST per request, with the response body consumed incrementally
//! through the chunk framer rather than buffered whole. `HttpTransport`
//! is this crate's only production implementation; `FakeTransport` (used
//! by the pipeline/driver integration tests) lives under `tests/`.

use std::io::Read;
use std::time::Duration;

use tracing::warn;

use crate::framer::{ChunkFramer, FramerEvent};
use crate::result::RequestParameters;
use crate::ring::PushOutcome;
use crate::streaming::StreamingResponse;

/// What the request pipeline needs from a completions backend: drive
/// one streaming request to completion, writing framed JSON events into
/// `response` and calling `response.finalize()` exactly once when the
/// HTTP call ends (successfully or not). Blocking; the pipeline runs
/// this on its own scoped thread per request.
pub trait Transport: Send + Sync {
    fn run_stream(&self, req: &RequestParameters, response: &StreamingResponse);
}

/// `reqwest::blocking`-backed transport against an OpenAI-style
/// `/completions` endpoint. Reads `OPENAI_API_KEY` from the process
/// environment itself -- the request/response core never touches it.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

const READ_BUFFER_SIZE: usize = 8 * 1024;

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> reqwest::Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

impl Transport for HttpTransport {
    fn run_stream(&self, req: &RequestParameters, response: &StreamingResponse) {
        let body = match req.to_request_body() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to serialize request body");
                response.finalize();
                return;
            }
        };

        let mut request = self.client.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let send_result = request.send();
        let mut http_response = match send_result {
            Ok(resp) => resp,
            Err(e) => {
                // Transport I/O error: surfaces to the core only as a
                // finalize with an empty backlog, never as a panic.
                warn!(error = %e, "completions request failed");
                response.finalize();
                return;
            }
        };

        let mut framer = ChunkFramer::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut done = false;

        loop {
            let n = match http_response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "error reading response body");
                    break;
                }
            };

            let text = String::from_utf8_lossy(&buf[..n]);
            let events = framer.feed(&text);

            // A read landing mid-chunk legitimately yields zero events
            // here: the framer carries the unterminated tail forward
            // and completes it on a later feed(). Only a tail still
            // unterminated at feed_eof() below is an actual anomaly.
            for event in events {
                match event {
                    FramerEvent::Chunk(payload) => {
                        if response.push(payload) == PushOutcome::Full {
                            warn!("chunk ring full, dropping event");
                        }
                    }
                    FramerEvent::Done => {
                        done = true;
                    }
                }
            }

            if done {
                break;
            }
        }

        if let Some(leftover) = framer.feed_eof() {
            response.feedback().record_parse_failure(leftover);
        }

        response.finalize();
    }
}
