//! Per-request fan-out pipeline.
//!
//! Owns one [`StreamingResponse`] per request and orchestrates `W`
//! consumer threads plus the calling thread as the awaiter, all scoped
//! to a single `std::thread::scope` call. This turns "every consumer
//! exits before the response is dropped" into a lifetime the borrow
//! checker enforces rather than a join-discipline convention: nothing
//! here ever wraps the response in an `Arc`.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::completion::CompletionResults;
use crate::config::Config;
use crate::constants::{CHUNK_RING_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_WORKERS_PER_REQUEST};
use crate::grade::grade;
use crate::metrics::Diagnostics;
use crate::result::{RequestParameters, RequestResult};
use crate::ring::{FetchOutcome, MpscRing};
use crate::streaming::StreamingResponse;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// `W`: consumer threads draining one request's chunk ring.
    pub workers_per_request: usize,
    /// Consecutive-EMPTY budget before a consumer gives up waiting on a
    /// producer that has already finished.
    pub max_retries: u32,
    pub chunk_ring_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers_per_request: DEFAULT_WORKERS_PER_REQUEST,
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_ring_capacity: CHUNK_RING_SIZE,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs one request end-to-end: dispatches `transport.run_stream`
    /// and `W` consumers against a freshly created `StreamingResponse`,
    /// waits for the transport's latencies, grades the assembled
    /// completion results against `row_config`, and pushes the
    /// resulting `RequestResult` into `results`. Drops (and records in
    /// `diagnostics`) any request whose transport produced zero usable
    /// events.
    pub fn send_and_collect(
        &self,
        req: RequestParameters,
        row_idx: usize,
        transport: &dyn Transport,
        row_config: &Config,
        results: &MpscRing<RequestResult>,
        diagnostics: &Diagnostics,
    ) {
        let response = match StreamingResponse::with_capacity(self.config.chunk_ring_capacity) {
            Ok(response) => response,
            Err(e) => {
                warn!(row_idx, error = %e, "failed to allocate streaming response");
                return;
            }
        };

        let collected: Mutex<Vec<CompletionResults>> = Mutex::new(Vec::new());

        let latencies = std::thread::scope(|scope| {
            scope.spawn(|| transport.run_stream(&req, &response));

            for worker in 0..self.config.workers_per_request {
                let collected = &collected;
                let response = &response;
                scope.spawn(move || {
                    run_consumer(worker, response, &self.config, &collected, diagnostics);
                });
            }

            response.wait_until_done()
        });

        // Fold this request's framer-level diagnostics (parse failures
        // recorded by the transport) into the run-wide accumulator.
        for sample in response.feedback().parse_failures() {
            diagnostics.record_framer_buffer_with_no_events(sample);
        }

        let completion_results = collected.into_inner();
        if completion_results.is_empty() {
            diagnostics.record_zero_event_request(row_idx);
            return;
        }

        let guessed_correctly = completion_results
            .first()
            .and_then(|c| c.first_choice_text())
            .map(|text| grade(row_config, &req.golden_label, text))
            .unwrap_or(false);

        let result = RequestResult { params: req, completion_results, latencies, guessed_correctly };

        match results.push(result) {
            crate::ring::PushOutcome::Ok => {}
            crate::ring::PushOutcome::Full => {
                // Sized generously: a FULL push here would mean the
                // driver's own invariants were badly violated. Still
                // not a reason to abort the whole run over one request
                // -- log loudly and move on.
                warn!(row_idx, "results ring full, dropping completed request");
            }
        }
    }
}

fn run_consumer(
    worker: usize,
    response: &StreamingResponse,
    config: &PipelineConfig,
    collected: &Mutex<Vec<CompletionResults>>,
    diagnostics: &Diagnostics,
) {
    let mut consecutive_empty = 0u32;

    loop {
        response.wait_until_ready();

        match response.fetch() {
            FetchOutcome::Ok(payload) => {
                consecutive_empty = 0;
                match CompletionResults::parse(&payload) {
                    Ok(parsed) => {
                        if parsed.all_choices_empty() {
                            diagnostics.record_empty_choice_event();
                        } else {
                            collected.lock().push(parsed);
                        }
                    }
                    Err(e) => {
                        debug!(worker, error = %e, "malformed completion JSON");
                        diagnostics.record_malformed_completion_json(payload);
                    }
                }
            }
            FetchOutcome::Empty => {
                if response.producer_finished() {
                    consecutive_empty += 1;
                    if consecutive_empty >= config.max_retries {
                        break;
                    }
                }
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    struct ScriptedTransport {
        events: Vec<String>,
        delay: Duration,
    }

    impl Transport for ScriptedTransport {
        fn run_stream(&self, _req: &RequestParameters, response: &StreamingResponse) {
            for event in &self.events {
                response.push(event.clone());
                if !self.delay.is_zero() {
                    std::thread::sleep(self.delay);
                }
            }
            response.finalize();
        }
    }

    fn sample_config() -> Config {
        serde_yaml::from_str(
            r#"
pre_formatted_prompt: "Q: {}"
sentence_tags: [sentence]
dataset: { tag: t, subset: s, split: validation }
class_label:
  tag: label
  values:
    - { id: 0, response: "no" }
    - { id: 1, response: "yes" }
request_params: { model: m, temperature: 0.0, num_logprobs: 0, max_tokens: 1 }
"#,
        )
        .unwrap()
    }

    fn sample_req(golden: i64) -> RequestParameters {
        RequestParameters {
            model: "m".to_string(),
            prompt: "p".to_string(),
            echo: false,
            temperature: 0.0,
            num_logprobs: 0,
            max_tokens: 1,
            top_k: None,
            stream: true,
            golden_label: json!(golden),
        }
    }

    fn completion_event(text: &str) -> String {
        format!(
            r#"{{"id":"c","object":"text_completion","created":1,"choices":[{{"text":"{text}","index":0,"finish_reason":"stop","logprobs":{{"tokens":[],"token_logprobs":[],"top_logprobs":[]}}}}]}}"#
        )
    }

    #[test]
    fn assembles_result_and_grades_correctly() {
        let pipeline = Pipeline::new(PipelineConfig { workers_per_request: 1, ..Default::default() });
        let transport = ScriptedTransport { events: vec![completion_event("yes")], delay: Duration::ZERO };
        let results: MpscRing<RequestResult> = MpscRing::new(16).unwrap();
        let diagnostics = Diagnostics::default();
        let cfg = sample_config();

        pipeline.send_and_collect(sample_req(1), 0, &transport, &cfg, &results, &diagnostics);

        match results.fetch() {
            FetchOutcome::Ok(result) => {
                assert!(result.guessed_correctly);
                assert_eq!(result.completion_results.len(), 1);
            }
            FetchOutcome::Empty => panic!("expected one result"),
        }
    }

    #[test]
    fn zero_event_request_is_dropped_not_pushed() {
        let pipeline = Pipeline::new(PipelineConfig { workers_per_request: 2, ..Default::default() });
        let transport = ScriptedTransport { events: vec![], delay: Duration::ZERO };
        let results: MpscRing<RequestResult> = MpscRing::new(16).unwrap();
        let diagnostics = Diagnostics::default();
        let cfg = sample_config();

        pipeline.send_and_collect(sample_req(1), 7, &transport, &cfg, &results, &diagnostics);

        assert!(matches!(results.fetch(), FetchOutcome::Empty));
        assert_eq!(diagnostics.zero_event_request_count(), 1);
    }

    #[test]
    fn empty_text_choice_is_filtered_keeping_the_first() {
        let pipeline = Pipeline::new(PipelineConfig { workers_per_request: 1, ..Default::default() });
        let transport = ScriptedTransport {
            events: vec![completion_event("yes"), completion_event("")],
            delay: Duration::ZERO,
        };
        let results: MpscRing<RequestResult> = MpscRing::new(16).unwrap();
        let diagnostics = Diagnostics::default();
        let cfg = sample_config();

        pipeline.send_and_collect(sample_req(1), 0, &transport, &cfg, &results, &diagnostics);

        match results.fetch() {
            FetchOutcome::Ok(result) => assert_eq!(result.completion_results.len(), 1),
            FetchOutcome::Empty => panic!("expected one result"),
        }
        assert_eq!(diagnostics.empty_choice_event_count(), 1);
    }

    #[test]
    fn w_equals_one_has_no_contention() {
        let pipeline = Pipeline::new(PipelineConfig { workers_per_request: 1, ..Default::default() });
        let transport = ScriptedTransport {
            events: (0..5).map(|i| completion_event(&format!("t{i}"))).collect(),
            delay: Duration::from_millis(1),
        };
        let results: MpscRing<RequestResult> = MpscRing::new(16).unwrap();
        let diagnostics = Diagnostics::default();
        let cfg = sample_config();

        pipeline.send_and_collect(sample_req(0), 0, &transport, &cfg, &results, &diagnostics);

        match results.fetch() {
            FetchOutcome::Ok(result) => assert_eq!(result.completion_results.len(), 5),
            FetchOutcome::Empty => panic!("expected one result"),
        }
    }
}
