//! Top-level job dispatch, result-writer thread, and quiescence.
//!
//! Grounded on `ProcessingStrategy::process_benchmark` and
//! `get_request_and_send_loop` (`benchmark_types.hpp`/`.cpp`): an
//! atomic `next_row` counter shared by `K` dispatcher threads, one
//! writer thread draining the results ring to a line-delimited JSON
//! file, and a `writer_can_finish` handoff that only flips once every
//! dispatcher has fully returned.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_N_SAMPLES, RESULTS_RING_SIZE};
use crate::dataset::DatasetSource;
use crate::error::{BenchError, Result};
use crate::grade::{build_request, label_logprobs};
use crate::metrics::{Diagnostics, FinalMetrics, Metrics};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::result::RequestResult;
use crate::ring::{FetchOutcome, MpscRing};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// `K`: concurrent dispatcher threads.
    pub concurrency: usize,
    /// Max dataset rows sampled for this run.
    pub n_samples: usize,
    pub timeout: Option<Duration>,
    pub outfile: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            n_samples: DEFAULT_N_SAMPLES,
            timeout: None,
            outfile: "output.jsonl".to_string(),
        }
    }
}

pub struct Driver {
    config: DriverConfig,
    pipeline_config: PipelineConfig,
}

impl Driver {
    pub fn new(config: DriverConfig, pipeline_config: PipelineConfig) -> Self {
        Self { config, pipeline_config }
    }

    /// Runs a full benchmark pass over `dataset` using `transport`,
    /// writing one JSON line per graded completion to `config.outfile`.
    /// Fatal only if the output file cannot be opened; everything else
    /// recoverable is folded into the returned diagnostics-bearing
    /// final metrics and logged.
    pub fn run(&self, dataset: &dyn DatasetSource, transport: &dyn Transport) -> Result<FinalMetrics> {
        let file = File::create(&self.config.outfile)
            .map_err(|e| BenchError::OutputFileOpen { path: self.config.outfile.clone(), source: e })?;

        let results: MpscRing<RequestResult> = MpscRing::new(RESULTS_RING_SIZE)?;
        let metrics = Metrics::new(self.config.outfile.clone());
        let diagnostics = Diagnostics::default();
        let next_row = AtomicUsize::new(0);
        let writer_can_finish = AtomicBool::new(false);
        let row_limit = dataset.size().min(self.config.n_samples);
        let pipeline = Pipeline::new(self.pipeline_config);
        let row_config = dataset.config();

        std::thread::scope(|scope| {
            let writer_handle = std::thread::Builder::new()
                .name("scale-bench-writer".to_string())
                .spawn_scoped(scope, || {
                    writer_loop(BufWriter::new(file), &results, &metrics, &writer_can_finish, row_config)
                })
                .expect("failed to spawn writer thread");

            let dispatcher_handles: Vec<_> = (0..self.config.concurrency)
                .map(|id| {
                    let pipeline = &pipeline;
                    let next_row = &next_row;
                    let results = &results;
                    let diagnostics = &diagnostics;
                    std::thread::Builder::new()
                        .name(format!("scale-bench-dispatcher-{id}"))
                        .spawn_scoped(scope, move || {
                            dispatcher_loop(id, row_limit, next_row, dataset, transport, pipeline, row_config, results, diagnostics)
                        })
                        .expect("failed to spawn dispatcher thread")
                })
                .collect();

            // Quiescence: writer_can_finish is not set until every
            // dispatcher has fully returned from send_and_collect, so
            // any RequestResult it produced is already visible in the
            // ring before the writer is told it may stop.
            for handle in dispatcher_handles {
                if handle.join().is_err() {
                    warn!("a dispatcher thread panicked; continuing with the remaining dispatchers");
                }
            }

            writer_can_finish.store(true, Ordering::Release);
            if writer_handle.join().is_err() {
                warn!("writer thread panicked");
            }
        });

        let final_metrics = metrics.finalize();
        info!(%final_metrics, "benchmark run complete");
        if diagnostics.zero_event_request_count() > 0 || diagnostics.malformed_completion_json_count() > 0 {
            info!(
                dropped_requests = diagnostics.zero_event_request_count(),
                malformed_json = diagnostics.malformed_completion_json_count(),
                empty_choice_events = diagnostics.empty_choice_event_count(),
                framer_parse_failures = diagnostics.framer_buffer_with_no_events_count(),
                "non-fatal diagnostics recorded during run"
            );
        }
        Ok(final_metrics)
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatcher_loop(
    id: usize,
    row_limit: usize,
    next_row: &AtomicUsize,
    dataset: &dyn DatasetSource,
    transport: &dyn Transport,
    pipeline: &Pipeline,
    row_config: &Config,
    results: &MpscRing<RequestResult>,
    diagnostics: &Diagnostics,
) {
    loop {
        let idx = next_row.fetch_add(1, Ordering::Relaxed);
        if idx >= row_limit {
            break;
        }

        let span = info_span!("request", dispatcher = id, row = idx);
        let _guard = span.enter();

        let req = build_request(dataset, idx);
        pipeline.send_and_collect(req, idx, transport, row_config, results, diagnostics);
    }
}

fn writer_loop(
    mut output: BufWriter<File>,
    results: &MpscRing<RequestResult>,
    metrics: &Metrics,
    writer_can_finish: &AtomicBool,
    row_config: &Config,
) {
    let mut consecutive_empty = 0u32;

    loop {
        match results.fetch() {
            FetchOutcome::Ok(result) => {
                consecutive_empty = 0;
                if let Err(e) = write_result_lines(&mut output, &result, row_config) {
                    warn!(error = %e, "failed to write result line");
                }
                metrics.record(result.latencies.ttft, result.latencies.e2e, result.guessed_correctly);
            }
            FetchOutcome::Empty => {
                if writer_can_finish.load(Ordering::Acquire) {
                    consecutive_empty += 1;
                    if consecutive_empty >= DEFAULT_MAX_RETRIES {
                        break;
                    }
                }
                std::thread::yield_now();
            }
        }
    }

    if let Err(e) = output.flush() {
        warn!(error = %e, "failed to flush output file");
    }
}

/// One JSON line per `CompletionResults` in `result`, matching
/// `get_output_json` (`utils.cpp`). `<response>_logprob` keys are
/// derived once from the first `CompletionResults`' first choice and
/// repeated on every line.
fn write_result_lines(output: &mut impl Write, result: &RequestResult, row_config: &Config) -> std::io::Result<()> {
    let logprobs = result.completion_results.first().and_then(|first| label_logprobs(row_config, first));

    for completion in &result.completion_results {
        let mut line: Value = json!({
            "e2e_latency": result.latencies.e2e.as_secs_f64(),
            "ttft": result.latencies.ttft.as_secs_f64(),
            "id": completion.id,
            "model": completion.model,
            "object": completion.object,
            "prompt": result.params.prompt,
            "guessed_correctly": result.guessed_correctly,
        });

        if let Some(choice) = completion.choices.first() {
            line["finish_reason"] = json!(choice.finish_reason);
            line["text"] = json!(choice.text);
        }

        if let Some(labels) = &logprobs {
            for label in labels {
                line[format!("{}_logprob", label.response)] = json!(label.logprob);
            }
        }

        writeln!(output, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticDatasetSource;
    use crate::streaming::StreamingResponse;
    use serde_json::json;

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

    struct ScriptedTransport {
        text: &'static str,
    }

    impl Transport for ScriptedTransport {
        fn run_stream(&self, _req: &crate::result::RequestParameters, response: &StreamingResponse) {
            let event = format!(
                r#"{{"id":"c","object":"text_completion","created":1,"choices":[{{"text":"{}","index":0,"finish_reason":"stop","logprobs":{{"tokens":[],"token_logprobs":[],"top_logprobs":[]}}}}]}}"#,
                self.text
            );
            response.push(event);
            response.finalize();
        }
    }

    #[test]
    fn dataset_of_size_zero_produces_clean_metrics() {
        let dir = std::env::temp_dir().join(format!("scale-bench-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let outfile = dir.join("zero.jsonl");

        let dataset = StaticDatasetSource::new(vec![], sample_config());
        let transport = ScriptedTransport { text: "yes" };
        let driver = Driver::new(
            DriverConfig { concurrency: 2, n_samples: 10, timeout: None, outfile: outfile.to_string_lossy().to_string() },
            PipelineConfig::default(),
        );

        let final_metrics = driver.run(&dataset, &transport).unwrap();
        assert_eq!(final_metrics.requests_processed, 0);
        assert_eq!(final_metrics.accuracy, 0.0);
    }

    #[test]
    fn run_over_small_dataset_writes_one_line_per_row() {
        let dir = std::env::temp_dir().join(format!("scale-bench-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let outfile = dir.join("small.jsonl");

        let rows = (0..3)
            .map(|i| json!({"sentence": format!("sentence {i}"), "label": i % 2}))
            .collect();
        let dataset = StaticDatasetSource::new(rows, sample_config());
        let transport = ScriptedTransport { text: "yes" };
        let driver = Driver::new(
            DriverConfig { concurrency: 4, n_samples: 10, timeout: None, outfile: outfile.to_string_lossy().to_string() },
            PipelineConfig { workers_per_request: 1, ..Default::default() },
        );

        let final_metrics = driver.run(&dataset, &transport).unwrap();
        assert_eq!(final_metrics.requests_processed, 3);

        let contents = std::fs::read_to_string(&outfile).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
