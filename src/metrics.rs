//! Run-wide metrics accumulator and the diagnostic counters recoverable
//! conditions get routed through instead of an error return.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Bound on how many raw diagnostic samples (malformed JSON, dropped
/// requests, unparsed framer tails) are retained for post-mortem. Older
/// samples are dropped once the bound is hit; the counters themselves
/// are unbounded.
const MAX_RETAINED_SAMPLES: usize = 256;

/// Non-fatal conditions recorded during a run. Every counter here
/// corresponds to a condition that is diagnostic only -- never
/// surfaced as a `Result::Err`.
#[derive(Default)]
pub struct Diagnostics {
    malformed_completion_json: AtomicU64,
    empty_choice_events: AtomicU64,
    zero_event_requests: AtomicU64,
    framer_buffers_with_no_events: AtomicU64,
    samples: Mutex<Vec<String>>,
}

impl Diagnostics {
    fn record_sample(&self, sample: String) {
        let mut samples = self.samples.lock();
        if samples.len() < MAX_RETAINED_SAMPLES {
            samples.push(sample);
        }
    }

    pub fn record_malformed_completion_json(&self, raw: impl Into<String>) {
        self.malformed_completion_json.fetch_add(1, Ordering::Relaxed);
        self.record_sample(raw.into());
    }

    pub fn record_empty_choice_event(&self) {
        self.empty_choice_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_zero_event_request(&self, row_idx: usize) {
        self.zero_event_requests.fetch_add(1, Ordering::Relaxed);
        self.record_sample(format!("dropped request: row {row_idx} produced no events"));
    }

    pub fn record_framer_buffer_with_no_events(&self, raw: impl Into<String>) {
        self.framer_buffers_with_no_events.fetch_add(1, Ordering::Relaxed);
        self.record_sample(raw.into());
    }

    pub fn malformed_completion_json_count(&self) -> u64 {
        self.malformed_completion_json.load(Ordering::Relaxed)
    }

    pub fn empty_choice_event_count(&self) -> u64 {
        self.empty_choice_events.load(Ordering::Relaxed)
    }

    pub fn zero_event_request_count(&self) -> u64 {
        self.zero_event_requests.load(Ordering::Relaxed)
    }

    pub fn framer_buffer_with_no_events_count(&self) -> u64 {
        self.framer_buffers_with_no_events.load(Ordering::Relaxed)
    }

    pub fn samples(&self) -> Vec<String> {
        self.samples.lock().clone()
    }
}

/// Running accumulator the writer loop updates once per serialized
/// `RequestResult`. `FinalMetrics` is the reduction computed once the
/// run ends.
pub struct Metrics {
    start: Instant,
    requests_processed: AtomicU64,
    sum_ttft: Mutex<Duration>,
    sum_e2e: Mutex<Duration>,
    sum_correct: AtomicU64,
    pub output_path: String,
}

impl Metrics {
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            requests_processed: AtomicU64::new(0),
            sum_ttft: Mutex::new(Duration::ZERO),
            sum_e2e: Mutex::new(Duration::ZERO),
            sum_correct: AtomicU64::new(0),
            output_path: output_path.into(),
        }
    }

    /// Folds one `RequestResult`'s latencies and correctness into the
    /// running totals. Called by the writer loop only after a result is
    /// serialized to disk, so a crash mid-write can never count a
    /// request that wasn't actually persisted.
    pub fn record(&self, ttft: Duration, e2e: Duration, correct: bool) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        *self.sum_ttft.lock() += ttft;
        *self.sum_e2e.lock() += e2e;
        if correct {
            self.sum_correct.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }

    /// Reduces the running totals into the final report. Takes `&self`
    /// at the moment the run is declared over; `end` is fixed to now.
    pub fn finalize(&self) -> FinalMetrics {
        let end = Instant::now();
        let processed = self.requests_processed() as f64;
        let seconds = end.duration_since(self.start).as_secs_f64();

        let avg_ttft = if processed > 0.0 {
            self.sum_ttft.lock().as_secs_f64() / processed
        } else {
            0.0
        };
        let avg_e2e = if processed > 0.0 {
            self.sum_e2e.lock().as_secs_f64() / processed
        } else {
            0.0
        };
        let accuracy = if processed > 0.0 {
            self.sum_correct.load(Ordering::Relaxed) as f64 / processed
        } else {
            0.0
        };
        let rate = if seconds > 0.0 { processed / seconds } else { 0.0 };

        FinalMetrics {
            avg_ttft_secs: avg_ttft,
            avg_e2e_secs: avg_e2e,
            requests_processed: self.requests_processed(),
            duration_secs: seconds,
            requests_per_sec: rate,
            accuracy,
        }
    }
}

/// The computed reduction reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalMetrics {
    pub avg_ttft_secs: f64,
    pub avg_e2e_secs: f64,
    pub requests_processed: u64,
    pub duration_secs: f64,
    pub requests_per_sec: f64,
    pub accuracy: f64,
}

impl std::fmt::Display for FinalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "==========")?;
        writeln!(f, "BENCHMARK RESULTS")?;
        writeln!(f, "requests_processed: {}", self.requests_processed)?;
        writeln!(f, "duration_secs: {:.3}", self.duration_secs)?;
        writeln!(f, "requests_per_sec: {:.3}", self.requests_per_sec)?;
        writeln!(f, "avg_ttft_secs: {:.4}", self.avg_ttft_secs)?;
        writeln!(f, "avg_e2e_secs: {:.4}", self.avg_e2e_secs)?;
        writeln!(f, "accuracy: {:.2}%", self.accuracy * 100.0)?;
        write!(f, "==========")
    }
}
