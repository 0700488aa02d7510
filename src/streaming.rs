//! Per-request streaming response handle.
//!
//! Wraps one [`SpmcRing<String>`] of framed JSON events plus the
//! termination state the request pipeline's consumers wait on. Unique
//! ownership lives with the pipeline call that created it, with
//! consumer tasks holding non-owning borrows scoped to that call;
//! nothing in this crate wraps it in an `Arc`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::constants::CHUNK_RING_SIZE;
use crate::error::Result;
use crate::ring::{FetchOutcome, PushOutcome, SpmcRing};
use crate::wait::WakeGate;

/// Recorded timings for one request: time-to-first-token and
/// end-to-end latency, both measured from request dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyMetrics {
    pub ttft: Duration,
    pub e2e: Duration,
}

/// Per-request diagnostic accounting: how many events the framer
/// actually pushed, and raw samples of anything that failed to parse
/// into a complete event. Never fatal; folded into the run-wide
/// [`crate::metrics::Diagnostics`] accumulator by the pipeline once the
/// request finishes.
#[derive(Default)]
pub struct Feedback {
    chunks_pushed: AtomicU64,
    parse_failures: Mutex<Vec<String>>,
}

impl Feedback {
    fn record_push(&self) {
        self.chunks_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self, raw: impl Into<String>) {
        self.parse_failures.lock().push(raw.into());
    }

    pub fn chunks_pushed(&self) -> u64 {
        self.chunks_pushed.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> Vec<String> {
        self.parse_failures.lock().clone()
    }
}

pub struct StreamingResponse {
    ring: SpmcRing<String>,
    producer_finished: AtomicBool,
    done: AtomicBool,
    wake: WakeGate,
    start: Instant,
    ttft: Mutex<Option<Duration>>,
    e2e: Mutex<Option<Duration>>,
    feedback: Feedback,
}

impl StreamingResponse {
    pub fn new() -> Result<Self> {
        Self::with_capacity(CHUNK_RING_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: SpmcRing::new(capacity)?,
            producer_finished: AtomicBool::new(false),
            done: AtomicBool::new(false),
            wake: WakeGate::new(),
            start: Instant::now(),
            ttft: Mutex::new(None),
            e2e: Mutex::new(None),
            feedback: Feedback::default(),
        })
    }

    /// Forwarded to the ring; on success records TTFT (first call only)
    /// and wakes any parked consumer.
    pub fn push(&self, event: String) -> PushOutcome {
        let outcome = self.ring.push(event);
        if outcome == PushOutcome::Ok {
            self.feedback.record_push();
            let mut ttft = self.ttft.lock();
            if ttft.is_none() {
                *ttft = Some(self.start.elapsed());
            }
            drop(ttft);
            self.wake.notify_all();
        }
        outcome
    }

    /// Forwarded to the ring.
    pub fn fetch(&self) -> FetchOutcome<String> {
        self.ring.fetch()
    }

    /// `ring non-empty OR done` -- the predicate consumers wait on.
    pub fn ready_to_fetch(&self) -> bool {
        !self.ring.is_empty() || self.done.load(Ordering::Acquire)
    }

    /// Parks the calling thread until `ready_to_fetch()` holds.
    pub fn wait_until_ready(&self) {
        self.wake.wait_until(|| self.ready_to_fetch());
    }

    /// Sets `producer_finished` and `done`, records end-to-end latency
    /// (first call only), and broadcasts the wakeup so every parked
    /// consumer re-checks `ready_to_fetch()`.
    pub fn finalize(&self) {
        let mut e2e = self.e2e.lock();
        if e2e.is_none() {
            *e2e = Some(self.start.elapsed());
        }
        drop(e2e);
        self.producer_finished.store(true, Ordering::Release);
        self.done.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    pub fn producer_finished(&self) -> bool {
        self.producer_finished.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    /// Blocks until `finalize()` has been called, then returns the
    /// recorded latencies. This is the blocking "awaiter" the request
    /// pipeline calls once it has handed a request off to a transport.
    pub fn wait_until_done(&self) -> LatencyMetrics {
        self.wake.wait_until(|| self.done.load(Ordering::Acquire));
        self.latencies().expect("latencies are recorded by finalize() before done is set")
    }

    pub fn latencies(&self) -> Option<LatencyMetrics> {
        let ttft = *self.ttft.lock();
        let e2e = *self.e2e.lock();
        match (ttft, e2e) {
            (Some(ttft), Some(e2e)) => Some(LatencyMetrics { ttft, e2e }),
            // A request that never received a chunk has no TTFT; fall
            // back to e2e for both so a zero-event request still has a
            // usable (if degenerate) latency record.
            (None, Some(e2e)) => Some(LatencyMetrics { ttft: e2e, e2e }),
            _ => None,
        }
    }
}
