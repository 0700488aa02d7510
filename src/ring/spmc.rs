//! Single-producer multi-consumer ring buffer.
//!
//! One writer advances the head plainly; consumers race to CAS the tail.
//! Used for the per-request chunk ring: the transport thread is the
//! sole producer, and the pipeline's consumer threads drain it.

use std::sync::atomic::{AtomicU64, Ordering};

use super::cell::{allocate_cells, check_capacity, Cell};
use crate::error::Result;

/// Outcome of a `push` call. `Full` and `Empty`/`Ok` are the only states
/// that may cross the public API; the CAS retry loop never escapes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Ok,
    Full,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Ok(T),
    Empty,
}

pub struct SpmcRing<T> {
    buffer: Box<[Cell<T>]>,
    mask: u64,
    enqueue_pos: AtomicU64,
    dequeue_pos: AtomicU64,
}

impl<T> SpmcRing<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        check_capacity(capacity)?;
        Ok(Self {
            buffer: allocate_cells(capacity),
            mask: (capacity - 1) as u64,
            enqueue_pos: AtomicU64::new(0),
            dequeue_pos: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Single-writer push. Never blocks; returns `Full` if the ring has
    /// not been drained far enough to reuse the next slot.
    pub fn push(&self, value: T) -> PushOutcome {
        let pos = self.enqueue_pos.load(Ordering::Relaxed);
        let cell = &self.buffer[(pos & self.mask) as usize];
        let seq = cell.sequence.load(Ordering::Acquire);
        let diff = (seq as i64) - (pos as i64);

        if diff != 0 {
            // diff < 0: the slot from the previous lap hasn't been
            // consumed yet. diff > 0 cannot happen: we are the only
            // writer and never advance enqueue_pos past a slot we
            // haven't published.
            return PushOutcome::Full;
        }

        // SAFETY: we are the sole producer and just verified this slot
        // is free (sequence == pos), so no reader holds a claim on it.
        unsafe { cell.write(value) };
        cell.sequence.store(pos + 1, Ordering::Release);
        self.enqueue_pos.store(pos + 1, Ordering::Relaxed);
        PushOutcome::Ok
    }

    /// Multi-consumer fetch. Consumers that lose the tail CAS retry
    /// against a freshly observed position; this loop never returns
    /// RETRY to the caller.
    pub fn fetch(&self) -> FetchOutcome<T> {
        loop {
            let pos = self.dequeue_pos.load(Ordering::Relaxed);
            let cell = &self.buffer[(pos & self.mask) as usize];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = (seq as i64) - (pos as i64 + 1);

            if diff == 0 {
                if self
                    .dequeue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: we won the CAS claiming this slot, and the
                    // sequence check above proved the writer's Release
                    // store is visible, so the payload is initialized.
                    let value = unsafe { cell.read() };
                    cell.sequence.store(pos + self.buffer.len() as u64, Ordering::Release);
                    return FetchOutcome::Ok(value);
                }
                // Lost the race to another consumer; retry.
            } else if diff < 0 {
                return FetchOutcome::Empty;
            }
            // diff > 0: another consumer claimed this slot and is
            // mid-read; spin until it finishes or a slot further ahead
            // becomes the new tail.
            std::hint::spin_loop();
        }
    }

    pub fn is_empty(&self) -> bool {
        let pos = self.dequeue_pos.load(Ordering::Acquire);
        let cell = &self.buffer[(pos & self.mask) as usize];
        let seq = cell.sequence.load(Ordering::Acquire);
        seq <= pos
    }
}
