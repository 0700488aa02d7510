//! Multi-producer single-consumer ring buffer.
//!
//! Writers CAS the head; the sole reader advances the tail plainly. Used
//! for the run-wide results ring: every dispatcher thread pushes its
//! assembled `RequestResult`, and the writer thread alone drains it.

use std::sync::atomic::{AtomicU64, Ordering};

use super::cell::{allocate_cells, check_capacity, Cell};
use super::spmc::{FetchOutcome, PushOutcome};
use crate::error::Result;

pub struct MpscRing<T> {
    buffer: Box<[Cell<T>]>,
    mask: u64,
    enqueue_pos: AtomicU64,
    dequeue_pos: AtomicU64,
}

impl<T> MpscRing<T> {
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

    /// Multi-producer push. A producer that loses the head CAS re-reads
    /// the current position and retries; RETRY never escapes this call.
    pub fn push(&self, value: T) -> PushOutcome {
        loop {
            let pos = self.enqueue_pos.load(Ordering::Relaxed);
            let cell = &self.buffer[(pos & self.mask) as usize];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = (seq as i64) - (pos as i64);

            if diff == 0 {
                if self
                    .enqueue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: we won the CAS claiming this slot; the
                    // sequence check proved the previous occupant (if
                    // any) has already been consumed.
                    unsafe { cell.write(value) };
                    cell.sequence.store(pos + 1, Ordering::Release);
                    return PushOutcome::Ok;
                }
                // Lost the race to another producer; retry.
            } else if diff < 0 {
                return PushOutcome::Full;
            }
            // diff > 0: another producer has already claimed this slot
            // and is mid-write; spin and retry against a fresh position.
            std::hint::spin_loop();
        }
    }

    /// Single-consumer fetch. No CAS is needed since only one thread
    /// may ever call this, but `dequeue_pos` stays atomic so producers
    /// can reason about slot reuse without a side channel.
    pub fn fetch(&self) -> FetchOutcome<T> {
        let pos = self.dequeue_pos.load(Ordering::Relaxed);
        let cell = &self.buffer[(pos & self.mask) as usize];
        let seq = cell.sequence.load(Ordering::Acquire);
        let diff = (seq as i64) - (pos as i64 + 1);

        if diff != 0 {
            return FetchOutcome::Empty;
        }

        // SAFETY: sole reader, and the sequence check proved the
        // producer's Release store of this slot is visible.
        let value = unsafe { cell.read() };
        self.dequeue_pos.store(pos + 1, Ordering::Relaxed);
        cell.sequence.store(pos + self.buffer.len() as u64, Ordering::Release);
        FetchOutcome::Ok(value)
    }

    pub fn is_empty(&self) -> bool {
        let pos = self.dequeue_pos.load(Ordering::Acquire);
        let cell = &self.buffer[(pos & self.mask) as usize];
        let seq = cell.sequence.load(Ordering::Acquire);
        seq <= pos
    }
}
