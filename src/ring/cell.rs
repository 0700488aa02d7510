//! Backing storage shared by the SPMC and MPSC ring variants.
//!
//! Each cell carries its own sequence counter rather than a boolean
//! published flag: a slot at ring index `i` is writable exactly when its
//! `sequence` equals the logical position of the writer that wants it,
//! and readable exactly when `sequence` equals one past the logical
//! position of the reader that wants it. Comparing against an exact
//! expected value (instead of a true/false flag) makes "this index has
//! wrapped and been freed by its previous reader" a single integer
//! comparison instead of a convention enforced by calling order.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicU64;

pub(super) struct Cell<T> {
    pub(super) sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: access to `value` is gated entirely by the sequence protocol in
// `spmc.rs`/`mpsc.rs`; at most one thread ever holds write access to a
// given cell's payload at a time, and a reader only observes a payload
// after an Acquire load pairs with the writer's Release store.
unsafe impl<T: Send> Send for Cell<T> {}
unsafe impl<T: Send> Sync for Cell<T> {}

impl<T> Cell<T> {
    fn new(seq: u64) -> Self {
        Self {
            sequence: AtomicU64::new(seq),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Writes `value` into the cell. Caller must hold exclusive claim.
    pub(super) unsafe fn write(&self, value: T) {
        (*self.value.get()).write(value);
    }

    /// Reads the value out of the cell, taking ownership. Caller must
    /// hold exclusive claim and the cell must have been written.
    pub(super) unsafe fn read(&self) -> T {
        (*self.value.get()).assume_init_read()
    }
}

pub(super) fn allocate_cells<T>(capacity: usize) -> Box<[Cell<T>]> {
    (0..capacity).map(|i| Cell::new(i as u64)).collect()
}

pub(super) fn check_capacity(capacity: usize) -> crate::error::Result<()> {
    if capacity == 0 {
        return Err(crate::error::BenchError::config("ring capacity must be greater than zero"));
    }
    if !capacity.is_power_of_two() {
        return Err(crate::error::BenchError::config("ring capacity must be a power of two"));
    }
    Ok(())
}
