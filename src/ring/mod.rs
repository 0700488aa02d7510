//! Bounded lock-free ring buffers.
//!
//! Two specializations share the same per-slot sequence-number discipline
//! (see `cell.rs`): [`SpmcRing`] for the per-request chunk channel (one
//! producer, many consumers) and [`MpscRing`] for the run-wide results
//! channel (many producers, one consumer).

mod cell;
mod mpsc;
mod spmc;

pub use mpsc::MpscRing;
pub use spmc::{FetchOutcome, PushOutcome, SpmcRing};
