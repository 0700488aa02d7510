//! Wakeup primitive used to park idle chunk consumers.
//!
//! Grounded on the blocking wait strategy pattern used throughout the
//! disruptor implementation this crate is descended from: a
//! `parking_lot::Mutex` guarding nothing but the condvar's predicate
//! check, paired with a `Condvar` that `notify_all`s on every publish
//! and on `finalize`.

use parking_lot::{Condvar, Mutex};

/// A broadcastable wakeup gate. `wait_while` suspends the calling
/// thread until `predicate` returns `true`; `notify_all` wakes every
/// waiter so it can re-check its predicate.
pub struct WakeGate {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl WakeGate {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `predicate()` returns `true`, then returns.
    pub fn wait_until(&self, mut predicate: impl FnMut() -> bool) {
        if predicate() {
            return;
        }
        let mut guard = self.lock.lock();
        while !predicate() {
            self.condvar.wait(&mut guard);
        }
    }

    /// Wakes every thread currently parked in `wait_until`.
    pub fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

impl Default for WakeGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_until_returns_immediately_if_predicate_already_true() {
        let gate = WakeGate::new();
        gate.wait_until(|| true);
    }

    #[test]
    fn notify_all_wakes_every_waiter() {
        let gate = Arc::new(WakeGate::new());
        let ready = Arc::new(AtomicBool::new(false));
        let woken = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let ready = Arc::clone(&ready);
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    gate.wait_until(|| ready.load(Ordering::Acquire));
                    woken.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        ready.store(true, Ordering::Release);
        gate.notify_all();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::Acquire), 4);
    }
}
