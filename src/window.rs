// SAMPLING WINDOW COUNTERS
// ONE MUTABLE COUNTING RECORD PER SAMPLING INTERVAL.
// ANY NUMBER OF PRODUCERS INCREMENT CONCURRENTLY. ONLY THE CONTROLLER RESETS.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Window {
    tested: AtomicU64,
    sampled: AtomicU64,
}

impl Window {
    pub const fn new() -> Self {
        Self {
            tested: AtomicU64::new(0),
            sampled: AtomicU64::new(0),
        }
    }

    pub(crate) fn add_test(&self) {
        self.tested.fetch_add(1, Ordering::Relaxed);
    }

    // SINGLE READ-MODIFY-WRITE: ONLY ADDS 1 WHILE BELOW THE CEILING.
    // A NON-POSITIVE LIMIT ACCEPTS NOTHING.
    pub(crate) fn add_sample(&self, limit: i64) -> bool {
        if limit <= 0 {
            return false;
        }
        let limit = limit as u64;
        self.sampled
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n < limit { Some(n + 1) } else { None }
            })
            .is_ok()
    }

    pub(crate) fn add_sample_unbounded(&self) {
        self.sampled.fetch_add(1, Ordering::Relaxed);
    }

    // CALLER GUARANTEES THIS WINDOW IS NO LONGER ACTIVE
    pub(crate) fn reset(&self) {
        self.tested.store(0, Ordering::Relaxed);
        self.sampled.store(0, Ordering::Relaxed);
    }

    pub fn tested(&self) -> u64 {
        self.tested.load(Ordering::Relaxed)
    }

    pub fn sampled(&self) -> u64 {
        self.sampled.load(Ordering::Relaxed)
    }
}
