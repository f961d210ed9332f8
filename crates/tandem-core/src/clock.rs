//! Monotonic local clock for `Item::updated_at_local`.
//!
//! Wall-clock milliseconds, forced strictly increasing so two writes in the
//! same millisecond (or across a backwards clock step) still order correctly.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Strictly increasing millisecond timestamps.
#[derive(Debug, Default)]
pub struct LocalClock {
    last: AtomicU64,
}

impl LocalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp: wall-clock millis, or last + 1 if the wall clock lags.
    pub fn tick(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Advance past a timestamp loaded from disk.
    pub fn observe(&self, timestamp: u64) {
        self.last.fetch_max(timestamp, Ordering::Relaxed);
    }

    /// Last issued (or observed) timestamp.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
