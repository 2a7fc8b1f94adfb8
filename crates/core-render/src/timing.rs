//! Pass timing instrumentation.
//!
//! Captures the duration of the last completed pass in nanoseconds. Owned per
//! scheduler instance so two schedulers in one process never clobber each
//! other's reading.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RenderTiming {
    last_pass_ns: AtomicU64,
}

impl RenderTiming {
    /// Record a pass duration in nanoseconds.
    pub fn record_last_pass_ns(&self, ns: u64) {
        self.last_pass_ns.store(ns, Ordering::Relaxed);
    }

    /// Fetch the last recorded pass duration in nanoseconds.
    pub fn last_pass_ns(&self) -> u64 {
        self.last_pass_ns.load(Ordering::Relaxed)
    }
}
