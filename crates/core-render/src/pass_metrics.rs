//! Execution-path counters for the prepare/commit pass, separate from the
//! scheduler's semantic counters (requests, coalesces, stale tokens).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PassMetrics {
    parts_prepared: AtomicU64,
    parts_committed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassMetricsSnapshot {
    pub parts_prepared: u64,
    pub parts_committed: u64,
}

impl PassMetrics {
    pub fn incr_prepared(&self) {
        self.parts_prepared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_committed(&self) {
        self.parts_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PassMetricsSnapshot {
        PassMetricsSnapshot {
            parts_prepared: self.parts_prepared.load(Ordering::Relaxed),
            parts_committed: self.parts_committed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = PassMetrics::default();
        m.incr_prepared();
        m.incr_prepared();
        m.incr_committed();
        let snap = m.snapshot();
        assert_eq!(snap.parts_prepared, 2);
        assert_eq!(snap.parts_committed, 1);
    }
}
