//! Per-sink delivery counters

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single sink, shared between its handle and worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Events waiting in the sink queue
    queue_len: AtomicUsize,
    /// Events the sink accepted without error
    delivered: AtomicU64,
    /// Events the sink rejected (I/O error, broken peer, bad label)
    failed: AtomicU64,
    /// Events never handed to the sink because its queue was full
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered: self.delivered(),
            failed: self.failed(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl MetricsSnapshot {
    /// Events that reached the sink or were dropped before it
    pub fn offered(&self) -> u64 {
        self.delivered + self.failed + self.dropped
    }

    /// Fraction of offered events delivered, 1.0 when nothing was offered
    pub fn delivery_ratio(&self) -> f64 {
        match self.offered() {
            0 => 1.0,
            offered => self.delivered as f64 / offered as f64,
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={}, failed={}, dropped={} ({:.2}% delivered)",
            self.delivered,
            self.failed,
            self.dropped,
            self.delivery_ratio() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_ratio() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.snapshot().delivery_ratio(), 1.0);

        metrics.record_delivered();
        metrics.record_delivered();
        metrics.record_delivered();
        metrics.record_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.offered(), 4);
        assert!((snapshot.delivery_ratio() - 0.75).abs() < 1e-12);
        assert!(snapshot.to_string().contains("75.00% delivered"));
    }
}
