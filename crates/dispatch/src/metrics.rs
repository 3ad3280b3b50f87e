//! Per-destination delivery metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single destination.
///
/// OK flushes record delivered records/bytes, errors count attempts. Retries
/// are deliberately not counted here: the scheduler owns retry accounting
/// since it also decides whether a retry is re-scheduled or abandoned, and
/// counting in both places would double count.
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    /// Records delivered by successful flushes
    ok_records: AtomicU64,
    /// Bytes delivered by successful flushes
    ok_bytes: AtomicU64,
    /// Failed flushes
    error_count: AtomicU64,
    /// Completion events dropped on a full notification channel
    dropped_events: AtomicU64,
}

impl DestinationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok_records(&self) -> u64 {
        self.ok_records.load(Ordering::Relaxed)
    }

    pub fn ok_bytes(&self) -> u64 {
        self.ok_bytes.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Record a successful flush of `records` records / `bytes` bytes.
    pub fn add_ok(&self, records: u64, bytes: u64) {
        self.ok_records.fetch_add(records, Ordering::Relaxed);
        self.ok_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a failed flush.
    pub fn inc_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completion event lost to a full channel.
    pub fn inc_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ok_records: self.ok_records(),
            ok_bytes: self.ok_bytes(),
            error_count: self.error_count(),
            dropped_events: self.dropped_events(),
        }
    }
}

/// Snapshot of destination metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub ok_records: u64,
    pub ok_bytes: u64,
    pub error_count: u64,
    pub dropped_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = DestinationMetrics::new();
        metrics.add_ok(10, 512);
        metrics.add_ok(5, 128);
        metrics.inc_error();
        metrics.inc_dropped_event();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ok_records, 15);
        assert_eq!(snapshot.ok_bytes, 640);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.dropped_events, 1);
    }
}
