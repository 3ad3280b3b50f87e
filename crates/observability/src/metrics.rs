//! Delivery pipeline metrics recording
//!
//! Scheduler-side counterpart of the per-destination counters the flush
//! engine keeps: recorded when completion events are consumed, so the
//! numbers reflect what the scheduler has actually observed.

use contracts::{BatchMeta, FlushOutcome};
use metrics::{counter, gauge, histogram};

/// Record the outcome of one consumed flush completion.
///
/// Called once per completion event read off a destination's notification
/// channel.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_flush_outcome;
///
/// let event = engine.consume(word)?;
/// record_flush_outcome("stdout", event.outcome, &meta);
/// ```
pub fn record_flush_outcome(destination: &str, outcome: FlushOutcome, meta: &BatchMeta) {
    counter!(
        "delivery_flushes_total",
        "destination" => destination.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    match outcome {
        FlushOutcome::Ok => {
            histogram!(
                "delivery_flush_bytes",
                "destination" => destination.to_string()
            )
            .record(meta.bytes as f64);
            histogram!(
                "delivery_flush_records",
                "destination" => destination.to_string()
            )
            .record(meta.records as f64);
        }
        FlushOutcome::Retry => {
            counter!(
                "delivery_retries_total",
                "destination" => destination.to_string()
            )
            .increment(1);
        }
        FlushOutcome::Error => {}
    }
}

/// Record one batch handed to the engine.
pub fn record_batch_dispatched(tag: &str, destinations: usize, bytes: usize) {
    counter!(
        "delivery_batches_total",
        "tag" => tag.to_string()
    )
    .increment(1);
    counter!(
        "delivery_batch_fanout_total",
        "tag" => tag.to_string()
    )
    .increment(destinations as u64);
    histogram!("delivery_batch_bytes").record(bytes as f64);
}

/// Record a completion event lost to a full notification channel.
pub fn record_completion_dropped(destination: &str) {
    counter!(
        "delivery_completions_dropped_total",
        "destination" => destination.to_string()
    )
    .increment(1);
}

/// Record the current number of in-flight flush coroutines.
pub fn record_in_flight_coroutines(count: usize) {
    gauge!("delivery_coroutines_in_flight").set(count as f64);
}

/// Per-destination running totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationTotals {
    pub ok_flushes: u64,
    pub ok_records: u64,
    pub ok_bytes: u64,
    pub errors: u64,
    pub retries: u64,
}

/// In-memory aggregation of consumed outcomes, for summaries and shutdown
/// reports.
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    totals: std::collections::HashMap<String, DestinationTotals>,
}

impl DeliveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one consumed outcome.
    pub fn update(&mut self, destination: &str, outcome: FlushOutcome, meta: &BatchMeta) {
        let totals = self.totals.entry(destination.to_string()).or_default();
        match outcome {
            FlushOutcome::Ok => {
                totals.ok_flushes += 1;
                totals.ok_records += meta.records as u64;
                totals.ok_bytes += meta.bytes as u64;
            }
            FlushOutcome::Error => totals.errors += 1,
            FlushOutcome::Retry => totals.retries += 1,
        }
    }

    pub fn totals(&self, destination: &str) -> Option<&DestinationTotals> {
        self.totals.get(destination)
    }

    /// Build a summary report.
    pub fn summary(&self) -> DeliverySummary {
        let mut destinations: Vec<_> = self
            .totals
            .iter()
            .map(|(name, totals)| (name.clone(), *totals))
            .collect();
        destinations.sort_by(|a, b| a.0.cmp(&b.0));
        DeliverySummary { destinations }
    }

    /// Reset the running totals.
    pub fn reset(&mut self) {
        self.totals.clear();
    }
}

/// Aggregated delivery report.
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub destinations: Vec<(String, DestinationTotals)>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        if self.destinations.is_empty() {
            writeln!(f, "No flushes consumed")?;
            return Ok(());
        }
        for (name, t) in &self.destinations {
            writeln!(
                f,
                "{}: ok={} ({} records, {} bytes), errors={}, retries={}",
                name, t.ok_flushes, t.ok_records, t.ok_bytes, t.errors, t.retries
            )?;
        }
        Ok(())
    }
}
