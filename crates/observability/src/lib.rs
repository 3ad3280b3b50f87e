//! # Observability
//!
//! Tracing + Prometheus wiring for the delivery pipeline.
//!
//! ## Features
//!
//! - Tracing initialization (JSON/Pretty/Compact formats)
//! - Prometheus metrics export
//! - Delivery metrics recording and aggregation
//!
//! ## Example
//!
//! ```ignore
//! use observability::{init, metrics};
//!
//! observability::init()?;
//!
//! // after consuming a completion event
//! metrics::record_flush_outcome(&name, event.outcome, &meta);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    record_batch_dispatched, record_completion_dropped, record_flush_outcome,
    record_in_flight_coroutines, DeliveryAggregator, DeliverySummary, DestinationTotals,
};

/// Initialize observability (Tracing + Prometheus) with defaults.
///
/// - Tracing: JSON format, honors the RUST_LOG environment variable
/// - Prometheus: listens on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log output format
    pub log_format: LogFormat,
    /// Prometheus listener port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log level when RUST_LOG is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human-readable multi-line format
    Pretty,
    /// Single-line compact format
    Compact,
}

/// Initialize with a custom configuration.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    }
    .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Initialize only the Prometheus exporter.
///
/// For processes where tracing was already set up elsewhere.
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, Some(9000));
        assert_eq!(config.default_log_level, "info");
    }
}
