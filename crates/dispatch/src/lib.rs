//! # Dispatch
//!
//! The flush engine: one cooperatively-scheduled coroutine per in-flight
//! destination flush.
//!
//! Responsibilities:
//! - Encode (and optionally prune) a batch once, share the buffer read-only
//! - Run one flush coroutine per destination, gated on explicit resume
//!   signals from the scheduler
//! - Report each flush outcome through a fixed-width completion word on the
//!   destination's non-blocking notification channel

pub mod coroutine;
pub mod destination;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use contracts::{Batch, BatchMeta, EncodedBatch, EngineConfig, FlushOutcome};
pub use coroutine::{CoroState, FlushControl};
pub use destination::{Destination, DestinationId, FlushRequest};
pub use engine::FlushEngine;
pub use error::DispatchError;
pub use metrics::{DestinationMetrics, MetricsSnapshot};
pub use protocol::CompletionEvent;
