//! Destination trait - the flush callback contract

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use contracts::BatchMeta;
use tokio::sync::mpsc;

use crate::coroutine::FlushControl;
use crate::metrics::DestinationMetrics;

/// Identifier assigned to a destination at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationId(pub(crate) usize);

impl DestinationId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arguments for one flush attempt.
///
/// The buffer is borrowed: the coroutine never mutates or frees it, and the
/// batch behind it is immutable for the whole delivery.
pub struct FlushRequest<'a> {
    /// Encoded batch buffer
    pub buffer: &'a Bytes,
    /// Routing tag
    pub tag: &'a str,
    /// Batch metadata
    pub meta: &'a BatchMeta,
}

/// An output destination with a registered flush callback.
///
/// The callback must call [`FlushControl::report`] exactly once before
/// returning for the last time. It may call [`FlushControl::suspend`] any
/// number of times while waiting on I/O readiness; each suspension hands
/// control back to the scheduler until it observes readiness and resumes
/// the coroutine.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Destination name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Attempt to deliver one encoded batch.
    async fn flush(&self, req: FlushRequest<'_>, ctrl: &FlushControl);
}

/// Engine-side bookkeeping for one registered destination.
pub(crate) struct DestinationHandle {
    pub(crate) name: String,
    pub(crate) destination: Arc<dyn Destination>,
    /// Sender half of the non-blocking notification channel
    pub(crate) notify_tx: mpsc::Sender<u64>,
    pub(crate) metrics: Arc<DestinationMetrics>,
    /// Arena keys of in-flight coroutines, non-owning, enumeration only
    pub(crate) active: HashSet<usize>,
}
