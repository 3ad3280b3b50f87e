//! Batch - the record set handed to one flush task

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::StructuredValue;

/// A batch of structured records routed under one tag.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Routing tag (e.g. input name)
    pub tag: String,
    /// Records, each a top-level map
    pub records: Vec<StructuredValue>,
}

impl Batch {
    pub fn new(tag: impl Into<String>, records: Vec<StructuredValue>) -> Self {
        Self {
            tag: tag.into(),
            records,
        }
    }
}

/// Metadata describing an encoded batch, shared with every flush of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMeta {
    /// Routing tag
    pub tag: String,
    /// Number of records in the batch
    pub records: usize,
    /// Encoded size in bytes
    pub bytes: usize,
}

/// An encoded batch ready for delivery.
///
/// The buffer is immutable for the whole delivery; flush coroutines borrow
/// it via cheap `Bytes` clones and never mutate it.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub meta: BatchMeta,
    pub buffer: Bytes,
}

impl EncodedBatch {
    pub fn new(tag: impl Into<String>, records: usize, buffer: Bytes) -> Self {
        Self {
            meta: BatchMeta {
                tag: tag.into(),
                records,
                bytes: buffer.len(),
            },
            buffer,
        }
    }
}
