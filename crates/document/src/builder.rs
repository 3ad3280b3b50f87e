//! Incremental MessagePack document builder with deferred size finalization
//!
//! MessagePack requires the number of entries in a map/array header before
//! the entries themselves. When composing a document whose final entry count
//! is unknown (e.g. while pruning), this builder reserves the widest header
//! class up front, counts entries as they are registered, and patches the
//! reserved bytes in place on finalization. Two extra bytes per container is
//! the price for never reshuffling the buffer.
//!
//! MANDATORY pairing: every `begin_*` must be matched by exactly one `end`
//! with every entry registered through `ContainerHeader::append` in between,
//! otherwise the resulting document is corrupt. This is a caller contract and
//! is not checked here.

use contracts::StructuredValue;
use rmp::encode;

/// Container format family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Map,
    Array,
}

/// Handle for a container whose size is finalized later.
///
/// Tracks the byte offset of the reserved header and the running entry
/// count. For maps one `append` covers one key/value pair.
#[derive(Debug)]
pub struct ContainerHeader {
    kind: ContainerKind,
    offset: usize,
    entries: u32,
}

impl ContainerHeader {
    /// Register one entry. The caller writes the entry bytes right after.
    pub fn append(&mut self) {
        self.entries += 1;
    }

    /// Entries registered so far.
    pub fn entries(&self) -> u32 {
        self.entries
    }
}

/// Builder owning the output buffer.
///
/// Scalar writes cannot fail on a `Vec` target, so the write API stays
/// infallible.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    buf: Vec<u8>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Open a container of the given kind with a reserved wide header.
    pub fn begin(&mut self, kind: ContainerKind) -> ContainerHeader {
        let offset = self.buf.len();
        let marker = match kind {
            ContainerKind::Map => 0xdf,
            ContainerKind::Array => 0xdd,
        };
        self.buf.push(marker);
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        ContainerHeader {
            kind,
            offset,
            entries: 0,
        }
    }

    pub fn begin_map(&mut self) -> ContainerHeader {
        self.begin(ContainerKind::Map)
    }

    pub fn begin_array(&mut self) -> ContainerHeader {
        self.begin(ContainerKind::Array)
    }

    /// Finalize a container: patch the reserved header with the final count.
    pub fn end(&mut self, header: ContainerHeader) {
        let slice = &mut self.buf[header.offset..];
        match header.kind {
            ContainerKind::Map => patch_map_header(slice, header.entries),
            ContainerKind::Array => patch_array_header(slice, header.entries),
        }
    }

    pub fn write_nil(&mut self) {
        let _ = encode::write_nil(&mut self.buf);
    }

    pub fn write_bool(&mut self, v: bool) {
        let _ = encode::write_bool(&mut self.buf, v);
    }

    pub fn write_int(&mut self, v: i64) {
        let _ = encode::write_sint(&mut self.buf, v);
    }

    pub fn write_float(&mut self, v: f64) {
        let _ = encode::write_f64(&mut self.buf, v);
    }

    pub fn write_str(&mut self, s: &str) {
        let _ = encode::write_str(&mut self.buf, s);
    }

    pub fn write_bin(&mut self, b: &[u8]) {
        let _ = encode::write_bin(&mut self.buf, b);
    }

    /// Append pre-encoded MessagePack bytes verbatim.
    ///
    /// The caller guarantees the slice holds complete objects.
    pub fn write_raw(&mut self, encoded: &[u8]) {
        self.buf.extend_from_slice(encoded);
    }

    /// Serialize a whole value with exact-width container headers.
    ///
    /// Used for verbatim copies of subtrees the caller is not modifying;
    /// containers opened through `begin`/`end` keep the wide class.
    pub fn write_value(&mut self, value: &StructuredValue) {
        match value {
            StructuredValue::Nil => self.write_nil(),
            StructuredValue::Bool(v) => self.write_bool(*v),
            StructuredValue::Int(v) => self.write_int(*v),
            StructuredValue::Float(v) => self.write_float(*v),
            StructuredValue::Str(s) => self.write_str(s),
            StructuredValue::Bytes(b) => self.write_bin(b),
            StructuredValue::Array(items) => {
                let _ = encode::write_array_len(&mut self.buf, items.len() as u32);
                for item in items {
                    self.write_value(item);
                }
            }
            StructuredValue::Map(pairs) => {
                let _ = encode::write_map_len(&mut self.buf, pairs.len() as u32);
                for (k, v) in pairs {
                    self.write_value(k);
                    self.write_value(v);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Patch a map header in place with the final entry count.
///
/// `header[0]` must be the marker byte written when the container was
/// opened. Width class is selected from the marker: fixmap (inline count),
/// map16 (2 bytes big-endian) or map32 (4 bytes big-endian). Any other
/// marker is a caller error and the buffer is left untouched.
pub fn patch_map_header(header: &mut [u8], count: u32) {
    match header[0] {
        0x80..=0x8f => header[0] = 0x80 | (count as u8 & 0x0f),
        0xde => header[1..3].copy_from_slice(&(count as u16).to_be_bytes()),
        0xdf => header[1..5].copy_from_slice(&count.to_be_bytes()),
        _ => {}
    }
}

/// Array counterpart of [`patch_map_header`].
pub fn patch_array_header(header: &mut [u8], count: u32) {
    match header[0] {
        0x90..=0x9f => header[0] = 0x90 | (count as u8 & 0x0f),
        0xdc => header[1..3].copy_from_slice(&(count as u16).to_be_bytes()),
        0xdd => header[1..5].copy_from_slice(&count.to_be_bytes()),
        _ => {}
    }
}

/// Count top-level MessagePack objects in a buffer.
///
/// A batch buffer is a concatenation of records; this walks them without
/// materializing anything beyond the decoder's own state.
pub fn record_count(buf: &[u8]) -> usize {
    let mut rd = buf;
    let mut count = 0;
    while !rd.is_empty() {
        if rmpv::decode::read_value(&mut rd).is_err() {
            break;
        }
        count += 1;
    }
    count
}
