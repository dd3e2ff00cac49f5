//! Shared request and report types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored object, as the store understands it (a key or path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for a single transform invocation, carried through
/// logs and error responses for correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte range of an object read, half-open on a missing end.
///
/// `start` is the first byte offset; `end`, when present, is the last byte
/// offset inclusive (HTTP range convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered, when the range is bounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|e| e.saturating_sub(self.start) + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// Everything the pipeline needs to execute one invocation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub object_id: ObjectId,
    pub range: Option<ByteRange>,
}

impl RequestContext {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            request_id: RequestId::new(),
            object_id,
            range: None,
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Object metadata forwarded from the store to the caller unchanged.
///
/// Content length is deliberately absent: output size is unknown until the
/// stream finishes and is never precomputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Content type as reported by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ResponseMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// Outcome summary of a successful invocation.
///
/// Used only for logs and metrics; it never influences the emitted bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionReport {
    /// Bytes consumed from the store
    pub bytes_in: u64,
    /// Bytes written to the sink
    pub bytes_out: u64,
    /// Number of chunks written to the sink
    pub chunks_emitted: u64,
    /// Confirmed redactions per detector, in registry order
    pub redactions: Vec<(String, u64)>,
}

impl RedactionReport {
    /// Total confirmed redactions across all detectors.
    pub fn total_redactions(&self) -> u64 {
        self.redactions.iter().map(|(_, n)| n).sum()
    }
}
