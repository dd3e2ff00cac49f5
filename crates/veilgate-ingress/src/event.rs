//! Inbound read events
//!
//! A `ReadEvent` is the transport-level description of one object read:
//! which key, which byte range, under which request id. Transports build
//! one and hand it to the adapter. Nothing here is tied to axum; the
//! HTTP helpers parse plain strings.

use veilgate_core::{ByteRange, ObjectId, RequestContext, RequestId};

/// One inbound object read.
#[derive(Debug, Clone)]
pub struct ReadEvent {
    /// Correlation id, carried into logs and error bodies.
    pub request_id: RequestId,
    /// Store key of the requested object.
    pub object_key: String,
    /// Requested byte range, if the transport carried one.
    pub range: Option<ByteRange>,
}

impl ReadEvent {
    pub fn new(object_key: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            object_key: object_key.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Build an event from a URL path and an optional `Range` header value.
    ///
    /// A malformed range value is ignored and the whole object is read;
    /// range is an optimization hint, not a correctness gate.
    pub fn from_http(path: &str, range_header: Option<&str>) -> Self {
        Self {
            request_id: RequestId::new(),
            object_key: object_key_from_path(path),
            range: range_header.and_then(parse_range_header),
        }
    }

    /// Pipeline-facing view of the event.
    pub fn context(&self) -> RequestContext {
        RequestContext {
            request_id: self.request_id.clone(),
            object_id: ObjectId::from(self.object_key.as_str()),
            range: self.range,
        }
    }
}

/// Extract the store key from a URL path: leading slashes stripped, query
/// string ignored.
pub fn object_key_from_path(path: &str) -> String {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.trim_start_matches('/').to_string()
}

/// Parse an HTTP `Range` header value of the form `bytes=a-b` or `bytes=a-`.
///
/// Anything else returns `None`: suffix ranges, multi-range sets, and
/// malformed values all fall back to a full-object read.
pub fn parse_range_header(value: &str) -> Option<ByteRange> {
    let spec = value.strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end = end.trim();
    if end.is_empty() {
        return Some(ByteRange::new(start, None));
    }
    let end: u64 = end.parse().ok()?;
    if end < start {
        return None;
    }
    Some(ByteRange::new(start, Some(end)))
}
