//! Destination sink abstraction
//!
//! The sink is the caller's response channel. The pipeline writes redacted
//! chunks through it; the invocation adapter owns the terminal calls and
//! guarantees exactly one of `complete` or `fail` per invocation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;
use crate::types::ResponseMetadata;

/// Streaming response channel for one invocation.
///
/// Call order: `begin` at most once, then zero or more `write_chunk` calls,
/// then exactly one terminal call. `fail` is valid at any point, including
/// before `begin`; `complete` is valid only after `begin`. Transports that
/// must commit a response head early may hold it back until the first
/// `write_chunk` so that a failure between `begin` and the first write can
/// still produce a proper error status.
#[async_trait]
pub trait ResponseSink: Send {
    /// Announce a successful fetch and forward the object metadata.
    async fn begin(&mut self, metadata: &ResponseMetadata) -> Result<(), SinkError>;

    /// Write one redacted chunk. Ordering is the emission order.
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Terminal success: all chunks written, the stream is whole.
    async fn complete(&mut self) -> Result<(), SinkError>;

    /// Terminal failure with a stable machine-readable code.
    ///
    /// The message is for humans and must never contain object content.
    async fn fail(&mut self, code: &str, message: &str) -> Result<(), SinkError>;
}
