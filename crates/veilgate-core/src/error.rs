//! Error types for VeilGate Core

use thiserror::Error;

use crate::types::ObjectId;

/// Errors produced by an object store while fetching an object.
///
/// The three variants are the complete cause taxonomy callers may rely on:
/// only `Transient` failures are eligible for a retry, and the decision to
/// retry belongs to the invocation adapter, never to the store itself.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("access denied: {0}")]
    AccessDenied(ObjectId),

    #[error("transient store failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Errors produced by a destination sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    WriteFailed(String),

    #[error("sink closed by receiver")]
    Closed,
}
