//! Object store abstraction
//!
//! The store is the source of truth for object bytes. Implementations live in
//! `veilgate-store`; the pipeline only ever sees this trait, so any backend
//! that can stream bytes and classify its failures can sit behind it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::FetchError;
use crate::types::{ByteRange, ObjectId, ResponseMetadata};

/// Stream of object bytes in store-chosen chunk sizes.
///
/// Mid-stream read failures surface as `FetchError` items; the consumer
/// treats any stream error as fatal for the invocation.
pub type ByteStream = Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send + Unpin>;

/// A successfully opened object: its forwarded metadata plus the byte stream.
pub struct FetchedObject {
    pub metadata: ResponseMetadata,
    pub stream: ByteStream,
}

/// Read access to stored objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for reading, optionally restricted to a byte range.
    ///
    /// Range semantics are the store's own; the caller receives exactly the
    /// window it asked for and the transform treats that window as an
    /// independent text stream.
    async fn fetch(
        &self,
        id: &ObjectId,
        range: Option<&ByteRange>,
    ) -> Result<FetchedObject, FetchError>;
}
