//! VeilGate Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout VeilGate:
//! - Request context and object identifiers
//! - Object store and response sink trait abstractions
//! - Fetch and sink error types

pub mod error;
pub mod sink;
pub mod store;
pub mod types;

pub use error::{FetchError, SinkError};
pub use sink::ResponseSink;
pub use store::{ByteStream, FetchedObject, ObjectStore};
pub use types::{
    ByteRange, ObjectId, RedactionReport, RequestContext, RequestId, ResponseMetadata,
};
