//! Object store backends
//!
//! Implementations of the `ObjectStore` trait: a filesystem store rooted at a
//! directory, an HTTP store that proxies an upstream object service, and an
//! in-memory store used by tests and demos.

pub mod fs;
pub mod http;
pub mod memory;

pub use fs::FsObjectStore;
pub use http::{HttpObjectStore, HttpStoreConfig, HttpStoreInitError};
pub use memory::MemoryObjectStore;
