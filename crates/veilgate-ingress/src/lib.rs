//! VeilGate Ingress
//!
//! Transport surfaces for the redaction pipeline:
//! - `event`: transport-level read events and HTTP header parsing
//! - `adapter`: exactly-once invocation bridging with retry and policy
//! - `http`: the `GET /objects/{*key}` read route

pub mod adapter;
pub mod event;
pub mod http;

pub use adapter::{RedactionPolicy, TransformAdapter};
pub use event::ReadEvent;
pub use http::{HttpState, router};
