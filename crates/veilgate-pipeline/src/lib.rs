//! Redaction pipeline
//!
//! Drives one invocation end to end: fetch the object from the store, scan
//! its bytes through the sealed detector registry, and emit redacted chunks
//! to the sink. The pipeline reports its outcome to the caller; terminal
//! sink calls (`complete`/`fail`) belong to the invocation adapter.

pub mod pipeline;

pub use pipeline::{PipelineConfig, PipelineError, RedactionPipeline};
