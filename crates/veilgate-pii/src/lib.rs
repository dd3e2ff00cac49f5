//! VeilGate PII Detection and Streaming Redaction
//!
//! This crate provides the redaction engine:
//! - Bounded regex detectors with post-match validation
//! - A sealed, ordered detector registry
//! - A boundary-safe streaming scanner whose output is invariant under
//!   re-chunking of the input
//!
//! The crate is deliberately leaf-level: it knows nothing about object
//! stores, sinks, or transports.

pub mod builtin;
pub mod detector;
pub mod registry;
pub mod scanner;

pub use detector::{Detector, DetectorError, DetectorSpec, RegexDetector, Span, Validator};
pub use registry::{DetectorRegistry, RegistryError};
pub use scanner::{ScanError, StreamScanner};
