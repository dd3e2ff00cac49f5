//! Detector registry: ordered, sealed before scanning begins

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::detector::{Detector, DetectorSpec};

/// Registration-time errors. All of them are fatal at startup: the process
/// must not begin serving with a rejected detector silently dropped.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate detector name: {0}")]
    DuplicateDetectorName(String),

    #[error("registry is sealed; detectors cannot be registered while in use")]
    RegistryInUse,

    #[error("detector '{0}' declares no finite maximum match length")]
    UnboundedPattern(String),

    #[error("detector '{name}' pattern is invalid: {reason}")]
    InvalidPattern { name: String, reason: String },
}

/// Ordered collection of detectors with a one-way sealed flag.
///
/// Built during startup, sealed, then shared via `Arc` with no locking on
/// the scan path. Registration order defines match precedence: when two
/// detectors produce candidates starting at the same offset, the earlier
/// registration wins.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
    sealed: bool,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a detector. Fails if the registry is sealed, the name is
    /// taken, the declared bound is zero, or the pattern can match the
    /// empty string.
    pub fn register(&mut self, detector: Arc<dyn Detector>) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::RegistryInUse);
        }
        let name = detector.name().to_string();
        if self.detectors.iter().any(|d| d.name() == name) {
            return Err(RegistryError::DuplicateDetectorName(name));
        }
        if detector.max_match_len() == 0 {
            return Err(RegistryError::UnboundedPattern(name));
        }
        // A nullable pattern would make the scan cursor stall on zero-width
        // matches; probe it behaviorally so non-regex detectors are covered.
        // The empty haystack exposes plainly nullable patterns; the short
        // word exposes patterns that are nullable only where `\b`-style
        // assertions hold, such as `\bx?`.
        for probe in [b"".as_slice(), b"ab".as_slice()] {
            match detector.earliest_match(probe, 0) {
                Ok(Some(span)) if span.is_empty() => {
                    return Err(RegistryError::InvalidPattern {
                        name,
                        reason: "pattern matches the empty string".to_string(),
                    });
                }
                Err(e) => {
                    return Err(RegistryError::InvalidPattern {
                        name,
                        reason: e.to_string(),
                    });
                }
                Ok(_) => {}
            }
        }
        self.detectors.push(detector);
        Ok(())
    }

    /// Build and append a detector from its configuration form, mapping
    /// compile failures to `InvalidPattern`.
    pub fn register_spec(&mut self, spec: &DetectorSpec) -> Result<(), RegistryError> {
        let detector = spec.build().map_err(|e| RegistryError::InvalidPattern {
            name: spec.name.clone(),
            reason: e.to_string(),
        })?;
        self.register(Arc::new(detector))
    }

    /// Flip the one-way sealed flag. Idempotent.
    pub fn seal(&mut self) {
        if !self.sealed {
            self.sealed = true;
            info!(
                "Detector registry sealed with {} detector(s), max pattern length {}",
                self.detectors.len(),
                self.max_pattern_len()
            );
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Longest declared match bound across all detectors; 0 when empty.
    pub fn max_pattern_len(&self) -> usize {
        self.detectors
            .iter()
            .map(|d| d.max_match_len())
            .max()
            .unwrap_or(0)
    }

    /// Detectors in registration (precedence) order.
    pub fn detectors(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
