//! Boundary-safe streaming scanner
//!
//! The scanner consumes a byte stream chunk by chunk and emits the redacted
//! stream. Its output is invariant under re-chunking: for a fixed input and
//! registry, any split of the input (down to 1-byte chunks) produces the
//! same bytes as a single pass.
//!
//! Two pieces of state make that possible:
//!
//! - a carry buffer holding the window suffix whose match outcome could
//!   still change with more input (bounded by `max_pattern_len - 1`);
//! - one byte of already-emitted left context, so leading `\b`/`^`
//!   assertions observe the true neighbor byte instead of a synthetic
//!   haystack start.
//!
//! A candidate starting at offset `p` in the working window is confirmed
//! only when every byte its outcome can depend on is present, that is when
//! `p + max_pattern_len <= len(window)`. With no look-behind in the regex
//! engine and declared bounds covering one byte of look-ahead, bytes beyond
//! that limit cannot change a match at `p`.

use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::detector::Span;
use crate::registry::DetectorRegistry;

/// Scan-time errors. All of them abort the invocation; partially scanned
/// output is never passed off as complete.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("detector '{detector}' fault: {message}")]
    DetectorFault { detector: String, message: String },
}

#[derive(Clone, Copy)]
enum NextMatch {
    Stale,
    Found(Span),
    Exhausted,
}

/// Stateful chunk processor over a sealed registry.
///
/// One scanner serves one stream; it is not reusable after [`finish`].
///
/// [`finish`]: StreamScanner::finish
pub struct StreamScanner {
    registry: Arc<DetectorRegistry>,
    carry: Vec<u8>,
    prev: Option<u8>,
    counts: Vec<u64>,
    scan_budget: Option<Duration>,
}

impl StreamScanner {
    pub fn new(registry: Arc<DetectorRegistry>) -> Self {
        let counts = vec![0; registry.len()];
        Self {
            registry,
            carry: Vec::new(),
            prev: None,
            counts,
            scan_budget: None,
        }
    }

    /// Bound the wall-clock time of each `scan_chunk`/`finish` call. On
    /// expiry the scan aborts with a `DetectorFault` naming the detector
    /// that was about to run.
    pub fn with_scan_budget(mut self, budget: Duration) -> Self {
        self.scan_budget = Some(budget);
        self
    }

    /// Process one chunk, returning the redacted bytes that are safe to
    /// emit now. Suffix bytes whose outcome is not yet decidable move into
    /// the carry and surface on a later call.
    pub fn scan_chunk(&mut self, chunk: &[u8]) -> Result<Bytes, ScanError> {
        self.process(chunk, false)
    }

    /// End of stream: scan the remaining carry with no deferral and return
    /// the final redacted bytes.
    pub fn finish(&mut self) -> Result<Bytes, ScanError> {
        self.process(&[], true)
    }

    /// Confirmed redactions per detector, in registry order.
    pub fn counts(&self) -> Vec<(String, u64)> {
        self.registry
            .detectors()
            .iter()
            .zip(&self.counts)
            .map(|(d, &n)| (d.name().to_string(), n))
            .collect()
    }

    /// Current carry length in bytes. Never exceeds
    /// `registry.max_pattern_len() - 1`.
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    fn process(&mut self, chunk: &[u8], at_eof: bool) -> Result<Bytes, ScanError> {
        if self.registry.is_empty() {
            return Ok(Bytes::copy_from_slice(chunk));
        }

        let max_len = self.registry.max_pattern_len();

        // Working window: left context byte, carry, new chunk.
        let base = usize::from(self.prev.is_some());
        let mut window = Vec::with_capacity(base + self.carry.len() + chunk.len());
        if let Some(b) = self.prev {
            window.push(b);
        }
        window.extend_from_slice(&self.carry);
        window.extend_from_slice(chunk);
        let len = window.len();

        // Candidates starting below this offset are final.
        let stable = if at_eof {
            len
        } else {
            (len + 1).saturating_sub(max_len)
        };

        let deadline = self.scan_budget.map(|b| Instant::now() + b);
        let detectors = self.registry.detectors();
        let mut next = vec![NextMatch::Stale; detectors.len()];

        let mut out = BytesMut::with_capacity(chunk.len());
        let mut cursor = base;

        loop {
            // Refresh stale candidates, then take the earliest start; ties
            // go to the earlier registration.
            let mut best: Option<(Span, usize)> = None;
            for (i, detector) in detectors.iter().enumerate() {
                // Checked per detector, not per refresh, so a pass that only
                // consults cached candidates still observes the budget.
                if let Some(deadline) = deadline
                    && Instant::now() >= deadline
                {
                    return Err(ScanError::DetectorFault {
                        detector: detector.name().to_string(),
                        message: "scan budget exceeded".to_string(),
                    });
                }
                let refresh = match next[i] {
                    NextMatch::Stale => true,
                    NextMatch::Found(span) => span.start < cursor,
                    NextMatch::Exhausted => false,
                };
                if refresh {
                    next[i] = match detector.earliest_match(&window, cursor) {
                        Ok(Some(span)) => NextMatch::Found(span),
                        Ok(None) => NextMatch::Exhausted,
                        Err(e) => {
                            return Err(ScanError::DetectorFault {
                                detector: detector.name().to_string(),
                                message: e.to_string(),
                            });
                        }
                    };
                }
                if let NextMatch::Found(span) = next[i]
                    && best.map_or(true, |(b, _)| span.start < b.start)
                {
                    best = Some((span, i));
                }
            }

            let Some((span, winner)) = best else { break };
            if !at_eof && span.start >= stable {
                break;
            }

            let detector = &detectors[winner];
            // A zero-width winner would never advance the cursor.
            if span.is_empty() {
                return Err(ScanError::DetectorFault {
                    detector: detector.name().to_string(),
                    message: "zero-width match".to_string(),
                });
            }
            if span.len() > detector.max_match_len() {
                return Err(ScanError::DetectorFault {
                    detector: detector.name().to_string(),
                    message: format!(
                        "match of {} bytes exceeds declared bound {}",
                        span.len(),
                        detector.max_match_len()
                    ),
                });
            }

            out.extend_from_slice(&window[cursor..span.start]);
            out.extend_from_slice(detector.token().as_bytes());
            self.counts[winner] += 1;
            cursor = span.end;
        }

        if at_eof {
            out.extend_from_slice(&window[cursor..]);
            self.carry.clear();
            self.prev = None;
        } else {
            let cut = cursor.max(stable);
            out.extend_from_slice(&window[cursor..cut]);
            self.prev = if cut > 0 { Some(window[cut - 1]) } else { None };
            self.carry = window[cut..].to_vec();
        }

        debug!(
            "Scanned chunk: {} bytes in, {} bytes out, carry {}",
            chunk.len(),
            out.len(),
            self.carry.len()
        );
        Ok(out.freeze())
    }
}
