//! Detector trait and the regex-based implementation

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte span of a match within a scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Error raised by a detector whose matching logic failed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DetectorError(pub String);

/// A named pattern matcher with a fixed redaction token.
///
/// Detectors are registered once at startup and shared read-only across all
/// scans. `max_match_len` is the contract that makes streaming boundary
/// safety possible: no match may consume more bytes than declared, counting
/// one byte of right context when the pattern ends in a boundary assertion
/// (`\b`, `$`). The scanner aborts the invocation if a match exceeds it.
pub trait Detector: Send + Sync {
    /// Unique name, stable for the process lifetime.
    fn name(&self) -> &str;

    /// Fixed replacement text for a confirmed match.
    fn token(&self) -> &str;

    /// Declared upper bound on match length in bytes, including assertion
    /// look-ahead. Zero means unbounded and is rejected at registration.
    fn max_match_len(&self) -> usize;

    /// Earliest match starting at or after byte offset `at`.
    ///
    /// The haystack is the full scan window so that look-around assertions
    /// observe real neighbor bytes; implementations must search from `at`
    /// without treating it as the start of the haystack. Spans must be
    /// non-empty: the scanner treats a zero-width match as a fault.
    fn earliest_match(&self, haystack: &[u8], at: usize) -> Result<Option<Span>, DetectorError>;
}

/// Post-match validation applied before a candidate is accepted.
///
/// A rejected candidate is skipped and the search resumes one byte past its
/// start, so a later overlapping candidate can still be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Luhn checksum over 13-19 digits (payment cards)
    Luhn,
    /// US social security number issue rules
    Ssn,
    /// Phone digit count and country-code rules
    Phone,
}

impl Validator {
    pub fn accepts(&self, candidate: &[u8]) -> bool {
        match self {
            Validator::Luhn => validate_luhn(candidate),
            Validator::Ssn => validate_ssn(candidate),
            Validator::Phone => validate_phone(candidate),
        }
    }
}

fn ascii_digits(candidate: &[u8]) -> Vec<u8> {
    candidate
        .iter()
        .copied()
        .filter(u8::is_ascii_digit)
        .collect()
}

/// Luhn checksum over the digits of the candidate.
fn validate_luhn(candidate: &[u8]) -> bool {
    let digits: Vec<u32> = ascii_digits(candidate)
        .iter()
        .map(|d| u32::from(d - b'0'))
        .collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    checksum.is_multiple_of(10)
}

/// US SSN issue rules: area not 000/666/9xx, group not 00, serial not 0000.
fn validate_ssn(candidate: &[u8]) -> bool {
    let digits = ascii_digits(candidate);

    if digits.len() != 9 {
        return false;
    }

    if &digits[0..3] == b"000" || &digits[0..3] == b"666" || digits[0] == b'9' {
        return false;
    }
    if &digits[3..5] == b"00" {
        return false;
    }
    if &digits[5..9] == b"0000" {
        return false;
    }

    true
}

/// Phone numbers are 10-15 digits; 11 digits must carry the US/Canada
/// country code.
fn validate_phone(candidate: &[u8]) -> bool {
    let digits = ascii_digits(candidate);

    if digits.len() < 10 || digits.len() > 15 {
        return false;
    }

    if digits.len() == 11 && digits[0] != b'1' {
        return false;
    }

    true
}

/// Regex-backed detector over raw bytes.
///
/// Byte-based matching keeps the scanner correct on non-UTF-8 input and on
/// multi-byte characters split across chunk boundaries.
pub struct RegexDetector {
    name: String,
    token: String,
    regex: Regex,
    max_match_len: usize,
    validator: Option<Validator>,
}

impl RegexDetector {
    /// Compile a detector from a pattern.
    ///
    /// `max_match_len` is the declared bound described on [`Detector`];
    /// callers registering the detector are responsible for declaring a
    /// bound the pattern cannot exceed.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        token: impl Into<String>,
        max_match_len: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            token: token.into(),
            regex: Regex::new(pattern)?,
            max_match_len,
            validator: None,
        })
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl Detector for RegexDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn token(&self) -> &str {
        &self.token
    }

    fn max_match_len(&self) -> usize {
        self.max_match_len
    }

    fn earliest_match(&self, haystack: &[u8], at: usize) -> Result<Option<Span>, DetectorError> {
        let mut from = at;
        while from <= haystack.len() {
            let Some(m) = self.regex.find_at(haystack, from) else {
                return Ok(None);
            };
            let span = Span {
                start: m.start(),
                end: m.end(),
            };
            match &self.validator {
                Some(v) if !v.accepts(&haystack[span.start..span.end]) => {
                    // Skip the rejected candidate, not its whole extent: a
                    // valid match may start inside it.
                    from = span.start + 1;
                }
                _ => return Ok(Some(span)),
            }
        }
        Ok(None)
    }
}

/// Serializable description of a custom detector, as it appears in the
/// configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSpec {
    /// Unique detector name
    pub name: String,
    /// Regular expression over bytes
    pub pattern: String,
    /// Replacement token for confirmed matches
    pub token: String,
    /// Declared maximum match length in bytes
    pub max_match_len: usize,
    /// Optional post-match validator
    #[serde(default)]
    pub validator: Option<Validator>,
}

impl DetectorSpec {
    pub fn build(&self) -> Result<RegexDetector, regex::Error> {
        let detector =
            RegexDetector::new(&self.name, &self.pattern, &self.token, self.max_match_len)?;
        Ok(match self.validator {
            Some(validator) => detector.with_validator(validator),
            None => detector,
        })
    }
}
