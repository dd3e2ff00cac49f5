//! Built-in detector catalog
//!
//! Bounded, validated detectors constructible by name from configuration.
//! Every pattern carries an explicit length bound: the local part of an
//! email is capped at 64 bytes and the TLD at 24, a card number at 19
//! digits plus separators, and so on. Streaming boundary safety depends on
//! those caps, so unbounded repetitions never appear here.

use crate::detector::{RegexDetector, Validator};

/// Names accepted by [`by_name`], in the order the default catalog
/// registers them.
pub const NAMES: [&str; 5] = ["email", "phone", "ssn", "credit_card", "ipv4"];

/// Default enabled set when configuration does not name detectors.
pub const DEFAULT_ENABLED: [&str; 1] = ["email"];

// Declared bounds: widest possible match plus one byte of look-ahead for
// the trailing boundary assertion.
const EMAIL_MAX_LEN: usize = 346;
const PHONE_MAX_LEN: usize = 20;
const SSN_MAX_LEN: usize = 12;
const CREDIT_CARD_MAX_LEN: usize = 23;
const IPV4_MAX_LEN: usize = 16;

/// Email addresses, replaced by `[REDACTED_EMAIL]`.
pub fn email() -> Result<RegexDetector, regex::Error> {
    RegexDetector::new(
        "email",
        r"\b[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,255}\.[A-Za-z]{2,24}\b",
        "[REDACTED_EMAIL]",
        EMAIL_MAX_LEN,
    )
}

/// Phone numbers: (123) 456-7890, 123-456-7890, 123.456.7890, +1 123 456 7890
pub fn phone() -> Result<RegexDetector, regex::Error> {
    Ok(RegexDetector::new(
        "phone",
        r"(\+?\d{1,3}[-.\s]?)?(\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]?\d{4}\b",
        "[REDACTED_PHONE]",
        PHONE_MAX_LEN,
    )?
    .with_validator(Validator::Phone))
}

/// SSN: 123-45-6789 or 123456789, subject to issue rules.
pub fn ssn() -> Result<RegexDetector, regex::Error> {
    Ok(
        RegexDetector::new("ssn", r"\b\d{3}-?\d{2}-?\d{4}\b", "[REDACTED_SSN]", SSN_MAX_LEN)?
            .with_validator(Validator::Ssn),
    )
}

/// Payment cards: 13-19 digit sequences with optional spaces/dashes,
/// subject to the Luhn checksum.
pub fn credit_card() -> Result<RegexDetector, regex::Error> {
    Ok(RegexDetector::new(
        "credit_card",
        r"\b(?:\d{4}[-\s]?){3}\d{4,7}\b",
        "[REDACTED_CARD]",
        CREDIT_CARD_MAX_LEN,
    )?
    .with_validator(Validator::Luhn))
}

/// IPv4 addresses; octet range is enforced by the pattern itself.
pub fn ipv4() -> Result<RegexDetector, regex::Error> {
    RegexDetector::new(
        "ipv4",
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
        "[REDACTED_IP]",
        IPV4_MAX_LEN,
    )
}

/// Look up a built-in detector by its configuration name.
pub fn by_name(name: &str) -> Option<Result<RegexDetector, regex::Error>> {
    match name {
        "email" => Some(email()),
        "phone" => Some(phone()),
        "ssn" => Some(ssn()),
        "credit_card" => Some(credit_card()),
        "ipv4" => Some(ipv4()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;

    fn find(det: &RegexDetector, hay: &[u8]) -> Option<(usize, usize)> {
        det.earliest_match(hay, 0)
            .unwrap()
            .map(|s| (s.start, s.end))
    }

    #[test]
    fn email_matches_common_forms() {
        let det = email().unwrap();
        let hay = b"write to alice.wonderland@company.net today";
        let span = find(&det, hay).unwrap();
        assert_eq!(&hay[span.0..span.1], b"alice.wonderland@company.net");
        assert!(find(&det, b"not-an-email@").is_none());
        assert!(find(&det, b"plain text").is_none());
    }

    #[test]
    fn email_subdomains_and_plus_tags() {
        let det = email().unwrap();
        assert!(find(&det, b"a+tag@mail.sub.example.co.uk").is_some());
        assert_eq!(find(&det, b"x@y.io"), Some((0, 6)));
    }

    #[test]
    fn phone_matches_formats() {
        let det = phone().unwrap();
        assert!(find(&det, b"call (555) 123-4567 now").is_some());
        assert!(find(&det, b"call 555.123.4567 now").is_some());
        assert!(find(&det, b"+1 555 123 4567").is_some());
        // Seven digits fail the validator.
        assert!(find(&det, b"ext 123-4567").is_none());
    }

    #[test]
    fn ssn_requires_issue_rules() {
        let det = ssn().unwrap();
        assert_eq!(find(&det, b"123-45-6789"), Some((0, 11)));
        assert!(find(&det, b"000-45-6789").is_none());
        assert!(find(&det, b"987-65-4320").is_none());
    }

    #[test]
    fn credit_card_requires_luhn() {
        let det = credit_card().unwrap();
        assert!(find(&det, b"pay 4111 1111 1111 1111 now").is_some());
        assert!(find(&det, b"pay 1234 5678 9012 3456 now").is_none());
    }

    #[test]
    fn ipv4_octets_bounded() {
        let det = ipv4().unwrap();
        assert_eq!(find(&det, b"host 192.168.0.1 up"), Some((5, 16)));
        assert!(find(&det, b"version 300.400.500.600").is_none());
    }

    #[test]
    fn catalog_names_resolve() {
        for name in NAMES {
            let det = by_name(name).expect("known name").expect("compiles");
            assert_eq!(det.name(), name);
            assert!(det.max_match_len() > 0);
        }
        assert!(by_name("dna").is_none());
    }

    #[test]
    fn declared_bounds_cover_widest_matches() {
        // Widest realistic forms must stay within the declared bound with
        // room for the boundary look-ahead byte.
        let email_widest = format!("{}@{}.info", "a".repeat(64), "b".repeat(250));
        let det = email().unwrap();
        let hay = email_widest.as_bytes();
        let span = det.earliest_match(hay, 0).unwrap().unwrap();
        assert!(span.len() < EMAIL_MAX_LEN);

        let det = credit_card().unwrap();
        let hay = b"4111-1111-1111-1111";
        let span = det.earliest_match(hay, 0).unwrap().unwrap();
        assert!(span.len() < CREDIT_CARD_MAX_LEN);
    }
}
