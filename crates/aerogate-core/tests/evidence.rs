// crates/aerogate-core/tests/evidence.rs
// ============================================================================
// Module: Evidence Redaction Unit Tests
// Description: PII stripping and excerpt truncation.
// Purpose: Validate that excerpts never carry obvious PII or exceed the cap.
// ============================================================================

//! ## Overview
//! Unit tests for the redacted-excerpt scanner:
//! - Email addresses, SSN-like digit runs, and phone numbers are replaced
//! - Ordinary tokens pass through untouched
//! - Output is capped at the excerpt limit

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::MAX_EXCERPT_CHARS;
use aerogate_core::redacted_excerpt;

#[test]
fn emails_are_stripped() {
    let excerpt = redacted_excerpt(b"contact ops@example.com for rebooking");
    assert_eq!(excerpt, "contact [email] for rebooking");
}

#[test]
fn ssn_like_digit_runs_are_stripped() {
    let excerpt = redacted_excerpt(b"customer ssn 123-45-6789 on file");
    assert_eq!(excerpt, "customer ssn [ssn] on file");
}

#[test]
fn phone_numbers_are_stripped() {
    let excerpt = redacted_excerpt(b"call 555-867-5309 now");
    assert_eq!(excerpt, "call [phone] now");
    let excerpt = redacted_excerpt(b"dispatch +1(555)8675309");
    assert_eq!(excerpt, "dispatch [phone]");
}

#[test]
fn ordinary_payloads_pass_through() {
    let excerpt = redacted_excerpt(br#"{"ground_stop": true, "avg_delay_minutes": 95}"#);
    assert!(excerpt.contains("ground_stop"));
    assert!(!excerpt.contains("[phone]"));
}

#[test]
fn excerpts_are_capped() {
    let payload = "weather ".repeat(200);
    let excerpt = redacted_excerpt(payload.as_bytes());
    assert!(excerpt.chars().count() <= MAX_EXCERPT_CHARS);
}

#[test]
fn non_utf8_payloads_are_decoded_lossily() {
    let excerpt = redacted_excerpt(&[0xff, 0xfe, b'o', b'k']);
    assert!(excerpt.contains("ok"));
}
