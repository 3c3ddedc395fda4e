// crates/aerogate-core/tests/hashing.rs
// ============================================================================
// Module: Hashing Unit Tests
// Description: Content hashing, canonical JSON, and policy text hashes.
// Purpose: Validate stable digests for citations and drift snapshots.
// ============================================================================

//! ## Overview
//! Unit tests for the hashing helpers:
//! - SHA-256 lowercase hex over raw bytes
//! - Canonical JSON hashing is key-order independent
//! - Policy text hashes are 12 hex chars over normalized text

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::hash_canonical_json;
use aerogate_core::normalize_policy_text;
use aerogate_core::policy_text_hash;
use aerogate_core::sha256_hex;
use serde_json::json;

#[test]
fn sha256_matches_known_vector() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(sha256_hex(b"abc").len(), 64);
}

#[test]
fn canonical_json_hash_ignores_key_order() {
    let left = json!({ "b": 1, "a": [1, 2, 3] });
    let right = json!({ "a": [1, 2, 3], "b": 1 });
    assert_eq!(
        hash_canonical_json(&left).expect("hash"),
        hash_canonical_json(&right).expect("hash")
    );
}

#[test]
fn policy_text_normalization_collapses_whitespace_and_case() {
    assert_eq!(
        normalize_policy_text("  High   Risk\tactions\nrequire approval "),
        "high risk actions require approval"
    );
}

#[test]
fn policy_text_hash_is_twelve_hex_chars_and_normalization_stable() {
    let hash = policy_text_hash("high risk actions require approval");
    assert_eq!(hash.len(), 12);
    assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    assert_eq!(hash, policy_text_hash("  HIGH risk   actions require APPROVAL  "));
    assert_ne!(hash, policy_text_hash("critical risk blocks accept posture"));
}
