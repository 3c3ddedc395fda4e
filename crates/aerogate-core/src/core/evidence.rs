// crates/aerogate-core/src/core/evidence.rs
// ============================================================================
// Module: Aerogate Evidence Model
// Description: Content-addressed evidence rows and redacted excerpts.
// Purpose: Bind every derived fact to the raw bytes that produced it.
// Dependencies: crate::core::{hashing, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Evidence rows are immutable and deduplicated on the identity triple
//! `(source_system, source_ref, content_sha256)`. Raw payload bytes live on
//! disk under a path derived from the content hash; rows carry a redacted
//! excerpt so packets never embed raw payloads. Inputs are untrusted and the
//! excerpt scanner strips obvious PII before storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::EvidenceId;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a redacted excerpt, in characters.
pub const MAX_EXCERPT_CHARS: usize = 500;

// ============================================================================
// SECTION: Source Systems
// ============================================================================

/// Signal source systems known to the control plane.
///
/// # Invariants
/// - Variants are stable for serialization and policy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    /// FAA National Airspace System status (ground stops, delays, closures).
    FaaNas,
    /// METAR surface weather observations.
    Metar,
    /// TAF terminal forecasts.
    Taf,
    /// NWS weather alerts.
    NwsAlerts,
    /// ADS-B aircraft movement snapshots.
    Adsb,
    /// Shipment booking records.
    Booking,
    /// Simulation harness payloads.
    Simulation,
}

impl SourceSystem {
    /// Returns a stable label for the source system.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FaaNas => "faa_nas",
            Self::Metar => "metar",
            Self::Taf => "taf",
            Self::NwsAlerts => "nws_alerts",
            Self::Adsb => "adsb",
            Self::Booking => "booking",
            Self::Simulation => "simulation",
        }
    }

    /// Returns the signal sources fetched during an airport investigation.
    #[must_use]
    pub const fn investigation_set() -> [Self; 5] {
        [Self::FaaNas, Self::Metar, Self::Taf, Self::NwsAlerts, Self::Adsb]
    }
}

// ============================================================================
// SECTION: Evidence Records
// ============================================================================

/// Immutable evidence row.
///
/// # Invariants
/// - `(source_system, source_ref, content_sha256)` is unique in the store.
/// - `payload_path` names the content-addressed byte file and never changes.
/// - `excerpt` is at most [`MAX_EXCERPT_CHARS`] characters with PII stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Evidence identifier.
    pub evidence_id: EvidenceId,
    /// Source system that produced the payload.
    pub source_system: SourceSystem,
    /// Source-scoped reference (endpoint, station, or record key).
    pub source_ref: String,
    /// Lowercase hex SHA-256 of the raw payload bytes.
    pub content_sha256: String,
    /// Payload content type.
    pub content_type: String,
    /// Retrieval timestamp (ingest time).
    pub retrieved_at: Timestamp,
    /// Best-effort event-time window; retrieval time when the source gave none.
    pub event_time: TimeWindow,
    /// Store-root-relative path of the raw payload bytes.
    pub payload_path: String,
    /// Redacted excerpt of the payload.
    pub excerpt: String,
    /// Arbitrary source metadata.
    pub meta: Value,
}

/// Input for an evidence `put`.
///
/// # Invariants
/// - `payload` is hashed by the store; callers never supply the content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceIngest {
    /// Source system that produced the payload.
    pub source_system: SourceSystem,
    /// Source-scoped reference (endpoint, station, or record key).
    pub source_ref: String,
    /// Payload content type.
    pub content_type: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Best-effort event-time window from the source.
    pub event_time: Option<TimeWindow>,
    /// Arbitrary source metadata.
    pub meta: Value,
}

// ============================================================================
// SECTION: Excerpt Redaction
// ============================================================================

/// Character classes tracked while scanning a token for PII shapes.
struct TokenShape {
    /// Count of ASCII digits in the token.
    digits: usize,
    /// Token contains an `@` with text on both sides.
    email_like: bool,
    /// Token consists only of digits and phone separators.
    phone_chars_only: bool,
}

/// Classifies a token's character shape.
fn token_shape(token: &str) -> TokenShape {
    let mut digits = 0;
    let mut at_index = None;
    let mut phone_chars_only = !token.is_empty();
    for (index, ch) in token.char_indices() {
        if ch.is_ascii_digit() {
            digits += 1;
        }
        if ch == '@' && at_index.is_none() {
            at_index = Some(index);
        }
        if !(ch.is_ascii_digit() || matches!(ch, '-' | '.' | '(' | ')' | '+' | ' ')) {
            phone_chars_only = false;
        }
    }
    let email_like = at_index
        .is_some_and(|index| index > 0 && index + 1 < token.len() && token[index + 1..].contains('.'));
    TokenShape {
        digits,
        email_like,
        phone_chars_only,
    }
}

/// Returns the redacted replacement for a token, if any.
fn redact_token(token: &str) -> Option<&'static str> {
    let shape = token_shape(token);
    if shape.email_like {
        return Some("[email]");
    }
    if shape.digits == 9 && shape.phone_chars_only {
        return Some("[ssn]");
    }
    if shape.digits >= 7 && shape.phone_chars_only {
        return Some("[phone]");
    }
    None
}

/// Produces a redacted excerpt from raw payload bytes.
///
/// Strips email addresses, phone numbers, and SSN-like digit runs, then
/// truncates to [`MAX_EXCERPT_CHARS`] characters. Non-UTF-8 payloads yield a
/// lossy decode before scanning.
#[must_use]
pub fn redacted_excerpt(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let mut out = String::with_capacity(MAX_EXCERPT_CHARS);
    let mut first = true;
    for token in text.split_whitespace() {
        let piece = redact_token(token).unwrap_or(token);
        if !first && out.len() + piece.len() + 1 > MAX_EXCERPT_CHARS * 4 {
            break;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(piece);
        first = false;
    }
    if out.chars().count() > MAX_EXCERPT_CHARS {
        out = out.chars().take(MAX_EXCERPT_CHARS).collect();
    }
    out
}
