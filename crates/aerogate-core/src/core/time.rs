// crates/aerogate-core/src/core/time.rs
// ============================================================================
// Module: Aerogate Time Model
// Description: Canonical timestamp and half-open window representations.
// Purpose: Provide deterministic, replayable time values across bi-temporal records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Aerogate stamps every fact with both event time (when it is true in the
//! world) and ingest time (when the system learned it). The core engine never
//! reads wall-clock time directly; hosts supply timestamps via the `Clock`
//! interface so replays are deterministic. Wire form is RFC 3339 UTC; the
//! in-memory form is unix epoch milliseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when converting timestamps to or from RFC 3339.
#[derive(Debug, Error)]
pub enum TimeError {
    /// Timestamp string failed to parse as RFC 3339.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
    /// Timestamp value is outside the representable range.
    #[error("timestamp out of range: {0}")]
    Range(i64),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp: unix epoch milliseconds, UTC.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - Serializes as a plain integer; RFC 3339 conversion is explicit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the signed number of milliseconds since `earlier`.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0 - earlier.0
    }

    /// Returns the timestamp advanced by the given number of milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the timestamp advanced by the given number of minutes.
    #[must_use]
    pub const fn plus_minutes(self, minutes: i64) -> Self {
        self.plus_millis(minutes.saturating_mul(60_000))
    }

    /// Formats the timestamp as an RFC 3339 UTC string.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Range`] when the value cannot be represented.
    pub fn to_rfc3339(self) -> Result<String, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        let datetime =
            OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| TimeError::Range(self.0))?;
        datetime.format(&Rfc3339).map_err(|_| TimeError::Range(self.0))
    }

    /// Parses an RFC 3339 timestamp string.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Parse`] when the input is not valid RFC 3339.
    pub fn from_rfc3339(value: &str) -> Result<Self, TimeError> {
        let datetime = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|_| TimeError::Parse(value.to_string()))?;
        let nanos = datetime.unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).map(Self).map_err(|_| TimeError::Parse(value.to_string()))
    }
}

// ============================================================================
// SECTION: Time Window
// ============================================================================

/// Half-open validity window `[start, end)`; an open end means current.
///
/// # Invariants
/// - `end`, when present, is not before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive window start.
    pub start: Timestamp,
    /// Exclusive window end; `None` means open-ended (current).
    pub end: Option<Timestamp>,
}

impl TimeWindow {
    /// Creates a closed window `[start, end)`.
    #[must_use]
    pub const fn closed(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates an open-ended window `[start, ∞)`.
    #[must_use]
    pub const fn open(start: Timestamp) -> Self {
        Self {
            start,
            end: None,
        }
    }

    /// Creates a point-in-time window `[at, ∞)` for instants without a known end.
    #[must_use]
    pub const fn at(at: Timestamp) -> Self {
        Self::open(at)
    }

    /// Returns true when the window contains the given instant.
    #[must_use]
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && self.end.is_none_or(|end| at < end)
    }

    /// Closes an open window at the given instant; closed windows are unchanged.
    #[must_use]
    pub fn closed_at(self, at: Timestamp) -> Self {
        Self {
            start: self.start,
            end: Some(self.end.unwrap_or(at)),
        }
    }
}
