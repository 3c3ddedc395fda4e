// crates/aerogate-core/src/core/identifiers.rs
// ============================================================================
// Module: Aerogate Identifiers
// Description: Canonical opaque identifiers for evidence, graph, and case rows.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Aerogate.
//! Row identifiers are opaque and serialize as numbers on the wire. Numeric
//! identifiers enforce non-zero, 1-based invariants at construction
//! boundaries, matching the rowid discipline of the durable store. Scope
//! identifiers are opaque strings (ICAO airport codes or lane labels).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Numeric Row Identifiers
// ============================================================================

/// Declares a non-zero numeric row identifier with the store rowid invariant.
macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// # Invariants
        /// - Always >= 1 (non-zero, 1-based store rowid).
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Creates a new identifier from a non-zero value.
            #[must_use]
            pub const fn new(id: NonZeroU64) -> Self {
                Self(id)
            }

            /// Creates an identifier from a raw value (returns `None` if zero).
            #[must_use]
            pub fn from_raw(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// Returns the raw identifier value (always >= 1).
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.get().fmt(f)
            }
        }
    };
}

row_id!(
    /// Evidence row identifier.
    EvidenceId
);
row_id!(
    /// Graph node identifier.
    NodeId
);
row_id!(
    /// Node version identifier.
    NodeVersionId
);
row_id!(
    /// Graph edge identifier.
    EdgeId
);
row_id!(
    /// Claim identifier.
    ClaimId
);
row_id!(
    /// Contradiction identifier.
    ContradictionId
);
row_id!(
    /// Case identifier.
    CaseId
);
row_id!(
    /// Action identifier.
    ActionId
);
row_id!(
    /// Missing-evidence request identifier.
    RequestId
);
row_id!(
    /// Policy identifier.
    PolicyId
);
row_id!(
    /// Playbook identifier.
    PlaybookId
);
row_id!(
    /// Webhook registration identifier.
    WebhookId
);
row_id!(
    /// Webhook delivery identifier.
    DeliveryId
);

// ============================================================================
// SECTION: Scope Identifier
// ============================================================================

/// Case scope identifier (ICAO airport code or lane label).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Creates a new scope identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
