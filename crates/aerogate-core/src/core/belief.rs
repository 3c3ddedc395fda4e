// crates/aerogate-core/src/core/belief.rs
// ============================================================================
// Module: Aerogate Belief Model
// Description: Posture, risk levels, flight categories, and the belief state.
// Purpose: Summarize graph and missing-evidence state for policy and planning.
// Dependencies: crate::core::{case, evidence, identifiers}, serde
// ============================================================================

//! ## Overview
//! The belief state is the structured summary the orchestrator assembles from
//! graph reads and missing-evidence accounting. It is the only input to the
//! policy engine and the planner; risk assessors consume it and return
//! structured records, never free-form control flow.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::case::ActionType;
use crate::core::evidence::SourceSystem;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ScopeId;

// ============================================================================
// SECTION: Posture and Risk
// ============================================================================

/// Gateway posture directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Accept freight normally.
    Accept,
    /// Accept with restrictions (capacity, service tiers).
    Restrict,
    /// Hold freight at origin.
    Hold,
    /// Escalate to human operations.
    Escalate,
}

impl Posture {
    /// Returns a stable label for the posture.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Restrict => "restrict",
            Self::Hold => "hold",
            Self::Escalate => "escalate",
        }
    }
}

/// Assessed risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Normal operations.
    Low,
    /// Elevated risk.
    Medium,
    /// Severe risk.
    High,
    /// Extreme risk; accepting freight is indefensible.
    Critical,
}

impl RiskLevel {
    /// Returns a stable label for the risk level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Service tier of affected freight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    /// Standard service.
    #[default]
    Standard,
    /// Express service.
    Express,
    /// Critical or time-definite service.
    Critical,
}

// ============================================================================
// SECTION: Flight Category
// ============================================================================

/// METAR flight category at the published FAA boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightCategory {
    /// Visual flight rules.
    Vfr,
    /// Marginal VFR.
    Mvfr,
    /// Instrument flight rules.
    Ifr,
    /// Low IFR.
    Lifr,
}

impl FlightCategory {
    /// Returns a stable label for the flight category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vfr => "vfr",
            Self::Mvfr => "mvfr",
            Self::Ifr => "ifr",
            Self::Lifr => "lifr",
        }
    }

    /// Classifies visibility (statute miles) and ceiling (feet AGL) at the
    /// published FAA category boundaries. The worse of the two governs.
    #[must_use]
    pub fn classify(visibility_sm: f64, ceiling_ft: Option<u32>) -> Self {
        let by_visibility = if visibility_sm < 1.0 {
            Self::Lifr
        } else if visibility_sm < 3.0 {
            Self::Ifr
        } else if visibility_sm <= 5.0 {
            Self::Mvfr
        } else {
            Self::Vfr
        };
        let by_ceiling = ceiling_ft.map_or(Self::Vfr, |ceiling| {
            if ceiling < 500 {
                Self::Lifr
            } else if ceiling < 1_000 {
                Self::Ifr
            } else if ceiling <= 3_000 {
                Self::Mvfr
            } else {
                Self::Vfr
            }
        });
        if rank(by_visibility) >= rank(by_ceiling) {
            by_visibility
        } else {
            by_ceiling
        }
    }

    /// Returns true for the instrument categories that produce weather risk.
    #[must_use]
    pub const fn is_instrument(self) -> bool {
        matches!(self, Self::Ifr | Self::Lifr)
    }
}

/// Severity rank used to pick the governing category.
const fn rank(category: FlightCategory) -> u8 {
    match category {
        FlightCategory::Vfr => 0,
        FlightCategory::Mvfr => 1,
        FlightCategory::Ifr => 2,
        FlightCategory::Lifr => 3,
    }
}

// ============================================================================
// SECTION: Belief State
// ============================================================================

/// Structured summary consumed by the policy engine and the planner.
///
/// # Invariants
/// - Assembled only from graph reads and missing-evidence accounting;
///   assessor output never mutates it retroactively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    /// Owning case.
    pub case_id: CaseId,
    /// Case scope.
    pub scope: ScopeId,
    /// Assessed risk level.
    pub risk_level: RiskLevel,
    /// Posture proposed for the gateway.
    pub proposed_posture: Posture,
    /// Source systems with at least one evidence row in this case.
    pub evidence_sources: Vec<SourceSystem>,
    /// Whether any contradiction is open.
    pub has_contradictions: bool,
    /// Whether any bound evidence exceeded the staleness bound.
    pub has_stale_evidence: bool,
    /// Actions proposed by the planner (empty before planning).
    pub proposed_actions: Vec<ActionType>,
    /// Estimated intervention cost in USD.
    pub estimated_cost: f64,
    /// Service tier of the most exposed freight.
    pub service_tier: ServiceTier,
    /// Hours until the tightest delivery deadline, when known.
    pub hours_until_deadline: Option<f64>,
    /// Current flight category, when METAR evidence exists.
    pub flight_category: Option<FlightCategory>,
    /// Count of evidence rows backing this belief.
    pub min_evidence_count: u32,
}

impl BeliefState {
    /// Returns a copy with the planner's proposed actions filled in.
    #[must_use]
    pub fn with_proposed_actions(mut self, actions: Vec<ActionType>) -> Self {
        self.proposed_actions = actions;
        self
    }

    /// Returns true when any proposed action is shipment-level.
    #[must_use]
    pub fn proposes_shipment_action(&self) -> bool {
        self.proposed_actions.iter().any(|action| action.is_shipment_level())
    }
}

// ============================================================================
// SECTION: Risk Assessment
// ============================================================================

/// Single confidence penalty entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePenalty {
    /// Penalty label (e.g. `degraded:adsb`).
    pub label: String,
    /// Penalty amount subtracted from the confidence score.
    pub amount: f64,
}

/// Confidence breakdown carried into the decision packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// Sources that returned evidence.
    pub sources_ok: Vec<SourceSystem>,
    /// Sources that failed or timed out.
    pub sources_missing: Vec<SourceSystem>,
    /// Penalties applied to the score.
    pub penalties: Vec<ConfidencePenalty>,
    /// Final confidence score in `[0, 1]`.
    pub score: f64,
    /// Human-readable explanation.
    pub explanation: String,
}

/// Structured record returned by a risk assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Assessed risk level.
    pub risk_level: RiskLevel,
    /// Posture the assessor recommends.
    pub recommended_posture: Posture,
    /// Confidence breakdown for the assessment.
    pub confidence: ConfidenceBreakdown,
}
