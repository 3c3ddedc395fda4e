// crates/aerogate-core/src/core/playbook.rs
// ============================================================================
// Module: Aerogate Playbook Model
// Description: Mined action templates with decay and policy-drift scoring.
// Purpose: Reuse resolved-case experience without replaying stale governance.
// Dependencies: crate::core::{belief, case, evidence, graph, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A playbook is mined from a resolved case: the matchable pattern, the
//! executed action template, and a snapshot of the policy texts active when
//! it was mined. Retrieval decays old playbooks by domain half-life and
//! discounts drifted policy sets by Jaccard similarity over 12-hex text
//! hashes, so stale experience loses influence without ever being deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::belief::RiskLevel;
use crate::core::case::ActionType;
use crate::core::case::CaseType;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ContradictionKind;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::PlaybookId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per day, used for decay age computation.
pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ============================================================================
// SECTION: Domain
// ============================================================================

/// Playbook domain tag governing the decay half-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookDomain {
    /// Weather-driven disruptions.
    Weather,
    /// Operational disruptions.
    Operational,
    /// Customs and documentation disruptions.
    Customs,
}

impl PlaybookDomain {
    /// Returns the decay half-life in days for the domain.
    #[must_use]
    pub const fn half_life_days(self) -> f64 {
        match self {
            Self::Weather => 30.0,
            Self::Operational => 90.0,
            Self::Customs => 180.0,
        }
    }

    /// Returns a stable label for the domain.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Operational => "operational",
            Self::Customs => "customs",
        }
    }
}

// ============================================================================
// SECTION: Pattern and Template
// ============================================================================

/// Matchable context extracted from a resolved case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookPattern {
    /// Case type the pattern was mined from.
    pub case_type: CaseType,
    /// Evidence sources present in the source case.
    pub evidence_sources: Vec<SourceSystem>,
    /// Contradiction kinds detected in the source case.
    pub contradiction_kinds: Vec<ContradictionKind>,
    /// Risk level of the source case.
    pub risk_level: RiskLevel,
}

/// One templated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookAction {
    /// Action type.
    pub action_type: ActionType,
    /// Templated arguments.
    pub args: Value,
}

/// Usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlaybookStats {
    /// Times the playbook was applied.
    pub times_used: u32,
    /// Applications that resolved successfully.
    pub successes: u32,
}

impl PlaybookStats {
    /// Returns the success rate; unused playbooks rate 0.
    #[must_use]
    pub fn success_rate(self) -> f64 {
        if self.times_used == 0 {
            0.0
        } else {
            f64::from(self.successes) / f64::from(self.times_used)
        }
    }
}

/// Mined playbook row.
///
/// # Invariants
/// - `policy_snapshot` is sorted ascending and holds 12-hex text hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookRecord {
    /// Playbook identifier.
    pub playbook_id: PlaybookId,
    /// Domain tag.
    pub domain: PlaybookDomain,
    /// Matchable pattern.
    pub pattern: PlaybookPattern,
    /// Templated actions.
    pub actions: Vec<PlaybookAction>,
    /// Usage statistics.
    pub stats: PlaybookStats,
    /// Mining timestamp.
    pub mined_at: Timestamp,
    /// Last application timestamp.
    pub last_used_at: Option<Timestamp>,
    /// Sorted 12-hex hashes of policy texts active when mined.
    pub policy_snapshot: Vec<String>,
    /// Case the playbook was mined from.
    pub source_case: CaseId,
}

/// Input for a playbook insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaybook {
    /// Domain tag.
    pub domain: PlaybookDomain,
    /// Matchable pattern.
    pub pattern: PlaybookPattern,
    /// Templated actions.
    pub actions: Vec<PlaybookAction>,
    /// Sorted 12-hex hashes of policy texts active when mined.
    pub policy_snapshot: Vec<String>,
    /// Case the playbook was mined from.
    pub source_case: CaseId,
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Exponential decay factor: exactly `0.5` at `age == half_life`.
#[must_use]
pub fn decay_factor(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5_f64.powf(age_days.max(0.0) / half_life_days)
}

/// Jaccard similarity between two sorted hash sets; both empty scores 1.
#[must_use]
pub fn policy_alignment(snapshot: &[String], current: &[String]) -> f64 {
    if snapshot.is_empty() && current.is_empty() {
        return 1.0;
    }
    let mut intersection = 0_usize;
    let mut left = snapshot.iter().peekable();
    let mut right = current.iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        match a.cmp(b) {
            std::cmp::Ordering::Less => {
                let _ = left.next();
            }
            std::cmp::Ordering::Greater => {
                let _ = right.next();
            }
            std::cmp::Ordering::Equal => {
                intersection += 1;
                let _ = left.next();
                let _ = right.next();
            }
        }
    }
    let union = snapshot.len() + current.len() - intersection;
    if union == 0 {
        1.0
    } else {
        intersection_ratio(intersection, union)
    }
}

/// Computes the intersection/union ratio without precision surprises.
fn intersection_ratio(intersection: usize, union: usize) -> f64 {
    let numerator = u32::try_from(intersection).unwrap_or(u32::MAX);
    let denominator = u32::try_from(union).unwrap_or(u32::MAX);
    f64::from(numerator) / f64::from(denominator)
}
