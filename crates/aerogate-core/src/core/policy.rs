// crates/aerogate-core/src/core/policy.rs
// ============================================================================
// Module: Aerogate Policy Model
// Description: Typed policy rules, verdict lattice, and the seed rule set.
// Purpose: Express governance rules evaluated against belief states.
// Dependencies: crate::core::{belief, case, evidence, hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Policies are typed rules with a unique human-readable text, a structured
//! condition set over the belief state, and a verdict effect. Verdicts form a
//! three-level lattice merged with `Block > RequireApproval > Allow`, so
//! adding a blocking rule can never weaken an existing block. The seed set of
//! thirteen policies must exist after bootstrap; seeding is idempotent on the
//! unique rule text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::belief::BeliefState;
use crate::core::belief::FlightCategory;
use crate::core::belief::Posture;
use crate::core::belief::RiskLevel;
use crate::core::belief::ServiceTier;
use crate::core::case::ActionType;
use crate::core::evidence::SourceSystem;
use crate::core::hashing::policy_text_hash;
use crate::core::identifiers::PolicyId;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Verdict Lattice
// ============================================================================

/// Policy verdict.
///
/// # Invariants
/// - Merging is monotone: `Block` dominates `RequireApproval` dominates `Allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Proceed without conditions.
    Allow,
    /// Proceed only with an approval.
    RequireApproval,
    /// Do not proceed; the case becomes blocked.
    Block,
}

impl Verdict {
    /// Returns a stable label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::RequireApproval => "require_approval",
            Self::Block => "block",
        }
    }

    /// Merges two verdicts, keeping the dominant one.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Block, _) | (_, Self::Block) => Self::Block,
            (Self::RequireApproval, _) | (_, Self::RequireApproval) => Self::RequireApproval,
            (Self::Allow, Self::Allow) => Self::Allow,
        }
    }
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

/// Structured predicate over a belief state.
///
/// # Invariants
/// - Evaluation is pure; conditions never read stores or clocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyCondition {
    /// Risk level is at least the given level.
    RiskAtLeast {
        /// Threshold level.
        level: RiskLevel,
    },
    /// Risk level is exactly the given level.
    RiskIs {
        /// Required level.
        level: RiskLevel,
    },
    /// Proposed posture matches.
    PostureIs {
        /// Required posture.
        posture: Posture,
    },
    /// At least one contradiction is open.
    HasContradictions,
    /// At least one evidence row exceeded the staleness bound.
    HasStaleEvidence,
    /// A shipment-level action is among the proposed actions.
    ProposesShipmentAction,
    /// The given action type is among the proposed actions.
    ProposesAction {
        /// Required action type.
        action: ActionType,
    },
    /// No booking evidence backs the case.
    MissingBookingEvidence,
    /// No evidence from the given source backs the case.
    EvidenceSourceMissing {
        /// Required source.
        source: SourceSystem,
    },
    /// Fewer than `count` evidence rows back the case.
    EvidenceCountBelow {
        /// Exclusive row-count threshold.
        count: u32,
    },
    /// Estimated intervention cost exceeds the threshold (USD).
    EstimatedCostAbove {
        /// Exclusive cost threshold.
        usd: f64,
    },
    /// Service tier matches.
    ServiceTierIs {
        /// Required tier.
        tier: ServiceTier,
    },
    /// Tightest deadline is nearer than the threshold (hours).
    HoursUntilDeadlineBelow {
        /// Exclusive hour threshold.
        hours: f64,
    },
    /// Flight category is one of the listed categories.
    FlightCategoryIn {
        /// Matching categories.
        categories: Vec<FlightCategory>,
    },
}

impl PolicyCondition {
    /// Evaluates the condition against a belief state.
    #[must_use]
    pub fn matches(&self, belief: &BeliefState) -> bool {
        match self {
            Self::RiskAtLeast {
                level,
            } => belief.risk_level >= *level,
            Self::RiskIs {
                level,
            } => belief.risk_level == *level,
            Self::PostureIs {
                posture,
            } => belief.proposed_posture == *posture,
            Self::HasContradictions => belief.has_contradictions,
            Self::HasStaleEvidence => belief.has_stale_evidence,
            Self::ProposesShipmentAction => belief.proposes_shipment_action(),
            Self::ProposesAction {
                action,
            } => belief.proposed_actions.contains(action),
            Self::MissingBookingEvidence => {
                !belief.evidence_sources.contains(&SourceSystem::Booking)
            }
            Self::EvidenceSourceMissing {
                source,
            } => !belief.evidence_sources.contains(source),
            Self::EvidenceCountBelow {
                count,
            } => belief.min_evidence_count < *count,
            Self::EstimatedCostAbove {
                usd,
            } => belief.estimated_cost > *usd,
            Self::ServiceTierIs {
                tier,
            } => belief.service_tier == *tier,
            Self::HoursUntilDeadlineBelow {
                hours,
            } => belief.hours_until_deadline.is_some_and(|value| value < *hours),
            Self::FlightCategoryIn {
                categories,
            } => belief.flight_category.is_some_and(|category| categories.contains(&category)),
        }
    }
}

// ============================================================================
// SECTION: Policy Records
// ============================================================================

/// Structured effect produced when a policy matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEffect {
    /// Verdict contributed to the merge.
    pub verdict: Verdict,
    /// Short operator-facing note.
    pub note: String,
}

/// Stored policy rule.
///
/// # Invariants
/// - `text` is unique across all policies; seeding dedups on it.
/// - A policy participates in evaluation only while `valid` contains "now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Unique human-readable rule text.
    pub text: String,
    /// Condition set; all conditions must match (conjunction).
    pub conditions: Vec<PolicyCondition>,
    /// Effect applied when the conditions match.
    pub effect: PolicyEffect,
    /// Validity window.
    pub valid: TimeWindow,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

impl PolicyRecord {
    /// Returns the 12-hex snapshot hash of this policy's text.
    #[must_use]
    pub fn text_hash(&self) -> String {
        policy_text_hash(&self.text)
    }
}

/// Input for a policy insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPolicy {
    /// Unique human-readable rule text.
    pub text: String,
    /// Condition set (conjunction).
    pub conditions: Vec<PolicyCondition>,
    /// Effect applied when the conditions match.
    pub effect: PolicyEffect,
    /// Validity window.
    pub valid: TimeWindow,
}

// ============================================================================
// SECTION: Seed Policies
// ============================================================================

/// Builds one seed policy.
fn seed(text: &str, conditions: Vec<PolicyCondition>, verdict: Verdict, from: Timestamp) -> NewPolicy {
    NewPolicy {
        text: text.to_string(),
        conditions,
        effect: PolicyEffect {
            verdict,
            note: text.to_string(),
        },
        valid: TimeWindow::open(from),
    }
}

/// Returns the thirteen seed policies that must exist after bootstrap.
///
/// The set preserves the non-removable invariants: high risk requires
/// approval, critical risk blocks an accept posture, open contradictions with
/// stale evidence block an accept posture, and shipment-typed actions without
/// booking evidence are blocked.
#[must_use]
pub fn seed_policies(from: Timestamp) -> Vec<NewPolicy> {
    vec![
        seed("default allow with audit citation", Vec::new(), Verdict::Allow, from),
        seed(
            "high risk actions require approval",
            vec![PolicyCondition::RiskAtLeast {
                level: RiskLevel::High,
            }],
            Verdict::RequireApproval,
            from,
        ),
        seed(
            "critical risk blocks accept posture",
            vec![
                PolicyCondition::RiskIs {
                    level: RiskLevel::Critical,
                },
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "open contradictions require evidence resolution",
            vec![
                PolicyCondition::HasContradictions,
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "contradicted stale evidence blocks accept posture",
            vec![
                PolicyCondition::HasContradictions,
                PolicyCondition::HasStaleEvidence,
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "shipment actions require booking evidence",
            vec![
                PolicyCondition::ProposesShipmentAction,
                PolicyCondition::MissingBookingEvidence,
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "instrument conditions block accept posture",
            vec![
                PolicyCondition::FlightCategoryIn {
                    categories: vec![FlightCategory::Ifr, FlightCategory::Lifr],
                },
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "sparse evidence blocks accept posture",
            vec![
                PolicyCondition::EvidenceCountBelow {
                    count: 3,
                },
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "missing surface weather blocks accept posture",
            vec![
                PolicyCondition::EvidenceSourceMissing {
                    source: SourceSystem::Metar,
                },
                PolicyCondition::PostureIs {
                    posture: Posture::Accept,
                },
            ],
            Verdict::Block,
            from,
        ),
        seed(
            "stale evidence requires review",
            vec![PolicyCondition::HasStaleEvidence],
            Verdict::RequireApproval,
            from,
        ),
        seed(
            "high cost interventions require approval",
            vec![PolicyCondition::EstimatedCostAbove {
                usd: 10_000.0,
            }],
            Verdict::RequireApproval,
            from,
        ),
        seed(
            "gateway switches require approval",
            vec![PolicyCondition::ProposesAction {
                action: ActionType::SwitchGateway,
            }],
            Verdict::RequireApproval,
            from,
        ),
        seed(
            "imminent deadline interventions require approval",
            vec![
                PolicyCondition::HoursUntilDeadlineBelow {
                    hours: 6.0,
                },
                PolicyCondition::RiskAtLeast {
                    level: RiskLevel::Medium,
                },
            ],
            Verdict::RequireApproval,
            from,
        ),
    ]
}
