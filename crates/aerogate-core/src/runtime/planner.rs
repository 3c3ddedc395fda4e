// crates/aerogate-core/src/runtime/planner.rs
// ============================================================================
// Module: Aerogate Action Planner
// Description: Deterministic beam search over a fixed action library.
// Purpose: Keep planning reproducible and testable with no external calls.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! The planner is a small hand-tuned beam search (width 4, depth 4) over a
//! fixed action library. Investigation actions score
//! `information_gain - cost`; intervention actions score
//! `action_value - cost - risk_penalty`. All three terms come from
//! precomputed tables, so identical contexts always yield identical plans.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::core::belief::Posture;
use crate::core::belief::RiskLevel;
use crate::core::belief::ServiceTier;
use crate::core::case::ActionRisk;
use crate::core::case::ActionType;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Beam width.
pub const BEAM_WIDTH: usize = 4;

/// Beam depth (maximum plan length).
pub const BEAM_DEPTH: usize = 4;

/// Shipment-level candidates are generated for at most this many shipments.
const MAX_SHIPMENT_CANDIDATES: usize = 2;

// ============================================================================
// SECTION: Context and Output
// ============================================================================

/// Planning context distilled from the belief state and cascade reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanContext {
    /// Posture proposed for the gateway.
    pub posture: Posture,
    /// Assessed risk level.
    pub risk: RiskLevel,
    /// Whether any contradiction is open.
    pub has_contradictions: bool,
    /// Shipments exposed downstream of the scope.
    pub shipments_at_risk: Vec<String>,
    /// Service tier of the most exposed freight.
    pub service_tier: ServiceTier,
}

/// One planned action with its deterministic score.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Structured arguments.
    pub args: Value,
    /// Risk classification.
    pub risk: ActionRisk,
    /// Beam-search score.
    pub score: f64,
}

// ============================================================================
// SECTION: Score Tables
// ============================================================================

/// Returns the intrinsic risk classification of an action type.
#[must_use]
pub const fn action_risk(action: ActionType) -> ActionRisk {
    match action {
        ActionType::SetPosture
        | ActionType::PublishGatewayAdvisory
        | ActionType::NotifyCustomer
        | ActionType::TriggerReevaluation => ActionRisk::Low,
        ActionType::UpdateBookingRules
        | ActionType::ReleaseCargo
        | ActionType::UpgradeService
        | ActionType::HoldCargo
        | ActionType::EscalateOps
        | ActionType::FileClaim => ActionRisk::Medium,
        ActionType::RebookFlight | ActionType::SwitchGateway => ActionRisk::High,
    }
}

/// Abstract execution cost table.
const fn cost(action: ActionType) -> f64 {
    match action {
        ActionType::SetPosture | ActionType::NotifyCustomer => 0.5,
        ActionType::PublishGatewayAdvisory | ActionType::TriggerReevaluation
        | ActionType::ReleaseCargo => 1.0,
        ActionType::UpdateBookingRules => 1.5,
        ActionType::EscalateOps | ActionType::HoldCargo => 2.0,
        ActionType::FileClaim => 3.0,
        ActionType::UpgradeService => 4.0,
        ActionType::RebookFlight => 5.0,
        ActionType::SwitchGateway => 6.0,
    }
}

/// Intervention value table, keyed by assessed risk.
const fn action_value(action: ActionType, risk: RiskLevel) -> f64 {
    let column = match risk {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
        RiskLevel::Critical => 3,
    };
    let row: [f64; 4] = match action {
        // Posture emission is the one mandatory intervention.
        ActionType::SetPosture => [10.0, 10.0, 10.0, 10.0],
        ActionType::PublishGatewayAdvisory => [0.5, 3.0, 5.0, 6.0],
        ActionType::UpdateBookingRules => [0.2, 2.0, 4.0, 5.0],
        ActionType::NotifyCustomer => [0.0, 1.5, 3.0, 4.0],
        ActionType::EscalateOps => [0.0, 1.0, 4.0, 6.5],
        ActionType::HoldCargo => [0.0, 1.0, 4.5, 5.5],
        ActionType::ReleaseCargo => [2.0, 0.0, 0.0, 0.0],
        ActionType::SwitchGateway => [0.0, 1.0, 3.0, 4.0],
        ActionType::RebookFlight => [0.0, 1.0, 2.5, 3.0],
        ActionType::UpgradeService => [0.0, 0.5, 1.5, 2.0],
        ActionType::FileClaim => [0.0, 0.0, 0.0, 0.0],
        ActionType::TriggerReevaluation => [0.0, 0.0, 0.0, 0.0],
    };
    row[column]
}

/// Risk penalty table.
const fn risk_penalty(risk: ActionRisk) -> f64 {
    match risk {
        ActionRisk::Low => 0.5,
        ActionRisk::Medium => 1.5,
        ActionRisk::High => 3.0,
    }
}

/// Information gain for investigation actions, keyed on open uncertainty.
const fn information_gain(action: ActionType, uncertain: bool) -> f64 {
    match action {
        ActionType::TriggerReevaluation => {
            if uncertain {
                4.0
            } else {
                0.5
            }
        }
        _ => 0.0,
    }
}

/// Per-type intervention cost in USD, summed into the belief estimate.
#[must_use]
pub const fn cost_usd(action: ActionType) -> f64 {
    match action {
        ActionType::SetPosture => 0.0,
        ActionType::NotifyCustomer => 50.0,
        ActionType::TriggerReevaluation => 100.0,
        ActionType::PublishGatewayAdvisory | ActionType::ReleaseCargo => 200.0,
        ActionType::UpdateBookingRules => 300.0,
        ActionType::EscalateOps => 500.0,
        ActionType::FileClaim => 800.0,
        ActionType::HoldCargo => 1_200.0,
        ActionType::UpgradeService => 3_500.0,
        ActionType::RebookFlight => 6_000.0,
        ActionType::SwitchGateway => 8_000.0,
    }
}

/// Sums the USD cost estimate for a plan.
#[must_use]
pub fn estimated_cost_usd(plan: &[PlannedAction]) -> f64 {
    plan.iter().map(|action| cost_usd(action.action_type)).sum()
}

/// Scores one candidate action in context.
fn score(action: ActionType, context: &PlanContext) -> f64 {
    let uncertain = context.has_contradictions || context.risk >= RiskLevel::Medium;
    if matches!(action, ActionType::TriggerReevaluation) {
        return information_gain(action, uncertain) - cost(action);
    }
    action_value(action, context.risk) - cost(action) - risk_penalty(action_risk(action))
}

// ============================================================================
// SECTION: Candidate Generation
// ============================================================================

/// Builds the candidate list for the context, in fixed library order.
fn candidates(context: &PlanContext) -> Vec<PlannedAction> {
    let mut out = vec![PlannedAction {
        action_type: ActionType::SetPosture,
        args: json!({ "posture": context.posture.as_str() }),
        risk: action_risk(ActionType::SetPosture),
        score: score(ActionType::SetPosture, context),
    }];
    for action in [
        ActionType::TriggerReevaluation,
        ActionType::PublishGatewayAdvisory,
        ActionType::UpdateBookingRules,
        ActionType::EscalateOps,
    ] {
        out.push(PlannedAction {
            action_type: action,
            args: json!({}),
            risk: action_risk(action),
            score: score(action, context),
        });
    }
    for shipment in context.shipments_at_risk.iter().take(MAX_SHIPMENT_CANDIDATES) {
        let shipment_actions = match context.posture {
            Posture::Hold | Posture::Escalate => {
                vec![ActionType::HoldCargo, ActionType::NotifyCustomer]
            }
            Posture::Restrict => vec![
                ActionType::NotifyCustomer,
                ActionType::RebookFlight,
                ActionType::SwitchGateway,
            ],
            Posture::Accept => vec![ActionType::ReleaseCargo],
        };
        for action in shipment_actions {
            out.push(PlannedAction {
                action_type: action,
                args: json!({ "shipment": shipment, "tier": tier_label(context.service_tier) }),
                risk: action_risk(action),
                score: score(action, context),
            });
        }
    }
    out
}

/// Returns the stable label for a service tier.
const fn tier_label(tier: ServiceTier) -> &'static str {
    match tier {
        ServiceTier::Standard => "standard",
        ServiceTier::Express => "express",
        ServiceTier::Critical => "critical",
    }
}

// ============================================================================
// SECTION: Beam Search
// ============================================================================

/// One beam entry: candidate indices chosen so far and the running score.
#[derive(Debug, Clone)]
struct Beam {
    /// Indices into the candidate list, in selection order.
    picks: Vec<usize>,
    /// Sum of the picked scores.
    total: f64,
}

/// Plans actions for the context with deterministic beam search.
///
/// The returned plan lists the best-scoring sequence of distinct candidates,
/// in library order, with only positive-scoring members retained.
#[must_use]
pub fn plan(context: &PlanContext) -> Vec<PlannedAction> {
    let pool = candidates(context);
    let mut beams = vec![Beam {
        picks: Vec::new(),
        total: 0.0,
    }];
    for _ in 0..BEAM_DEPTH {
        let mut next: Vec<Beam> = beams.clone();
        for beam in &beams {
            for (index, candidate) in pool.iter().enumerate() {
                if candidate.score <= 0.0 || beam.picks.contains(&index) {
                    continue;
                }
                let mut picks = beam.picks.clone();
                picks.push(index);
                // Scores are order-independent; canonicalize so permutations
                // of the same set collapse into one beam entry.
                picks.sort_unstable();
                next.push(Beam {
                    picks,
                    total: beam.total + candidate.score,
                });
            }
        }
        next.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.picks.len().cmp(&b.picks.len()))
                .then_with(|| a.picks.cmp(&b.picks))
        });
        next.dedup_by(|a, b| a.picks == b.picks);
        next.truncate(BEAM_WIDTH);
        beams = next;
    }
    let best = beams.into_iter().next().unwrap_or(Beam {
        picks: Vec::new(),
        total: 0.0,
    });
    best.picks.into_iter().map(|index| pool[index].clone()).collect()
}
