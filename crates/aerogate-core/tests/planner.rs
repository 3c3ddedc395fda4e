// crates/aerogate-core/tests/planner.rs
// ============================================================================
// Module: Planner Tests
// Description: Beam-search determinism and context-sensitive plans.
// Purpose: Validate that planning is a pure function of its context.
// ============================================================================

//! ## Overview
//! Tests for the beam-search planner:
//! - A benign accept context plans only the posture emission
//! - A hold context under high risk adds protective operational actions
//! - Shipment-level candidates appear only with shipments at risk
//! - Identical contexts always produce identical plans

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::ActionType;
use aerogate_core::Posture;
use aerogate_core::RiskLevel;
use aerogate_core::ServiceTier;
use aerogate_core::runtime::BEAM_DEPTH;
use aerogate_core::runtime::PlanContext;
use aerogate_core::runtime::estimated_cost_usd;
use aerogate_core::runtime::plan;

fn context(posture: Posture, risk: RiskLevel, shipments: &[&str]) -> PlanContext {
    PlanContext {
        posture,
        risk,
        has_contradictions: false,
        shipments_at_risk: shipments.iter().map(ToString::to_string).collect(),
        service_tier: ServiceTier::Standard,
    }
}

#[test]
fn benign_accept_context_plans_only_the_posture() {
    let actions = plan(&context(Posture::Accept, RiskLevel::Low, &[]));
    let types: Vec<ActionType> = actions.iter().map(|action| action.action_type).collect();
    assert_eq!(types, vec![ActionType::SetPosture]);
    assert_eq!(actions[0].args["posture"], "accept");
}

#[test]
fn hold_context_under_high_risk_adds_protective_actions() {
    let actions = plan(&context(Posture::Hold, RiskLevel::High, &[]));
    let types: Vec<ActionType> = actions.iter().map(|action| action.action_type).collect();
    assert!(types.contains(&ActionType::SetPosture));
    assert!(types.contains(&ActionType::PublishGatewayAdvisory));
    assert!(types.contains(&ActionType::TriggerReevaluation));
    assert!(types.len() <= BEAM_DEPTH);
}

#[test]
fn shipment_candidates_require_shipments_at_risk() {
    let without = plan(&context(Posture::Hold, RiskLevel::High, &[]));
    assert!(without.iter().all(|action| !action.action_type.is_shipment_level()));

    let with = plan(&context(Posture::Hold, RiskLevel::High, &["TRK-001"]));
    let holds: Vec<_> = with
        .iter()
        .filter(|action| action.action_type == ActionType::HoldCargo)
        .collect();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].args["shipment"], "TRK-001");
}

#[test]
fn plans_are_deterministic_for_identical_contexts() {
    let first = plan(&context(Posture::Restrict, RiskLevel::Medium, &["TRK-001", "TRK-002"]));
    let second = plan(&context(Posture::Restrict, RiskLevel::Medium, &["TRK-001", "TRK-002"]));
    assert_eq!(first, second);
}

#[test]
fn contradictions_make_reinvestigation_worthwhile() {
    let mut quiet = context(Posture::Accept, RiskLevel::Low, &[]);
    quiet.has_contradictions = false;
    let quiet_plan = plan(&quiet);
    assert!(
        quiet_plan.iter().all(|action| action.action_type != ActionType::TriggerReevaluation)
    );

    let mut noisy = context(Posture::Restrict, RiskLevel::Low, &[]);
    noisy.has_contradictions = true;
    let noisy_plan = plan(&noisy);
    assert!(
        noisy_plan.iter().any(|action| action.action_type == ActionType::TriggerReevaluation)
    );
}

#[test]
fn estimated_cost_sums_the_usd_table() {
    let actions = plan(&context(Posture::Hold, RiskLevel::High, &["TRK-001"]));
    let expected: f64 = actions
        .iter()
        .map(|action| aerogate_core::runtime::planner::cost_usd(action.action_type))
        .sum();
    assert_eq!(estimated_cost_usd(&actions), expected);
    assert!(estimated_cost_usd(&actions) > 0.0);
}
