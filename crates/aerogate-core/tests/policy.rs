// crates/aerogate-core/tests/policy.rs
// ============================================================================
// Module: Policy Engine Tests
// Description: Seed set, verdict merging, citations, and the booking override.
// Purpose: Validate the governance rule semantics the packets cite.
// ============================================================================

//! ## Overview
//! Tests for the policy engine:
//! - The thirteen seed policies exist and carry 12-hex text hashes
//! - Required invariants: high risk, critical-accept, contradiction, booking
//! - Merge order Block > RequireApproval > Allow
//! - The booking safety override applies after merging

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::ActionType;
use aerogate_core::BeliefState;
use aerogate_core::CaseId;
use aerogate_core::FlightCategory;
use aerogate_core::MemoryStores;
use aerogate_core::NewPolicy;
use aerogate_core::PolicyCondition;
use aerogate_core::PolicyEffect;
use aerogate_core::PolicyStore;
use aerogate_core::Posture;
use aerogate_core::RiskLevel;
use aerogate_core::ScopeId;
use aerogate_core::ServiceTier;
use aerogate_core::SourceSystem;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_core::Verdict;
use aerogate_core::runtime::evaluate;
use aerogate_core::seed_policies;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn active_policies() -> Vec<aerogate_core::PolicyRecord> {
    let stores = MemoryStores::new();
    stores.seed_policies(&seed_policies(ts(0)), ts(0)).expect("seed");
    stores.policies_active_at(ts(10)).expect("active")
}

fn benign_belief() -> BeliefState {
    BeliefState {
        case_id: CaseId::from_raw(1).expect("nonzero case id"),
        scope: ScopeId::new("KLAX"),
        risk_level: RiskLevel::Low,
        proposed_posture: Posture::Accept,
        evidence_sources: vec![
            SourceSystem::FaaNas,
            SourceSystem::Metar,
            SourceSystem::Taf,
            SourceSystem::NwsAlerts,
            SourceSystem::Adsb,
        ],
        has_contradictions: false,
        has_stale_evidence: false,
        proposed_actions: vec![ActionType::SetPosture],
        estimated_cost: 0.0,
        service_tier: ServiceTier::Standard,
        hours_until_deadline: None,
        flight_category: Some(FlightCategory::Vfr),
        min_evidence_count: 5,
    }
}

#[test]
fn seed_set_has_thirteen_policies_with_short_hashes() {
    let policies = active_policies();
    assert_eq!(policies.len(), 13);
    for policy in &policies {
        let hash = policy.text_hash();
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
    // Seeding twice must not duplicate.
    let stores = MemoryStores::new();
    stores.seed_policies(&seed_policies(ts(0)), ts(0)).expect("seed");
    let inserted = stores.seed_policies(&seed_policies(ts(0)), ts(5)).expect("reseed");
    assert_eq!(inserted, 0);
}

#[test]
fn benign_belief_is_allowed_with_all_policies_evaluated() {
    let result = evaluate(&benign_belief(), &active_policies());
    assert_eq!(result.verdict, Verdict::Allow);
    assert_eq!(result.evaluated, 13);
    // Only the audit baseline matches.
    assert_eq!(result.effects.len(), 1);
}

#[test]
fn high_risk_requires_approval() {
    let mut belief = benign_belief();
    belief.risk_level = RiskLevel::High;
    belief.proposed_posture = Posture::Hold;
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::RequireApproval);
}

#[test]
fn critical_risk_blocks_accept_posture() {
    let mut belief = benign_belief();
    belief.risk_level = RiskLevel::Critical;
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::Block);
}

#[test]
fn open_contradictions_block_accept_posture() {
    let mut belief = benign_belief();
    belief.has_contradictions = true;
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::Block);
    // A non-accept posture survives with contradictions open.
    belief.proposed_posture = Posture::Restrict;
    let result = evaluate(&belief, &active_policies());
    assert_ne!(result.verdict, Verdict::Block);
}

#[test]
fn instrument_conditions_block_accept_posture() {
    let mut belief = benign_belief();
    belief.flight_category = Some(FlightCategory::Lifr);
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::Block);
}

#[test]
fn shipment_action_without_booking_evidence_blocks() {
    let mut belief = benign_belief();
    belief.proposed_actions.push(ActionType::HoldCargo);
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::Block);
    // With booking evidence present the block lifts.
    belief.evidence_sources.push(SourceSystem::Booking);
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::Allow);
}

#[test]
fn booking_override_applies_after_merging() {
    // A future policy that blocks on missing booking evidence alone must not
    // block a case proposing no shipment action.
    let mut policies = active_policies();
    policies.push(aerogate_core::PolicyRecord {
        policy_id: aerogate_core::PolicyId::from_raw(99).expect("nonzero policy id"),
        text: "bookings must back every case".to_string(),
        conditions: vec![PolicyCondition::MissingBookingEvidence],
        effect: PolicyEffect {
            verdict: Verdict::Block,
            note: "bookings must back every case".to_string(),
        },
        valid: TimeWindow::open(ts(0)),
        created_at: ts(0),
    });
    let belief = benign_belief();
    assert!(!belief.proposes_shipment_action());
    let result = evaluate(&belief, &policies);
    assert_eq!(result.verdict, Verdict::Allow);
}

#[test]
fn citations_list_contributing_text_hashes() {
    let mut belief = benign_belief();
    belief.risk_level = RiskLevel::High;
    belief.proposed_posture = Posture::Hold;
    let policies = active_policies();
    let result = evaluate(&belief, &policies);
    assert!(!result.citations.is_empty());
    for citation in &result.citations {
        assert!(policies.iter().any(|policy| policy.text_hash() == *citation));
    }
}

#[test]
fn stale_evidence_requires_review() {
    let mut belief = benign_belief();
    belief.has_stale_evidence = true;
    belief.proposed_posture = Posture::Restrict;
    let result = evaluate(&belief, &active_policies());
    assert_eq!(result.verdict, Verdict::RequireApproval);
}

#[test]
fn expired_policies_do_not_evaluate() {
    let stores = MemoryStores::new();
    stores
        .seed_policies(
            &[NewPolicy {
                text: "short lived rule".to_string(),
                conditions: Vec::new(),
                effect: PolicyEffect {
                    verdict: Verdict::Block,
                    note: "short lived rule".to_string(),
                },
                valid: TimeWindow::closed(ts(0), ts(10)),
            }],
            ts(0),
        )
        .expect("seed");
    assert_eq!(stores.policies_active_at(ts(5)).expect("active").len(), 1);
    assert!(stores.policies_active_at(ts(10)).expect("active").is_empty());
}
