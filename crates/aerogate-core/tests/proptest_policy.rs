// crates/aerogate-core/tests/proptest_policy.rs
// ============================================================================
// Module: Policy Merge Property Tests
// Description: Verdict lattice and merge monotonicity under random rule sets.
// Purpose: Prove that adding blocking rules can never weaken a block.
// ============================================================================

//! ## Overview
//! Property tests over the verdict lattice:
//! - `merge` is commutative, associative in effect, and monotone
//! - Appending a matching Block-producing rule never changes the result away
//!   from Block

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::ActionType;
use aerogate_core::BeliefState;
use aerogate_core::CaseId;
use aerogate_core::PolicyEffect;
use aerogate_core::PolicyId;
use aerogate_core::PolicyRecord;
use aerogate_core::Posture;
use aerogate_core::RiskLevel;
use aerogate_core::ScopeId;
use aerogate_core::ServiceTier;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_core::Verdict;
use aerogate_core::runtime::evaluate;
use proptest::prelude::*;

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Allow),
        Just(Verdict::RequireApproval),
        Just(Verdict::Block),
    ]
}

fn rank(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Allow => 0,
        Verdict::RequireApproval => 1,
        Verdict::Block => 2,
    }
}

/// Builds an unconditional policy carrying the given verdict.
fn unconditional(id: u64, verdict: Verdict) -> PolicyRecord {
    PolicyRecord {
        policy_id: PolicyId::from_raw(id).expect("nonzero policy id"),
        text: format!("rule {id}"),
        conditions: Vec::new(),
        effect: PolicyEffect {
            verdict,
            note: format!("rule {id}"),
        },
        valid: TimeWindow::open(Timestamp::from_unix_millis(0)),
        created_at: Timestamp::from_unix_millis(0),
    }
}

fn any_belief() -> BeliefState {
    BeliefState {
        case_id: CaseId::from_raw(1).expect("nonzero case id"),
        scope: ScopeId::new("KJFK"),
        risk_level: RiskLevel::Low,
        proposed_posture: Posture::Accept,
        evidence_sources: Vec::new(),
        has_contradictions: false,
        has_stale_evidence: false,
        proposed_actions: vec![ActionType::SetPosture],
        estimated_cost: 0.0,
        service_tier: ServiceTier::Standard,
        hours_until_deadline: None,
        flight_category: None,
        min_evidence_count: 0,
    }
}

proptest! {
    #[test]
    fn merge_is_commutative_and_dominant(a in verdict_strategy(), b in verdict_strategy()) {
        prop_assert_eq!(a.merge(b), b.merge(a));
        prop_assert_eq!(rank(a.merge(b)), rank(a).max(rank(b)));
    }

    #[test]
    fn merged_verdict_equals_lattice_maximum(verdicts in prop::collection::vec(verdict_strategy(), 0..8)) {
        let policies: Vec<PolicyRecord> = verdicts
            .iter()
            .enumerate()
            .map(|(index, verdict)| unconditional(index as u64 + 1, *verdict))
            .collect();
        let result = evaluate(&any_belief(), &policies);
        let expected = verdicts.iter().fold(Verdict::Allow, |merged, v| merged.merge(*v));
        prop_assert_eq!(result.verdict, expected);
    }

    #[test]
    fn adding_a_blocking_rule_never_unblocks(verdicts in prop::collection::vec(verdict_strategy(), 0..8)) {
        let mut policies: Vec<PolicyRecord> = verdicts
            .iter()
            .enumerate()
            .map(|(index, verdict)| unconditional(index as u64 + 1, *verdict))
            .collect();
        let before = evaluate(&any_belief(), &policies);
        policies.push(unconditional(99, Verdict::Block));
        let after = evaluate(&any_belief(), &policies);
        prop_assert_eq!(after.verdict, Verdict::Block);
        prop_assert!(rank(after.verdict) >= rank(before.verdict));
    }
}
