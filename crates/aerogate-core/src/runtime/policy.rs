// crates/aerogate-core/src/runtime/policy.rs
// ============================================================================
// Module: Aerogate Policy Engine
// Description: Stateless policy evaluation over belief states.
// Purpose: Merge rule verdicts monotonically and cite contributing policies.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The policy engine is a stateless evaluator: it tests every active policy's
//! condition set against the belief state, merges verdicts with
//! `Block > RequireApproval > Allow`, and cites contributing policies by
//! their 12-hex text hashes. A safety override runs after merging: a
//! booking-evidence block cannot fire when no shipment-typed action is
//! actually proposed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::belief::BeliefState;
use crate::core::identifiers::PolicyId;
use crate::core::policy::PolicyCondition;
use crate::core::policy::PolicyRecord;
use crate::core::policy::Verdict;

// ============================================================================
// SECTION: Results
// ============================================================================

/// One policy that matched and contributed to the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPolicy {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Policy text.
    pub text: String,
    /// 12-hex snapshot hash of the policy text.
    pub text_hash: String,
    /// Verdict contributed.
    pub verdict: Verdict,
    /// Operator-facing note.
    pub note: String,
}

/// Merged evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    /// Merged verdict.
    pub verdict: Verdict,
    /// Policies that matched, in evaluation order.
    pub effects: Vec<AppliedPolicy>,
    /// Text hashes of contributing policies.
    pub citations: Vec<String>,
    /// Count of policies evaluated (matched or not).
    pub evaluated: u32,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates active policies against a belief state.
///
/// Policies are matched as conjunctions over their condition sets. The merged
/// verdict is monotone: adding a blocking rule can never weaken an existing
/// block.
#[must_use]
pub fn evaluate(belief: &BeliefState, policies: &[PolicyRecord]) -> PolicyResult {
    let mut effects: Vec<AppliedPolicy> = Vec::new();
    for policy in policies {
        if policy.conditions.iter().all(|condition| condition.matches(belief)) {
            effects.push(AppliedPolicy {
                policy_id: policy.policy_id,
                text: policy.text.clone(),
                text_hash: policy.text_hash(),
                verdict: policy.effect.verdict,
                note: policy.effect.note.clone(),
            });
        }
    }
    apply_booking_override(belief, policies, &mut effects);
    let verdict =
        effects.iter().fold(Verdict::Allow, |merged, effect| merged.merge(effect.verdict));
    let citations = effects.iter().map(|effect| effect.text_hash.clone()).collect();
    PolicyResult {
        verdict,
        effects,
        citations,
        evaluated: u32::try_from(policies.len()).unwrap_or(u32::MAX),
    }
}

/// Drops booking-evidence blocks when no shipment-typed action is proposed.
///
/// Applied after rule matching so a future policy that blocks on booking
/// evidence without a shipment-action condition still cannot block a case
/// that proposes no shipment action.
fn apply_booking_override(
    belief: &BeliefState,
    policies: &[PolicyRecord],
    effects: &mut Vec<AppliedPolicy>,
) {
    if belief.proposes_shipment_action() {
        return;
    }
    effects.retain(|effect| {
        if effect.verdict != Verdict::Block {
            return true;
        }
        !policy_guards_booking(policies, effect.policy_id)
    });
}

/// Returns true when the policy's conditions include the booking-evidence guard.
fn policy_guards_booking(policies: &[PolicyRecord], id: PolicyId) -> bool {
    policies.iter().filter(|policy| policy.policy_id == id).any(|policy| {
        policy
            .conditions
            .iter()
            .any(|condition| matches!(condition, PolicyCondition::MissingBookingEvidence))
    })
}
