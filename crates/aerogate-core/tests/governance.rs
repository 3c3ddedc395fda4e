// crates/aerogate-core/tests/governance.rs
// ============================================================================
// Module: Action Governance Tests
// Description: Legal transitions, approvals, execution, rollback, resolution.
// Purpose: Validate the per-action state machine and its store invariants.
// ============================================================================

//! ## Overview
//! Tests for action governance:
//! - Legal-transition table membership
//! - HIGH risk forces the approval requirement at the store layer
//! - EXECUTING without an approval is rejected
//! - Re-delivered approvals are no-ops
//! - Rollback exists only for the five reversible types
//! - Cases auto-resolve when actions are terminal and no blocking gap is open

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::ActionRisk;
use aerogate_core::ActionState;
use aerogate_core::ActionType;
use aerogate_core::CaseStatus;
use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::Criticality;
use aerogate_core::EvidenceStore;
use aerogate_core::InvariantKind;
use aerogate_core::MemoryStores;
use aerogate_core::NewAction;
use aerogate_core::NewMissingEvidence;
use aerogate_core::NullEventSink;
use aerogate_core::ScopeId;
use aerogate_core::SourceSystem;
use aerogate_core::StoreError;
use aerogate_core::Timestamp;
use aerogate_core::Verdict;
use aerogate_core::runtime::ActionGovernor;
use aerogate_core::runtime::GovernanceError;
use aerogate_core::runtime::PlannedAction;
use aerogate_core::runtime::transition_allowed;
use serde_json::json;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn planned(action_type: ActionType, risk: ActionRisk) -> PlannedAction {
    PlannedAction {
        action_type,
        args: json!({ "posture": "hold" }),
        risk,
        score: 1.0,
    }
}

#[test]
fn legal_transition_table_matches_spec() {
    use ActionState::*;
    let legal = [
        (Proposed, PendingApproval),
        (Proposed, Approved),
        (PendingApproval, Approved),
        (PendingApproval, Failed),
        (Approved, Executing),
        (Executing, Completed),
        (Executing, Failed),
        (Completed, RolledBack),
    ];
    for (from, to) in legal {
        assert!(transition_allowed(from, to), "{from:?} -> {to:?} must be legal");
    }
    let illegal = [
        (Proposed, Executing),
        (PendingApproval, Executing),
        (Approved, Completed),
        (Failed, Executing),
        (Failed, Approved),
        (RolledBack, Executing),
        (Completed, Executing),
    ];
    for (from, to) in illegal {
        assert!(!transition_allowed(from, to), "{from:?} -> {to:?} must be illegal");
    }
}

#[test]
fn high_risk_without_approval_flag_is_rejected_by_the_store() {
    let stores = MemoryStores::new();
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let err = stores
        .insert_action(
            NewAction {
                case_id: case,
                action_type: ActionType::SwitchGateway,
                args: json!({}),
                risk: ActionRisk::High,
                requires_approval: false,
            },
            ts(1),
        )
        .expect_err("high risk without approval must be rejected");
    assert!(matches!(
        err,
        StoreError::InvariantViolation {
            kind: InvariantKind::ActionGovernance,
            ..
        }
    ));
}

#[test]
fn low_risk_action_is_auto_approved_and_executes() {
    let stores = MemoryStores::new();
    let events = NullEventSink;
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let governor = ActionGovernor::new(&stores, &events);
    let action = governor
        .propose(case, &planned(ActionType::SetPosture, ActionRisk::Low), Verdict::Allow, ts(2))
        .expect("propose");
    assert_eq!(action.state, ActionState::Approved);
    assert!(!action.requires_approval);
    let outcome = governor.execute(action.action_id, ts(3)).expect("execute");
    assert!(outcome.success);
    assert_eq!(stores.action(action.action_id).expect("action").state, ActionState::Completed);
    assert!(stores.outcome(action.action_id).expect("outcome").is_some());
    let trace = stores.trace(case).expect("trace");
    assert!(trace.len() >= 3);
    let mut last_seq = 0;
    for event in &trace {
        assert!(event.seq > last_seq, "trace sequence must be strictly increasing");
        last_seq = event.seq;
    }
}

#[test]
fn approval_gates_execution_and_is_idempotent() {
    let stores = MemoryStores::new();
    let events = NullEventSink;
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let governor = ActionGovernor::new(&stores, &events);
    let action = governor
        .propose(
            case,
            &planned(ActionType::SwitchGateway, ActionRisk::High),
            Verdict::RequireApproval,
            ts(2),
        )
        .expect("propose");
    assert_eq!(action.state, ActionState::PendingApproval);
    assert!(action.requires_approval);

    // Forcing EXECUTING without an approval trips the store invariant.
    let err = stores
        .set_action_state(action.action_id, ActionState::Executing, None, None, ts(3))
        .expect_err("executing without approval must be rejected");
    assert!(matches!(
        err,
        StoreError::InvariantViolation {
            kind: InvariantKind::ActionGovernance,
            ..
        }
    ));

    governor.approve(action.action_id, "ops-lead", ts(4)).expect("approve");
    // Second approval is a no-op, not an error.
    governor.approve(action.action_id, "ops-lead", ts(5)).expect("re-approve");
    let approved = stores.action(action.action_id).expect("action");
    assert_eq!(approved.state, ActionState::Approved);
    assert_eq!(approved.approved_at, Some(ts(4)));

    let outcome = governor.execute(action.action_id, ts(6)).expect("execute");
    assert!(outcome.success);
}

#[test]
fn rollback_is_defined_only_for_reversible_types() {
    let stores = MemoryStores::new();
    let events = NullEventSink;
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let governor = ActionGovernor::new(&stores, &events);

    let reversible = governor
        .propose(case, &planned(ActionType::HoldCargo, ActionRisk::Medium), Verdict::Allow, ts(2))
        .expect("propose");
    governor.execute(reversible.action_id, ts(3)).expect("execute");
    governor.rollback(reversible.action_id, ts(4)).expect("rollback");
    assert_eq!(
        stores.action(reversible.action_id).expect("action").state,
        ActionState::RolledBack
    );

    let irreversible = governor
        .propose(case, &planned(ActionType::FileClaim, ActionRisk::Medium), Verdict::Allow, ts(5))
        .expect("propose");
    governor.execute(irreversible.action_id, ts(6)).expect("execute");
    let err = governor
        .rollback(irreversible.action_id, ts(7))
        .expect_err("file_claim has no inverse handler");
    assert!(matches!(err, GovernanceError::RollbackUnsupported(_)));
}

#[test]
fn executing_a_completed_action_is_an_illegal_transition() {
    let stores = MemoryStores::new();
    let events = NullEventSink;
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let governor = ActionGovernor::new(&stores, &events);
    let action = governor
        .propose(case, &planned(ActionType::SetPosture, ActionRisk::Low), Verdict::Allow, ts(2))
        .expect("propose");
    governor.execute(action.action_id, ts(3)).expect("execute");
    let err = governor.execute(action.action_id, ts(4)).expect_err("double execution");
    assert!(matches!(err, GovernanceError::IllegalTransition { .. }));
}

#[test]
fn case_resolution_waits_for_terminal_actions_and_blocking_gaps() {
    let stores = MemoryStores::new();
    let events = NullEventSink;
    let case = stores.create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    let governor = ActionGovernor::new(&stores, &events);
    let action = governor
        .propose(case, &planned(ActionType::SetPosture, ActionRisk::Low), Verdict::Allow, ts(2))
        .expect("propose");

    // Not terminal yet.
    assert!(!governor.maybe_resolve_case(case, ts(3)).expect("check"));
    governor.execute(action.action_id, ts(4)).expect("execute");

    // Terminal, but a blocking gap holds resolution.
    let request = stores
        .record_missing(
            NewMissingEvidence {
                case_id: case,
                source_system: SourceSystem::FaaNas,
                request_type: "signal_fetch".to_string(),
                params: json!({}),
                reason: "upstream outage".to_string(),
                criticality: Criticality::Blocking,
                retryable: true,
            },
            ts(5),
        )
        .expect("record");
    assert!(!governor.maybe_resolve_case(case, ts(6)).expect("check"));

    let evidence = stores
        .put_evidence(
            aerogate_core::EvidenceIngest {
                source_system: SourceSystem::FaaNas,
                source_ref: "recovered".to_string(),
                content_type: "application/json".to_string(),
                payload: b"{}".to_vec(),
                event_time: None,
                meta: json!({}),
            },
            ts(7),
        )
        .expect("evidence");
    stores.resolve_missing(request, evidence).expect("resolve");
    assert!(governor.maybe_resolve_case(case, ts(8)).expect("resolve"));
    assert_eq!(stores.case(case).expect("case").status, CaseStatus::Resolved);

    // Resolved cases are append-only.
    let err = stores
        .set_case_status(case, CaseStatus::Open, None, ts(9))
        .expect_err("resolved case must reject writes");
    assert!(matches!(err, StoreError::Conflict(_)));
}
