// crates/aerogate-core/src/runtime/governance.rs
// ============================================================================
// Module: Aerogate Action Governance
// Description: Per-action approval state machine with handler dispatch and rollback.
// Purpose: Ensure no action executes outside the legal transitions and approvals.
// Dependencies: crate::{core, interfaces}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every proposed action walks the legal-transition table and emits a trace
//! event on each transition. Approval rules are enforced twice: here, and
//! again inside the store so callers cannot bypass them. Execution dispatches
//! to a per-type handler; rollback is defined only for the five reversible
//! action types. Re-delivered approvals are no-ops so upstream retries stay
//! idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::belief::Posture;
use crate::core::case::ActionRecord;
use crate::core::case::ActionRisk;
use crate::core::case::ActionState;
use crate::core::case::ActionType;
use crate::core::case::CaseStatus;
use crate::core::case::NewAction;
use crate::core::case::OutcomeRecord;
use crate::core::case::TraceKind;
use crate::core::identifiers::ActionId;
use crate::core::identifiers::CaseId;
use crate::core::policy::Verdict;
use crate::core::time::Timestamp;
use crate::interfaces::CaseStore;
use crate::interfaces::EventSink;
use crate::interfaces::GatewayEvent;
use crate::interfaces::GatewayEventKind;
use crate::interfaces::StoreError;
use crate::runtime::planner::PlannedAction;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Governance errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Transition is not in the legal table.
    #[error("illegal action transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state label.
        from: &'static str,
        /// Requested state label.
        to: &'static str,
    },
    /// Rollback requested for a type without an inverse handler.
    #[error("rollback unsupported for action type: {0}")]
    RollbackUnsupported(&'static str),
    /// Handler reported a failure.
    #[error("action handler failed: {0}")]
    HandlerFailed(String),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Legal Transitions
// ============================================================================

/// Returns true when `from -> to` appears in the legal-transition table.
#[must_use]
pub const fn transition_allowed(from: ActionState, to: ActionState) -> bool {
    matches!(
        (from, to),
        (ActionState::Proposed, ActionState::PendingApproval)
            | (ActionState::Proposed | ActionState::PendingApproval, ActionState::Approved)
            | (ActionState::PendingApproval, ActionState::Failed)
            | (ActionState::Approved, ActionState::Executing)
            | (ActionState::Executing, ActionState::Completed | ActionState::Failed)
            | (ActionState::Completed, ActionState::RolledBack)
    )
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Executes one action type and, where defined, its inverse.
pub trait ActionHandler: Send + Sync {
    /// Executes the action, returning a structured outcome payload.
    ///
    /// # Errors
    ///
    /// Returns a failure description when execution fails.
    fn execute(&self, action: &ActionRecord) -> Result<Value, String>;

    /// Executes the inverse of a completed action.
    ///
    /// # Errors
    ///
    /// Returns a failure description; the default has no inverse.
    fn rollback(&self, action: &ActionRecord) -> Result<Value, String> {
        let _ = action;
        Err("no inverse handler".to_string())
    }
}

/// Handler that acknowledges execution with a structured receipt.
///
/// Real integrations (booking systems, notification channels) are external
/// collaborators; the built-in handler records what was directed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptHandler;

impl ActionHandler for ReceiptHandler {
    fn execute(&self, action: &ActionRecord) -> Result<Value, String> {
        Ok(json!({
            "directive": action.action_type.as_str(),
            "args": action.args,
            "acknowledged": true,
        }))
    }

    fn rollback(&self, action: &ActionRecord) -> Result<Value, String> {
        Ok(json!({
            "directive": action.action_type.as_str(),
            "args": action.args,
            "reversed": true,
        }))
    }
}

/// Handler registry keyed by action type.
pub type HandlerRegistry = BTreeMap<&'static str, Box<dyn ActionHandler>>;

/// Builds a registry with the built-in receipt handler for every type.
#[must_use]
pub fn default_handlers() -> HandlerRegistry {
    let mut registry: HandlerRegistry = BTreeMap::new();
    for action in [
        ActionType::HoldCargo,
        ActionType::ReleaseCargo,
        ActionType::SwitchGateway,
        ActionType::RebookFlight,
        ActionType::UpgradeService,
        ActionType::NotifyCustomer,
        ActionType::FileClaim,
        ActionType::SetPosture,
        ActionType::PublishGatewayAdvisory,
        ActionType::UpdateBookingRules,
        ActionType::TriggerReevaluation,
        ActionType::EscalateOps,
    ] {
        registry.insert(action.as_str(), Box::new(ReceiptHandler));
    }
    registry
}

// ============================================================================
// SECTION: Governor
// ============================================================================

/// Drives actions through the governance state machine.
pub struct ActionGovernor<'a> {
    /// Case storage.
    cases: &'a dyn CaseStore,
    /// Event fan-out.
    events: &'a dyn EventSink,
    /// Handler registry.
    handlers: HandlerRegistry,
}

impl<'a> ActionGovernor<'a> {
    /// Creates a governor with the built-in handler registry.
    #[must_use]
    pub fn new(cases: &'a dyn CaseStore, events: &'a dyn EventSink) -> Self {
        Self {
            cases,
            events,
            handlers: default_handlers(),
        }
    }

    /// Replaces the handler for one action type.
    pub fn set_handler(&mut self, action: ActionType, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(action.as_str(), handler);
    }

    /// Proposes a planned action under the given policy verdict.
    ///
    /// `requires_approval` is computed from the verdict and the intrinsic
    /// risk; HIGH risk always requires approval.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError`] when the insert or transition fails.
    pub fn propose(
        &self,
        case_id: CaseId,
        planned: &PlannedAction,
        verdict: Verdict,
        now: Timestamp,
    ) -> Result<ActionRecord, GovernanceError> {
        let requires_approval =
            planned.risk == ActionRisk::High || verdict == Verdict::RequireApproval;
        let action_id = self.cases.insert_action(
            NewAction {
                case_id,
                action_type: planned.action_type,
                args: planned.args.clone(),
                risk: planned.risk,
                requires_approval,
            },
            now,
        )?;
        self.trace_transition(case_id, action_id, "proposed", now)?;
        if requires_approval {
            self.transition(action_id, ActionState::PendingApproval, None, None, now)?;
        } else {
            self.transition(action_id, ActionState::Approved, None, None, now)?;
        }
        Ok(self.cases.action(action_id)?)
    }

    /// Approves an action; re-delivery of an approval is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::IllegalTransition`] outside the legal table.
    pub fn approve(
        &self,
        action_id: ActionId,
        actor: &str,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let action = self.cases.action(action_id)?;
        if action.state == ActionState::Approved && action.approved_at.is_some() {
            return Ok(());
        }
        self.transition(
            action_id,
            ActionState::Approved,
            Some((actor.to_string(), now)),
            None,
            now,
        )
    }

    /// Executes an approved action through its handler.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError`] when the transition is illegal or a store
    /// write fails; handler failures produce a FAILED action, not an error.
    pub fn execute(
        &self,
        action_id: ActionId,
        now: Timestamp,
    ) -> Result<OutcomeRecord, GovernanceError> {
        let action = self.cases.action(action_id)?;
        self.transition(action_id, ActionState::Executing, None, None, now)?;
        self.cases.append_trace(
            action.case_id,
            TraceKind::ToolCall,
            &format!("execute {}", action.action_type.as_str()),
            Some(action_id.to_string()),
            action.args.clone(),
            now,
        )?;
        let handler_result = self
            .handlers
            .get(action.action_type.as_str())
            .map_or_else(|| Err("no handler registered".to_string()), |h| h.execute(&action));
        let outcome = match handler_result {
            Ok(payload) => {
                self.transition(action_id, ActionState::Completed, None, None, now)?;
                OutcomeRecord {
                    action_id,
                    success: true,
                    payload,
                    recorded_at: now,
                }
            }
            Err(reason) => {
                self.transition(action_id, ActionState::Failed, None, Some(reason.clone()), now)?;
                OutcomeRecord {
                    action_id,
                    success: false,
                    payload: json!({ "error": reason }),
                    recorded_at: now,
                }
            }
        };
        self.cases.record_outcome(outcome.clone())?;
        self.cases.append_trace(
            action.case_id,
            TraceKind::ToolResult,
            &format!("outcome {}", action.action_type.as_str()),
            Some(action_id.to_string()),
            json!({ "success": outcome.success }),
            now,
        )?;
        self.after_execution(&action, &outcome, now)?;
        Ok(outcome)
    }

    /// Rolls back a completed action via its inverse handler.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::RollbackUnsupported`] for the seven types
    /// without an inverse, and [`GovernanceError::HandlerFailed`] when the
    /// inverse handler fails (the action stays COMPLETED).
    pub fn rollback(&self, action_id: ActionId, now: Timestamp) -> Result<(), GovernanceError> {
        let action = self.cases.action(action_id)?;
        if !action.action_type.supports_rollback() {
            return Err(GovernanceError::RollbackUnsupported(action.action_type.as_str()));
        }
        if !transition_allowed(action.state, ActionState::RolledBack) {
            return Err(GovernanceError::IllegalTransition {
                from: action.state.as_str(),
                to: ActionState::RolledBack.as_str(),
            });
        }
        let payload = self
            .handlers
            .get(action.action_type.as_str())
            .map_or_else(|| Err("no handler registered".to_string()), |h| h.rollback(&action))
            .map_err(GovernanceError::HandlerFailed)?;
        self.transition(action_id, ActionState::RolledBack, None, None, now)?;
        self.cases.append_trace(
            action.case_id,
            TraceKind::ToolResult,
            &format!("rollback {}", action.action_type.as_str()),
            Some(action_id.to_string()),
            payload,
            now,
        )?;
        Ok(())
    }

    /// Fails an in-flight or pending action (cancellation path).
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::IllegalTransition`] outside the legal table.
    pub fn fail(
        &self,
        action_id: ActionId,
        reason: &str,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.transition(action_id, ActionState::Failed, None, Some(reason.to_string()), now)
    }

    /// Resolves the case when every action is terminal and no blocking
    /// missing-evidence request remains open.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError`] on store failure.
    pub fn maybe_resolve_case(
        &self,
        case_id: CaseId,
        now: Timestamp,
    ) -> Result<bool, GovernanceError> {
        let case = self.cases.case(case_id)?;
        if case.status == CaseStatus::Resolved {
            return Ok(true);
        }
        let actions = self.cases.actions_for_case(case_id)?;
        let all_terminal = actions.iter().all(|action| action.state.is_terminal());
        let blocking_open = self
            .cases
            .open_missing(case_id)?
            .iter()
            .any(|request| request.criticality == crate::core::case::Criticality::Blocking);
        if !all_terminal || blocking_open {
            return Ok(false);
        }
        self.cases.set_case_status(case_id, CaseStatus::Resolved, case.posture, now)?;
        self.events.emit(&GatewayEvent {
            kind: GatewayEventKind::CaseResolved,
            case_id,
            scope: case.scope,
            payload: json!({ "posture": case.posture.map(Posture::as_str) }),
            at: now,
        });
        Ok(true)
    }

    /// Applies one legal transition and traces it.
    fn transition(
        &self,
        action_id: ActionId,
        to: ActionState,
        approval: Option<(String, Timestamp)>,
        failure_reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let action = self.cases.action(action_id)?;
        if !transition_allowed(action.state, to) {
            return Err(GovernanceError::IllegalTransition {
                from: action.state.as_str(),
                to: to.as_str(),
            });
        }
        self.cases.set_action_state(action_id, to, approval, failure_reason, now)?;
        self.cases.append_trace(
            action.case_id,
            TraceKind::Handoff,
            &format!("action {} -> {}", action.state.as_str(), to.as_str()),
            Some(action_id.to_string()),
            json!({ "action_type": action.action_type.as_str() }),
            now,
        )?;
        Ok(())
    }

    /// Emits a proposal trace row.
    fn trace_transition(
        &self,
        case_id: CaseId,
        action_id: ActionId,
        label: &str,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.cases.append_trace(
            case_id,
            TraceKind::Handoff,
            &format!("action {label}"),
            Some(action_id.to_string()),
            Value::Null,
            now,
        )?;
        Ok(())
    }

    /// Posture bookkeeping and event fan-out after a successful execution.
    fn after_execution(
        &self,
        action: &ActionRecord,
        outcome: &OutcomeRecord,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let case = self.cases.case(action.case_id)?;
        if outcome.success
            && action.action_type == ActionType::SetPosture
            && let Some(label) = action.args.get("posture").and_then(Value::as_str)
        {
            let posture = match label {
                "accept" => Some(Posture::Accept),
                "restrict" => Some(Posture::Restrict),
                "hold" => Some(Posture::Hold),
                "escalate" => Some(Posture::Escalate),
                _ => None,
            };
            if let Some(posture) = posture {
                self.cases.set_case_status(action.case_id, case.status, Some(posture), now)?;
                self.events.emit(&GatewayEvent {
                    kind: GatewayEventKind::PostureChange,
                    case_id: action.case_id,
                    scope: case.scope.clone(),
                    payload: json!({ "posture": posture.as_str() }),
                    at: now,
                });
            }
        }
        self.events.emit(&GatewayEvent {
            kind: GatewayEventKind::ActionExecuted,
            case_id: action.case_id,
            scope: case.scope,
            payload: json!({
                "action_type": action.action_type.as_str(),
                "success": outcome.success,
            }),
            at: now,
        });
        Ok(())
    }
}
