// crates/aerogate-core/src/core/case.rs
// ============================================================================
// Module: Aerogate Case Model
// Description: Cases, missing-evidence requests, actions, outcomes, and traces.
// Purpose: Capture governed case evolution for replay and audit.
// Dependencies: crate::core::{belief, evidence, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A case is one governed decision episode over a scope. Everything the case
//! does is recorded: actions walk a legal-transition state machine, failed
//! fetches become first-class missing-evidence requests, and an ordered trace
//! log captures every state transition for point-in-time replay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::belief::Posture;
use crate::core::evidence::SourceSystem;
use crate::core::identifiers::ActionId;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ScopeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Cases
// ============================================================================

/// Case type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    /// Disruption at a single airport gateway.
    AirportDisruption,
    /// Disruption on a lane between gateways.
    LaneDisruption,
}

impl CaseType {
    /// Returns a stable label for the case type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AirportDisruption => "airport_disruption",
            Self::LaneDisruption => "lane_disruption",
        }
    }
}

/// Case lifecycle status.
///
/// # Invariants
/// - Cases are append-only once `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Case is open and may run.
    Open,
    /// Case is blocked on missing critical evidence or a policy block.
    Blocked,
    /// Case is resolved; no further writes are accepted.
    Resolved,
}

impl CaseStatus {
    /// Returns a stable label for the case status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Blocked => "blocked",
            Self::Resolved => "resolved",
        }
    }
}

/// Case row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Case identifier.
    pub case_id: CaseId,
    /// Case type.
    pub case_type: CaseType,
    /// Scope (airport or lane).
    pub scope: ScopeId,
    /// Lifecycle status.
    pub status: CaseStatus,
    /// Last emitted gateway posture, when one exists.
    pub posture: Option<Posture>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Resolution timestamp, once resolved.
    pub resolved_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Missing Evidence
// ============================================================================

/// Criticality of a missing-evidence request.
///
/// # Invariants
/// - An open `Blocking` request forces case status `Blocked` and prevents
///   auto-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// The case cannot decide without this evidence.
    Blocking,
    /// The decision proceeds with a confidence penalty.
    Degraded,
    /// Nice-to-have; no penalty beyond the record itself.
    Informational,
}

impl Criticality {
    /// Returns a stable label for the criticality.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Degraded => "degraded",
            Self::Informational => "informational",
        }
    }
}

/// First-class record of evidence that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEvidenceRecord {
    /// Request identifier.
    pub request_id: RequestId,
    /// Owning case.
    pub case_id: CaseId,
    /// Source that failed.
    pub source_system: SourceSystem,
    /// What was requested (endpoint or record class).
    pub request_type: String,
    /// Structured request parameters.
    pub params: Value,
    /// Why the fetch failed.
    pub reason: String,
    /// Criticality of the gap.
    pub criticality: Criticality,
    /// Whether a retry within this case may succeed.
    pub retryable: bool,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Evidence row that later satisfied the request, when resolved.
    pub resolved_by_evidence: Option<EvidenceId>,
}

/// Input for a missing-evidence record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMissingEvidence {
    /// Owning case.
    pub case_id: CaseId,
    /// Source that failed.
    pub source_system: SourceSystem,
    /// What was requested.
    pub request_type: String,
    /// Structured request parameters.
    pub params: Value,
    /// Why the fetch failed.
    pub reason: String,
    /// Criticality of the gap.
    pub criticality: Criticality,
    /// Whether a retry within this case may succeed.
    pub retryable: bool,
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Governed action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Hold a shipment at the gateway.
    HoldCargo,
    /// Release a held shipment.
    ReleaseCargo,
    /// Reroute a shipment through another gateway.
    SwitchGateway,
    /// Rebook a shipment onto another flight.
    RebookFlight,
    /// Upgrade the shipment service tier.
    UpgradeService,
    /// Notify the customer about the disruption.
    NotifyCustomer,
    /// File a service-failure claim.
    FileClaim,
    /// Set the gateway posture.
    SetPosture,
    /// Publish a gateway advisory to booking channels.
    PublishGatewayAdvisory,
    /// Update automated booking rules.
    UpdateBookingRules,
    /// Schedule a re-evaluation of the case scope.
    TriggerReevaluation,
    /// Escalate to the operations desk.
    EscalateOps,
}

impl ActionType {
    /// Returns a stable label for the action type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HoldCargo => "hold_cargo",
            Self::ReleaseCargo => "release_cargo",
            Self::SwitchGateway => "switch_gateway",
            Self::RebookFlight => "rebook_flight",
            Self::UpgradeService => "upgrade_service",
            Self::NotifyCustomer => "notify_customer",
            Self::FileClaim => "file_claim",
            Self::SetPosture => "set_posture",
            Self::PublishGatewayAdvisory => "publish_gateway_advisory",
            Self::UpdateBookingRules => "update_booking_rules",
            Self::TriggerReevaluation => "trigger_reevaluation",
            Self::EscalateOps => "escalate_ops",
        }
    }

    /// Returns true for shipment-level actions, which require booking evidence.
    #[must_use]
    pub const fn is_shipment_level(self) -> bool {
        matches!(
            self,
            Self::HoldCargo
                | Self::ReleaseCargo
                | Self::SwitchGateway
                | Self::RebookFlight
                | Self::UpgradeService
                | Self::NotifyCustomer
                | Self::FileClaim
        )
    }

    /// Returns true when an inverse handler is defined for rollback.
    #[must_use]
    pub const fn supports_rollback(self) -> bool {
        matches!(
            self,
            Self::SetPosture
                | Self::PublishGatewayAdvisory
                | Self::UpdateBookingRules
                | Self::TriggerReevaluation
                | Self::HoldCargo
        )
    }
}

/// Action risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRisk {
    /// Low-impact action.
    Low,
    /// Medium-impact action.
    Medium,
    /// High-impact action; always requires approval.
    High,
}

impl ActionRisk {
    /// Returns a stable label for the risk level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Action governance states.
///
/// # Invariants
/// - Transitions follow the legal-transition table in the governance runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Proposed by the planner.
    Proposed,
    /// Awaiting an approval.
    PendingApproval,
    /// Approved for execution.
    Approved,
    /// Handler is executing.
    Executing,
    /// Handler completed successfully.
    Completed,
    /// Handler failed or the action was cancelled.
    Failed,
    /// Completed action was rolled back.
    RolledBack,
}

impl ActionState {
    /// Returns a stable label for the action state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Returns true for terminal states that permit case auto-resolution.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RolledBack)
    }
}

/// Governed action row.
///
/// # Invariants
/// - `risk == High` implies `requires_approval`.
/// - `state == Executing` implies `!requires_approval || approved_at.is_some()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Action identifier.
    pub action_id: ActionId,
    /// Owning case.
    pub case_id: CaseId,
    /// Action type.
    pub action_type: ActionType,
    /// Structured action arguments.
    pub args: Value,
    /// Risk classification.
    pub risk: ActionRisk,
    /// Whether an approval is required before execution.
    pub requires_approval: bool,
    /// Governance state.
    pub state: ActionState,
    /// Approval timestamp, once approved.
    pub approved_at: Option<Timestamp>,
    /// Approving actor, once approved.
    pub approved_by: Option<String>,
    /// Failure reason for `Failed` rows.
    pub failure_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last transition timestamp.
    pub updated_at: Timestamp,
}

/// Input for an action insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
    /// Owning case.
    pub case_id: CaseId,
    /// Action type.
    pub action_type: ActionType,
    /// Structured action arguments.
    pub args: Value,
    /// Risk classification.
    pub risk: ActionRisk,
    /// Whether an approval is required before execution.
    pub requires_approval: bool,
}

/// Result payload for an executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Executed action.
    pub action_id: ActionId,
    /// Whether the handler succeeded.
    pub success: bool,
    /// Structured handler payload.
    pub payload: Value,
    /// Recording timestamp.
    pub recorded_at: Timestamp,
}

// ============================================================================
// SECTION: Trace Events
// ============================================================================

/// Trace event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// Orchestrator state entered.
    StateEnter,
    /// Orchestrator state exited.
    StateExit,
    /// External capability invoked.
    ToolCall,
    /// External capability returned.
    ToolResult,
    /// Control handed between roles or action states.
    Handoff,
    /// A guardrail rejected the case's current course.
    GuardrailFail,
    /// The case became blocked.
    Blocked,
}

impl TraceKind {
    /// Returns a stable label for the trace kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateEnter => "state_enter",
            Self::StateExit => "state_exit",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Handoff => "handoff",
            Self::GuardrailFail => "guardrail_fail",
            Self::Blocked => "blocked",
        }
    }
}

/// Ordered per-case trace event.
///
/// # Invariants
/// - `seq` is strictly increasing within a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Owning case.
    pub case_id: CaseId,
    /// Monotonic sequence within the case.
    pub seq: u64,
    /// Event kind.
    pub kind: TraceKind,
    /// Short human-readable label.
    pub label: String,
    /// Optional reference pointer (action id, evidence id, state name).
    pub reference: Option<String>,
    /// Structured metadata.
    pub meta: Value,
    /// Event timestamp.
    pub at: Timestamp,
}
