// crates/aerogate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Aerogate Interfaces
// Description: Backend-agnostic interfaces for signals, assessment, storage, and dispatch.
// Purpose: Define the contract surfaces used by the Aerogate runtime.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Aerogate integrates with external systems without
//! embedding backend-specific details. Signal-source clients, risk assessors,
//! the analytics sink, and durable stores all sit behind these traits.
//! Implementations must fail closed on missing or invalid data: a fetch that
//! cannot complete becomes a typed error which the orchestrator converts into
//! a missing-evidence request, never a silent gap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::belief::BeliefState;
use crate::core::belief::Posture;
use crate::core::belief::RiskAssessment;
use crate::core::case::ActionRecord;
use crate::core::case::ActionState;
use crate::core::case::CaseRecord;
use crate::core::case::CaseStatus;
use crate::core::case::CaseType;
use crate::core::case::MissingEvidenceRecord;
use crate::core::case::NewAction;
use crate::core::case::NewMissingEvidence;
use crate::core::case::OutcomeRecord;
use crate::core::case::TraceEvent;
use crate::core::case::TraceKind;
use crate::core::evidence::EvidenceIngest;
use crate::core::evidence::EvidenceRecord;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ClaimRecord;
use crate::core::graph::ClaimStatus;
use crate::core::graph::ContradictionRecord;
use crate::core::graph::ContradictionStatus;
use crate::core::graph::Direction;
use crate::core::graph::EdgeKind;
use crate::core::graph::EdgeRecord;
use crate::core::graph::GraphView;
use crate::core::graph::NewClaim;
use crate::core::graph::NewContradiction;
use crate::core::graph::NewEdge;
use crate::core::graph::NodeKind;
use crate::core::graph::NodeRecord;
use crate::core::graph::NodeVersionRecord;
use crate::core::identifiers::ActionId;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::ContradictionId;
use crate::core::identifiers::EdgeId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::NodeVersionId;
use crate::core::identifiers::PlaybookId;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ScopeId;
use crate::core::identifiers::WebhookId;
use crate::core::packet::DecisionPacket;
use crate::core::playbook::NewPlaybook;
use crate::core::playbook::PlaybookRecord;
use crate::core::policy::NewPolicy;
use crate::core::policy::PolicyRecord;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source supplied by the host.
///
/// The core never reads wall-clock time directly; replays inject fixed or
/// scripted clocks.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// ============================================================================
// SECTION: Signal Source
// ============================================================================

/// Raw bytes returned by a signal source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFetch {
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
    /// Payload content type.
    pub content_type: String,
    /// Source-scoped reference for the fetch (endpoint, station).
    pub source_ref: String,
    /// Best-effort event-time window reported by the source.
    pub source_time: Option<TimeWindow>,
}

/// Signal source failure kinds.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `Permanent` failures are
///   not retried within a case.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Network timeout or 5xx; a retry may succeed.
    #[error("transient source failure: {0}")]
    Transient(String),
    /// 4xx or malformed payload; retries will not help this case.
    #[error("permanent source failure: {0}")]
    Permanent(String),
    /// Per-call timeout elapsed.
    #[error("source timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },
}

impl SignalError {
    /// Returns true when a retry within this case may succeed.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}

/// External capability returning raw disruption-signal bytes.
pub trait SignalSource: Send + Sync {
    /// Fetches raw bytes for one source system and scope.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] when the fetch fails or times out.
    fn fetch(&self, source: SourceSystem, scope: &ScopeId) -> Result<SignalFetch, SignalError>;
}

// ============================================================================
// SECTION: Risk Assessor
// ============================================================================

/// Risk assessor failure kinds.
#[derive(Debug, Error)]
pub enum AssessorError {
    /// Provider unavailable or returned an error.
    #[error("assessor unavailable: {0}")]
    Unavailable(String),
    /// Per-call timeout elapsed.
    #[error("assessor timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },
    /// Provider output failed structured validation.
    #[error("assessor returned malformed output: {0}")]
    Malformed(String),
}

/// External capability scoring a belief state.
///
/// Output is captured as a structured record; it never drives control flow
/// directly.
pub trait RiskAssessor: Send + Sync {
    /// Assesses the belief state.
    ///
    /// # Errors
    ///
    /// Returns [`AssessorError`] when the assessment cannot be produced.
    fn assess(&self, belief: &BeliefState) -> Result<RiskAssessment, AssessorError>;
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Binding invariants enforced at the store layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantKind {
    /// FACT rows require at least one evidence binding.
    EvidenceBinding,
    /// Node rows are immutable; changes go through versions.
    NodeImmutability,
    /// High-risk actions require approval before execution.
    ActionGovernance,
}

impl InvariantKind {
    /// Returns a stable label for the invariant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EvidenceBinding => "evidence_binding",
            Self::NodeImmutability => "node_immutability",
            Self::ActionGovernance => "action_governance",
        }
    }
}

/// Store errors shared by every backend.
///
/// # Invariants
/// - `InvariantViolation` is never retried and never silently swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Database engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Invalid input data.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity label.
        entity: &'static str,
        /// Row identifier.
        id: u64,
    },
    /// Write conflicts with append-only or uniqueness rules.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// A binding invariant was violated.
    #[error("invariant {} violated on row {row}: {message}", kind.as_str())]
    InvariantViolation {
        /// Violated invariant.
        kind: InvariantKind,
        /// Offending row identifier.
        row: u64,
        /// Details.
        message: String,
    },
    /// Store corruption detected.
    #[error("store corruption: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

/// Immutable content-addressed evidence storage.
pub trait EvidenceStore {
    /// Ingests raw bytes; idempotent on `(source, source_ref, content_sha256)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the byte write fails; callers must
    /// convert the failed ingestion into a missing-evidence request.
    fn put_evidence(&self, ingest: EvidenceIngest, now: Timestamp)
    -> Result<EvidenceId, StoreError>;

    /// Returns the row and raw bytes for an evidence id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn get_evidence(&self, id: EvidenceId) -> Result<(EvidenceRecord, Vec<u8>), StoreError>;

    /// Returns evidence rows for a source, optionally filtered by reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn evidence_by_source(
        &self,
        source: SourceSystem,
        source_ref: Option<&str>,
    ) -> Result<Vec<EvidenceRecord>, StoreError>;
}

// ============================================================================
// SECTION: Graph Store
// ============================================================================

/// Append-only bi-temporal graph storage.
pub trait GraphStore {
    /// Returns the node id for `(kind, identifier)`, inserting when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn upsert_node(
        &self,
        kind: NodeKind,
        identifier: &str,
        now: Timestamp,
    ) -> Result<NodeId, StoreError>;

    /// Looks up a node by identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn node(&self, kind: NodeKind, identifier: &str) -> Result<Option<NodeRecord>, StoreError>;

    /// Looks up a node row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn node_by_id(&self, id: NodeId) -> Result<NodeRecord, StoreError>;

    /// Creates a new attribute version, closing and chaining the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn new_node_version(
        &self,
        node_id: NodeId,
        attrs: Value,
        now: Timestamp,
    ) -> Result<NodeVersionId, StoreError>;

    /// Returns the current (open-window) version for a node, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn current_node_version(&self, node_id: NodeId)
    -> Result<Option<NodeVersionRecord>, StoreError>;

    /// Inserts an edge; FACT status requires evidence bound in the same
    /// logical transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] for unbound FACT inserts.
    fn insert_edge(&self, edge: NewEdge, now: Timestamp) -> Result<EdgeId, StoreError>;

    /// Binds evidence to an edge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn bind_edge_evidence(&self, edge: EdgeId, evidence: EvidenceId) -> Result<(), StoreError>;

    /// Promotes an edge to FACT; rejected without at least one binding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] when no binding exists.
    fn promote_edge(&self, edge: EdgeId) -> Result<(), StoreError>;

    /// Retracts an edge; the row is kept for audit, never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn retract_edge(&self, edge: EdgeId) -> Result<(), StoreError>;

    /// Returns evidence ids bound to an edge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn edge_evidence(&self, edge: EdgeId) -> Result<Vec<EvidenceId>, StoreError>;

    /// Inserts a claim; FACT status requires evidence bound in the same
    /// logical transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] for unbound FACT inserts.
    fn insert_claim(&self, claim: NewClaim, now: Timestamp) -> Result<ClaimId, StoreError>;

    /// Binds evidence to a claim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn bind_claim_evidence(&self, claim: ClaimId, evidence: EvidenceId)
    -> Result<(), StoreError>;

    /// Updates a claim's status; promotion to FACT fires the binding check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] for unbound FACT promotion.
    fn set_claim_status(&self, claim: ClaimId, status: ClaimStatus) -> Result<(), StoreError>;

    /// Inserts a superseding claim and records the chain on the new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn supersede_claim(
        &self,
        old: ClaimId,
        replacement: NewClaim,
        now: Timestamp,
    ) -> Result<ClaimId, StoreError>;

    /// Looks up a claim by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn claim(&self, id: ClaimId) -> Result<ClaimRecord, StoreError>;

    /// Returns claims whose subject is the given node.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn claims_for_subject(&self, node: NodeId) -> Result<Vec<ClaimRecord>, StoreError>;

    /// Returns evidence ids bound to a claim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn claim_evidence(&self, claim: ClaimId) -> Result<Vec<EvidenceId>, StoreError>;

    /// Inserts a contradiction row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn insert_contradiction(
        &self,
        contradiction: NewContradiction,
        now: Timestamp,
    ) -> Result<ContradictionId, StoreError>;

    /// Returns contradictions detected for a case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn contradictions_for_case(
        &self,
        case: CaseId,
    ) -> Result<Vec<ContradictionRecord>, StoreError>;

    /// Sets a contradiction's resolution status, citing a resolution claim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn resolve_contradiction(
        &self,
        id: ContradictionId,
        status: ContradictionStatus,
        resolved_by: Option<ClaimId>,
    ) -> Result<(), StoreError>;

    /// Returns edges touching a node, honoring validity windows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn neighbors(
        &self,
        node: NodeId,
        kind: Option<EdgeKind>,
        direction: Direction,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError>;

    /// Bounded breadth-first traversal; cycle-safe.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn traverse(
        &self,
        root: NodeId,
        kinds: &[EdgeKind],
        max_depth: u32,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError>;

    /// The canonical bi-temporal read; all audit reads go through this.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn as_of(&self, event_time: Timestamp, ingest_time: Timestamp)
    -> Result<GraphView, StoreError>;
}

// ============================================================================
// SECTION: Case Store
// ============================================================================

/// Case, action, trace, missing-evidence, and packet storage.
pub trait CaseStore {
    /// Creates a case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn create_case(
        &self,
        case_type: CaseType,
        scope: &ScopeId,
        now: Timestamp,
    ) -> Result<CaseId, StoreError>;

    /// Looks up a case by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn case(&self, id: CaseId) -> Result<CaseRecord, StoreError>;

    /// Lists all cases, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn cases(&self) -> Result<Vec<CaseRecord>, StoreError>;

    /// Updates case status and posture; resolved cases reject further writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the case is already resolved.
    fn set_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
        posture: Option<Posture>,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Records a missing-evidence request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn record_missing(
        &self,
        request: NewMissingEvidence,
        now: Timestamp,
    ) -> Result<RequestId, StoreError>;

    /// Returns unresolved missing-evidence requests for a case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn open_missing(&self, case: CaseId) -> Result<Vec<MissingEvidenceRecord>, StoreError>;

    /// Resolves a request with the evidence row that satisfied it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown requests.
    fn resolve_missing(&self, request: RequestId, evidence: EvidenceId)
    -> Result<(), StoreError>;

    /// Inserts an action row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] for HIGH risk without the
    /// approval requirement.
    fn insert_action(&self, action: NewAction, now: Timestamp) -> Result<ActionId, StoreError>;

    /// Looks up an action by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn action(&self, id: ActionId) -> Result<ActionRecord, StoreError>;

    /// Returns all actions for a case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn actions_for_case(&self, case: CaseId) -> Result<Vec<ActionRecord>, StoreError>;

    /// Applies an action state transition; governance invariants fire here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvariantViolation`] for EXECUTING without a
    /// required approval.
    fn set_action_state(
        &self,
        id: ActionId,
        state: ActionState,
        approval: Option<(String, Timestamp)>,
        failure_reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Records an action outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn record_outcome(&self, outcome: OutcomeRecord) -> Result<(), StoreError>;

    /// Returns the outcome for an action, when recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn outcome(&self, action: ActionId) -> Result<Option<OutcomeRecord>, StoreError>;

    /// Appends a trace event, returning the assigned sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn append_trace(
        &self,
        case: CaseId,
        kind: TraceKind,
        label: &str,
        reference: Option<String>,
        meta: Value,
        now: Timestamp,
    ) -> Result<u64, StoreError>;

    /// Returns the ordered trace for a case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn trace(&self, case: CaseId) -> Result<Vec<TraceEvent>, StoreError>;

    /// Persists a sealed packet; identical re-seals are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when a different packet exists.
    fn save_packet(&self, packet: &DecisionPacket) -> Result<(), StoreError>;

    /// Returns the sealed packet for a case, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn packet(&self, case: CaseId) -> Result<Option<DecisionPacket>, StoreError>;
}

// ============================================================================
// SECTION: Policy and Playbook Stores
// ============================================================================

/// Policy storage with idempotent seeding.
pub trait PolicyStore {
    /// Seeds policies, deduplicating on unique text; returns inserted count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn seed_policies(&self, policies: &[NewPolicy], now: Timestamp) -> Result<u32, StoreError>;

    /// Returns policies whose validity window contains the instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn policies_active_at(&self, at: Timestamp) -> Result<Vec<PolicyRecord>, StoreError>;
}

/// Playbook storage.
pub trait PlaybookStore {
    /// Inserts a mined playbook.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn insert_playbook(
        &self,
        playbook: NewPlaybook,
        now: Timestamp,
    ) -> Result<PlaybookId, StoreError>;

    /// Returns all playbooks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn playbooks(&self) -> Result<Vec<PlaybookRecord>, StoreError>;

    /// Records an application of a playbook.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    fn touch_playbook(
        &self,
        id: PlaybookId,
        success: bool,
        now: Timestamp,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Composite Store
// ============================================================================

/// Everything the orchestrator needs from durable storage.
///
/// Blanket-implemented for any type providing all five store surfaces.
pub trait ControlStores:
    EvidenceStore + GraphStore + CaseStore + PolicyStore + PlaybookStore
{
}

impl<T> ControlStores for T where
    T: EvidenceStore + GraphStore + CaseStore + PolicyStore + PlaybookStore
{
}

// ============================================================================
// SECTION: Event Sink
// ============================================================================

/// Gateway event kinds delivered to webhooks and streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    /// Gateway posture changed.
    PostureChange,
    /// An action completed execution.
    ActionExecuted,
    /// A case resolved.
    CaseResolved,
    /// An SLA breach is imminent.
    SlaBreachImminent,
}

impl GatewayEventKind {
    /// Returns a stable label for the event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostureChange => "posture_change",
            Self::ActionExecuted => "action_executed",
            Self::CaseResolved => "case_resolved",
            Self::SlaBreachImminent => "sla_breach_imminent",
        }
    }
}

/// Event emitted during orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Event kind.
    pub kind: GatewayEventKind,
    /// Originating case.
    pub case_id: CaseId,
    /// Case scope.
    pub scope: ScopeId,
    /// Structured event payload.
    pub payload: Value,
    /// Emission timestamp.
    pub at: Timestamp,
}

/// Registered webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    /// Registration identifier.
    pub webhook_id: WebhookId,
    /// Endpoint URL.
    pub url: String,
    /// Event kinds the endpoint subscribed to.
    pub events: Vec<GatewayEventKind>,
    /// Registration timestamp.
    pub created_at: Timestamp,
}

/// Delivery log entry for one webhook POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDelivery {
    /// Target registration.
    pub webhook_id: WebhookId,
    /// Delivered event kind.
    pub event_kind: GatewayEventKind,
    /// Attempts performed.
    pub attempts: u32,
    /// Last HTTP status, when a response arrived.
    pub last_status: Option<u16>,
    /// Whether delivery ultimately succeeded.
    pub success: bool,
}

/// Webhook registration and delivery-log storage.
pub trait WebhookStore {
    /// Registers an endpoint for the given event kinds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn register_webhook(
        &self,
        url: &str,
        events: &[GatewayEventKind],
        now: Timestamp,
    ) -> Result<WebhookId, StoreError>;

    /// Returns registrations subscribed to an event kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn webhooks_for_event(
        &self,
        kind: GatewayEventKind,
    ) -> Result<Vec<WebhookRegistration>, StoreError>;

    /// Appends a delivery log entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn record_delivery(
        &self,
        delivery: NewDelivery,
        now: Timestamp,
    ) -> Result<DeliveryId, StoreError>;
}

/// Fan-out sink for gateway events.
///
/// Delivery failures are the sink's responsibility to record; orchestration
/// never fails on event emission.
pub trait EventSink: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: &GatewayEvent);
}

/// Sink that drops all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &GatewayEvent) {}
}

// ============================================================================
// SECTION: Packet Sink
// ============================================================================

/// Packet export failure.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Export sink reported an error.
    #[error("packet export failed: {0}")]
    Sink(String),
}

/// Write-only export of sealed packets to the analytics collaborator.
pub trait PacketSink: Send + Sync {
    /// Exports one sealed packet.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] when the export fails.
    fn export(&self, packet: &DecisionPacket) -> Result<(), ExportError>;
}

/// Sink that drops all packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPacketSink;

impl PacketSink for NullPacketSink {
    fn export(&self, _packet: &DecisionPacket) -> Result<(), ExportError> {
        Ok(())
    }
}
