// crates/aerogate-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Aerogate Case Orchestrator
// Description: Deterministic multi-role state machine producing decision packets.
// Purpose: Drive one case from signals to a sealed, evidence-bound posture.
// Dependencies: crate::{core, interfaces, runtime}, rand, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator is a deterministic state machine:
//! INIT -> INVESTIGATE -> QUANTIFY_RISK -> CRITIQUE (-> INVESTIGATE, bounded)
//! -> EVALUATE_POLICY -> PLAN_ACTIONS -> DRAFT_COMMS -> EXECUTE -> COMPLETE.
//! Every state entry and exit is traced. External capabilities (signal
//! sources, the risk assessor) are suspension points with bounded retries;
//! their failures become missing-evidence requests or structured fallbacks,
//! never control-flow surprises. Guardrails run before execution and can
//! block the case. The single decision point for RESOLVED / BLOCKED / FAILED
//! is here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::belief::BeliefState;
use crate::core::belief::ConfidenceBreakdown;
use crate::core::belief::ConfidencePenalty;
use crate::core::belief::Posture;
use crate::core::belief::RiskAssessment;
use crate::core::belief::RiskLevel;
use crate::core::belief::ServiceTier;
use crate::core::case::ActionType;
use crate::core::case::CaseRecord;
use crate::core::case::CaseStatus;
use crate::core::case::Criticality;
use crate::core::case::NewMissingEvidence;
use crate::core::case::TraceKind;
use crate::core::evidence::EvidenceIngest;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ClaimStatus;
use crate::core::graph::ContradictionStatus;
use crate::core::graph::EdgeKind;
use crate::core::graph::NodeKind;
use crate::core::hashing::sha256_hex;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ScopeId;
use crate::core::packet::DecisionPacket;
use crate::core::policy::Verdict;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::ControlStores;
use crate::interfaces::EventSink;
use crate::interfaces::GatewayEvent;
use crate::interfaces::GatewayEventKind;
use crate::interfaces::PacketSink;
use crate::interfaces::RiskAssessor;
use crate::interfaces::SignalError;
use crate::interfaces::SignalFetch;
use crate::interfaces::SignalSource;
use crate::interfaces::StoreError;
use crate::runtime::derivation::Derived;
use crate::runtime::derivation::SourceSample;
use crate::runtime::derivation::derive_signals;
use crate::runtime::derivation::fetch_criticality;
use crate::runtime::governance::ActionGovernor;
use crate::runtime::governance::GovernanceError;
use crate::runtime::learner::mine_case;
use crate::runtime::packet::PacketInputs;
use crate::runtime::packet::build_packet;
use crate::runtime::packet::cascade_impact;
use crate::runtime::planner::PlanContext;
use crate::runtime::planner::PlannedAction;
use crate::runtime::planner::estimated_cost_usd;
use crate::runtime::planner::plan;
use crate::runtime::policy::PolicyResult;
use crate::runtime::policy::evaluate;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Maximum additional INVESTIGATE passes demanded by CRITIQUE.
pub const MAX_INVESTIGATE_RETRIES: u32 = 2;

/// Maximum outbound fetch attempts per source.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Orchestrator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum INVESTIGATE retries demanded by CRITIQUE.
    pub max_investigate_retries: u32,
    /// Bounded fan-out for outbound signal fetches; clamped to `[1, 8]`.
    pub fetch_pool_size: usize,
    /// Whether DRAFT_COMMS runs.
    pub draft_comms: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_investigate_retries: MAX_INVESTIGATE_RETRIES,
            fetch_pool_size: 6,
            draft_comms: true,
        }
    }
}

// ============================================================================
// SECTION: States
// ============================================================================

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Load case and scope context.
    Init,
    /// Fetch signals, persist evidence, derive facts.
    Investigate,
    /// Assemble belief and call the risk assessor.
    QuantifyRisk,
    /// Challenge evidence quality; may demand another pass.
    Critique,
    /// Evaluate policies against the belief.
    EvaluatePolicy,
    /// Deterministic beam-search planning.
    PlanActions,
    /// Draft customer and operations communications.
    DraftComms,
    /// Drive planned actions through governance.
    Execute,
    /// Seal the packet, fire webhooks, mine the playbook.
    Complete,
}

impl OrchestratorState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Investigate => "investigate",
            Self::QuantifyRisk => "quantify_risk",
            Self::Critique => "critique",
            Self::EvaluatePolicy => "evaluate_policy",
            Self::PlanActions => "plan_actions",
            Self::DraftComms => "draft_comms",
            Self::Execute => "execute",
            Self::Complete => "complete",
        }
    }

    /// Returns the role description shown in streams.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Init => "loading case and scope context",
            Self::Investigate => "fetching signals and binding evidence",
            Self::QuantifyRisk => "quantifying risk from the belief state",
            Self::Critique => "challenging evidence quality",
            Self::EvaluatePolicy => "evaluating governance policies",
            Self::PlanActions => "planning actions with beam search",
            Self::DraftComms => "drafting communications",
            Self::Execute => "executing governed actions",
            Self::Complete => "sealing the decision packet",
        }
    }
}

// ============================================================================
// SECTION: Observation and Cancellation
// ============================================================================

/// Progress snapshot streamed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Current state label.
    pub state: &'static str,
    /// Human-readable description.
    pub description: String,
    /// Evidence rows ingested so far.
    pub evidence_count: u32,
    /// Claims recorded so far.
    pub claim_count: u32,
    /// Open missing-evidence requests plus open contradictions.
    pub uncertainty_count: u32,
    /// Assessed risk level, once known.
    pub risk_level: Option<RiskLevel>,
    /// Recommended posture, once known.
    pub recommended_posture: Option<Posture>,
    /// Confidence score, once known.
    pub confidence: Option<f64>,
}

/// Receives state transitions and progress snapshots during a run.
pub trait RunObserver: Send + Sync {
    /// Called on every state transition.
    fn on_transition(&self, state: &'static str, description: &str, condition: Option<&str>);

    /// Called after significant progress inside a state.
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn on_transition(&self, _state: &'static str, _description: &str, _condition: Option<&str>) {}

    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Cooperative cancellation flag checked at suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Errors and Report
// ============================================================================

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Governance failure.
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    /// Internal failure; the case is marked FAILED in the trace.
    #[error("orchestration failed: {0}")]
    Internal(String),
}

/// Final report for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Case identifier.
    pub case_id: CaseId,
    /// Final state label.
    pub final_state: &'static str,
    /// Final case status.
    pub status: CaseStatus,
    /// Emitted posture, when one was emitted.
    pub posture: Option<Posture>,
    /// Actions proposed.
    pub actions_proposed: u32,
    /// Actions executed.
    pub actions_executed: u32,
    /// Sealed decision packet.
    pub packet: DecisionPacket,
}

// ============================================================================
// SECTION: Run Context
// ============================================================================

/// Mutable context threaded through the states of one run.
struct RunCtx {
    /// Case row as loaded at INIT.
    case: CaseRecord,
    /// Airport scope node.
    airport: NodeId,
    /// Evidence rows ingested this run, in ingest order.
    evidence_ids: Vec<EvidenceId>,
    /// Claims recorded this run.
    claim_ids: Vec<ClaimId>,
    /// Distinct sources with evidence this run.
    sources_ok: Vec<SourceSystem>,
    /// Sources that failed this run.
    sources_missing: Vec<SourceSystem>,
    /// Latest derivation output.
    derived: Derived,
    /// Risk assessment, once produced.
    assessment: Option<RiskAssessment>,
    /// Final policy evaluation, once produced.
    policy_result: PolicyResult,
    /// Planned actions.
    planned: Vec<PlannedAction>,
    /// INVESTIGATE passes performed.
    investigate_passes: u32,
    /// First signal ingest time.
    first_signal_at: Option<Timestamp>,
    /// Posture emission time.
    posture_emitted_at: Option<Timestamp>,
    /// Reason the case became blocked, when it did.
    blocked_reason: Option<String>,
    /// Actions executed.
    executed: u32,
    /// Hours until the tightest booking deadline.
    hours_until_deadline: Option<f64>,
    /// Service tier of the most exposed booking.
    service_tier: ServiceTier,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Deterministic case orchestrator.
pub struct Orchestrator<'a> {
    /// Durable stores.
    stores: &'a dyn ControlStores,
    /// Signal source capability.
    signals: &'a dyn SignalSource,
    /// Risk assessor capability.
    assessor: &'a dyn RiskAssessor,
    /// Event fan-out.
    events: &'a dyn EventSink,
    /// Packet export sink.
    packets: &'a dyn PacketSink,
    /// Host clock.
    clock: &'a dyn Clock,
    /// Tunables.
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator over the given capabilities.
    #[must_use]
    pub fn new(
        stores: &'a dyn ControlStores,
        signals: &'a dyn SignalSource,
        assessor: &'a dyn RiskAssessor,
        events: &'a dyn EventSink,
        packets: &'a dyn PacketSink,
        clock: &'a dyn Clock,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            stores,
            signals,
            assessor,
            events,
            packets,
            clock,
            config,
        }
    }

    /// Runs a case to COMPLETE or BLOCKED without observation.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when a store or governance call fails.
    pub fn run(&self, case_id: CaseId) -> Result<RunReport, OrchestratorError> {
        self.run_observed(case_id, &NullObserver, &CancelToken::new())
    }

    /// Runs a case with an observer and cancellation token.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when a store or governance call fails;
    /// capability failures are absorbed into missing-evidence records and
    /// fallbacks instead.
    pub fn run_observed(
        &self,
        case_id: CaseId,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> Result<RunReport, OrchestratorError> {
        let case = self.stores.case(case_id)?;
        if case.status == CaseStatus::Resolved {
            return Err(OrchestratorError::Store(StoreError::Conflict(
                "case is resolved and append-only".to_string(),
            )));
        }
        let mut ctx = self.init(case, observer)?;
        self.investigate_loop(&mut ctx, observer, cancel)?;
        if ctx.blocked_reason.is_some() {
            // Cancelled at a suspension point; seal a blocked packet.
        } else if self.blocking_gap_open(&ctx)? {
            self.block_case(&mut ctx, "critical evidence missing")?;
        } else {
            self.evaluate_policy(&mut ctx, observer)?;
            self.plan_actions(&mut ctx, observer)?;
            if self.config.draft_comms {
                self.draft_comms(&mut ctx, observer)?;
            }
            self.execute(&mut ctx, observer, cancel)?;
        }
        self.complete(&mut ctx, observer)
    }

    // ------------------------------------------------------------------
    // INIT
    // ------------------------------------------------------------------

    /// Loads the case and scope context.
    fn init(
        &self,
        case: CaseRecord,
        observer: &dyn RunObserver,
    ) -> Result<RunCtx, OrchestratorError> {
        self.enter(case.case_id, OrchestratorState::Init, observer, None)?;
        let airport =
            self.stores.upsert_node(NodeKind::Airport, case.scope.as_str(), self.clock.now())?;
        let ctx = RunCtx {
            airport,
            case,
            evidence_ids: Vec::new(),
            claim_ids: Vec::new(),
            sources_ok: Vec::new(),
            sources_missing: Vec::new(),
            derived: Derived::default(),
            assessment: None,
            policy_result: PolicyResult {
                verdict: Verdict::Allow,
                effects: Vec::new(),
                citations: Vec::new(),
                evaluated: 0,
            },
            planned: Vec::new(),
            investigate_passes: 0,
            first_signal_at: None,
            posture_emitted_at: None,
            blocked_reason: None,
            executed: 0,
            hours_until_deadline: None,
            service_tier: ServiceTier::Standard,
        };
        self.exit(ctx.case.case_id, OrchestratorState::Init)?;
        Ok(ctx)
    }

    // ------------------------------------------------------------------
    // INVESTIGATE / QUANTIFY_RISK / CRITIQUE loop
    // ------------------------------------------------------------------

    /// Runs the bounded investigate -> quantify -> critique loop.
    fn investigate_loop(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> Result<(), OrchestratorError> {
        loop {
            self.investigate(ctx, observer, cancel)?;
            if ctx.blocked_reason.is_some() {
                return Ok(());
            }
            self.quantify_risk(ctx, observer, cancel)?;
            if ctx.blocked_reason.is_some() {
                return Ok(());
            }
            if !self.critique_demands_retry(ctx, observer)? {
                return Ok(());
            }
        }
    }

    /// One INVESTIGATE pass: fetch, persist, derive, account gaps.
    fn investigate(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> Result<(), OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::Investigate, observer, None)?;
        ctx.investigate_passes += 1;
        if cancel.cancelled() {
            self.cancel_case(ctx)?;
            return Ok(());
        }
        let fetches = self.fetch_all(&ctx.case.scope);
        let mut samples = Vec::new();
        for (source, result) in fetches {
            let now = self.clock.now();
            match result {
                Ok(fetch) => {
                    self.ingest_fetch(ctx, source, fetch, now, &mut samples)?;
                }
                Err(err) => {
                    if !ctx.sources_missing.contains(&source) {
                        ctx.sources_missing.push(source);
                    }
                    self.record_fetch_failure(ctx, source, &err, now)?;
                }
            }
        }
        let derived = derive_signals(
            self.stores,
            ctx.case.case_id,
            &ctx.case.scope,
            ctx.airport,
            &samples,
            self.clock.now(),
        )?;
        for issue in &derived.issues {
            self.stores.record_missing(
                NewMissingEvidence {
                    case_id: ctx.case.case_id,
                    source_system: issue.source,
                    request_type: "payload_projection".to_string(),
                    params: json!({ "scope": ctx.case.scope.as_str() }),
                    reason: issue.reason.clone(),
                    criticality: fetch_criticality(issue.source),
                    retryable: false,
                },
                self.clock.now(),
            )?;
        }
        ctx.claim_ids.extend(derived.claims.iter().copied());
        if !samples.is_empty() {
            // A pass that ingested nothing new keeps the prior summaries.
            ctx.derived = derived;
        }
        self.resolve_open_requests(ctx)?;
        observer.on_progress(&self.snapshot(ctx, OrchestratorState::Investigate)?);
        self.exit(ctx.case.case_id, OrchestratorState::Investigate)?;
        Ok(())
    }

    /// Persists one successful fetch and queues its sample for derivation.
    fn ingest_fetch(
        &self,
        ctx: &mut RunCtx,
        source: SourceSystem,
        fetch: SignalFetch,
        now: Timestamp,
        samples: &mut Vec<SourceSample>,
    ) -> Result<(), OrchestratorError> {
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::ToolCall,
            &format!("fetch {}", source.as_str()),
            Some(fetch.source_ref.clone()),
            Value::Null,
            now,
        )?;
        let payload: Value = match serde_json::from_slice(&fetch.bytes) {
            Ok(value) => value,
            Err(err) => {
                if !ctx.sources_missing.contains(&source) {
                    ctx.sources_missing.push(source);
                }
                self.stores.record_missing(
                    NewMissingEvidence {
                        case_id: ctx.case.case_id,
                        source_system: source,
                        request_type: "payload_parse".to_string(),
                        params: json!({ "source_ref": fetch.source_ref }),
                        reason: format!("malformed payload: {err}"),
                        criticality: fetch_criticality(source),
                        retryable: false,
                    },
                    now,
                )?;
                return Ok(());
            }
        };
        let event_time = fetch.source_time.unwrap_or_else(|| TimeWindow::at(now));
        let evidence_id = self.stores.put_evidence(
            EvidenceIngest {
                source_system: source,
                source_ref: fetch.source_ref,
                content_type: fetch.content_type,
                payload: fetch.bytes,
                event_time: Some(event_time),
                meta: json!({ "scope": ctx.case.scope.as_str() }),
            },
            now,
        )?;
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::ToolResult,
            &format!("ingested {}", source.as_str()),
            Some(evidence_id.to_string()),
            Value::Null,
            now,
        )?;
        if ctx.evidence_ids.contains(&evidence_id) {
            return Ok(());
        }
        ctx.first_signal_at.get_or_insert(now);
        ctx.evidence_ids.push(evidence_id);
        if !ctx.sources_ok.contains(&source) {
            ctx.sources_ok.push(source);
        }
        let (record, _) = self.stores.get_evidence(evidence_id)?;
        samples.push(SourceSample {
            evidence_id,
            source,
            payload,
            retrieved_at: record.retrieved_at,
            event_time: record.event_time,
        });
        Ok(())
    }

    /// Records a missing-evidence request for a failed fetch.
    fn record_fetch_failure(
        &self,
        ctx: &RunCtx,
        source: SourceSystem,
        err: &SignalError,
        now: Timestamp,
    ) -> Result<(), OrchestratorError> {
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::ToolResult,
            &format!("fetch failed {}", source.as_str()),
            None,
            json!({ "error": err.to_string() }),
            now,
        )?;
        self.stores.record_missing(
            NewMissingEvidence {
                case_id: ctx.case.case_id,
                source_system: source,
                request_type: "signal_fetch".to_string(),
                params: json!({ "scope": ctx.case.scope.as_str() }),
                reason: err.to_string(),
                criticality: fetch_criticality(source),
                retryable: err.retryable(),
            },
            now,
        )?;
        Ok(())
    }

    /// Re-checks open requests against evidence ingested this run; resolution
    /// is explicit, never implicit at ingest time.
    fn resolve_open_requests(&self, ctx: &RunCtx) -> Result<(), OrchestratorError> {
        for request in self.stores.open_missing(ctx.case.case_id)? {
            let satisfied = ctx.evidence_ids.iter().find(|id| {
                self.stores
                    .get_evidence(**id)
                    .map(|(record, _)| record.source_system == request.source_system)
                    .unwrap_or(false)
            });
            if let Some(evidence_id) = satisfied {
                self.stores.resolve_missing(request.request_id, *evidence_id)?;
            }
        }
        Ok(())
    }

    /// Fetches every investigation source with bounded fan-out and retries.
    fn fetch_all(&self, scope: &ScopeId) -> Vec<(SourceSystem, Result<SignalFetch, SignalError>)> {
        let sources = SourceSystem::investigation_set();
        let pool = self.config.fetch_pool_size.clamp(1, 8);
        let signals = self.signals;
        let results: Mutex<Vec<(SourceSystem, Result<SignalFetch, SignalError>)>> =
            Mutex::new(Vec::new());
        for chunk in sources.chunks(pool) {
            thread::scope(|workers| {
                for source in chunk {
                    let results = &results;
                    workers.spawn(move || {
                        let outcome = fetch_with_retry(signals, *source, scope);
                        if let Ok(mut guard) = results.lock() {
                            guard.push((*source, outcome));
                        }
                    });
                }
            });
        }
        let mut collected = results.into_inner().unwrap_or_default();
        collected.sort_by_key(|(source, _)| *source);
        collected
    }

    /// QUANTIFY_RISK: assemble belief, call the assessor, absorb failures.
    fn quantify_risk(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> Result<(), OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::QuantifyRisk, observer, None)?;
        if cancel.cancelled() {
            self.cancel_case(ctx)?;
            return Ok(());
        }
        self.scan_cascade_exposure(ctx)?;
        let belief = self.assemble_belief(ctx, RiskLevel::Medium, Posture::Accept, &[], 0.0)?;
        let now = self.clock.now();
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::ToolCall,
            "assess risk",
            None,
            json!({ "evidence_count": belief.min_evidence_count }),
            now,
        )?;
        let assessment = match self.assessor.assess(&belief) {
            Ok(assessment) => assessment,
            Err(err) => self.fallback_assessment(ctx, &err.to_string()),
        };
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::ToolResult,
            "risk assessed",
            None,
            json!({
                "risk_level": assessment.risk_level.as_str(),
                "recommended_posture": assessment.recommended_posture.as_str(),
            }),
            self.clock.now(),
        )?;
        ctx.assessment = Some(assessment);
        observer.on_progress(&self.snapshot(ctx, OrchestratorState::QuantifyRisk)?);
        self.exit(ctx.case.case_id, OrchestratorState::QuantifyRisk)?;
        Ok(())
    }

    /// Assessor fallback: HIGH risk with a degraded confidence penalty.
    fn fallback_assessment(&self, ctx: &RunCtx, reason: &str) -> RiskAssessment {
        RiskAssessment {
            risk_level: RiskLevel::High,
            recommended_posture: Posture::Restrict,
            confidence: ConfidenceBreakdown {
                sources_ok: ctx.sources_ok.clone(),
                sources_missing: ctx.sources_missing.clone(),
                penalties: vec![ConfidencePenalty {
                    label: "degraded:assessor".to_string(),
                    amount: 0.3,
                }],
                score: 0.4,
                explanation: format!("risk assessor unavailable, failing safe: {reason}"),
            },
        }
    }

    /// CRITIQUE: challenges evidence age, source diversity, and contradiction
    /// count; any failed dimension demands another pass while retries remain.
    fn critique_demands_retry(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
    ) -> Result<bool, OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::Critique, observer, None)?;
        let open_contradictions = self
            .stores
            .contradictions_for_case(ctx.case.case_id)?
            .iter()
            .filter(|row| row.status == ContradictionStatus::Open)
            .count();
        let insufficient = ctx.sources_ok.len() < 3 && !ctx.sources_missing.is_empty();
        let aged = !ctx.derived.summary.stale_sources.is_empty();
        let challenge = if insufficient {
            Some("insufficient evidence")
        } else if open_contradictions > 0 {
            Some("open contradictions")
        } else if aged {
            Some("stale evidence")
        } else {
            None
        };
        let retries_left = ctx.investigate_passes <= self.config.max_investigate_retries;
        let retry = challenge.is_some() && retries_left;
        let condition = if retry {
            challenge
        } else {
            None
        };
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::Handoff,
            if retry {
                "critique demands another investigate pass"
            } else {
                "critique satisfied"
            },
            None,
            json!({
                "sources_ok": ctx.sources_ok.len(),
                "open_contradictions": open_contradictions,
                "stale_sources": ctx.derived.summary.stale_sources.len(),
                "pass": ctx.investigate_passes,
            }),
            self.clock.now(),
        )?;
        if retry {
            observer.on_transition(
                OrchestratorState::Investigate.as_str(),
                OrchestratorState::Investigate.description(),
                condition,
            );
        }
        self.exit(ctx.case.case_id, OrchestratorState::Critique)?;
        Ok(retry)
    }

    // ------------------------------------------------------------------
    // EVALUATE_POLICY / PLAN_ACTIONS / DRAFT_COMMS
    // ------------------------------------------------------------------

    /// EVALUATE_POLICY: posture-level evaluation before planning.
    fn evaluate_policy(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
    ) -> Result<(), OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::EvaluatePolicy, observer, None)?;
        let assessment = self.assessment(ctx)?;
        let belief = self.assemble_belief(
            ctx,
            assessment.risk_level,
            assessment.recommended_posture,
            &[],
            0.0,
        )?;
        let policies = self.stores.policies_active_at(self.clock.now())?;
        ctx.policy_result = evaluate(&belief, &policies);
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::Handoff,
            &format!("policy verdict {}", ctx.policy_result.verdict.as_str()),
            None,
            json!({ "citations": ctx.policy_result.citations, "evaluated": ctx.policy_result.evaluated }),
            self.clock.now(),
        )?;
        self.exit(ctx.case.case_id, OrchestratorState::EvaluatePolicy)?;
        Ok(())
    }

    /// PLAN_ACTIONS: beam search plus the planning-aware policy pass.
    fn plan_actions(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
    ) -> Result<(), OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::PlanActions, observer, None)?;
        let assessment = self.assessment(ctx)?;
        let shipments = self.shipments_at_risk(ctx)?;
        let context = PlanContext {
            posture: assessment.recommended_posture,
            risk: assessment.risk_level,
            has_contradictions: self.open_contradiction_count(ctx)? > 0,
            shipments_at_risk: shipments,
            service_tier: ctx.service_tier,
        };
        ctx.planned = plan(&context);
        let proposed: Vec<ActionType> =
            ctx.planned.iter().map(|action| action.action_type).collect();
        let belief = self.assemble_belief(
            ctx,
            assessment.risk_level,
            assessment.recommended_posture,
            &proposed,
            estimated_cost_usd(&ctx.planned),
        )?;
        let policies = self.stores.policies_active_at(self.clock.now())?;
        ctx.policy_result = evaluate(&belief, &policies);
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::Handoff,
            &format!("planned {} actions", ctx.planned.len()),
            None,
            json!({ "verdict": ctx.policy_result.verdict.as_str() }),
            self.clock.now(),
        )?;
        self.exit(ctx.case.case_id, OrchestratorState::PlanActions)?;
        Ok(())
    }

    /// DRAFT_COMMS: fills message payloads for communication actions.
    fn draft_comms(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
    ) -> Result<(), OrchestratorError> {
        if !ctx
            .planned
            .iter()
            .any(|action| {
                matches!(
                    action.action_type,
                    ActionType::NotifyCustomer | ActionType::EscalateOps
                )
            })
        {
            return Ok(());
        }
        self.enter(ctx.case.case_id, OrchestratorState::DraftComms, observer, None)?;
        let assessment = self.assessment(ctx)?;
        let message = format!(
            "gateway {} posture {} under {} risk",
            ctx.case.scope.as_str(),
            assessment.recommended_posture.as_str(),
            assessment.risk_level.as_str(),
        );
        for action in &mut ctx.planned {
            if matches!(action.action_type, ActionType::NotifyCustomer | ActionType::EscalateOps)
                && let Value::Object(args) = &mut action.args
            {
                args.insert("message".to_string(), Value::String(message.clone()));
            }
        }
        self.exit(ctx.case.case_id, OrchestratorState::DraftComms)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // EXECUTE
    // ------------------------------------------------------------------

    /// EXECUTE: guardrails, then governed execution of the plan.
    fn execute(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> Result<(), OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::Execute, observer, None)?;
        if !self.guardrails_pass(ctx)? {
            self.exit(ctx.case.case_id, OrchestratorState::Execute)?;
            return Ok(());
        }
        if ctx.policy_result.verdict == Verdict::Block {
            let citations = ctx.policy_result.citations.join(",");
            self.stores.append_trace(
                ctx.case.case_id,
                TraceKind::Blocked,
                "policy blocked execution",
                None,
                json!({ "citations": citations }),
                self.clock.now(),
            )?;
            self.block_case(ctx, "policy verdict block")?;
            self.exit(ctx.case.case_id, OrchestratorState::Execute)?;
            return Ok(());
        }
        let governor = ActionGovernor::new(self.stores, self.events);
        let planned = ctx.planned.clone();
        for action in &planned {
            if cancel.cancelled() {
                self.cancel_case(ctx)?;
                break;
            }
            let now = self.clock.now();
            let record =
                governor.propose(ctx.case.case_id, action, ctx.policy_result.verdict, now)?;
            if record.requires_approval {
                continue;
            }
            let outcome = governor.execute(record.action_id, self.clock.now())?;
            if outcome.success {
                ctx.executed += 1;
                if record.action_type == ActionType::SetPosture {
                    ctx.posture_emitted_at = Some(outcome.recorded_at);
                }
            }
        }
        governor.maybe_resolve_case(ctx.case.case_id, self.clock.now())?;
        self.exit(ctx.case.case_id, OrchestratorState::Execute)?;
        Ok(())
    }

    /// Runs the three between-state guardrails; false means the case blocked.
    fn guardrails_pass(&self, ctx: &mut RunCtx) -> Result<bool, OrchestratorError> {
        // Evidence-binding guardrail.
        for claim_id in &ctx.claim_ids {
            let claim = self.stores.claim(*claim_id)?;
            if claim.status == ClaimStatus::Fact
                && self.stores.claim_evidence(*claim_id)?.is_empty()
            {
                self.guardrail_fail(ctx, "evidence_binding", &claim_id.to_string())?;
                self.block_case(ctx, "promoted claim lacks evidence")?;
                return Ok(false);
            }
        }
        // Booking-required guardrail.
        let proposes_shipment =
            ctx.planned.iter().any(|action| action.action_type.is_shipment_level());
        if proposes_shipment && !ctx.sources_ok.contains(&SourceSystem::Booking) {
            let booked = self
                .stores
                .evidence_by_source(SourceSystem::Booking, None)?
                .iter()
                .any(|row| row.meta.get("scope").and_then(Value::as_str)
                    == Some(ctx.case.scope.as_str()));
            if !booked {
                self.guardrail_fail(ctx, "booking_required", ctx.case.scope.as_str())?;
                self.stores.record_missing(
                    NewMissingEvidence {
                        case_id: ctx.case.case_id,
                        source_system: SourceSystem::Booking,
                        request_type: "booking_evidence".to_string(),
                        params: json!({ "scope": ctx.case.scope.as_str() }),
                        reason: "shipment action proposed without booking evidence".to_string(),
                        criticality: Criticality::Blocking,
                        retryable: false,
                    },
                    self.clock.now(),
                )?;
                self.block_case(ctx, "shipment action without booking evidence")?;
                return Ok(false);
            }
        }
        // Non-workflow guardrail: distinct cases must leave distinct traces.
        let signature = self.trace_signature(ctx)?;
        for case in self.stores.cases()? {
            if case.case_id == ctx.case.case_id || case.scope != ctx.case.scope {
                continue;
            }
            if let Some(packet) = self.stores.packet(case.case_id)?
                && packet_signature(&packet) == signature
            {
                self.guardrail_fail(ctx, "non_workflow", &case.case_id.to_string())?;
                self.block_case(ctx, "trace replays a prior case")?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Emits a guardrail-failure trace row.
    fn guardrail_fail(
        &self,
        ctx: &RunCtx,
        guardrail: &str,
        reference: &str,
    ) -> Result<(), OrchestratorError> {
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::GuardrailFail,
            guardrail,
            Some(reference.to_string()),
            Value::Null,
            self.clock.now(),
        )?;
        Ok(())
    }

    /// Signature of this run's trace path and evidence set. Only states up
    /// to EXECUTE participate so live runs compare against sealed packets.
    fn trace_signature(&self, ctx: &RunCtx) -> Result<String, OrchestratorError> {
        let trace = self.stores.trace(ctx.case.case_id)?;
        let mut content = signature_prefix(&trace);
        for id in &ctx.evidence_ids {
            let (record, _) = self.stores.get_evidence(*id)?;
            content.push_str(&record.content_sha256);
            content.push(';');
        }
        Ok(sha256_hex(content.as_bytes()))
    }

    // ------------------------------------------------------------------
    // COMPLETE
    // ------------------------------------------------------------------

    /// COMPLETE: seal the packet, export, fire events, mine the playbook.
    fn complete(
        &self,
        ctx: &mut RunCtx,
        observer: &dyn RunObserver,
    ) -> Result<RunReport, OrchestratorError> {
        self.enter(ctx.case.case_id, OrchestratorState::Complete, observer, None)?;
        let case = self.stores.case(ctx.case.case_id)?;
        let assessment = ctx.assessment.clone().unwrap_or_else(|| {
            self.fallback_assessment(ctx, "run ended before risk quantification")
        });
        let posture = if case.status == CaseStatus::Blocked {
            Posture::Hold
        } else {
            case.posture.unwrap_or(assessment.recommended_posture)
        };
        let rationale = self.rationale(ctx, &case, posture);
        let inputs = PacketInputs {
            posture,
            risk_level: assessment.risk_level,
            rationale,
            confidence: assessment.confidence.clone(),
            policy: &ctx.policy_result,
            evidence_ids: &ctx.evidence_ids,
            claim_ids: &ctx.claim_ids,
            airport: ctx.airport,
            investigate_passes: ctx.investigate_passes,
            first_signal_at: ctx.first_signal_at,
            posture_emitted_at: ctx.posture_emitted_at,
        };
        let now = self.clock.now();
        let packet = build_packet(self.stores, ctx.case.case_id, &inputs, now)?;
        self.stores.save_packet(&packet)?;
        if let Err(err) = self.packets.export(&packet) {
            self.stores.append_trace(
                ctx.case.case_id,
                TraceKind::ToolResult,
                "packet export failed",
                None,
                json!({ "error": err.to_string() }),
                self.clock.now(),
            )?;
        }
        self.emit_sla_warning(ctx, posture, now);
        let final_case = self.stores.case(ctx.case.case_id)?;
        if final_case.status == CaseStatus::Resolved {
            mine_case(self.stores, ctx.case.case_id, &packet, self.clock.now())?;
        }
        self.exit(ctx.case.case_id, OrchestratorState::Complete)?;
        Ok(RunReport {
            case_id: ctx.case.case_id,
            final_state: if final_case.status == CaseStatus::Blocked {
                "blocked"
            } else {
                OrchestratorState::Complete.as_str()
            },
            status: final_case.status,
            posture: final_case.posture.or(Some(posture)),
            actions_proposed: u32::try_from(ctx.planned.len()).unwrap_or(u32::MAX),
            actions_executed: ctx.executed,
            packet,
        })
    }

    /// Emits the SLA warning when a tight deadline meets a non-accept posture.
    fn emit_sla_warning(&self, ctx: &RunCtx, posture: Posture, now: Timestamp) {
        if posture != Posture::Accept
            && ctx.hours_until_deadline.is_some_and(|hours| hours < 6.0)
        {
            self.events.emit(&GatewayEvent {
                kind: GatewayEventKind::SlaBreachImminent,
                case_id: ctx.case.case_id,
                scope: ctx.case.scope.clone(),
                payload: json!({
                    "hours_until_deadline": ctx.hours_until_deadline,
                    "posture": posture.as_str(),
                }),
                at: now,
            });
        }
    }

    /// Builds the packet rationale line.
    fn rationale(&self, ctx: &RunCtx, case: &CaseRecord, posture: Posture) -> String {
        if let Some(reason) = &ctx.blocked_reason {
            return format!("case blocked: {reason}");
        }
        format!(
            "posture {} for {} from {} evidence rows across {} sources with {} open contradictions",
            posture.as_str(),
            case.scope.as_str(),
            ctx.evidence_ids.len(),
            ctx.sources_ok.len(),
            self.open_contradiction_count(ctx).unwrap_or(0),
        )
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Returns the assessment or an internal error before QUANTIFY_RISK.
    fn assessment(&self, ctx: &RunCtx) -> Result<RiskAssessment, OrchestratorError> {
        ctx.assessment
            .clone()
            .ok_or_else(|| OrchestratorError::Internal("risk not yet quantified".to_string()))
    }

    /// Counts open contradictions for the case.
    fn open_contradiction_count(&self, ctx: &RunCtx) -> Result<u32, OrchestratorError> {
        let count = self
            .stores
            .contradictions_for_case(ctx.case.case_id)?
            .iter()
            .filter(|row| row.status == ContradictionStatus::Open)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// True when any blocking missing-evidence request is open.
    fn blocking_gap_open(&self, ctx: &RunCtx) -> Result<bool, OrchestratorError> {
        Ok(self
            .stores
            .open_missing(ctx.case.case_id)?
            .iter()
            .any(|request| request.criticality == Criticality::Blocking))
    }

    /// Scans cascade bookings for deadline and tier exposure.
    fn scan_cascade_exposure(&self, ctx: &mut RunCtx) -> Result<(), OrchestratorError> {
        let now = self.clock.now();
        let impact = cascade_impact(self.stores, ctx.airport, now)?;
        for booking in &impact.bookings {
            if let Some(node) = self.stores.node(NodeKind::Booking, booking)?
                && let Some(version) = self.stores.current_node_version(node.node_id)?
            {
                if let Some(deadline) = version.attrs.get("deadline_ms").and_then(Value::as_i64) {
                    let hours =
                        Timestamp::from_unix_millis(deadline).millis_since(now) as f64 / 3_600_000.0;
                    ctx.hours_until_deadline = Some(
                        ctx.hours_until_deadline.map_or(hours, |current| current.min(hours)),
                    );
                }
                if version.attrs.get("tier").and_then(Value::as_str) == Some("critical") {
                    ctx.service_tier = ServiceTier::Critical;
                } else if version.attrs.get("tier").and_then(Value::as_str) == Some("express")
                    && ctx.service_tier == ServiceTier::Standard
                {
                    ctx.service_tier = ServiceTier::Express;
                }
            }
        }
        Ok(())
    }

    /// Collects shipments reachable from the scope node.
    fn shipments_at_risk(&self, ctx: &RunCtx) -> Result<Vec<String>, OrchestratorError> {
        let edges = self.stores.traverse(
            ctx.airport,
            &[EdgeKind::Serves, EdgeKind::Carries],
            2,
            self.clock.now(),
        )?;
        let mut shipments = Vec::new();
        for edge in edges {
            let node = self.stores.node_by_id(edge.dst)?;
            if node.kind == NodeKind::Shipment && !shipments.contains(&node.identifier) {
                shipments.push(node.identifier);
            }
        }
        shipments.sort();
        Ok(shipments)
    }

    /// Assembles the belief state from graph reads and gap accounting.
    fn assemble_belief(
        &self,
        ctx: &RunCtx,
        risk: RiskLevel,
        posture: Posture,
        proposed: &[ActionType],
        estimated_cost: f64,
    ) -> Result<BeliefState, OrchestratorError> {
        let mut evidence_sources = ctx.sources_ok.clone();
        for row in self.stores.evidence_by_source(SourceSystem::Booking, None)? {
            if row.meta.get("scope").and_then(Value::as_str) == Some(ctx.case.scope.as_str())
                && !evidence_sources.contains(&SourceSystem::Booking)
            {
                evidence_sources.push(SourceSystem::Booking);
            }
        }
        Ok(BeliefState {
            case_id: ctx.case.case_id,
            scope: ctx.case.scope.clone(),
            risk_level: risk,
            proposed_posture: posture,
            evidence_sources,
            has_contradictions: self.open_contradiction_count(ctx)? > 0,
            has_stale_evidence: !ctx.derived.summary.stale_sources.is_empty(),
            proposed_actions: proposed.to_vec(),
            estimated_cost,
            service_tier: ctx.service_tier,
            hours_until_deadline: ctx.hours_until_deadline,
            flight_category: ctx.derived.summary.metar.as_ref().map(|metar| metar.category),
            min_evidence_count: u32::try_from(ctx.evidence_ids.len()).unwrap_or(u32::MAX),
        })
    }

    /// Builds a progress snapshot.
    fn snapshot(
        &self,
        ctx: &RunCtx,
        state: OrchestratorState,
    ) -> Result<ProgressSnapshot, OrchestratorError> {
        let open_missing = self.stores.open_missing(ctx.case.case_id)?.len();
        let uncertainty = u32::try_from(open_missing).unwrap_or(u32::MAX)
            + self.open_contradiction_count(ctx)?;
        Ok(ProgressSnapshot {
            state: state.as_str(),
            description: state.description().to_string(),
            evidence_count: u32::try_from(ctx.evidence_ids.len()).unwrap_or(u32::MAX),
            claim_count: u32::try_from(ctx.claim_ids.len()).unwrap_or(u32::MAX),
            uncertainty_count: uncertainty,
            risk_level: ctx.assessment.as_ref().map(|a| a.risk_level),
            recommended_posture: ctx.assessment.as_ref().map(|a| a.recommended_posture),
            confidence: ctx.assessment.as_ref().map(|a| a.confidence.score),
        })
    }

    /// Marks the case blocked with a traced reason.
    fn block_case(&self, ctx: &mut RunCtx, reason: &str) -> Result<(), OrchestratorError> {
        ctx.blocked_reason = Some(reason.to_string());
        let now = self.clock.now();
        self.stores.append_trace(
            ctx.case.case_id,
            TraceKind::Blocked,
            reason,
            None,
            Value::Null,
            now,
        )?;
        self.stores.set_case_status(ctx.case.case_id, CaseStatus::Blocked, None, now)?;
        Ok(())
    }

    /// Cancellation path: fail in-flight actions, block the case.
    fn cancel_case(&self, ctx: &mut RunCtx) -> Result<(), OrchestratorError> {
        let governor = ActionGovernor::new(self.stores, self.events);
        let now = self.clock.now();
        for action in self.stores.actions_for_case(ctx.case.case_id)? {
            if action.state == crate::core::case::ActionState::Executing {
                governor.fail(action.action_id, "CANCELLED", now)?;
            }
        }
        self.block_case(ctx, "run cancelled")
    }

    /// Traces and streams a state entry.
    fn enter(
        &self,
        case_id: CaseId,
        state: OrchestratorState,
        observer: &dyn RunObserver,
        condition: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        self.stores.append_trace(
            case_id,
            TraceKind::StateEnter,
            state.as_str(),
            None,
            Value::Null,
            self.clock.now(),
        )?;
        observer.on_transition(state.as_str(), state.description(), condition);
        Ok(())
    }

    /// Traces a state exit.
    fn exit(&self, case_id: CaseId, state: OrchestratorState) -> Result<(), OrchestratorError> {
        self.stores.append_trace(
            case_id,
            TraceKind::StateExit,
            state.as_str(),
            None,
            Value::Null,
            self.clock.now(),
        )?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Packet Signatures
// ============================================================================

/// Retries one fetch with jittered backoff; permanent failures short-circuit.
fn fetch_with_retry(
    signals: &dyn SignalSource,
    source: SourceSystem,
    scope: &ScopeId,
) -> Result<SignalFetch, SignalError> {
    let mut last = None;
    for attempt in 1..=MAX_FETCH_ATTEMPTS {
        match signals.fetch(source, scope) {
            Ok(fetch) => return Ok(fetch),
            Err(err) => {
                let retryable = err.retryable();
                last = Some(err);
                if !retryable || attempt == MAX_FETCH_ATTEMPTS {
                    break;
                }
                let jitter = rand::thread_rng().gen_range(0..50);
                thread::sleep(Duration::from_millis(u64::from(attempt) * 100 + jitter));
            }
        }
    }
    Err(last.unwrap_or_else(|| SignalError::Transient("fetch failed".to_string())))
}

/// State-enter prefix shared by live and sealed trace signatures; events
/// after EXECUTE are excluded because sealed traces carry the extra COMPLETE
/// entry a live run has not reached yet.
fn signature_prefix(trace: &[crate::core::case::TraceEvent]) -> String {
    let mut content = String::new();
    for event in trace {
        if event.kind == TraceKind::StateEnter && event.label != "complete" {
            content.push_str(&event.label);
            content.push(':');
            content.push_str(&event.at.as_unix_millis().to_string());
            content.push(';');
        }
    }
    content
}

/// Signature of a sealed packet's trace path and evidence set, comparable
/// with a live run's trace signature.
fn packet_signature(packet: &DecisionPacket) -> String {
    let mut content = signature_prefix(&packet.workflow_trace);
    for row in &packet.evidence {
        content.push_str(&row.content_sha256);
        content.push(';');
    }
    sha256_hex(content.as_bytes())
}
