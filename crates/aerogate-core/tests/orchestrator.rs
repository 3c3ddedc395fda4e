// crates/aerogate-core/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator End-to-End Tests
// Description: Scenario runs over scripted sources and assessors.
// Purpose: Validate the full signal-to-packet flow, guardrails, and fallbacks.
// ============================================================================

//! ## Overview
//! End-to-end runs over the in-memory stores with scripted capabilities:
//! - Ground stop: HOLD posture, no contradictions, cascade populated
//! - Source contradiction: RESTRICT with two open contradictions
//! - ADS-B timeout: informational gap, degraded RESTRICT completion
//! - Clear skies: ACCEPT with a single posture action executed
//! - Booking guardrail: shipment action without booking evidence blocks
//! - Determinism, assessor fallback, critique retries, and cancellation

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;

use aerogate_core::ActionState;
use aerogate_core::ActionType;
use aerogate_core::AssessorError;
use aerogate_core::BeliefState;
use aerogate_core::CancelToken;
use aerogate_core::CaseId;
use aerogate_core::CaseStatus;
use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::ConfidenceBreakdown;
use aerogate_core::Criticality;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceIngest;
use aerogate_core::EvidenceStore;
use aerogate_core::FixedClock;
use aerogate_core::FlightCategory;
use aerogate_core::GraphStore;
use aerogate_core::MemoryStores;
use aerogate_core::NewEdge;
use aerogate_core::NodeKind;
use aerogate_core::NullEventSink;
use aerogate_core::NullPacketSink;
use aerogate_core::Orchestrator;
use aerogate_core::OrchestratorConfig;
use aerogate_core::Posture;
use aerogate_core::RiskAssessment;
use aerogate_core::RiskAssessor;
use aerogate_core::RiskLevel;
use aerogate_core::ScopeId;
use aerogate_core::SignalError;
use aerogate_core::SignalFetch;
use aerogate_core::SignalSource;
use aerogate_core::SourceSystem;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_core::TraceKind;
use aerogate_core::runtime::ActionGovernor;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Scripted Capabilities
// ============================================================================

/// Signal source replaying a fixed payload script.
struct ScriptedSource {
    /// Payload or failure per source system.
    script: BTreeMap<&'static str, Result<Value, &'static str>>,
}

impl ScriptedSource {
    fn new(entries: Vec<(SourceSystem, Result<Value, &'static str>)>) -> Self {
        Self {
            script: entries.into_iter().map(|(source, entry)| (source.as_str(), entry)).collect(),
        }
    }

    /// Benign payloads for all five investigation sources.
    fn benign() -> Vec<(SourceSystem, Result<Value, &'static str>)> {
        vec![
            (SourceSystem::FaaNas, Ok(json!({}))),
            (
                SourceSystem::Metar,
                Ok(json!({ "visibility_sm": 10.0, "ceiling_ft": 25_000 })),
            ),
            (
                SourceSystem::Taf,
                Ok(json!({
                    "valid_from": "2026-08-01T00:00:00Z",
                    "valid_to": "2026-08-02T00:00:00Z"
                })),
            ),
            (SourceSystem::NwsAlerts, Ok(json!({ "alerts": [] }))),
            (
                SourceSystem::Adsb,
                Ok(json!({ "aircraft_count": 95, "baseline_count": 100 })),
            ),
        ]
    }
}

impl SignalSource for ScriptedSource {
    fn fetch(&self, source: SourceSystem, scope: &ScopeId) -> Result<SignalFetch, SignalError> {
        match self.script.get(source.as_str()) {
            Some(Ok(payload)) => Ok(SignalFetch {
                bytes: payload.to_string().into_bytes(),
                content_type: "application/json".to_string(),
                source_ref: format!("scripted:{}:{}", scope.as_str(), source.as_str()),
                source_time: None,
            }),
            Some(Err("timeout")) => Err(SignalError::Timeout {
                seconds: 10,
            }),
            Some(Err(reason)) => Err(SignalError::Permanent((*reason).to_string())),
            None => Err(SignalError::Permanent("source not scripted".to_string())),
        }
    }
}

/// Deterministic assessor mirroring the production heuristic.
struct HeuristicAssessor;

impl RiskAssessor for HeuristicAssessor {
    fn assess(&self, belief: &BeliefState) -> Result<RiskAssessment, AssessorError> {
        let lifr = belief.flight_category == Some(FlightCategory::Lifr);
        let instrument = belief.flight_category.is_some_and(FlightCategory::is_instrument);
        let signal_count = belief
            .evidence_sources
            .iter()
            .filter(|source| SourceSystem::investigation_set().contains(source))
            .count();
        let (risk_level, recommended_posture) = if lifr && !belief.has_contradictions {
            (RiskLevel::High, Posture::Hold)
        } else if instrument {
            (RiskLevel::Medium, Posture::Restrict)
        } else if belief.has_contradictions || belief.has_stale_evidence || signal_count < 5 {
            (RiskLevel::Medium, Posture::Restrict)
        } else {
            (RiskLevel::Low, Posture::Accept)
        };
        Ok(RiskAssessment {
            risk_level,
            recommended_posture,
            confidence: ConfidenceBreakdown {
                sources_ok: belief.evidence_sources.clone(),
                sources_missing: Vec::new(),
                penalties: Vec::new(),
                score: 0.9,
                explanation: "scripted heuristic".to_string(),
            },
        })
    }
}

/// Assessor returning one fixed record.
struct FixedAssessor(RiskAssessment);

impl RiskAssessor for FixedAssessor {
    fn assess(&self, _belief: &BeliefState) -> Result<RiskAssessment, AssessorError> {
        Ok(self.0.clone())
    }
}

/// Assessor that always fails.
struct FailingAssessor;

impl RiskAssessor for FailingAssessor {
    fn assess(&self, _belief: &BeliefState) -> Result<RiskAssessment, AssessorError> {
        Err(AssessorError::Unavailable("provider offline".to_string()))
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

/// Seeds the downstream cascade fixture, optionally with booking evidence.
fn seed_cascade(stores: &MemoryStores, scope: &str, with_bookings: bool) {
    let now = ts(0);
    let airport = stores.upsert_node(NodeKind::Airport, scope, now).expect("airport");
    let flight =
        stores.upsert_node(NodeKind::Flight, &format!("{scope}-FL01"), now).expect("flight");
    let shipment =
        stores.upsert_node(NodeKind::Shipment, &format!("TRK-{scope}"), now).expect("shipment");
    let booking =
        stores.upsert_node(NodeKind::Booking, &format!("BKG-{scope}"), now).expect("booking");
    stores
        .new_node_version(booking, json!({ "sla_usd": 5_000.0 }), now)
        .expect("booking attrs");
    for (src, dst, kind) in [
        (airport, flight, EdgeKind::Serves),
        (flight, shipment, EdgeKind::Carries),
        (shipment, booking, EdgeKind::BookedUnder),
    ] {
        stores
            .insert_edge(
                NewEdge {
                    src,
                    dst,
                    kind,
                    status: EdgeStatus::Draft,
                    attrs: json!({ "seeded": true }),
                    event_time: TimeWindow::at(now),
                    valid: TimeWindow::open(now),
                    source_system: SourceSystem::Booking,
                    confidence: 1.0,
                    supersedes: None,
                    evidence: Vec::new(),
                },
                now,
            )
            .expect("cascade edge");
    }
    if with_bookings {
        stores
            .put_evidence(
                EvidenceIngest {
                    source_system: SourceSystem::Booking,
                    source_ref: format!("BKG-{scope}"),
                    content_type: "application/json".to_string(),
                    payload: json!({ "booking": format!("BKG-{scope}") })
                        .to_string()
                        .into_bytes(),
                    event_time: None,
                    meta: json!({ "scope": scope }),
                },
                now,
            )
            .expect("booking evidence");
    }
}

/// Runs one case over the scripted capabilities.
fn run_case(
    stores: &MemoryStores,
    source: &dyn SignalSource,
    assessor: &dyn RiskAssessor,
    scope: &str,
    clock_millis: i64,
) -> (CaseId, aerogate_core::RunReport) {
    let clock = FixedClock(ts(clock_millis));
    let events = NullEventSink;
    let packets = NullPacketSink;
    let case_id = stores
        .create_case(CaseType::AirportDisruption, &ScopeId::new(scope), ts(clock_millis))
        .expect("case");
    let orchestrator = Orchestrator::new(
        stores,
        source,
        assessor,
        &events,
        &packets,
        &clock,
        OrchestratorConfig::default(),
    );
    let report = orchestrator.run(case_id).expect("run");
    (case_id, report)
}

// ============================================================================
// SECTION: Scenario Tests
// ============================================================================

#[test]
fn ground_stop_holds_the_gateway() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KJFK", true);
    let source = ScriptedSource::new(vec![
        (
            SourceSystem::FaaNas,
            Ok(json!({ "ground_stop": true, "avg_delay_minutes": 95.0 })),
        ),
        (
            SourceSystem::Metar,
            Ok(json!({ "visibility_sm": 0.5, "wind_kt": 28.0, "ceiling_ft": 200 })),
        ),
        (
            SourceSystem::Taf,
            Ok(json!({
                "valid_from": "2026-08-01T00:00:00Z",
                "valid_to": "2026-08-02T00:00:00Z"
            })),
        ),
        (
            SourceSystem::NwsAlerts,
            Ok(json!({ "alerts": [{ "severity": "Severe", "headline": "Winter Storm Warning" }] })),
        ),
        (
            SourceSystem::Adsb,
            Ok(json!({ "aircraft_count": 32, "baseline_count": 110 })),
        ),
    ]);
    let (case_id, report) = run_case(&stores, &source, &HeuristicAssessor, "KJFK", 1_000);

    let packet = report.packet;
    assert_eq!(packet.posture, Posture::Hold);
    assert_eq!(packet.risk_level, RiskLevel::High);
    assert_eq!(packet.metrics.contradictions_open, 0);
    assert!(packet.metrics.evidence_rows >= 4);
    assert!(!packet.blocked_section.is_blocked);
    assert!(!packet.cascade_impact.shipments.is_empty());
    assert!(packet.cascade_impact.sla_exposure_usd > 0.0);
    assert!(!packet.workflow_trace.is_empty());

    // High risk requires approval: actions wait and the case stays open.
    assert_eq!(report.status, CaseStatus::Open);
    let actions = stores.actions_for_case(case_id).expect("actions");
    assert!(!actions.is_empty());
    assert!(actions.iter().all(|action| action.state == ActionState::PendingApproval));
    assert!(
        packet
            .policies_applied
            .iter()
            .any(|policy| policy.text == "high risk actions require approval")
    );

    // Approving and executing every pending action resolves the case.
    let events = NullEventSink;
    let governor = ActionGovernor::new(&stores, &events);
    for action in &actions {
        governor.approve(action.action_id, "ops-lead", ts(2_000)).expect("approve");
        governor.execute(action.action_id, ts(2_001)).expect("execute");
    }
    assert!(governor.maybe_resolve_case(case_id, ts(2_002)).expect("resolve"));
    assert_eq!(stores.case(case_id).expect("case").status, CaseStatus::Resolved);
}

#[test]
fn contradicted_sources_restrict_the_gateway() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KSEA", true);
    let mut script = ScriptedSource::benign();
    script[1] = (
        SourceSystem::Metar,
        Ok(json!({ "visibility_sm": 0.5, "ceiling_ft": 300 })),
    );
    script[4] = (
        SourceSystem::Adsb,
        Ok(json!({ "aircraft_count": 25, "baseline_count": 90 })),
    );
    let source = ScriptedSource::new(script);
    let (_, report) = run_case(&stores, &source, &HeuristicAssessor, "KSEA", 1_000);

    let packet = report.packet;
    assert_ne!(packet.posture, Posture::Accept);
    assert_eq!(packet.posture, Posture::Restrict);
    assert_eq!(packet.metrics.contradictions_open, 2);
    assert_eq!(report.status, CaseStatus::Resolved);
    assert!(report.actions_executed >= 1);
}

#[test]
fn critique_retries_on_contradicted_evidence() {
    // Every source answers, so diversity is fine; the open contradictions
    // alone must make CRITIQUE demand the bounded reinvestigation.
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KSEA", true);
    let mut script = ScriptedSource::benign();
    script[1] = (
        SourceSystem::Metar,
        Ok(json!({ "visibility_sm": 0.5, "ceiling_ft": 300 })),
    );
    script[4] = (
        SourceSystem::Adsb,
        Ok(json!({ "aircraft_count": 25, "baseline_count": 90 })),
    );
    let source = ScriptedSource::new(script);
    let (case_id, report) = run_case(&stores, &source, &HeuristicAssessor, "KSEA", 1_000);

    // One initial pass plus MAX_INVESTIGATE_RETRIES: re-fetching the same
    // sources cannot resolve the contradictions, so the loop exhausts its
    // bound and proceeds with the current belief.
    assert_eq!(
        report.packet.metrics.investigate_passes,
        1 + aerogate_core::runtime::MAX_INVESTIGATE_RETRIES
    );
    assert_eq!(report.status, CaseStatus::Resolved);
    let trace = stores.trace(case_id).expect("trace");
    assert!(
        trace
            .iter()
            .any(|event| event.label == "critique demands another investigate pass")
    );
    // Identical refetches deduplicate: no contradiction rows pile up.
    assert_eq!(report.packet.metrics.contradictions_open, 2);
}

#[test]
fn adsb_timeout_degrades_but_completes() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KDFW", true);
    let mut script = ScriptedSource::benign();
    script[4] = (SourceSystem::Adsb, Err("timeout"));
    let source = ScriptedSource::new(script);
    let (case_id, report) = run_case(&stores, &source, &HeuristicAssessor, "KDFW", 1_000);

    let packet = report.packet;
    assert_eq!(packet.posture, Posture::Restrict);
    assert!(!packet.blocked_section.is_blocked);
    assert_eq!(report.status, CaseStatus::Resolved);

    // No movement edge was derived.
    let airport = stores.node(NodeKind::Airport, "KDFW").expect("read").expect("airport");
    let movement = stores
        .neighbors(
            airport.node_id,
            Some(EdgeKind::HasMovement),
            aerogate_core::Direction::Out,
            ts(5_000),
        )
        .expect("neighbors");
    assert!(movement.is_empty());

    // The gap is recorded as informational and retryable.
    let missing = stores.open_missing(case_id).expect("missing");
    let adsb: Vec<_> =
        missing.iter().filter(|row| row.source_system == SourceSystem::Adsb).collect();
    assert_eq!(adsb.len(), 1);
    assert_eq!(adsb[0].criticality, Criticality::Informational);
    assert!(adsb[0].retryable);
    assert!(
        packet
            .confidence_breakdown
            .penalties
            .iter()
            .any(|penalty| penalty.label.contains("adsb"))
            || packet.confidence_breakdown.score < 1.0
    );
}

#[test]
fn clear_skies_accept_with_single_posture_action() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KLAX", true);
    let source = ScriptedSource::new(ScriptedSource::benign());
    let (case_id, report) = run_case(&stores, &source, &HeuristicAssessor, "KLAX", 1_000);

    let packet = report.packet;
    assert_eq!(packet.posture, Posture::Accept);
    assert_eq!(packet.risk_level, RiskLevel::Low);
    assert_eq!(packet.metrics.contradictions_open, 0);
    assert_eq!(packet.metrics.evidence_rows, 5);
    assert_eq!(report.actions_executed, 1);
    assert_eq!(report.status, CaseStatus::Resolved);
    let actions = stores.actions_for_case(case_id).expect("actions");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::SetPosture);
    // Thirteen policies were evaluated even though only the baseline matched.
    assert!(packet.metrics.posture_decision_latency_ms.is_some());
}

#[test]
fn shipment_action_without_booking_evidence_blocks_the_case() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KSFO", false);
    let source = ScriptedSource::new(ScriptedSource::benign());
    let assessor = FixedAssessor(RiskAssessment {
        risk_level: RiskLevel::High,
        recommended_posture: Posture::Hold,
        confidence: ConfidenceBreakdown {
            sources_ok: Vec::new(),
            sources_missing: Vec::new(),
            penalties: Vec::new(),
            score: 0.8,
            explanation: "forced hold".to_string(),
        },
    });
    let (case_id, report) = run_case(&stores, &source, &assessor, "KSFO", 1_000);

    assert_eq!(report.status, CaseStatus::Blocked);
    let packet = report.packet;
    assert!(packet.blocked_section.is_blocked);
    let booking_requests: Vec<_> = packet
        .blocked_section
        .missing_evidence_requests
        .iter()
        .filter(|request| request.source_system == SourceSystem::Booking)
        .collect();
    assert_eq!(booking_requests.len(), 1);
    assert_eq!(booking_requests[0].criticality, Criticality::Blocking);
    assert_eq!(report.actions_executed, 0);
    let trace = stores.trace(case_id).expect("trace");
    assert!(
        trace
            .iter()
            .any(|event| event.kind == TraceKind::GuardrailFail
                && event.label == "booking_required")
    );
}

// ============================================================================
// SECTION: Fallbacks, Retries, Determinism
// ============================================================================

#[test]
fn assessor_failure_fails_safe_with_degraded_confidence() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KBOS", true);
    let source = ScriptedSource::new(ScriptedSource::benign());
    let (_, report) = run_case(&stores, &source, &FailingAssessor, "KBOS", 1_000);

    let packet = report.packet;
    assert_eq!(packet.risk_level, RiskLevel::High);
    assert!(
        packet
            .confidence_breakdown
            .penalties
            .iter()
            .any(|penalty| penalty.label == "degraded:assessor")
    );
    assert!(!packet.blocked_section.is_blocked);
}

#[test]
fn critique_demands_bounded_reinvestigation() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KMIA", true);
    // Three of five sources fail permanently: evidence stays insufficient.
    let source = ScriptedSource::new(vec![
        (SourceSystem::FaaNas, Ok(json!({}))),
        (SourceSystem::Metar, Err("upstream 404")),
        (SourceSystem::Taf, Err("upstream 404")),
        (SourceSystem::NwsAlerts, Err("upstream 404")),
        (
            SourceSystem::Adsb,
            Ok(json!({ "aircraft_count": 95, "baseline_count": 100 })),
        ),
    ]);
    let (case_id, report) = run_case(&stores, &source, &HeuristicAssessor, "KMIA", 1_000);

    // One initial pass plus MAX_INVESTIGATE_RETRIES.
    assert_eq!(report.packet.metrics.investigate_passes, 3);
    // METAR is blocking: the case cannot decide a posture.
    assert_eq!(report.status, CaseStatus::Blocked);
    assert!(report.packet.blocked_section.is_blocked);
    let missing = stores.open_missing(case_id).expect("missing");
    assert!(missing.iter().any(|row| {
        row.source_system == SourceSystem::Metar && row.criticality == Criticality::Blocking
    }));
    // Permanent failures are flagged non-retryable.
    assert!(missing.iter().all(|row| !row.retryable));
}

#[test]
fn identical_inputs_produce_identical_packet_digests() {
    let build = || {
        let stores = MemoryStores::new();
        seed_cascade(&stores, "KJFK", true);
        let source = ScriptedSource::new(ScriptedSource::benign());
        let (_, report) = run_case(&stores, &source, &HeuristicAssessor, "KJFK", 1_000);
        report.packet.digest().expect("digest")
    };
    assert_eq!(build(), build());
}

#[test]
fn replayed_trace_paths_are_flagged_across_cases() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KRPL", true);
    let source = ScriptedSource::new(ScriptedSource::benign());
    let (_, first) = run_case(&stores, &source, &HeuristicAssessor, "KRPL", 1_000);
    assert_eq!(first.status, CaseStatus::Resolved);

    // A second case over the same scope, clock, and evidence replays the
    // exact trace path and is blocked by the anti-replay guardrail.
    let (second_id, second) = run_case(&stores, &source, &HeuristicAssessor, "KRPL", 1_000);
    assert_eq!(second.status, CaseStatus::Blocked);
    let trace = stores.trace(second_id).expect("trace");
    assert!(
        trace
            .iter()
            .any(|event| event.kind == TraceKind::GuardrailFail && event.label == "non_workflow")
    );
}

#[test]
fn cancellation_blocks_instead_of_abandoning() {
    let stores = MemoryStores::new();
    seed_cascade(&stores, "KCAN", true);
    let source = ScriptedSource::new(ScriptedSource::benign());
    let clock = FixedClock(ts(1_000));
    let events = NullEventSink;
    let packets = NullPacketSink;
    let case_id = stores
        .create_case(CaseType::AirportDisruption, &ScopeId::new("KCAN"), ts(1_000))
        .expect("case");
    let orchestrator = Orchestrator::new(
        &stores,
        &source,
        &HeuristicAssessor,
        &events,
        &packets,
        &clock,
        OrchestratorConfig::default(),
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = orchestrator
        .run_observed(case_id, &aerogate_core::runtime::NullObserver, &cancel)
        .expect("run");
    assert_eq!(report.status, CaseStatus::Blocked);
    let trace = stores.trace(case_id).expect("trace");
    assert!(
        trace
            .iter()
            .any(|event| event.kind == TraceKind::Blocked && event.label == "run cancelled")
    );
}
