// crates/aerogate-server/tests/scenario_source.rs
// ============================================================================
// Module: Scenario Source Tests
// Description: Canned payload shapes, seeding, and the heuristic assessor.
// Purpose: Validate the simulation surface the server ships by default.
// ============================================================================

//! ## Overview
//! Tests for scenario mode:
//! - Canned payloads carry the shapes derivation expects per scope
//! - Seeding builds the cascade fixture with booking evidence
//! - Clearing retracts seeded edges without deleting graph history
//! - The heuristic assessor maps belief shapes onto postures

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::BeliefState;
use aerogate_core::CaseId;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceStore;
use aerogate_core::FixedClock;
use aerogate_core::FlightCategory;
use aerogate_core::GraphStore;
use aerogate_core::MemoryStores;
use aerogate_core::NodeKind;
use aerogate_core::Posture;
use aerogate_core::RiskAssessor;
use aerogate_core::RiskLevel;
use aerogate_core::ScopeId;
use aerogate_core::ServiceTier;
use aerogate_core::SignalError;
use aerogate_core::SignalSource;
use aerogate_core::SourceSystem;
use aerogate_core::Timestamp;
use aerogate_core::runtime::packet::cascade_impact;
use aerogate_server::HeuristicRiskAssessor;
use aerogate_server::ScenarioSignalSource;
use aerogate_server::scenarios;
use aerogate_server::seed_airport;
use serde_json::Value;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn fetch_json(source: SourceSystem, scope: &str) -> Value {
    let fetch = ScenarioSignalSource
        .fetch(source, &ScopeId::new(scope))
        .expect("fetch");
    serde_json::from_slice(&fetch.bytes).expect("json payload")
}

#[test]
fn catalog_lists_four_scenarios() {
    let catalog = scenarios();
    assert_eq!(catalog.len(), 4);
    assert!(catalog.iter().any(|scenario| scenario.scope == "KJFK"));
    assert!(catalog.iter().any(|scenario| scenario.scope == "KLAX"));
}

#[test]
fn jfk_scenario_is_a_ground_stop_storm() {
    let faa = fetch_json(SourceSystem::FaaNas, "KJFK");
    assert_eq!(faa["ground_stop"], true);
    let metar = fetch_json(SourceSystem::Metar, "KJFK");
    assert_eq!(metar["visibility_sm"], 0.5);
    let nws = fetch_json(SourceSystem::NwsAlerts, "KJFK");
    assert_eq!(nws["alerts"][0]["severity"], "Severe");
    let adsb = fetch_json(SourceSystem::Adsb, "KJFK");
    assert_eq!(adsb["aircraft_count"], 32);
    assert_eq!(adsb["baseline_count"], 110);
}

#[test]
fn dfw_adsb_times_out_while_other_sources_answer() {
    let err = ScenarioSignalSource
        .fetch(SourceSystem::Adsb, &ScopeId::new("KDFW"))
        .expect_err("adsb timeout");
    assert!(matches!(err, SignalError::Timeout { seconds: 10 }));
    // The remaining sources answer benignly.
    let faa = fetch_json(SourceSystem::FaaNas, "KDFW");
    assert_eq!(faa, serde_json::json!({}));
}

#[test]
fn unknown_scopes_get_benign_payloads() {
    let metar = fetch_json(SourceSystem::Metar, "KPHX");
    assert_eq!(metar["visibility_sm"], 10.0);
    let adsb = fetch_json(SourceSystem::Adsb, "KPHX");
    assert_eq!(adsb["aircraft_count"], 95);
}

#[test]
fn seeding_builds_cascade_with_booking_evidence_and_clearing_retracts() {
    let stores = MemoryStores::new();
    let clock = FixedClock(ts(0));
    let scope = ScopeId::new("KJFK");
    let report = seed_airport(&stores, &scope, false, &clock).expect("seed");
    assert!(report.nodes_created >= 7);

    let airport = stores.node(NodeKind::Airport, "KJFK").expect("read").expect("airport");
    let impact = cascade_impact(&stores, airport.node_id, ts(1)).expect("cascade");
    assert_eq!(impact.flights.len(), 2);
    assert_eq!(impact.shipments.len(), 2);
    assert_eq!(impact.bookings.len(), 2);
    assert!(impact.sla_exposure_usd > 0.0);

    let bookings = stores
        .evidence_by_source(SourceSystem::Booking, None)
        .expect("booking evidence");
    assert_eq!(bookings.len(), 2);

    // Refresh retracts the previous fixture before reseeding.
    let refreshed = seed_airport(&stores, &scope, true, &clock).expect("reseed");
    assert!(refreshed.cleared >= 6);
    let airport_edges = stores
        .neighbors(
            airport.node_id,
            None,
            aerogate_core::Direction::Out,
            ts(1),
        )
        .expect("neighbors");
    // Retracted edges stay out of validity-honoring reads.
    assert!(airport_edges.iter().all(|edge| edge.status != EdgeStatus::Retracted));
}

#[test]
fn heuristic_assessor_maps_belief_shapes_onto_postures() {
    let assessor = HeuristicRiskAssessor;
    let base = BeliefState {
        case_id: CaseId::from_raw(1).expect("case id"),
        scope: ScopeId::new("KJFK"),
        risk_level: RiskLevel::Medium,
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
        proposed_actions: Vec::new(),
        estimated_cost: 0.0,
        service_tier: ServiceTier::Standard,
        hours_until_deadline: None,
        flight_category: Some(FlightCategory::Vfr),
        min_evidence_count: 5,
    };

    let clear = assessor.assess(&base).expect("assess");
    assert_eq!(clear.risk_level, RiskLevel::Low);
    assert_eq!(clear.recommended_posture, Posture::Accept);

    let mut lifr = base.clone();
    lifr.flight_category = Some(FlightCategory::Lifr);
    let held = assessor.assess(&lifr).expect("assess");
    assert_eq!(held.risk_level, RiskLevel::High);
    assert_eq!(held.recommended_posture, Posture::Hold);

    let mut contradicted = lifr.clone();
    contradicted.has_contradictions = true;
    let restricted = assessor.assess(&contradicted).expect("assess");
    assert_eq!(restricted.risk_level, RiskLevel::Medium);
    assert_eq!(restricted.recommended_posture, Posture::Restrict);

    let mut thin = base.clone();
    thin.evidence_sources.pop();
    let degraded = assessor.assess(&thin).expect("assess");
    assert_eq!(degraded.recommended_posture, Posture::Restrict);
    assert!(
        degraded
            .confidence
            .penalties
            .iter()
            .any(|penalty| penalty.label == "degraded:adsb")
    );
}
