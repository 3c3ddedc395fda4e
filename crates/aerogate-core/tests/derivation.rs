// crates/aerogate-core/tests/derivation.rs
// ============================================================================
// Module: Signal Derivation Tests
// Description: Source projection, boundaries, and contradiction detection.
// Purpose: Validate the fixed derivation table and its edge cases.
// ============================================================================

//! ## Overview
//! Tests for signal derivation:
//! - Each source projects its table row with evidence bound
//! - Flight-category and movement-collapse boundaries are exact
//! - The four contradiction patterns fire on their trigger shapes
//! - Malformed payloads become derivation issues, not partial facts

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::ClaimKind;
use aerogate_core::ClaimStatus;
use aerogate_core::ContradictionKind;
use aerogate_core::Criticality;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceIngest;
use aerogate_core::EvidenceStore;
use aerogate_core::FlightCategory;
use aerogate_core::GraphStore;
use aerogate_core::MemoryStores;
use aerogate_core::NodeKind;
use aerogate_core::ScopeId;
use aerogate_core::SourceSystem;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_core::runtime::SourceSample;
use aerogate_core::runtime::derive_signals;
use aerogate_core::runtime::fetch_criticality;
use serde_json::Value;
use serde_json::json;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

/// Harness bundling the stores, case, and airport node for one scope.
struct Harness {
    stores: MemoryStores,
    case: aerogate_core::CaseId,
    airport: aerogate_core::NodeId,
    scope: ScopeId,
}

impl Harness {
    fn new(scope: &str) -> Self {
        let stores = MemoryStores::new();
        let scope = ScopeId::new(scope);
        let case =
            stores.create_case(CaseType::AirportDisruption, &scope, ts(0)).expect("case");
        let airport = stores.upsert_node(NodeKind::Airport, scope.as_str(), ts(0)).expect("node");
        Self {
            stores,
            case,
            airport,
            scope,
        }
    }

    fn sample(&self, source: SourceSystem, payload: Value, retrieved_at: Timestamp) -> SourceSample {
        let evidence_id = self
            .stores
            .put_evidence(
                EvidenceIngest {
                    source_system: source,
                    source_ref: format!("test:{}:{}", self.scope.as_str(), source.as_str()),
                    content_type: "application/json".to_string(),
                    payload: payload.to_string().into_bytes(),
                    event_time: Some(TimeWindow::at(retrieved_at)),
                    meta: json!({ "scope": self.scope.as_str() }),
                },
                retrieved_at,
            )
            .expect("evidence");
        SourceSample {
            evidence_id,
            source,
            payload,
            retrieved_at,
            event_time: TimeWindow::at(retrieved_at),
        }
    }
}

#[test]
fn criticality_table_is_fixed() {
    assert_eq!(fetch_criticality(SourceSystem::FaaNas), Criticality::Blocking);
    assert_eq!(fetch_criticality(SourceSystem::Metar), Criticality::Blocking);
    assert_eq!(fetch_criticality(SourceSystem::NwsAlerts), Criticality::Degraded);
    assert_eq!(fetch_criticality(SourceSystem::Taf), Criticality::Degraded);
    assert_eq!(fetch_criticality(SourceSystem::Adsb), Criticality::Informational);
}

#[test]
fn flight_category_uses_published_boundaries() {
    assert_eq!(FlightCategory::classify(0.9, None), FlightCategory::Lifr);
    assert_eq!(FlightCategory::classify(1.0, None), FlightCategory::Ifr);
    assert_eq!(FlightCategory::classify(3.0, None), FlightCategory::Mvfr);
    assert_eq!(FlightCategory::classify(5.0, None), FlightCategory::Mvfr);
    assert_eq!(FlightCategory::classify(6.0, None), FlightCategory::Vfr);
    assert_eq!(FlightCategory::classify(10.0, Some(400)), FlightCategory::Lifr);
    assert_eq!(FlightCategory::classify(10.0, Some(500)), FlightCategory::Ifr);
    assert_eq!(FlightCategory::classify(10.0, Some(1_000)), FlightCategory::Mvfr);
    assert_eq!(FlightCategory::classify(10.0, Some(3_000)), FlightCategory::Mvfr);
    assert_eq!(FlightCategory::classify(10.0, Some(3_001)), FlightCategory::Vfr);
}

#[test]
fn faa_disruption_projects_a_fact_edge_with_bound_evidence() {
    let h = Harness::new("KJFK");
    let samples = vec![h.sample(
        SourceSystem::FaaNas,
        json!({ "ground_stop": true, "avg_delay_minutes": 95.0 }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert_eq!(derived.edges.len(), 1);
    assert!(derived.issues.is_empty());
    let edges = h
        .stores
        .neighbors(h.airport, Some(EdgeKind::DisruptedBy), aerogate_core::Direction::Out, ts(2_000))
        .expect("neighbors");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].status, EdgeStatus::Fact);
    assert_eq!(edges[0].attrs["kind"], "ground_stop");
    assert!(!h.stores.edge_evidence(edges[0].edge_id).expect("bindings").is_empty());
}

#[test]
fn lifr_metar_produces_weather_risk_fact_claim() {
    let h = Harness::new("KJFK");
    let samples = vec![h.sample(
        SourceSystem::Metar,
        json!({ "visibility_sm": 0.5, "ceiling_ft": 200 }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert_eq!(derived.claims.len(), 1);
    let claim = h.stores.claim(derived.claims[0]).expect("claim");
    assert_eq!(claim.kind, ClaimKind::WeatherRisk);
    assert_eq!(claim.status, ClaimStatus::Fact);
    assert!(!h.stores.claim_evidence(claim.claim_id).expect("bindings").is_empty());
    assert_eq!(
        derived.summary.metar.as_ref().expect("metar summary").category,
        FlightCategory::Lifr
    );
}

#[test]
fn vfr_metar_produces_no_weather_risk_claim() {
    let h = Harness::new("KLAX");
    let samples = vec![h.sample(
        SourceSystem::Metar,
        json!({ "visibility_sm": 10.0, "ceiling_ft": 25_000 }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert!(derived.claims.is_empty());
}

#[test]
fn movement_collapse_boundary_is_strict() {
    // Exactly half the baseline does not collapse.
    let h = Harness::new("KDFW");
    let samples = vec![h.sample(
        SourceSystem::Adsb,
        json!({ "aircraft_count": 55, "baseline_count": 110 }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert!(derived.claims.is_empty());
    assert!(!derived.summary.movement.as_ref().expect("movement").collapse);

    // One below collapses.
    let h = Harness::new("KDFW2");
    let samples = vec![h.sample(
        SourceSystem::Adsb,
        json!({ "aircraft_count": 54, "baseline_count": 110 }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert_eq!(derived.claims.len(), 1);
    assert_eq!(
        h.stores.claim(derived.claims[0]).expect("claim").kind,
        ClaimKind::MovementCollapse
    );
}

#[test]
fn nws_severity_governs_fact_promotion() {
    let h = Harness::new("KJFK");
    let samples = vec![h.sample(
        SourceSystem::NwsAlerts,
        json!({ "alerts": [
            { "severity": "Severe", "headline": "Winter Storm Warning" },
            { "severity": "Minor", "headline": "Frost Advisory" }
        ] }),
        ts(1_000),
    )];
    derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
        .expect("derive");
    let edges = h
        .stores
        .neighbors(h.airport, Some(EdgeKind::HasAlert), aerogate_core::Direction::Out, ts(2_000))
        .expect("neighbors");
    assert_eq!(edges.len(), 2);
    let severe = edges.iter().find(|edge| edge.attrs["severity"] == "Severe").expect("severe");
    let minor = edges.iter().find(|edge| edge.attrs["severity"] == "Minor").expect("minor");
    assert_eq!(severe.status, EdgeStatus::Fact);
    assert_eq!(minor.status, EdgeStatus::Draft);
}

#[test]
fn taf_validity_equals_the_forecast_window() {
    let h = Harness::new("KJFK");
    let samples = vec![h.sample(
        SourceSystem::Taf,
        json!({
            "valid_from": "2026-08-01T00:00:00Z",
            "valid_to": "2026-08-02T00:00:00Z"
        }),
        ts(1_000),
    )];
    derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
        .expect("derive");
    let window_start = Timestamp::from_rfc3339("2026-08-01T00:00:00Z").expect("start");
    let window_end = Timestamp::from_rfc3339("2026-08-02T00:00:00Z").expect("end");
    let inside = h
        .stores
        .neighbors(
            h.airport,
            Some(EdgeKind::HasForecast),
            aerogate_core::Direction::Out,
            window_start,
        )
        .expect("neighbors");
    assert_eq!(inside.len(), 1);
    // Half-open window: the end instant is outside.
    let at_end = h
        .stores
        .neighbors(
            h.airport,
            Some(EdgeKind::HasForecast),
            aerogate_core::Direction::Out,
            window_end,
        )
        .expect("neighbors");
    assert!(at_end.is_empty());
}

#[test]
fn faa_normal_with_lifr_and_collapse_opens_two_contradictions() {
    let h = Harness::new("KSEA");
    let samples = vec![
        h.sample(SourceSystem::FaaNas, json!({}), ts(1_000)),
        h.sample(
            SourceSystem::Metar,
            json!({ "visibility_sm": 0.5, "ceiling_ft": 300 }),
            ts(1_000),
        ),
        h.sample(
            SourceSystem::Adsb,
            json!({ "aircraft_count": 25, "baseline_count": 90 }),
            ts(1_000),
        ),
    ];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert_eq!(derived.contradictions.len(), 2);
    let rows = h.stores.contradictions_for_case(h.case).expect("contradictions");
    let kinds: Vec<ContradictionKind> = rows.iter().map(|row| row.kind).collect();
    assert!(kinds.contains(&ContradictionKind::FaaNormalVsIfr));
    assert!(kinds.contains(&ContradictionKind::FaaNormalVsCollapse));
    assert!(
        rows.iter()
            .all(|row| row.status == aerogate_core::ContradictionStatus::Open)
    );
}

#[test]
fn vfr_with_collapse_contradicts() {
    let h = Harness::new("KPDX");
    let samples = vec![
        h.sample(
            SourceSystem::Metar,
            json!({ "visibility_sm": 10.0, "ceiling_ft": 25_000 }),
            ts(1_000),
        ),
        h.sample(
            SourceSystem::Adsb,
            json!({ "aircraft_count": 10, "baseline_count": 90 }),
            ts(1_000),
        ),
    ];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert_eq!(derived.contradictions.len(), 1);
    let rows = h.stores.contradictions_for_case(h.case).expect("contradictions");
    assert_eq!(rows[0].kind, ContradictionKind::VfrVsCollapse);
}

#[test]
fn stale_faa_with_fresh_peers_contradicts() {
    let h = Harness::new("KORD");
    let now = ts(20 * 60_000);
    let samples = vec![
        // FAA retrieved twenty minutes before "now".
        h.sample(SourceSystem::FaaNas, json!({ "ground_stop": true }), ts(0)),
        h.sample(
            SourceSystem::Metar,
            json!({ "visibility_sm": 10.0, "ceiling_ft": 25_000 }),
            now,
        ),
    ];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, now).expect("derive");
    assert!(derived.summary.stale_sources.contains(&SourceSystem::FaaNas));
    let rows = h.stores.contradictions_for_case(h.case).expect("contradictions");
    assert!(rows.iter().any(|row| row.kind == ContradictionKind::StaleFaa));
}

#[test]
fn malformed_payloads_become_issues_not_facts() {
    let h = Harness::new("KJFK");
    let samples = vec![h.sample(
        SourceSystem::Metar,
        json!({ "visibility_sm": "not a number" }),
        ts(1_000),
    )];
    let derived =
        derive_signals(&h.stores, h.case, &h.scope, h.airport, &samples, ts(1_000))
            .expect("derive");
    assert!(derived.edges.is_empty());
    assert_eq!(derived.issues.len(), 1);
    assert_eq!(derived.issues[0].source, SourceSystem::Metar);
}
