// crates/aerogate-core/tests/graph_store.rs
// ============================================================================
// Module: Graph Store Invariant Tests
// Description: Evidence binding, node immutability, dedup, and bi-temporal reads.
// Purpose: Validate the store-layer invariants against the reference stores.
// ============================================================================

//! ## Overview
//! Invariant tests over the in-memory reference stores:
//! - Evidence `put` is idempotent on the identity triple
//! - FACT edges and claims are rejected without bindings
//! - Node attribute changes chain versions; rows never mutate
//! - `as_of` honors the canonical bi-temporal predicate with supersession

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::ClaimKind;
use aerogate_core::ClaimStatus;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceIngest;
use aerogate_core::EvidenceStore;
use aerogate_core::GraphStore;
use aerogate_core::InvariantKind;
use aerogate_core::MemoryStores;
use aerogate_core::NewClaim;
use aerogate_core::NewEdge;
use aerogate_core::NodeKind;
use aerogate_core::SourceSystem;
use aerogate_core::StoreError;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use serde_json::json;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn sample_ingest(payload: &str) -> EvidenceIngest {
    EvidenceIngest {
        source_system: SourceSystem::Metar,
        source_ref: "scenario:KJFK:metar".to_string(),
        content_type: "application/json".to_string(),
        payload: payload.as_bytes().to_vec(),
        event_time: None,
        meta: json!({ "scope": "KJFK" }),
    }
}

#[test]
fn evidence_put_is_idempotent_on_identity_triple() {
    let stores = MemoryStores::new();
    let first = stores.put_evidence(sample_ingest("{\"visibility_sm\": 1.0}"), ts(1)).expect("put");
    let second =
        stores.put_evidence(sample_ingest("{\"visibility_sm\": 1.0}"), ts(2)).expect("put");
    assert_eq!(first, second);
    let different =
        stores.put_evidence(sample_ingest("{\"visibility_sm\": 2.0}"), ts(3)).expect("put");
    assert_ne!(first, different);
}

#[test]
fn fact_edge_requires_evidence_at_insert() {
    let stores = MemoryStores::new();
    let airport = stores.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let obs = stores.upsert_node(NodeKind::WeatherObservation, "KJFK:metar:1", ts(1)).expect("node");
    let err = stores
        .insert_edge(
            NewEdge {
                src: airport,
                dst: obs,
                kind: EdgeKind::HasWeather,
                status: EdgeStatus::Fact,
                attrs: json!({}),
                event_time: TimeWindow::at(ts(1)),
                valid: TimeWindow::open(ts(1)),
                source_system: SourceSystem::Metar,
                confidence: 0.9,
                supersedes: None,
                evidence: Vec::new(),
            },
            ts(1),
        )
        .expect_err("unbound fact edge must be rejected");
    assert!(matches!(
        err,
        StoreError::InvariantViolation {
            kind: InvariantKind::EvidenceBinding,
            ..
        }
    ));
}

#[test]
fn claim_promotion_protocol_fires_binding_check() {
    let stores = MemoryStores::new();
    let airport = stores.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let claim = stores
        .insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "low visibility".to_string(),
                status: ClaimStatus::Draft,
                confidence: 0.9,
                event_time: TimeWindow::at(ts(1)),
                supersedes: None,
                evidence: Vec::new(),
            },
            ts(1),
        )
        .expect("draft insert");
    let err = stores
        .set_claim_status(claim, ClaimStatus::Fact)
        .expect_err("unbound promotion must be rejected");
    assert!(matches!(
        err,
        StoreError::InvariantViolation {
            kind: InvariantKind::EvidenceBinding,
            ..
        }
    ));
    let evidence = stores.put_evidence(sample_ingest("{}"), ts(2)).expect("put");
    stores.bind_claim_evidence(claim, evidence).expect("bind");
    stores.set_claim_status(claim, ClaimStatus::Fact).expect("promotion with binding");
    assert_eq!(stores.claim(claim).expect("claim").status, ClaimStatus::Fact);
}

#[test]
fn node_identity_dedups_and_versions_chain() {
    let stores = MemoryStores::new();
    let first = stores.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let second = stores.upsert_node(NodeKind::Airport, "KJFK", ts(2)).expect("node");
    assert_eq!(first, second);

    let v1 = stores.new_node_version(first, json!({ "runways": 4 }), ts(10)).expect("v1");
    let v2 = stores.new_node_version(first, json!({ "runways": 3 }), ts(20)).expect("v2");
    let current = stores.current_node_version(first).expect("read").expect("current");
    assert_eq!(current.version_id, v2);
    assert_eq!(current.supersedes, Some(v1));
    assert!(current.valid.end.is_none());
    assert_eq!(current.attrs, json!({ "runways": 3 }));
}

#[test]
fn as_of_honors_event_and_ingest_time_with_supersession() {
    let stores = MemoryStores::new();
    let airport = stores.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let evidence = stores.put_evidence(sample_ingest("{\"visibility_sm\": 0.5}"), ts(100)).expect("put");

    let original = stores
        .insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "visibility 0.5 sm".to_string(),
                status: ClaimStatus::Fact,
                confidence: 0.9,
                event_time: TimeWindow::open(ts(100)),
                supersedes: None,
                evidence: vec![evidence],
            },
            ts(100),
        )
        .expect("original claim");

    // Corrective claim ingested later for the same event time.
    let corrective_evidence =
        stores.put_evidence(sample_ingest("{\"visibility_sm\": 2.0}"), ts(200)).expect("put");
    let corrective = stores
        .supersede_claim(
            original,
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "visibility 2.0 sm (corrected)".to_string(),
                status: ClaimStatus::Fact,
                confidence: 0.95,
                event_time: TimeWindow::open(ts(100)),
                supersedes: None,
                evidence: vec![corrective_evidence],
            },
            ts(200),
        )
        .expect("corrective claim");

    let before = stores.as_of(ts(150), ts(150)).expect("as_of t1");
    assert_eq!(before.claims.len(), 1);
    assert_eq!(before.claims[0].claim_id, original);

    let after = stores.as_of(ts(150), ts(250)).expect("as_of t2");
    assert_eq!(after.claims.len(), 1);
    assert_eq!(after.claims[0].claim_id, corrective);
    assert_eq!(after.claims[0].supersedes, Some(original));

    // Before the event window opens nothing is visible.
    let too_early = stores.as_of(ts(50), ts(250)).expect("as_of early");
    assert!(too_early.claims.is_empty());
}

#[test]
fn traverse_is_cycle_safe_and_depth_bounded() {
    let stores = MemoryStores::new();
    let airport = stores.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let flight = stores.upsert_node(NodeKind::Flight, "KJFK-FL01", ts(1)).expect("node");
    let shipment = stores.upsert_node(NodeKind::Shipment, "TRK-1", ts(1)).expect("node");
    for (src, dst, kind) in [
        (airport, flight, EdgeKind::Serves),
        (flight, shipment, EdgeKind::Carries),
        // Cycle back to the airport.
        (shipment, airport, EdgeKind::Serves),
    ] {
        stores
            .insert_edge(
                NewEdge {
                    src,
                    dst,
                    kind,
                    status: EdgeStatus::Draft,
                    attrs: json!({}),
                    event_time: TimeWindow::at(ts(1)),
                    valid: TimeWindow::open(ts(1)),
                    source_system: SourceSystem::Booking,
                    confidence: 1.0,
                    supersedes: None,
                    evidence: Vec::new(),
                },
                ts(1),
            )
            .expect("edge");
    }
    let edges = stores
        .traverse(airport, &[EdgeKind::Serves, EdgeKind::Carries], 5, ts(10))
        .expect("traverse");
    assert_eq!(edges.len(), 3);
    let shallow = stores
        .traverse(airport, &[EdgeKind::Serves, EdgeKind::Carries], 1, ts(10))
        .expect("traverse depth 1");
    assert_eq!(shallow.len(), 1);
}
