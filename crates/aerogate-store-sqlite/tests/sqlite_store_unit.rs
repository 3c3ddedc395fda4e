// crates/aerogate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Integrity Unit Tests
// Description: Trigger-enforced invariants, dedup, append-only rules, as_of.
// Purpose: Validate that the database itself rejects invariant violations.
// ============================================================================

//! ## Overview
//! Unit-level tests for the durable store:
//! - Evidence dedup on the identity triple and content-addressed byte files
//! - SQL triggers reject node updates, unbound FACT writes, and ungoverned
//!   action transitions even when issued as raw SQL
//! - Resolved cases are append-only
//! - `as_of` implements the canonical bi-temporal predicate with supersession
//! - Schema version mismatches fail closed at open

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::CaseStatus;
use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::ClaimKind;
use aerogate_core::ClaimStatus;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceIngest;
use aerogate_core::EvidenceStore;
use aerogate_core::GraphStore;
use aerogate_core::InvariantKind;
use aerogate_core::NewClaim;
use aerogate_core::NewEdge;
use aerogate_core::NodeKind;
use aerogate_core::ScopeId;
use aerogate_core::SourceSystem;
use aerogate_core::StoreError;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_store_sqlite::SqliteControlStores;
use aerogate_store_sqlite::SqliteStoreConfig;
use aerogate_store_sqlite::SqliteStoreError;
use aerogate_store_sqlite::SqliteStoreMode;
use aerogate_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::json;
use tempfile::TempDir;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn open_store(dir: &TempDir) -> SqliteControlStores {
    SqliteControlStores::open(&SqliteStoreConfig {
        path: dir.path().join("aerogate.db"),
        evidence_root: dir.path().join("evidence"),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    })
    .expect("open store")
}

fn metar_ingest(payload: &str) -> EvidenceIngest {
    EvidenceIngest {
        source_system: SourceSystem::Metar,
        source_ref: "station:KJFK".to_string(),
        content_type: "application/json".to_string(),
        payload: payload.as_bytes().to_vec(),
        event_time: None,
        meta: json!({ "scope": "KJFK" }),
    }
}

#[test]
fn evidence_put_dedups_and_writes_content_addressed_bytes() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let first = store.put_evidence(metar_ingest("{\"visibility_sm\": 1.0}"), ts(1)).expect("put");
    let second = store.put_evidence(metar_ingest("{\"visibility_sm\": 1.0}"), ts(2)).expect("put");
    assert_eq!(first, second);

    let (record, bytes) = store.get_evidence(first).expect("get");
    assert_eq!(bytes, b"{\"visibility_sm\": 1.0}");
    assert_eq!(record.payload_path, format!("{}.bin", record.content_sha256));
    assert!(dir.path().join("evidence").join(&record.payload_path).exists());
    assert_eq!(record.content_sha256.len(), 64);
}

#[test]
fn raw_sql_cannot_mutate_nodes_or_evidence() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    store.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    store.put_evidence(metar_ingest("{}"), ts(1)).expect("evidence");
    drop(store);

    let conn = Connection::open(dir.path().join("aerogate.db")).expect("open raw");
    let node_update = conn.execute("UPDATE nodes SET identifier = 'KLGA'", params![]);
    let message = node_update.expect_err("node update must abort").to_string();
    assert!(message.contains("node_immutability"), "got: {message}");

    let evidence_update = conn.execute("UPDATE evidence SET excerpt = 'tampered'", params![]);
    assert!(evidence_update.is_err());
    let evidence_delete = conn.execute("DELETE FROM evidence", params![]);
    assert!(evidence_delete.is_err());
}

#[test]
fn unbound_fact_writes_are_rejected_in_rust_and_sql() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let airport = store.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let err = store
        .insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "unbound".to_string(),
                status: ClaimStatus::Fact,
                confidence: 0.9,
                event_time: TimeWindow::at(ts(1)),
                supersedes: None,
                evidence: Vec::new(),
            },
            ts(1),
        )
        .expect_err("unbound fact claim");
    assert!(matches!(
        err,
        StoreError::InvariantViolation {
            kind: InvariantKind::EvidenceBinding,
            ..
        }
    ));

    // A draft claim promoted by raw SQL hits the trigger backstop.
    let draft = store
        .insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "draft".to_string(),
                status: ClaimStatus::Draft,
                confidence: 0.9,
                event_time: TimeWindow::at(ts(1)),
                supersedes: None,
                evidence: Vec::new(),
            },
            ts(1),
        )
        .expect("draft claim");
    drop(store);
    let conn = Connection::open(dir.path().join("aerogate.db")).expect("open raw");
    let promote = conn.execute(
        "UPDATE claims SET status = 'fact' WHERE id = ?1",
        params![i64::try_from(draft.get()).expect("id")],
    );
    let message = promote.expect_err("raw promotion must abort").to_string();
    assert!(message.contains("evidence_binding"), "got: {message}");
}

#[test]
fn fact_insert_with_evidence_binds_in_one_transaction() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let airport = store.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let obs = store
        .upsert_node(NodeKind::WeatherObservation, "KJFK:metar:1", ts(1))
        .expect("node");
    let evidence = store.put_evidence(metar_ingest("{\"visibility_sm\": 0.5}"), ts(1)).expect("put");
    let edge = store
        .insert_edge(
            NewEdge {
                src: airport,
                dst: obs,
                kind: EdgeKind::HasWeather,
                status: EdgeStatus::Fact,
                attrs: json!({ "category": "lifr" }),
                event_time: TimeWindow::at(ts(1)),
                valid: TimeWindow::open(ts(1)),
                source_system: SourceSystem::Metar,
                confidence: 0.95,
                supersedes: None,
                evidence: vec![evidence],
            },
            ts(1),
        )
        .expect("fact edge with binding");
    assert_eq!(store.edge_evidence(edge).expect("bindings"), vec![evidence]);
    let neighbors = store
        .neighbors(airport, Some(EdgeKind::HasWeather), aerogate_core::Direction::Out, ts(2))
        .expect("neighbors");
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].status, EdgeStatus::Fact);
}

#[test]
fn action_governance_triggers_hold_even_for_raw_sql() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let case = store
        .create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    drop(store);
    let conn = Connection::open(dir.path().join("aerogate.db")).expect("open raw");

    // High risk without the approval flag aborts on insert.
    let insert = conn.execute(
        "INSERT INTO actions (case_id, action_type, args_json, risk, requires_approval, \
         state, created_at, updated_at) VALUES (?1, 'switch_gateway', '{}', 'high', 0, \
         'proposed', 0, 0)",
        params![i64::try_from(case.get()).expect("id")],
    );
    let message = insert.expect_err("ungoverned insert must abort").to_string();
    assert!(message.contains("action_governance"), "got: {message}");

    // An unapproved action forced to EXECUTING aborts on update.
    conn.execute(
        "INSERT INTO actions (case_id, action_type, args_json, risk, requires_approval, \
         state, created_at, updated_at) VALUES (?1, 'hold_cargo', '{}', 'medium', 1, \
         'pending_approval', 0, 0)",
        params![i64::try_from(case.get()).expect("id")],
    )
    .expect("governed insert");
    let update = conn.execute("UPDATE actions SET state = 'executing'", params![]);
    let message = update.expect_err("unapproved execution must abort").to_string();
    assert!(message.contains("action_governance"), "got: {message}");
}

#[test]
fn resolved_cases_reject_further_writes() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let case = store
        .create_case(CaseType::AirportDisruption, &ScopeId::new("KJFK"), ts(1))
        .expect("case");
    store
        .set_case_status(case, CaseStatus::Resolved, Some(aerogate_core::Posture::Accept), ts(2))
        .expect("resolve");
    let err = store
        .set_case_status(case, CaseStatus::Open, None, ts(3))
        .expect_err("resolved case is append-only");
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn as_of_replays_point_in_time_with_supersession() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let airport = store.upsert_node(NodeKind::Airport, "KJFK", ts(1)).expect("node");
    let original_evidence =
        store.put_evidence(metar_ingest("{\"visibility_sm\": 0.5}"), ts(100)).expect("put");
    let original = store
        .insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: "visibility 0.5 sm".to_string(),
                status: ClaimStatus::Fact,
                confidence: 0.9,
                event_time: TimeWindow::open(ts(100)),
                supersedes: None,
                evidence: vec![original_evidence],
            },
            ts(100),
        )
        .expect("original");
    let corrective_evidence =
        store.put_evidence(metar_ingest("{\"visibility_sm\": 2.0}"), ts(200)).expect("put");
    let corrective = store
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
        .expect("corrective");

    let before = store.as_of(ts(150), ts(150)).expect("as_of before");
    assert_eq!(before.claims.len(), 1);
    assert_eq!(before.claims[0].claim_id, original);

    let after = store.as_of(ts(150), ts(250)).expect("as_of after");
    assert_eq!(after.claims.len(), 1);
    assert_eq!(after.claims[0].claim_id, corrective);
    assert_eq!(after.claims[0].supersedes, Some(original));
}

#[test]
fn schema_version_mismatch_fails_closed() {
    let dir = TempDir::new().expect("tempdir");
    {
        let _store = open_store(&dir);
    }
    {
        let conn = Connection::open(dir.path().join("aerogate.db")).expect("open raw");
        conn.execute("UPDATE store_meta SET version = 99", params![]).expect("bump version");
    }
    let result = SqliteControlStores::open(&SqliteStoreConfig {
        path: dir.path().join("aerogate.db"),
        evidence_root: dir.path().join("evidence"),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    });
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}
