// crates/aerogate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Control-Plane Store
// Description: Durable evidence, graph, case, policy, playbook, webhook storage.
// Purpose: Enforce the binding invariants inside the store with SQL triggers.
// Dependencies: aerogate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One `SQLite` database holds every control-plane table; raw evidence bytes
//! live as content-addressed files under the configured store root. The three
//! binding invariants are enforced twice: typed Rust pre-checks return
//! precise row ids, and SQL triggers reject any write that slips past a
//! caller. FACT rows are inserted as DRAFT, bound, and promoted inside one
//! transaction so the promotion trigger always sees its bindings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use aerogate_core::ActionId;
use aerogate_core::ActionRecord;
use aerogate_core::ActionRisk;
use aerogate_core::ActionState;
use aerogate_core::CaseId;
use aerogate_core::CaseRecord;
use aerogate_core::CaseStatus;
use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::ClaimId;
use aerogate_core::ClaimRecord;
use aerogate_core::ClaimStatus;
use aerogate_core::ContradictionId;
use aerogate_core::ContradictionRecord;
use aerogate_core::ContradictionStatus;
use aerogate_core::DecisionPacket;
use aerogate_core::DeliveryId;
use aerogate_core::Direction;
use aerogate_core::EdgeId;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeRecord;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceId;
use aerogate_core::EvidenceIngest;
use aerogate_core::EvidenceRecord;
use aerogate_core::EvidenceStore;
use aerogate_core::GatewayEventKind;
use aerogate_core::GraphStore;
use aerogate_core::GraphView;
use aerogate_core::InvariantKind;
use aerogate_core::MissingEvidenceRecord;
use aerogate_core::NewAction;
use aerogate_core::NewClaim;
use aerogate_core::NewContradiction;
use aerogate_core::NewDelivery;
use aerogate_core::NewEdge;
use aerogate_core::NewMissingEvidence;
use aerogate_core::NewPlaybook;
use aerogate_core::NewPolicy;
use aerogate_core::NodeId;
use aerogate_core::NodeKind;
use aerogate_core::NodeRecord;
use aerogate_core::NodeVersionId;
use aerogate_core::NodeVersionRecord;
use aerogate_core::OutcomeRecord;
use aerogate_core::PlaybookId;
use aerogate_core::PlaybookRecord;
use aerogate_core::PlaybookStats;
use aerogate_core::PlaybookStore;
use aerogate_core::PolicyId;
use aerogate_core::PolicyRecord;
use aerogate_core::PolicyStore;
use aerogate_core::Posture;
use aerogate_core::RequestId;
use aerogate_core::ScopeId;
use aerogate_core::SourceSystem;
use aerogate_core::StoreError;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use aerogate_core::TraceEvent;
use aerogate_core::TraceKind;
use aerogate_core::WebhookId;
use aerogate_core::WebhookRegistration;
use aerogate_core::WebhookStore;
use aerogate_core::redacted_excerpt;
use aerogate_core::sha256_hex;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` control-plane store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `evidence_root` is created at open when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Directory for content-addressed evidence payload files.
    pub evidence_root: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw evidence payloads.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or label mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
        }
    }
}

/// Maps a rusqlite error, surfacing trigger-raised invariant aborts.
fn map_db(err: &rusqlite::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("invariant:evidence_binding") {
        return StoreError::InvariantViolation {
            kind: InvariantKind::EvidenceBinding,
            row: 0,
            message,
        };
    }
    if message.contains("invariant:node_immutability") {
        return StoreError::InvariantViolation {
            kind: InvariantKind::NodeImmutability,
            row: 0,
            message,
        };
    }
    if message.contains("invariant:action_governance") {
        return StoreError::InvariantViolation {
            kind: InvariantKind::ActionGovernance,
            row: 0,
            message,
        };
    }
    if message.contains("append_only") || message.contains("immutable") {
        return StoreError::Conflict(message);
    }
    StoreError::Db(message)
}

// ============================================================================
// SECTION: Label Helpers
// ============================================================================

/// Serializes an enum's snake_case wire label for a TEXT column.
fn to_label<T: Serialize>(value: &T) -> Result<String, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::String(label)) => Ok(label),
        Ok(other) => Err(StoreError::Invalid(format!("non-string label: {other}"))),
        Err(err) => Err(StoreError::Invalid(err.to_string())),
    }
}

/// Parses an enum from its snake_case wire label.
fn from_label<T: for<'de> Deserialize<'de>>(label: &str) -> Result<T, StoreError> {
    serde_json::from_value(Value::String(label.to_string()))
        .map_err(|err| StoreError::Corrupt(format!("bad label {label}: {err}")))
}

/// Serializes a JSON column.
fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Parses a JSON column.
fn from_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Corrupt(err.to_string()))
}

/// Converts a stored rowid into a `u64`.
fn raw_id(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative rowid {value}")))
}

/// Converts an optional `(start, end)` column pair into a window.
const fn window(start: i64, end: Option<i64>) -> TimeWindow {
    TimeWindow {
        start: Timestamp::from_unix_millis(start),
        end: match end {
            Some(end) => Some(Timestamp::from_unix_millis(end)),
            None => None,
        },
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Opens the connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if config.path.is_dir() {
        return Err(SqliteStoreError::Invalid("database path is a directory".to_string()));
    }
    let conn =
        Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    conn.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    conn.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(conn)
}

/// Creates tables, triggers, and indexes; validates the schema version.
fn init_schema(conn: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = conn.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(SCHEMA_SQL).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "found {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Full schema: tables, invariant triggers, and range indexes.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS evidence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_system TEXT NOT NULL,
    source_ref TEXT NOT NULL,
    content_sha256 TEXT NOT NULL,
    content_type TEXT NOT NULL,
    retrieved_at INTEGER NOT NULL,
    event_start INTEGER NOT NULL,
    event_end INTEGER,
    payload_path TEXT NOT NULL,
    excerpt TEXT NOT NULL,
    meta_json TEXT NOT NULL,
    UNIQUE(source_system, source_ref, content_sha256)
);
CREATE TRIGGER IF NOT EXISTS evidence_immutable_update
BEFORE UPDATE ON evidence
BEGIN SELECT RAISE(ABORT, 'immutable: evidence rows are never updated'); END;
CREATE TRIGGER IF NOT EXISTS evidence_immutable_delete
BEFORE DELETE ON evidence
BEGIN SELECT RAISE(ABORT, 'immutable: evidence rows are never deleted'); END;

CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    identifier TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(kind, identifier)
);
CREATE TRIGGER IF NOT EXISTS nodes_immutable
BEFORE UPDATE ON nodes
BEGIN SELECT RAISE(ABORT, 'invariant:node_immutability'); END;

CREATE TABLE IF NOT EXISTS node_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id INTEGER NOT NULL REFERENCES nodes(id),
    attrs_json TEXT NOT NULL,
    valid_start INTEGER NOT NULL,
    valid_end INTEGER,
    supersedes INTEGER REFERENCES node_versions(id)
);
CREATE TRIGGER IF NOT EXISTS node_versions_close_only
BEFORE UPDATE ON node_versions
WHEN NEW.node_id != OLD.node_id
  OR NEW.attrs_json != OLD.attrs_json
  OR NEW.valid_start != OLD.valid_start
  OR IFNULL(NEW.supersedes, -1) != IFNULL(OLD.supersedes, -1)
BEGIN SELECT RAISE(ABORT, 'invariant:node_immutability'); END;

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    src INTEGER NOT NULL REFERENCES nodes(id),
    dst INTEGER NOT NULL REFERENCES nodes(id),
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    attrs_json TEXT NOT NULL,
    event_start INTEGER NOT NULL,
    event_end INTEGER,
    ingested_at INTEGER NOT NULL,
    valid_start INTEGER NOT NULL,
    valid_end INTEGER,
    source_system TEXT NOT NULL,
    confidence REAL NOT NULL,
    supersedes INTEGER REFERENCES edges(id)
);
CREATE INDEX IF NOT EXISTS idx_edges_bitemporal ON edges(event_start, ingested_at);
CREATE TABLE IF NOT EXISTS edge_evidence (
    edge_id INTEGER NOT NULL REFERENCES edges(id),
    evidence_id INTEGER NOT NULL REFERENCES evidence(id),
    UNIQUE(edge_id, evidence_id)
);
CREATE TRIGGER IF NOT EXISTS edges_fact_insert
BEFORE INSERT ON edges
WHEN NEW.status = 'fact'
BEGIN SELECT RAISE(ABORT, 'invariant:evidence_binding'); END;
CREATE TRIGGER IF NOT EXISTS edges_fact_promotion
BEFORE UPDATE OF status ON edges
WHEN NEW.status = 'fact'
 AND (SELECT COUNT(1) FROM edge_evidence WHERE edge_id = NEW.id) = 0
BEGIN SELECT RAISE(ABORT, 'invariant:evidence_binding'); END;

CREATE TABLE IF NOT EXISTS claims (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject INTEGER NOT NULL REFERENCES nodes(id),
    kind TEXT NOT NULL,
    text TEXT NOT NULL,
    status TEXT NOT NULL,
    confidence REAL NOT NULL,
    event_start INTEGER NOT NULL,
    event_end INTEGER,
    ingested_at INTEGER NOT NULL,
    supersedes INTEGER REFERENCES claims(id)
);
CREATE INDEX IF NOT EXISTS idx_claims_bitemporal ON claims(event_start, ingested_at);
CREATE TABLE IF NOT EXISTS claim_evidence (
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    evidence_id INTEGER NOT NULL REFERENCES evidence(id),
    UNIQUE(claim_id, evidence_id)
);
CREATE TRIGGER IF NOT EXISTS claims_fact_insert
BEFORE INSERT ON claims
WHEN NEW.status = 'fact'
BEGIN SELECT RAISE(ABORT, 'invariant:evidence_binding'); END;
CREATE TRIGGER IF NOT EXISTS claims_fact_promotion
BEFORE UPDATE OF status ON claims
WHEN NEW.status = 'fact'
 AND (SELECT COUNT(1) FROM claim_evidence WHERE claim_id = NEW.id) = 0
BEGIN SELECT RAISE(ABORT, 'invariant:evidence_binding'); END;

CREATE TABLE IF NOT EXISTS contradictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    left_claim INTEGER REFERENCES claims(id),
    right_claim INTEGER REFERENCES claims(id),
    detail TEXT NOT NULL,
    detected_at INTEGER NOT NULL,
    status TEXT NOT NULL,
    resolved_by INTEGER REFERENCES claims(id)
);

CREATE TABLE IF NOT EXISTS cases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_type TEXT NOT NULL,
    scope TEXT NOT NULL,
    status TEXT NOT NULL,
    posture TEXT,
    created_at INTEGER NOT NULL,
    resolved_at INTEGER
);
CREATE TRIGGER IF NOT EXISTS cases_append_only
BEFORE UPDATE ON cases
WHEN OLD.status = 'resolved'
BEGIN SELECT RAISE(ABORT, 'append_only: case is resolved'); END;

CREATE TABLE IF NOT EXISTS missing_evidence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL REFERENCES cases(id),
    source_system TEXT NOT NULL,
    request_type TEXT NOT NULL,
    params_json TEXT NOT NULL,
    reason TEXT NOT NULL,
    criticality TEXT NOT NULL,
    retryable INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    resolved_by_evidence INTEGER REFERENCES evidence(id)
);

CREATE TABLE IF NOT EXISTS actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL REFERENCES cases(id),
    action_type TEXT NOT NULL,
    args_json TEXT NOT NULL,
    risk TEXT NOT NULL,
    requires_approval INTEGER NOT NULL,
    state TEXT NOT NULL,
    approved_at INTEGER,
    approved_by TEXT,
    failure_reason TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TRIGGER IF NOT EXISTS actions_high_risk_approval
BEFORE INSERT ON actions
WHEN NEW.risk = 'high' AND NEW.requires_approval = 0
BEGIN SELECT RAISE(ABORT, 'invariant:action_governance'); END;
CREATE TRIGGER IF NOT EXISTS actions_executing_needs_approval
BEFORE UPDATE OF state ON actions
WHEN NEW.state = 'executing'
 AND NEW.requires_approval = 1
 AND NEW.approved_at IS NULL
BEGIN SELECT RAISE(ABORT, 'invariant:action_governance'); END;

CREATE TABLE IF NOT EXISTS outcomes (
    action_id INTEGER PRIMARY KEY REFERENCES actions(id),
    success INTEGER NOT NULL,
    payload_json TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trace_events (
    case_id INTEGER NOT NULL REFERENCES cases(id),
    seq INTEGER NOT NULL,
    kind TEXT NOT NULL,
    label TEXT NOT NULL,
    reference TEXT,
    meta_json TEXT NOT NULL,
    at INTEGER NOT NULL,
    PRIMARY KEY (case_id, seq)
);

CREATE TABLE IF NOT EXISTS policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL UNIQUE,
    conditions_json TEXT NOT NULL,
    effect_json TEXT NOT NULL,
    valid_start INTEGER NOT NULL,
    valid_end INTEGER,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS playbooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    pattern_json TEXT NOT NULL,
    actions_json TEXT NOT NULL,
    times_used INTEGER NOT NULL,
    successes INTEGER NOT NULL,
    mined_at INTEGER NOT NULL,
    last_used_at INTEGER,
    policy_snapshot_json TEXT NOT NULL,
    source_case INTEGER NOT NULL REFERENCES cases(id)
);

CREATE TABLE IF NOT EXISTS packets (
    case_id INTEGER PRIMARY KEY REFERENCES cases(id),
    packet_json TEXT NOT NULL,
    sealed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS webhooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    events_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS webhook_deliveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    webhook_id INTEGER NOT NULL REFERENCES webhooks(id),
    event_kind TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    last_status INTEGER,
    success INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL
);
";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable `SQLite` implementation of every Aerogate store trait.
pub struct SqliteControlStores {
    /// Guarded connection.
    conn: Mutex<Connection>,
    /// Content-addressed payload directory.
    evidence_root: PathBuf,
}

impl SqliteControlStores {
    /// Opens (or creates) the database and evidence root.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or the
    /// schema version mismatches.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        fs::create_dir_all(&config.evidence_root)
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut conn = open_connection(config)?;
        init_schema(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            evidence_root: config.evidence_root.clone(),
        })
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Db("connection lock poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Maps one evidence row.
fn evidence_from_row(row: &rusqlite::Row<'_>) -> Result<EvidenceRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let source: String = row.get(1).map_err(|err| map_db(&err))?;
    let event_start: i64 = row.get(6).map_err(|err| map_db(&err))?;
    let event_end: Option<i64> = row.get(7).map_err(|err| map_db(&err))?;
    let meta_raw: String = row.get(10).map_err(|err| map_db(&err))?;
    Ok(EvidenceRecord {
        evidence_id: EvidenceId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero evidence id".to_string()))?,
        source_system: from_label(&source)?,
        source_ref: row.get(2).map_err(|err| map_db(&err))?,
        content_sha256: row.get(3).map_err(|err| map_db(&err))?,
        content_type: row.get(4).map_err(|err| map_db(&err))?,
        retrieved_at: Timestamp::from_unix_millis(row.get(5).map_err(|err| map_db(&err))?),
        event_time: window(event_start, event_end),
        payload_path: row.get(8).map_err(|err| map_db(&err))?,
        excerpt: row.get(9).map_err(|err| map_db(&err))?,
        meta: from_json(&meta_raw)?,
    })
}

/// Column list matching [`evidence_from_row`].
const EVIDENCE_COLUMNS: &str = "id, source_system, source_ref, content_sha256, content_type, \
                                retrieved_at, event_start, event_end, payload_path, excerpt, \
                                meta_json";

/// Maps one edge row.
fn edge_from_row(row: &rusqlite::Row<'_>) -> Result<EdgeRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let src: i64 = row.get(1).map_err(|err| map_db(&err))?;
    let dst: i64 = row.get(2).map_err(|err| map_db(&err))?;
    let kind: String = row.get(3).map_err(|err| map_db(&err))?;
    let status: String = row.get(4).map_err(|err| map_db(&err))?;
    let attrs_raw: String = row.get(5).map_err(|err| map_db(&err))?;
    let event_start: i64 = row.get(6).map_err(|err| map_db(&err))?;
    let event_end: Option<i64> = row.get(7).map_err(|err| map_db(&err))?;
    let valid_start: i64 = row.get(9).map_err(|err| map_db(&err))?;
    let valid_end: Option<i64> = row.get(10).map_err(|err| map_db(&err))?;
    let source: String = row.get(11).map_err(|err| map_db(&err))?;
    let supersedes: Option<i64> = row.get(13).map_err(|err| map_db(&err))?;
    Ok(EdgeRecord {
        edge_id: EdgeId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero edge id".to_string()))?,
        src: NodeId::from_raw(raw_id(src)?)
            .ok_or_else(|| StoreError::Corrupt("zero src id".to_string()))?,
        dst: NodeId::from_raw(raw_id(dst)?)
            .ok_or_else(|| StoreError::Corrupt("zero dst id".to_string()))?,
        kind: from_label(&kind)?,
        status: from_label(&status)?,
        attrs: from_json(&attrs_raw)?,
        event_time: window(event_start, event_end),
        ingested_at: Timestamp::from_unix_millis(row.get(8).map_err(|err| map_db(&err))?),
        valid: window(valid_start, valid_end),
        source_system: from_label(&source)?,
        confidence: row.get(12).map_err(|err| map_db(&err))?,
        supersedes: supersedes.and_then(|raw| u64::try_from(raw).ok()).and_then(EdgeId::from_raw),
    })
}

/// Column list matching [`edge_from_row`].
const EDGE_COLUMNS: &str = "id, src, dst, kind, status, attrs_json, event_start, event_end, \
                            ingested_at, valid_start, valid_end, source_system, confidence, \
                            supersedes";

/// Maps one claim row.
fn claim_from_row(row: &rusqlite::Row<'_>) -> Result<ClaimRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let subject: i64 = row.get(1).map_err(|err| map_db(&err))?;
    let kind: String = row.get(2).map_err(|err| map_db(&err))?;
    let status: String = row.get(4).map_err(|err| map_db(&err))?;
    let event_start: i64 = row.get(6).map_err(|err| map_db(&err))?;
    let event_end: Option<i64> = row.get(7).map_err(|err| map_db(&err))?;
    let supersedes: Option<i64> = row.get(9).map_err(|err| map_db(&err))?;
    Ok(ClaimRecord {
        claim_id: ClaimId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero claim id".to_string()))?,
        subject: NodeId::from_raw(raw_id(subject)?)
            .ok_or_else(|| StoreError::Corrupt("zero subject id".to_string()))?,
        kind: from_label(&kind)?,
        text: row.get(3).map_err(|err| map_db(&err))?,
        status: from_label(&status)?,
        confidence: row.get(5).map_err(|err| map_db(&err))?,
        event_time: window(event_start, event_end),
        ingested_at: Timestamp::from_unix_millis(row.get(8).map_err(|err| map_db(&err))?),
        supersedes: supersedes.and_then(|raw| u64::try_from(raw).ok()).and_then(ClaimId::from_raw),
    })
}

/// Column list matching [`claim_from_row`].
const CLAIM_COLUMNS: &str = "id, subject, kind, text, status, confidence, event_start, \
                             event_end, ingested_at, supersedes";

/// Maps one contradiction row.
fn contradiction_from_row(row: &rusqlite::Row<'_>) -> Result<ContradictionRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let case: i64 = row.get(1).map_err(|err| map_db(&err))?;
    let kind: String = row.get(2).map_err(|err| map_db(&err))?;
    let left: Option<i64> = row.get(3).map_err(|err| map_db(&err))?;
    let right: Option<i64> = row.get(4).map_err(|err| map_db(&err))?;
    let status: String = row.get(7).map_err(|err| map_db(&err))?;
    let resolved_by: Option<i64> = row.get(8).map_err(|err| map_db(&err))?;
    Ok(ContradictionRecord {
        contradiction_id: ContradictionId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero contradiction id".to_string()))?,
        case_id: CaseId::from_raw(raw_id(case)?)
            .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))?,
        kind: from_label(&kind)?,
        left_claim: left.and_then(|raw| u64::try_from(raw).ok()).and_then(ClaimId::from_raw),
        right_claim: right.and_then(|raw| u64::try_from(raw).ok()).and_then(ClaimId::from_raw),
        detail: row.get(5).map_err(|err| map_db(&err))?,
        detected_at: Timestamp::from_unix_millis(row.get(6).map_err(|err| map_db(&err))?),
        status: from_label(&status)?,
        resolved_by: resolved_by
            .and_then(|raw| u64::try_from(raw).ok())
            .and_then(ClaimId::from_raw),
    })
}

/// Maps one case row.
fn case_from_row(row: &rusqlite::Row<'_>) -> Result<CaseRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let case_type: String = row.get(1).map_err(|err| map_db(&err))?;
    let scope: String = row.get(2).map_err(|err| map_db(&err))?;
    let status: String = row.get(3).map_err(|err| map_db(&err))?;
    let posture: Option<String> = row.get(4).map_err(|err| map_db(&err))?;
    let resolved_at: Option<i64> = row.get(6).map_err(|err| map_db(&err))?;
    Ok(CaseRecord {
        case_id: CaseId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))?,
        case_type: from_label(&case_type)?,
        scope: ScopeId::new(scope),
        status: from_label(&status)?,
        posture: posture.as_deref().map(from_label::<Posture>).transpose()?,
        created_at: Timestamp::from_unix_millis(row.get(5).map_err(|err| map_db(&err))?),
        resolved_at: resolved_at.map(Timestamp::from_unix_millis),
    })
}

/// Maps one action row.
fn action_from_row(row: &rusqlite::Row<'_>) -> Result<ActionRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let case: i64 = row.get(1).map_err(|err| map_db(&err))?;
    let action_type: String = row.get(2).map_err(|err| map_db(&err))?;
    let args_raw: String = row.get(3).map_err(|err| map_db(&err))?;
    let risk: String = row.get(4).map_err(|err| map_db(&err))?;
    let state: String = row.get(6).map_err(|err| map_db(&err))?;
    let approved_at: Option<i64> = row.get(7).map_err(|err| map_db(&err))?;
    Ok(ActionRecord {
        action_id: ActionId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero action id".to_string()))?,
        case_id: CaseId::from_raw(raw_id(case)?)
            .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))?,
        action_type: from_label(&action_type)?,
        args: from_json(&args_raw)?,
        risk: from_label(&risk)?,
        requires_approval: row.get::<_, i64>(5).map_err(|err| map_db(&err))? != 0,
        state: from_label(&state)?,
        approved_at: approved_at.map(Timestamp::from_unix_millis),
        approved_by: row.get(8).map_err(|err| map_db(&err))?,
        failure_reason: row.get(9).map_err(|err| map_db(&err))?,
        created_at: Timestamp::from_unix_millis(row.get(10).map_err(|err| map_db(&err))?),
        updated_at: Timestamp::from_unix_millis(row.get(11).map_err(|err| map_db(&err))?),
    })
}

/// Column list matching [`action_from_row`].
const ACTION_COLUMNS: &str = "id, case_id, action_type, args_json, risk, requires_approval, \
                              state, approved_at, approved_by, failure_reason, created_at, \
                              updated_at";

/// Maps one missing-evidence row.
fn missing_from_row(row: &rusqlite::Row<'_>) -> Result<MissingEvidenceRecord, StoreError> {
    let id: i64 = row.get(0).map_err(|err| map_db(&err))?;
    let case: i64 = row.get(1).map_err(|err| map_db(&err))?;
    let source: String = row.get(2).map_err(|err| map_db(&err))?;
    let params_raw: String = row.get(4).map_err(|err| map_db(&err))?;
    let criticality: String = row.get(6).map_err(|err| map_db(&err))?;
    let resolved: Option<i64> = row.get(9).map_err(|err| map_db(&err))?;
    Ok(MissingEvidenceRecord {
        request_id: RequestId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero request id".to_string()))?,
        case_id: CaseId::from_raw(raw_id(case)?)
            .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))?,
        source_system: from_label(&source)?,
        request_type: row.get(3).map_err(|err| map_db(&err))?,
        params: from_json(&params_raw)?,
        reason: row.get(5).map_err(|err| map_db(&err))?,
        criticality: from_label(&criticality)?,
        retryable: row.get::<_, i64>(7).map_err(|err| map_db(&err))? != 0,
        created_at: Timestamp::from_unix_millis(row.get(8).map_err(|err| map_db(&err))?),
        resolved_by_evidence: resolved
            .and_then(|raw| u64::try_from(raw).ok())
            .and_then(EvidenceId::from_raw),
    })
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

impl EvidenceStore for SqliteControlStores {
    fn put_evidence(
        &self,
        ingest: EvidenceIngest,
        now: Timestamp,
    ) -> Result<EvidenceId, StoreError> {
        let content_sha256 = sha256_hex(&ingest.payload);
        let payload_path = format!("{content_sha256}.bin");
        let source = to_label(&ingest.source_system)?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| map_db(&err))?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM evidence WHERE source_system = ?1 AND source_ref = ?2 AND \
                 content_sha256 = ?3",
                params![source, ingest.source_ref, content_sha256],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| map_db(&err))?;
        if let Some(id) = existing {
            tx.commit().map_err(|err| map_db(&err))?;
            return EvidenceId::from_raw(raw_id(id)?)
                .ok_or_else(|| StoreError::Corrupt("zero evidence id".to_string()));
        }
        let disk_path = self.evidence_root.join(&payload_path);
        if !disk_path.exists() {
            fs::write(&disk_path, &ingest.payload).map_err(|err| StoreError::Io(err.to_string()))?;
        }
        let event = ingest.event_time.unwrap_or_else(|| TimeWindow::at(now));
        tx.execute(
            "INSERT INTO evidence (source_system, source_ref, content_sha256, content_type, \
             retrieved_at, event_start, event_end, payload_path, excerpt, meta_json) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                source,
                ingest.source_ref,
                content_sha256,
                ingest.content_type,
                now.as_unix_millis(),
                event.start.as_unix_millis(),
                event.end.map(Timestamp::as_unix_millis),
                payload_path,
                redacted_excerpt(&ingest.payload),
                to_json(&ingest.meta)?,
            ],
        )
        .map_err(|err| map_db(&err))?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(|err| map_db(&err))?;
        EvidenceId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero evidence id".to_string()))
    }

    fn get_evidence(&self, id: EvidenceId) -> Result<(EvidenceRecord, Vec<u8>), StoreError> {
        let guard = self.lock()?;
        let record = guard
            .query_row(
                &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE id = ?1"),
                params![raw_id_to_i64(id.get())?],
                |row| Ok(evidence_from_row(row)),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .ok_or(StoreError::NotFound {
                entity: "evidence",
                id: id.get(),
            })??;
        drop(guard);
        let bytes = fs::read(self.evidence_root.join(&record.payload_path))
            .map_err(|err| StoreError::Io(err.to_string()))?;
        Ok((record, bytes))
    }

    fn evidence_by_source(
        &self,
        source: SourceSystem,
        source_ref: Option<&str>,
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let guard = self.lock()?;
        let label = to_label(&source)?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE source_system = ?1 AND (?2 IS \
                 NULL OR source_ref = ?2) ORDER BY id"
            ))
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![label, source_ref], |row| Ok(evidence_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }
}

/// Converts a `u64` id for SQL binding.
fn raw_id_to_i64(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Invalid(format!("id out of range: {id}")))
}

// ============================================================================
// SECTION: Graph Store
// ============================================================================

/// Inserts an edge or claim's bindings inside an open transaction.
fn bind_rows(
    tx: &Transaction<'_>,
    table: &str,
    key: &str,
    row_id: i64,
    evidence: &[EvidenceId],
) -> Result<(), StoreError> {
    for id in evidence {
        tx.execute(
            &format!("INSERT OR IGNORE INTO {table} ({key}, evidence_id) VALUES (?1, ?2)"),
            params![row_id, raw_id_to_i64(id.get())?],
        )
        .map_err(|err| map_db(&err))?;
    }
    Ok(())
}

impl GraphStore for SqliteControlStores {
    fn upsert_node(
        &self,
        kind: NodeKind,
        identifier: &str,
        now: Timestamp,
    ) -> Result<NodeId, StoreError> {
        let guard = self.lock()?;
        let label = to_label(&kind)?;
        guard
            .execute(
                "INSERT OR IGNORE INTO nodes (kind, identifier, created_at) VALUES (?1, ?2, ?3)",
                params![label, identifier, now.as_unix_millis()],
            )
            .map_err(|err| map_db(&err))?;
        let id: i64 = guard
            .query_row(
                "SELECT id FROM nodes WHERE kind = ?1 AND identifier = ?2",
                params![label, identifier],
                |row| row.get(0),
            )
            .map_err(|err| map_db(&err))?;
        NodeId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero node id".to_string()))
    }

    fn node(&self, kind: NodeKind, identifier: &str) -> Result<Option<NodeRecord>, StoreError> {
        let guard = self.lock()?;
        let label = to_label(&kind)?;
        guard
            .query_row(
                "SELECT id, created_at FROM nodes WHERE kind = ?1 AND identifier = ?2",
                params![label, identifier],
                |row| Ok((row.get::<_, i64>(0), row.get::<_, i64>(1))),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .map(|(id, created_at)| {
                let id = id.map_err(|err| map_db(&err))?;
                let created_at = created_at.map_err(|err| map_db(&err))?;
                Ok(NodeRecord {
                    node_id: NodeId::from_raw(raw_id(id)?)
                        .ok_or_else(|| StoreError::Corrupt("zero node id".to_string()))?,
                    kind,
                    identifier: identifier.to_string(),
                    created_at: Timestamp::from_unix_millis(created_at),
                })
            })
            .transpose()
    }

    fn node_by_id(&self, id: NodeId) -> Result<NodeRecord, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT kind, identifier, created_at FROM nodes WHERE id = ?1",
                params![raw_id_to_i64(id.get())?],
                |row| {
                    Ok((
                        row.get::<_, String>(0),
                        row.get::<_, String>(1),
                        row.get::<_, i64>(2),
                    ))
                },
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .ok_or(StoreError::NotFound {
                entity: "node",
                id: id.get(),
            })
            .and_then(|(kind, identifier, created_at)| {
                Ok(NodeRecord {
                    node_id: id,
                    kind: from_label(&kind.map_err(|err| map_db(&err))?)?,
                    identifier: identifier.map_err(|err| map_db(&err))?,
                    created_at: Timestamp::from_unix_millis(
                        created_at.map_err(|err| map_db(&err))?,
                    ),
                })
            })
    }

    fn new_node_version(
        &self,
        node_id: NodeId,
        attrs: Value,
        now: Timestamp,
    ) -> Result<NodeVersionId, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| map_db(&err))?;
        let node_raw = raw_id_to_i64(node_id.get())?;
        let previous: Option<i64> = tx
            .query_row(
                "SELECT id FROM node_versions WHERE node_id = ?1 AND valid_end IS NULL",
                params![node_raw],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| map_db(&err))?;
        if let Some(previous) = previous {
            tx.execute(
                "UPDATE node_versions SET valid_end = ?1 WHERE id = ?2",
                params![now.as_unix_millis(), previous],
            )
            .map_err(|err| map_db(&err))?;
        }
        tx.execute(
            "INSERT INTO node_versions (node_id, attrs_json, valid_start, valid_end, \
             supersedes) VALUES (?1, ?2, ?3, NULL, ?4)",
            params![node_raw, to_json(&attrs)?, now.as_unix_millis(), previous],
        )
        .map_err(|err| map_db(&err))?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(|err| map_db(&err))?;
        NodeVersionId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero version id".to_string()))
    }

    fn current_node_version(
        &self,
        node_id: NodeId,
    ) -> Result<Option<NodeVersionRecord>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT id, attrs_json, valid_start, supersedes FROM node_versions WHERE \
                 node_id = ?1 AND valid_end IS NULL",
                params![raw_id_to_i64(node_id.get())?],
                |row| {
                    Ok((
                        row.get::<_, i64>(0),
                        row.get::<_, String>(1),
                        row.get::<_, i64>(2),
                        row.get::<_, Option<i64>>(3),
                    ))
                },
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .map(|(id, attrs, valid_start, supersedes)| {
                let id = id.map_err(|err| map_db(&err))?;
                Ok(NodeVersionRecord {
                    version_id: NodeVersionId::from_raw(raw_id(id)?)
                        .ok_or_else(|| StoreError::Corrupt("zero version id".to_string()))?,
                    node_id,
                    attrs: from_json(&attrs.map_err(|err| map_db(&err))?)?,
                    valid: TimeWindow::open(Timestamp::from_unix_millis(
                        valid_start.map_err(|err| map_db(&err))?,
                    )),
                    supersedes: supersedes
                        .map_err(|err| map_db(&err))?
                        .and_then(|raw| u64::try_from(raw).ok())
                        .and_then(NodeVersionId::from_raw),
                })
            })
            .transpose()
    }

    fn insert_edge(&self, edge: NewEdge, now: Timestamp) -> Result<EdgeId, StoreError> {
        if edge.status == EdgeStatus::Fact && edge.evidence.is_empty() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: 0,
                message: "edge inserted as fact without evidence".to_string(),
            });
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| map_db(&err))?;
        tx.execute(
            "INSERT INTO edges (src, dst, kind, status, attrs_json, event_start, event_end, \
             ingested_at, valid_start, valid_end, source_system, confidence, supersedes) VALUES \
             (?1, ?2, ?3, 'draft', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                raw_id_to_i64(edge.src.get())?,
                raw_id_to_i64(edge.dst.get())?,
                to_label(&edge.kind)?,
                to_json(&edge.attrs)?,
                edge.event_time.start.as_unix_millis(),
                edge.event_time.end.map(Timestamp::as_unix_millis),
                now.as_unix_millis(),
                edge.valid.start.as_unix_millis(),
                edge.valid.end.map(Timestamp::as_unix_millis),
                to_label(&edge.source_system)?,
                edge.confidence,
                edge.supersedes.map(|id| raw_id_to_i64(id.get())).transpose()?,
            ],
        )
        .map_err(|err| map_db(&err))?;
        let id = tx.last_insert_rowid();
        bind_rows(&tx, "edge_evidence", "edge_id", id, &edge.evidence)?;
        if edge.status != EdgeStatus::Draft {
            tx.execute(
                "UPDATE edges SET status = ?1 WHERE id = ?2",
                params![to_label(&edge.status)?, id],
            )
            .map_err(|err| map_db(&err))?;
        }
        tx.commit().map_err(|err| map_db(&err))?;
        EdgeId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero edge id".to_string()))
    }

    fn bind_edge_evidence(&self, edge: EdgeId, evidence: EvidenceId) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let exists: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM edges WHERE id = ?1",
                params![raw_id_to_i64(edge.get())?],
                |row| row.get(0),
            )
            .map_err(|err| map_db(&err))?;
        if exists == 0 {
            return Err(StoreError::NotFound {
                entity: "edge",
                id: edge.get(),
            });
        }
        guard
            .execute(
                "INSERT OR IGNORE INTO edge_evidence (edge_id, evidence_id) VALUES (?1, ?2)",
                params![raw_id_to_i64(edge.get())?, raw_id_to_i64(evidence.get())?],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn promote_edge(&self, edge: EdgeId) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let raw = raw_id_to_i64(edge.get())?;
        let bound: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM edge_evidence WHERE edge_id = ?1",
                params![raw],
                |row| row.get(0),
            )
            .map_err(|err| map_db(&err))?;
        if bound == 0 {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: edge.get(),
                message: "edge promoted to fact without evidence".to_string(),
            });
        }
        let changed = guard
            .execute("UPDATE edges SET status = 'fact' WHERE id = ?1", params![raw])
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "edge",
                id: edge.get(),
            });
        }
        Ok(())
    }

    fn retract_edge(&self, edge: EdgeId) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE edges SET status = 'retracted' WHERE id = ?1",
                params![raw_id_to_i64(edge.get())?],
            )
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "edge",
                id: edge.get(),
            });
        }
        Ok(())
    }

    fn edge_evidence(&self, edge: EdgeId) -> Result<Vec<EvidenceId>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare("SELECT evidence_id FROM edge_evidence WHERE edge_id = ?1 ORDER BY \
                      evidence_id")
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(edge.get())?], |row| row.get::<_, i64>(0))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| map_db(&err))?;
            if let Some(id) = EvidenceId::from_raw(raw_id(raw)?) {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn insert_claim(&self, claim: NewClaim, now: Timestamp) -> Result<ClaimId, StoreError> {
        if claim.status == ClaimStatus::Fact && claim.evidence.is_empty() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: 0,
                message: "claim inserted as fact without evidence".to_string(),
            });
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| map_db(&err))?;
        tx.execute(
            "INSERT INTO claims (subject, kind, text, status, confidence, event_start, \
             event_end, ingested_at, supersedes) VALUES (?1, ?2, ?3, 'draft', ?4, ?5, ?6, ?7, \
             ?8)",
            params![
                raw_id_to_i64(claim.subject.get())?,
                to_label(&claim.kind)?,
                claim.text,
                claim.confidence,
                claim.event_time.start.as_unix_millis(),
                claim.event_time.end.map(Timestamp::as_unix_millis),
                now.as_unix_millis(),
                claim.supersedes.map(|id| raw_id_to_i64(id.get())).transpose()?,
            ],
        )
        .map_err(|err| map_db(&err))?;
        let id = tx.last_insert_rowid();
        bind_rows(&tx, "claim_evidence", "claim_id", id, &claim.evidence)?;
        if claim.status != ClaimStatus::Draft {
            tx.execute(
                "UPDATE claims SET status = ?1 WHERE id = ?2",
                params![to_label(&claim.status)?, id],
            )
            .map_err(|err| map_db(&err))?;
        }
        tx.commit().map_err(|err| map_db(&err))?;
        ClaimId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero claim id".to_string()))
    }

    fn bind_claim_evidence(
        &self,
        claim: ClaimId,
        evidence: EvidenceId,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let exists: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM claims WHERE id = ?1",
                params![raw_id_to_i64(claim.get())?],
                |row| row.get(0),
            )
            .map_err(|err| map_db(&err))?;
        if exists == 0 {
            return Err(StoreError::NotFound {
                entity: "claim",
                id: claim.get(),
            });
        }
        guard
            .execute(
                "INSERT OR IGNORE INTO claim_evidence (claim_id, evidence_id) VALUES (?1, ?2)",
                params![raw_id_to_i64(claim.get())?, raw_id_to_i64(evidence.get())?],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn set_claim_status(&self, claim: ClaimId, status: ClaimStatus) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let raw = raw_id_to_i64(claim.get())?;
        if status == ClaimStatus::Fact {
            let bound: i64 = guard
                .query_row(
                    "SELECT COUNT(1) FROM claim_evidence WHERE claim_id = ?1",
                    params![raw],
                    |row| row.get(0),
                )
                .map_err(|err| map_db(&err))?;
            if bound == 0 {
                return Err(StoreError::InvariantViolation {
                    kind: InvariantKind::EvidenceBinding,
                    row: claim.get(),
                    message: "claim promoted to fact without evidence".to_string(),
                });
            }
        }
        let changed = guard
            .execute(
                "UPDATE claims SET status = ?1 WHERE id = ?2",
                params![to_label(&status)?, raw],
            )
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "claim",
                id: claim.get(),
            });
        }
        Ok(())
    }

    fn supersede_claim(
        &self,
        old: ClaimId,
        replacement: NewClaim,
        now: Timestamp,
    ) -> Result<ClaimId, StoreError> {
        {
            let guard = self.lock()?;
            let exists: i64 = guard
                .query_row(
                    "SELECT COUNT(1) FROM claims WHERE id = ?1",
                    params![raw_id_to_i64(old.get())?],
                    |row| row.get(0),
                )
                .map_err(|err| map_db(&err))?;
            if exists == 0 {
                return Err(StoreError::NotFound {
                    entity: "claim",
                    id: old.get(),
                });
            }
        }
        let mut chained = replacement;
        chained.supersedes = Some(old);
        self.insert_claim(chained, now)
    }

    fn claim(&self, id: ClaimId) -> Result<ClaimRecord, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = ?1"),
                params![raw_id_to_i64(id.get())?],
                |row| Ok(claim_from_row(row)),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .ok_or(StoreError::NotFound {
                entity: "claim",
                id: id.get(),
            })?
    }

    fn claims_for_subject(&self, node: NodeId) -> Result<Vec<ClaimRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {CLAIM_COLUMNS} FROM claims WHERE subject = ?1 ORDER BY id"
            ))
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(node.get())?], |row| Ok(claim_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn claim_evidence(&self, claim: ClaimId) -> Result<Vec<EvidenceId>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare("SELECT evidence_id FROM claim_evidence WHERE claim_id = ?1 ORDER BY \
                      evidence_id")
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(claim.get())?], |row| row.get::<_, i64>(0))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| map_db(&err))?;
            if let Some(id) = EvidenceId::from_raw(raw_id(raw)?) {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn insert_contradiction(
        &self,
        contradiction: NewContradiction,
        now: Timestamp,
    ) -> Result<ContradictionId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO contradictions (case_id, kind, left_claim, right_claim, detail, \
                 detected_at, status, resolved_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', \
                 NULL)",
                params![
                    raw_id_to_i64(contradiction.case_id.get())?,
                    to_label(&contradiction.kind)?,
                    contradiction.left_claim.map(|id| raw_id_to_i64(id.get())).transpose()?,
                    contradiction.right_claim.map(|id| raw_id_to_i64(id.get())).transpose()?,
                    contradiction.detail,
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        ContradictionId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero contradiction id".to_string()))
    }

    fn contradictions_for_case(
        &self,
        case: CaseId,
    ) -> Result<Vec<ContradictionRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, case_id, kind, left_claim, right_claim, detail, detected_at, \
                 status, resolved_by FROM contradictions WHERE case_id = ?1 ORDER BY id",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(case.get())?], |row| Ok(contradiction_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn resolve_contradiction(
        &self,
        id: ContradictionId,
        status: ContradictionStatus,
        resolved_by: Option<ClaimId>,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE contradictions SET status = ?1, resolved_by = ?2 WHERE id = ?3",
                params![
                    to_label(&status)?,
                    resolved_by.map(|claim| raw_id_to_i64(claim.get())).transpose()?,
                    raw_id_to_i64(id.get())?,
                ],
            )
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "contradiction",
                id: id.get(),
            });
        }
        Ok(())
    }

    fn neighbors(
        &self,
        node: NodeId,
        kind: Option<EdgeKind>,
        direction: Direction,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError> {
        let guard = self.lock()?;
        let clause = match direction {
            Direction::Out => "src = ?1",
            Direction::In => "dst = ?1",
            Direction::Both => "(src = ?1 OR dst = ?1)",
        };
        let kind_label = kind.map(|kind| to_label(&kind)).transpose()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM edges WHERE {clause} AND status != 'retracted' AND \
                 valid_start <= ?2 AND (valid_end IS NULL OR valid_end > ?2) AND (?3 IS NULL OR \
                 kind = ?3) ORDER BY id"
            ))
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(
                params![raw_id_to_i64(node.get())?, at.as_unix_millis(), kind_label],
                |row| Ok(edge_from_row(row)),
            )
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn traverse(
        &self,
        root: NodeId,
        kinds: &[EdgeKind],
        max_depth: u32,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError> {
        let mut out = Vec::new();
        let mut visited = std::collections::BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        visited.insert(root.get());
        queue.push_back((root, 0_u32));
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.neighbors(node, None, Direction::Out, at)? {
                if !kinds.contains(&edge.kind) {
                    continue;
                }
                if visited.insert(edge.dst.get()) {
                    queue.push_back((edge.dst, depth + 1));
                }
                out.push(edge);
            }
        }
        Ok(out)
    }

    fn as_of(
        &self,
        event_time: Timestamp,
        ingest_time: Timestamp,
    ) -> Result<GraphView, StoreError> {
        let guard = self.lock()?;
        let mut edges = Vec::new();
        {
            let mut stmt = guard
                .prepare(&format!(
                    "SELECT {EDGE_COLUMNS} FROM edges WHERE event_start <= ?1 AND (event_end IS \
                     NULL OR event_end > ?1) AND ingested_at <= ?2 AND id NOT IN (SELECT \
                     supersedes FROM edges WHERE supersedes IS NOT NULL AND ingested_at <= ?2) \
                     ORDER BY id"
                ))
                .map_err(|err| map_db(&err))?;
            let rows = stmt
                .query_map(
                    params![event_time.as_unix_millis(), ingest_time.as_unix_millis()],
                    |row| Ok(edge_from_row(row)),
                )
                .map_err(|err| map_db(&err))?;
            for row in rows {
                edges.push(row.map_err(|err| map_db(&err))??);
            }
        }
        let mut claims = Vec::new();
        {
            let mut stmt = guard
                .prepare(&format!(
                    "SELECT {CLAIM_COLUMNS} FROM claims WHERE event_start <= ?1 AND (event_end \
                     IS NULL OR event_end > ?1) AND ingested_at <= ?2 AND id NOT IN (SELECT \
                     supersedes FROM claims WHERE supersedes IS NOT NULL AND ingested_at <= ?2) \
                     ORDER BY id"
                ))
                .map_err(|err| map_db(&err))?;
            let rows = stmt
                .query_map(
                    params![event_time.as_unix_millis(), ingest_time.as_unix_millis()],
                    |row| Ok(claim_from_row(row)),
                )
                .map_err(|err| map_db(&err))?;
            for row in rows {
                claims.push(row.map_err(|err| map_db(&err))??);
            }
        }
        Ok(GraphView {
            event_time,
            ingest_time,
            edges,
            claims,
        })
    }
}

// ============================================================================
// SECTION: Case Store
// ============================================================================

impl CaseStore for SqliteControlStores {
    fn create_case(
        &self,
        case_type: CaseType,
        scope: &ScopeId,
        now: Timestamp,
    ) -> Result<CaseId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO cases (case_type, scope, status, posture, created_at, resolved_at) \
                 VALUES (?1, ?2, 'open', NULL, ?3, NULL)",
                params![to_label(&case_type)?, scope.as_str(), now.as_unix_millis()],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        CaseId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))
    }

    fn case(&self, id: CaseId) -> Result<CaseRecord, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT id, case_type, scope, status, posture, created_at, resolved_at FROM \
                 cases WHERE id = ?1",
                params![raw_id_to_i64(id.get())?],
                |row| Ok(case_from_row(row)),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .ok_or(StoreError::NotFound {
                entity: "case",
                id: id.get(),
            })?
    }

    fn cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, case_type, scope, status, posture, created_at, resolved_at FROM \
                 cases ORDER BY id DESC",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt.query_map(params![], |row| Ok(case_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn set_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
        posture: Option<Posture>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let current = self.case(id)?;
        if current.status == CaseStatus::Resolved {
            return Err(StoreError::Conflict("case is resolved and append-only".to_string()));
        }
        let guard = self.lock()?;
        let resolved_at = if status == CaseStatus::Resolved {
            Some(now.as_unix_millis())
        } else {
            current.resolved_at.map(Timestamp::as_unix_millis)
        };
        let posture_label = match posture.or(current.posture) {
            Some(posture) => Some(to_label(&posture)?),
            None => None,
        };
        guard
            .execute(
                "UPDATE cases SET status = ?1, posture = ?2, resolved_at = ?3 WHERE id = ?4",
                params![to_label(&status)?, posture_label, resolved_at, raw_id_to_i64(id.get())?],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn record_missing(
        &self,
        request: NewMissingEvidence,
        now: Timestamp,
    ) -> Result<RequestId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO missing_evidence (case_id, source_system, request_type, \
                 params_json, reason, criticality, retryable, created_at, resolved_by_evidence) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                params![
                    raw_id_to_i64(request.case_id.get())?,
                    to_label(&request.source_system)?,
                    request.request_type,
                    to_json(&request.params)?,
                    request.reason,
                    to_label(&request.criticality)?,
                    i64::from(request.retryable),
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        RequestId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero request id".to_string()))
    }

    fn open_missing(&self, case: CaseId) -> Result<Vec<MissingEvidenceRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, case_id, source_system, request_type, params_json, reason, \
                 criticality, retryable, created_at, resolved_by_evidence FROM missing_evidence \
                 WHERE case_id = ?1 AND resolved_by_evidence IS NULL ORDER BY id",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(case.get())?], |row| Ok(missing_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn resolve_missing(
        &self,
        request: RequestId,
        evidence: EvidenceId,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE missing_evidence SET resolved_by_evidence = ?1 WHERE id = ?2",
                params![raw_id_to_i64(evidence.get())?, raw_id_to_i64(request.get())?],
            )
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "missing_evidence",
                id: request.get(),
            });
        }
        Ok(())
    }

    fn insert_action(&self, action: NewAction, now: Timestamp) -> Result<ActionId, StoreError> {
        if action.risk == ActionRisk::High && !action.requires_approval {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::ActionGovernance,
                row: 0,
                message: "high risk action must require approval".to_string(),
            });
        }
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO actions (case_id, action_type, args_json, risk, \
                 requires_approval, state, approved_at, approved_by, failure_reason, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'proposed', NULL, NULL, \
                 NULL, ?6, ?6)",
                params![
                    raw_id_to_i64(action.case_id.get())?,
                    to_label(&action.action_type)?,
                    to_json(&action.args)?,
                    to_label(&action.risk)?,
                    i64::from(action.requires_approval),
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        ActionId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero action id".to_string()))
    }

    fn action(&self, id: ActionId) -> Result<ActionRecord, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!("SELECT {ACTION_COLUMNS} FROM actions WHERE id = ?1"),
                params![raw_id_to_i64(id.get())?],
                |row| Ok(action_from_row(row)),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .ok_or(StoreError::NotFound {
                entity: "action",
                id: id.get(),
            })?
    }

    fn actions_for_case(&self, case: CaseId) -> Result<Vec<ActionRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {ACTION_COLUMNS} FROM actions WHERE case_id = ?1 ORDER BY id"
            ))
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(case.get())?], |row| Ok(action_from_row(row)))
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| map_db(&err))??);
        }
        Ok(out)
    }

    fn set_action_state(
        &self,
        id: ActionId,
        state: ActionState,
        approval: Option<(String, Timestamp)>,
        failure_reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let current = self.action(id)?;
        let approved_at = approval
            .as_ref()
            .map_or(current.approved_at, |(_, at)| Some(*at));
        if state == ActionState::Executing && current.requires_approval && approved_at.is_none() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::ActionGovernance,
                row: id.get(),
                message: "action requires approval before executing".to_string(),
            });
        }
        let guard = self.lock()?;
        guard
            .execute(
                "UPDATE actions SET state = ?1, approved_at = ?2, approved_by = ?3, \
                 failure_reason = COALESCE(?4, failure_reason), updated_at = ?5 WHERE id = ?6",
                params![
                    to_label(&state)?,
                    approved_at.map(Timestamp::as_unix_millis),
                    approval.map(|(actor, _)| actor).or(current.approved_by),
                    failure_reason,
                    now.as_unix_millis(),
                    raw_id_to_i64(id.get())?,
                ],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn record_outcome(&self, outcome: OutcomeRecord) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR REPLACE INTO outcomes (action_id, success, payload_json, \
                 recorded_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    raw_id_to_i64(outcome.action_id.get())?,
                    i64::from(outcome.success),
                    to_json(&outcome.payload)?,
                    outcome.recorded_at.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn outcome(&self, action: ActionId) -> Result<Option<OutcomeRecord>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT success, payload_json, recorded_at FROM outcomes WHERE action_id = ?1",
                params![raw_id_to_i64(action.get())?],
                |row| {
                    Ok((
                        row.get::<_, i64>(0),
                        row.get::<_, String>(1),
                        row.get::<_, i64>(2),
                    ))
                },
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .map(|(success, payload, recorded_at)| {
                Ok(OutcomeRecord {
                    action_id: action,
                    success: success.map_err(|err| map_db(&err))? != 0,
                    payload: from_json(&payload.map_err(|err| map_db(&err))?)?,
                    recorded_at: Timestamp::from_unix_millis(
                        recorded_at.map_err(|err| map_db(&err))?,
                    ),
                })
            })
            .transpose()
    }

    fn append_trace(
        &self,
        case: CaseId,
        kind: TraceKind,
        label: &str,
        reference: Option<String>,
        meta: Value,
        now: Timestamp,
    ) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| map_db(&err))?;
        let case_raw = raw_id_to_i64(case.get())?;
        let seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM trace_events WHERE case_id = ?1",
                params![case_raw],
                |row| row.get(0),
            )
            .map_err(|err| map_db(&err))?;
        tx.execute(
            "INSERT INTO trace_events (case_id, seq, kind, label, reference, meta_json, at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                case_raw,
                seq,
                to_label(&kind)?,
                label,
                reference,
                to_json(&meta)?,
                now.as_unix_millis(),
            ],
        )
        .map_err(|err| map_db(&err))?;
        tx.commit().map_err(|err| map_db(&err))?;
        raw_id(seq)
    }

    fn trace(&self, case: CaseId) -> Result<Vec<TraceEvent>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT seq, kind, label, reference, meta_json, at FROM trace_events WHERE \
                 case_id = ?1 ORDER BY seq",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![raw_id_to_i64(case.get())?], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let (seq, kind, label, reference, meta, at) = row.map_err(|err| map_db(&err))?;
            out.push(TraceEvent {
                case_id: case,
                seq: raw_id(seq)?,
                kind: from_label(&kind)?,
                label,
                reference,
                meta: from_json(&meta)?,
                at: Timestamp::from_unix_millis(at),
            });
        }
        Ok(out)
    }

    fn save_packet(&self, packet: &DecisionPacket) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let case_raw = raw_id_to_i64(packet.case_id.get())?;
        let serialized = to_json(packet)?;
        let existing: Option<String> = guard
            .query_row(
                "SELECT packet_json FROM packets WHERE case_id = ?1",
                params![case_raw],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| map_db(&err))?;
        if let Some(existing) = existing {
            if existing == serialized {
                return Ok(());
            }
            return Err(StoreError::Conflict("packet already sealed for case".to_string()));
        }
        guard
            .execute(
                "INSERT INTO packets (case_id, packet_json, sealed_at) VALUES (?1, ?2, ?3)",
                params![case_raw, serialized, packet.timestamps.sealed_at.as_unix_millis()],
            )
            .map_err(|err| map_db(&err))?;
        Ok(())
    }

    fn packet(&self, case: CaseId) -> Result<Option<DecisionPacket>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT packet_json FROM packets WHERE case_id = ?1",
                params![raw_id_to_i64(case.get())?],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| map_db(&err))?
            .map(|raw| from_json(&raw))
            .transpose()
    }
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

impl PolicyStore for SqliteControlStores {
    fn seed_policies(&self, policies: &[NewPolicy], now: Timestamp) -> Result<u32, StoreError> {
        let guard = self.lock()?;
        let mut inserted = 0_u32;
        for policy in policies {
            let changed = guard
                .execute(
                    "INSERT OR IGNORE INTO policies (text, conditions_json, effect_json, \
                     valid_start, valid_end, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        policy.text,
                        to_json(&policy.conditions)?,
                        to_json(&policy.effect)?,
                        policy.valid.start.as_unix_millis(),
                        policy.valid.end.map(Timestamp::as_unix_millis),
                        now.as_unix_millis(),
                    ],
                )
                .map_err(|err| map_db(&err))?;
            inserted += u32::try_from(changed).unwrap_or(0);
        }
        Ok(inserted)
    }

    fn policies_active_at(&self, at: Timestamp) -> Result<Vec<PolicyRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, text, conditions_json, effect_json, valid_start, valid_end, \
                 created_at FROM policies WHERE valid_start <= ?1 AND (valid_end IS NULL OR \
                 valid_end > ?1) ORDER BY id",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![at.as_unix_millis()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, text, conditions, effect, valid_start, valid_end, created_at) =
                row.map_err(|err| map_db(&err))?;
            out.push(PolicyRecord {
                policy_id: PolicyId::from_raw(raw_id(id)?)
                    .ok_or_else(|| StoreError::Corrupt("zero policy id".to_string()))?,
                text,
                conditions: from_json(&conditions)?,
                effect: from_json(&effect)?,
                valid: window(valid_start, valid_end),
                created_at: Timestamp::from_unix_millis(created_at),
            });
        }
        Ok(out)
    }
}

// ============================================================================
// SECTION: Playbook Store
// ============================================================================

impl PlaybookStore for SqliteControlStores {
    fn insert_playbook(
        &self,
        playbook: NewPlaybook,
        now: Timestamp,
    ) -> Result<PlaybookId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO playbooks (domain, pattern_json, actions_json, times_used, \
                 successes, mined_at, last_used_at, policy_snapshot_json, source_case) VALUES \
                 (?1, ?2, ?3, 1, 1, ?4, NULL, ?5, ?6)",
                params![
                    to_label(&playbook.domain)?,
                    to_json(&playbook.pattern)?,
                    to_json(&playbook.actions)?,
                    now.as_unix_millis(),
                    to_json(&playbook.policy_snapshot)?,
                    raw_id_to_i64(playbook.source_case.get())?,
                ],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        PlaybookId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero playbook id".to_string()))
    }

    fn playbooks(&self) -> Result<Vec<PlaybookRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, domain, pattern_json, actions_json, times_used, successes, \
                 mined_at, last_used_at, policy_snapshot_json, source_case FROM playbooks ORDER \
                 BY id",
            )
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, Option<i64>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, i64>(9)?,
                ))
            })
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, domain, pattern, actions, times_used, successes, mined_at, last_used_at, snapshot, source_case) =
                row.map_err(|err| map_db(&err))?;
            out.push(PlaybookRecord {
                playbook_id: PlaybookId::from_raw(raw_id(id)?)
                    .ok_or_else(|| StoreError::Corrupt("zero playbook id".to_string()))?,
                domain: from_label(&domain)?,
                pattern: from_json(&pattern)?,
                actions: from_json(&actions)?,
                stats: PlaybookStats {
                    times_used: u32::try_from(times_used).unwrap_or(0),
                    successes: u32::try_from(successes).unwrap_or(0),
                },
                mined_at: Timestamp::from_unix_millis(mined_at),
                last_used_at: last_used_at.map(Timestamp::from_unix_millis),
                policy_snapshot: from_json(&snapshot)?,
                source_case: CaseId::from_raw(raw_id(source_case)?)
                    .ok_or_else(|| StoreError::Corrupt("zero case id".to_string()))?,
            });
        }
        Ok(out)
    }

    fn touch_playbook(
        &self,
        id: PlaybookId,
        success: bool,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE playbooks SET times_used = times_used + 1, successes = successes + \
                 ?1, last_used_at = ?2 WHERE id = ?3",
                params![i64::from(success), now.as_unix_millis(), raw_id_to_i64(id.get())?],
            )
            .map_err(|err| map_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "playbook",
                id: id.get(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Webhook Store
// ============================================================================

impl WebhookStore for SqliteControlStores {
    fn register_webhook(
        &self,
        url: &str,
        events: &[GatewayEventKind],
        now: Timestamp,
    ) -> Result<WebhookId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO webhooks (url, events_json, created_at) VALUES (?1, ?2, ?3)",
                params![url, to_json(&events)?, now.as_unix_millis()],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        WebhookId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero webhook id".to_string()))
    }

    fn webhooks_for_event(
        &self,
        kind: GatewayEventKind,
    ) -> Result<Vec<WebhookRegistration>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare("SELECT id, url, events_json, created_at FROM webhooks ORDER BY id")
            .map_err(|err| map_db(&err))?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|err| map_db(&err))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, url, events, created_at) = row.map_err(|err| map_db(&err))?;
            let events: Vec<GatewayEventKind> = from_json(&events)?;
            if !events.contains(&kind) {
                continue;
            }
            out.push(WebhookRegistration {
                webhook_id: WebhookId::from_raw(raw_id(id)?)
                    .ok_or_else(|| StoreError::Corrupt("zero webhook id".to_string()))?,
                url,
                events,
                created_at: Timestamp::from_unix_millis(created_at),
            });
        }
        Ok(out)
    }

    fn record_delivery(
        &self,
        delivery: NewDelivery,
        now: Timestamp,
    ) -> Result<DeliveryId, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO webhook_deliveries (webhook_id, event_kind, attempts, \
                 last_status, success, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    raw_id_to_i64(delivery.webhook_id.get())?,
                    to_label(&delivery.event_kind)?,
                    i64::from(delivery.attempts),
                    delivery.last_status.map(i64::from),
                    i64::from(delivery.success),
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db(&err))?;
        let id = guard.last_insert_rowid();
        DeliveryId::from_raw(raw_id(id)?)
            .ok_or_else(|| StoreError::Corrupt("zero delivery id".to_string()))
    }
}
