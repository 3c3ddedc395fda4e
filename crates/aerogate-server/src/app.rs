// crates/aerogate-server/src/app.rs
// ============================================================================
// Module: Aerogate REST Surface
// Description: Axum router, handlers, and SSE run streaming.
// Purpose: Expose case orchestration and audit reads over HTTP.
// Dependencies: aerogate-core, aerogate-dispatch, aerogate-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! The server wires the synchronous core behind an async surface: every
//! orchestration run executes inside `spawn_blocking`, with an observer
//! bridging state transitions into a server-sent-event stream. The thirteen
//! seed policies are planted at startup, idempotently on their unique texts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use aerogate_core::CancelToken;
use aerogate_core::CaseId;
use aerogate_core::CaseStore;
use aerogate_core::CaseType;
use aerogate_core::Clock;
use aerogate_core::EventSink;
use aerogate_core::EvidenceStore;
use aerogate_core::GatewayEventKind;
use aerogate_core::GraphStore;
use aerogate_core::NodeKind;
use aerogate_core::NullPacketSink;
use aerogate_core::Orchestrator;
use aerogate_core::OrchestratorConfig;
use aerogate_core::PacketSink;
use aerogate_core::PlaybookPattern;
use aerogate_core::PolicyStore;
use aerogate_core::Posture;
use aerogate_core::RiskAssessor;
use aerogate_core::RiskLevel;
use aerogate_core::RunObserver;
use aerogate_core::RunReport;
use aerogate_core::ScopeId;
use aerogate_core::SignalSource;
use aerogate_core::SourceSystem;
use aerogate_core::Timestamp;
use aerogate_core::runtime::ProgressSnapshot;
use aerogate_core::runtime::learner;
use aerogate_core::runtime::packet::cascade_impact;
use aerogate_core::seed_policies;
use aerogate_dispatch::WebhookConfig;
use aerogate_dispatch::WebhookDispatcher;
use aerogate_dispatch::validate_webhook_url;
use aerogate_store_sqlite::SqliteControlStores;
use aerogate_store_sqlite::SqliteStoreConfig;
use aerogate_store_sqlite::SqliteStoreError;
use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::assess::HeuristicRiskAssessor;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::scenario::ScenarioSignalSource;
use crate::scenario::scenario_by_id;
use crate::scenario::scenarios;
use crate::scenario::seed_airport;
use crate::telemetry::MetricsRecorder;
use crate::telemetry::NullRecorder;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock time source for the server edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::from_unix_millis(millis)
    }
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Durable stores.
    pub stores: Arc<SqliteControlStores>,
    /// Signal source capability.
    pub signals: Arc<dyn SignalSource>,
    /// Risk assessor capability.
    pub assessor: Arc<dyn RiskAssessor>,
    /// Event fan-out (webhook dispatcher).
    pub events: Arc<dyn EventSink>,
    /// Packet export sink.
    pub packets: Arc<dyn PacketSink>,
    /// Host clock.
    pub clock: Arc<dyn Clock>,
    /// Metrics recorder.
    pub metrics: Arc<dyn MetricsRecorder>,
}

impl AppState {
    /// Opens the stores, plants seed policies, and wires the capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened.
    pub fn bootstrap(config: &ServerConfig) -> Result<Self, SqliteStoreError> {
        let stores = Arc::new(SqliteControlStores::open(&SqliteStoreConfig {
            path: config.database_path.clone(),
            evidence_root: config.evidence_root.clone(),
            busy_timeout_ms: 5_000,
            journal_mode: aerogate_store_sqlite::SqliteStoreMode::Wal,
            sync_mode: aerogate_store_sqlite::SqliteSyncMode::Full,
        })?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let now = clock.now();
        stores
            .seed_policies(&seed_policies(now), now)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let events: Arc<dyn EventSink> = Arc::new(WebhookDispatcher::new(
            Arc::clone(&stores),
            Arc::clone(&clock),
            WebhookConfig {
                timeout_ms: config.webhook_timeout_ms,
                ..WebhookConfig::default()
            },
        ));
        Ok(Self {
            stores,
            signals: Arc::new(ScenarioSignalSource),
            assessor: Arc::new(HeuristicRiskAssessor),
            events,
            packets: Arc::new(NullPacketSink),
            clock,
            metrics: Arc::new(NullRecorder),
        })
    }

    /// Runs one case on the blocking pool.
    async fn run_case(
        &self,
        case_id: CaseId,
        observer: Option<ChannelObserver>,
    ) -> Result<RunReport, ApiError> {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let orchestrator = Orchestrator::new(
                state.stores.as_ref(),
                state.signals.as_ref(),
                state.assessor.as_ref(),
                state.events.as_ref(),
                state.packets.as_ref(),
                state.clock.as_ref(),
                OrchestratorConfig::default(),
            );
            match observer {
                Some(observer) => {
                    orchestrator.run_observed(case_id, &observer, &CancelToken::new())
                }
                None => orchestrator.run(case_id),
            }
        })
        .await
        .map_err(|err| ApiError::internal(format!("run worker failed: {err}")))?
        .map_err(ApiError::from)
    }
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Body for case creation.
#[derive(Debug, Deserialize)]
pub struct CreateCaseBody {
    /// Case type.
    pub case_type: CaseType,
    /// Case scope (airport or lane).
    pub scope: String,
}

/// Response for case creation.
#[derive(Debug, Serialize)]
pub struct CreateCaseResponse {
    /// New case identifier.
    pub case_id: u64,
    /// Best-scoring playbook for the scope, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook_suggested: Option<u64>,
}

/// Run report summary returned by run endpoints.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Case identifier.
    pub case_id: u64,
    /// Final state label.
    pub final_state: &'static str,
    /// Final case status.
    pub status: &'static str,
    /// Emitted posture, when one was emitted.
    pub posture: Option<&'static str>,
    /// Actions proposed.
    pub actions_proposed: u32,
    /// Actions executed.
    pub actions_executed: u32,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            case_id: report.case_id.get(),
            final_state: report.final_state,
            status: report.status.as_str(),
            posture: report.posture.map(Posture::as_str),
            actions_proposed: report.actions_proposed,
            actions_executed: report.actions_executed,
        }
    }
}

/// Body for bi-temporal reads.
#[derive(Debug, Deserialize)]
pub struct BitemporalBody {
    /// Event time (RFC 3339).
    pub event_time: String,
    /// Ingest time (RFC 3339).
    pub ingest_time: String,
}

/// Body for webhook registration.
#[derive(Debug, Deserialize)]
pub struct RegisterWebhookBody {
    /// Endpoint URL.
    pub url: String,
    /// Subscribed event kinds.
    pub events: Vec<GatewayEventKind>,
}

/// Query for simulation seeding.
#[derive(Debug, Deserialize, Default)]
pub struct SeedQuery {
    /// Retract a previous fixture before seeding.
    #[serde(default)]
    pub refresh: bool,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full REST router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cases", post(create_case))
        .route("/cases/{id}/run", post(run_case))
        .route("/cases/{id}/run/stream", get(stream_case_run))
        .route("/ingest/airport/{icao}", post(ingest_airport))
        .route("/packets/{case_id}", get(get_packet))
        .route("/graph/bitemporal/beliefs", post(bitemporal_beliefs))
        .route("/graph/cascade/{icao}", get(cascade))
        .route(
            "/simulation/seed/airport/{icao}",
            post(simulation_seed).delete(simulation_clear),
        )
        .route("/simulation/scenarios", get(list_scenarios))
        .route("/simulation/run/{id}", post(run_scenario))
        .route("/webhooks/register", post(register_webhook))
        .with_state(state)
}

// ============================================================================
// SECTION: Case Handlers
// ============================================================================

/// POST /cases
async fn create_case(
    State(state): State<AppState>,
    Json(body): Json<CreateCaseBody>,
) -> Result<Json<CreateCaseResponse>, ApiError> {
    let now = state.clock.now();
    let scope = ScopeId::new(body.scope);
    let case_id = state.stores.create_case(body.case_type, &scope, now)?;
    let query = PlaybookPattern {
        case_type: body.case_type,
        evidence_sources: Vec::new(),
        contradiction_kinds: Vec::new(),
        risk_level: RiskLevel::Medium,
    };
    let playbook_suggested = learner::retrieve(state.stores.as_ref(), &query, now)?
        .into_iter()
        .find(|hit| hit.score > 0.0)
        .map(|hit| hit.playbook.playbook_id.get());
    Ok(Json(CreateCaseResponse {
        case_id: case_id.get(),
        playbook_suggested,
    }))
}

/// POST /cases/{id}/run
async fn run_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<RunSummary>, ApiError> {
    let case_id =
        CaseId::from_raw(id).ok_or_else(|| ApiError::not_found(format!("case {id}")))?;
    let report = state.run_case(case_id, None).await?;
    Ok(Json(RunSummary::from(&report)))
}

/// Observer bridging run progress into an SSE channel.
struct ChannelObserver {
    /// Event channel.
    tx: tokio::sync::mpsc::UnboundedSender<serde_json::Value>,
}

impl RunObserver for ChannelObserver {
    fn on_transition(&self, state: &'static str, description: &str, condition: Option<&str>) {
        let mut event = json!({
            "event": "state_transition",
            "to_state": state,
            "handler": state,
            "description": description,
        });
        if let (Some(condition), Some(map)) = (condition, event.as_object_mut()) {
            map.insert("condition".to_string(), json!(condition));
        }
        let _ = self.tx.send(event);
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = self.tx.send(json!({
            "event": "progress",
            "state": snapshot.state,
            "description": snapshot.description,
            "evidence_count": snapshot.evidence_count,
            "claim_count": snapshot.claim_count,
            "uncertainty_count": snapshot.uncertainty_count,
            "risk_level": snapshot.risk_level.map(RiskLevel::as_str),
            "recommended_posture": snapshot.recommended_posture.map(Posture::as_str),
            "confidence": snapshot.confidence,
        }));
    }
}

/// GET /cases/{id}/run/stream
async fn stream_case_run(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let case_id =
        CaseId::from_raw(id).ok_or_else(|| ApiError::not_found(format!("case {id}")))?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let _ = tx.send(json!({ "event": "started" }));
    let worker_tx = tx.clone();
    tokio::spawn(async move {
        let observer = ChannelObserver {
            tx: worker_tx.clone(),
        };
        match state.run_case(case_id, Some(observer)).await {
            Ok(report) => {
                let _ = worker_tx.send(json!({
                    "event": "completed",
                    "final_state": report.final_state,
                    "status": report.status.as_str(),
                    "actions_executed": report.actions_executed,
                    "actions_proposed": report.actions_proposed,
                }));
            }
            Err(err) => {
                let _ = worker_tx.send(json!({ "event": "error", "error": err.detail }));
            }
        }
    });
    let stream = UnboundedReceiverStream::new(rx)
        .map(|value| Ok(Event::default().data(value.to_string())));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ============================================================================
// SECTION: Ingest and Audit Handlers
// ============================================================================

/// POST /ingest/airport/{icao}
async fn ingest_airport(
    State(state): State<AppState>,
    Path(icao): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = ScopeId::new(icao);
    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let now = worker_state.clock.now();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for source in SourceSystem::investigation_set() {
            match worker_state.signals.fetch(source, &scope) {
                Ok(fetch) => {
                    let ingest = aerogate_core::EvidenceIngest {
                        source_system: source,
                        source_ref: fetch.source_ref,
                        content_type: fetch.content_type,
                        payload: fetch.bytes,
                        event_time: fetch.source_time,
                        meta: json!({ "scope": scope.as_str() }),
                    };
                    match worker_state.stores.put_evidence(ingest, now) {
                        Ok(_) => succeeded.push(source.as_str()),
                        Err(err) => {
                            failed.push(source.as_str());
                            errors.push(err.to_string());
                        }
                    }
                }
                Err(err) => {
                    failed.push(source.as_str());
                    errors.push(err.to_string());
                }
            }
        }
        json!({
            "sources_succeeded": succeeded,
            "sources_failed": failed,
            "errors": errors,
        })
    })
    .await
    .map_err(|err| ApiError::internal(format!("ingest worker failed: {err}")))?;
    Ok(Json(result))
}

/// GET /packets/{case_id}
async fn get_packet(
    State(state): State<AppState>,
    Path(case_id): Path<u64>,
) -> Result<Json<aerogate_core::DecisionPacket>, ApiError> {
    let case_id = CaseId::from_raw(case_id)
        .ok_or_else(|| ApiError::not_found(format!("case {case_id}")))?;
    state
        .stores
        .packet(case_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("packet for case {case_id}")))
}

/// POST /graph/bitemporal/beliefs
async fn bitemporal_beliefs(
    State(state): State<AppState>,
    Json(body): Json<BitemporalBody>,
) -> Result<Json<aerogate_core::GraphView>, ApiError> {
    let event_time = Timestamp::from_rfc3339(&body.event_time)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let ingest_time = Timestamp::from_rfc3339(&body.ingest_time)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(Json(state.stores.as_of(event_time, ingest_time)?))
}

/// GET /graph/cascade/{icao}
async fn cascade(
    State(state): State<AppState>,
    Path(icao): Path<String>,
) -> Result<Json<aerogate_core::CascadeImpact>, ApiError> {
    let node = state
        .stores
        .node(NodeKind::Airport, &icao)?
        .ok_or_else(|| ApiError::not_found(format!("airport {icao}")))?;
    let impact = cascade_impact(state.stores.as_ref(), node.node_id, state.clock.now())?;
    Ok(Json(impact))
}

// ============================================================================
// SECTION: Simulation Handlers
// ============================================================================

/// POST /simulation/seed/airport/{icao}
async fn simulation_seed(
    State(state): State<AppState>,
    Path(icao): Path<String>,
    Query(query): Query<SeedQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = ScopeId::new(icao);
    let report =
        seed_airport(state.stores.as_ref(), &scope, query.refresh, state.clock.as_ref())?;
    Ok(Json(json!({
        "seed_used": scope.as_str(),
        "nodes_created": report.nodes_created,
        "cleared": report.cleared,
    })))
}

/// DELETE /simulation/seed/airport/{icao}
///
/// The graph is append-only, so deletion retracts the seeded edges and keeps
/// nodes in place.
async fn simulation_clear(
    State(state): State<AppState>,
    Path(icao): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = ScopeId::new(icao);
    let cleared =
        crate::scenario::clear_airport(state.stores.as_ref(), &scope, state.clock.now())?;
    Ok(Json(json!({ "edges_deleted": cleared, "nodes_deleted": 0 })))
}

/// GET /simulation/scenarios
async fn list_scenarios(State(_state): State<AppState>) -> Json<serde_json::Value> {
    let catalog: Vec<_> = scenarios()
        .into_iter()
        .map(|scenario| {
            json!({
                "id": scenario.id,
                "scope": scenario.scope,
                "description": scenario.description,
            })
        })
        .collect();
    Json(json!({ "scenarios": catalog }))
}

/// POST /simulation/run/{id}
async fn run_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunSummary>, ApiError> {
    let scenario =
        scenario_by_id(&id).ok_or_else(|| ApiError::not_found(format!("scenario {id}")))?;
    let now = state.clock.now();
    let scope = ScopeId::new(scenario.scope);
    seed_airport(state.stores.as_ref(), &scope, true, state.clock.as_ref())?;
    let case_id = state.stores.create_case(CaseType::AirportDisruption, &scope, now)?;
    let report = state.run_case(case_id, None).await?;
    Ok(Json(RunSummary::from(&report)))
}

// ============================================================================
// SECTION: Webhook Handlers
// ============================================================================

/// POST /webhooks/register
async fn register_webhook(
    State(state): State<AppState>,
    Json(body): Json<RegisterWebhookBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_webhook_url(&body.url).map_err(|err| ApiError::bad_request(err.to_string()))?;
    if body.events.is_empty() {
        return Err(ApiError::bad_request("at least one event kind is required"));
    }
    let webhook_id = aerogate_core::WebhookStore::register_webhook(
        state.stores.as_ref(),
        &body.url,
        &body.events,
        state.clock.now(),
    )?;
    Ok(Json(json!({ "webhook_id": webhook_id.get() })))
}
