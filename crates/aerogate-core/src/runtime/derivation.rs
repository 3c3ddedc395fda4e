// crates/aerogate-core/src/runtime/derivation.rs
// ============================================================================
// Module: Aerogate Signal Derivation
// Description: Projects ingested evidence into typed edges, claims, and contradictions.
// Purpose: Keep every derived fact bound to the exact evidence that supplied it.
// Dependencies: crate::{core, interfaces}, serde, serde_json
// ============================================================================

//! ## Overview
//! Derivation consumes newly ingested evidence rows for a case scope and
//! writes graph rows through the store, binding each produced edge and claim
//! to the evidence that supplied its attributes. Payloads are untrusted:
//! malformed documents yield derivation issues (converted upstream into
//! missing-evidence requests), never partial facts. Contradiction detection
//! runs after derivation over the per-source summaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::core::belief::FlightCategory;
use crate::core::case::Criticality;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ClaimKind;
use crate::core::graph::ClaimStatus;
use crate::core::graph::ContradictionKind;
use crate::core::graph::EdgeKind;
use crate::core::graph::EdgeStatus;
use crate::core::graph::NewClaim;
use crate::core::graph::NewContradiction;
use crate::core::graph::NewEdge;
use crate::core::graph::NodeKind;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::ContradictionId;
use crate::core::identifiers::EdgeId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ScopeId;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;
use crate::interfaces::GraphStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// FAA data older than this is stale when other sources are fresh.
pub const STALE_FAA_MINUTES: i64 = 15;

/// Strict movement-collapse threshold as a fraction of baseline.
pub const COLLAPSE_FRACTION: f64 = 0.5;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// One ingested evidence row with its parsed payload document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSample {
    /// Evidence row that supplied the payload.
    pub evidence_id: EvidenceId,
    /// Source system.
    pub source: SourceSystem,
    /// Parsed payload document.
    pub payload: Value,
    /// Retrieval timestamp.
    pub retrieved_at: Timestamp,
    /// Best-effort event-time window.
    pub event_time: TimeWindow,
}

/// Returns the criticality recorded when a source fails entirely.
#[must_use]
pub const fn fetch_criticality(source: SourceSystem) -> Criticality {
    match source {
        SourceSystem::FaaNas | SourceSystem::Metar | SourceSystem::Booking => {
            Criticality::Blocking
        }
        SourceSystem::NwsAlerts | SourceSystem::Taf => Criticality::Degraded,
        SourceSystem::Adsb | SourceSystem::Simulation => Criticality::Informational,
    }
}

// ============================================================================
// SECTION: Payload Shapes
// ============================================================================

/// FAA NAS status payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct FaaNasPayload {
    /// Ground stop in effect.
    #[serde(default)]
    pub ground_stop: bool,
    /// Ground delay program in effect.
    #[serde(default)]
    pub ground_delay: bool,
    /// Airport closure in effect.
    #[serde(default)]
    pub closure: bool,
    /// Average delay minutes, when reported.
    #[serde(default)]
    pub avg_delay_minutes: Option<f64>,
    /// Program end time (RFC 3339), when reported.
    #[serde(default)]
    pub end_time: Option<String>,
}

impl FaaNasPayload {
    /// Returns true when any disruption flag is set.
    #[must_use]
    pub const fn disrupted(&self) -> bool {
        self.ground_stop || self.ground_delay || self.closure
    }

    /// Returns the dominant disruption kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        if self.closure {
            "closure"
        } else if self.ground_stop {
            "ground_stop"
        } else if self.ground_delay {
            "ground_delay"
        } else {
            "normal"
        }
    }
}

/// METAR observation payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetarPayload {
    /// Reporting station, when present.
    #[serde(default)]
    pub station: Option<String>,
    /// Visibility in statute miles.
    pub visibility_sm: f64,
    /// Wind speed in knots, when reported.
    #[serde(default)]
    pub wind_kt: Option<f64>,
    /// Ceiling in feet AGL; `None` means unlimited.
    #[serde(default)]
    pub ceiling_ft: Option<u32>,
    /// Source-reported category, when present; recomputed otherwise.
    #[serde(default)]
    pub category: Option<String>,
}

impl MetarPayload {
    /// Returns the flight category, trusting the measured values.
    #[must_use]
    pub fn flight_category(&self) -> FlightCategory {
        FlightCategory::classify(self.visibility_sm, self.ceiling_ft)
    }
}

/// TAF forecast payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TafPayload {
    /// Forecast window start (RFC 3339).
    pub valid_from: String,
    /// Forecast window end (RFC 3339).
    pub valid_to: String,
    /// Forecast summary text, when present.
    #[serde(default)]
    pub summary: Option<String>,
}

/// NWS alert list payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct NwsAlertsPayload {
    /// Active alerts.
    #[serde(default)]
    pub alerts: Vec<NwsAlert>,
}

/// One NWS alert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NwsAlert {
    /// Alert severity (e.g. `Severe`, `Extreme`).
    pub severity: String,
    /// Alert certainty, when present.
    #[serde(default)]
    pub certainty: Option<String>,
    /// Alert headline.
    pub headline: String,
    /// Alert event name, when present.
    #[serde(default)]
    pub event: Option<String>,
}

impl NwsAlert {
    /// Returns true for severities that promote the alert edge to FACT.
    #[must_use]
    pub fn severe(&self) -> bool {
        matches!(self.severity.as_str(), "Severe" | "Extreme")
    }
}

/// ADS-B movement snapshot payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdsbPayload {
    /// Aircraft observed in the area.
    pub aircraft_count: u32,
    /// Baseline aircraft count for the hour.
    pub baseline_count: u32,
}

impl AdsbPayload {
    /// Strict-`<` collapse test against half the baseline.
    #[must_use]
    pub fn collapsed(&self) -> bool {
        f64::from(self.aircraft_count) < f64::from(self.baseline_count) * COLLAPSE_FRACTION
    }
}

// ============================================================================
// SECTION: Summaries
// ============================================================================

/// Per-source signal summaries consumed by contradiction detection and the
/// belief assembly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalSummary {
    /// FAA NAS summary.
    pub faa: Option<FaaSummary>,
    /// METAR summary.
    pub metar: Option<MetarSummary>,
    /// TAF summary.
    pub taf: Option<TafSummary>,
    /// NWS summary.
    pub nws: Option<NwsSummary>,
    /// Movement summary.
    pub movement: Option<MovementSummary>,
    /// Sources whose evidence exceeded the staleness bound.
    pub stale_sources: Vec<SourceSystem>,
}

/// FAA NAS signal summary.
#[derive(Debug, Clone, PartialEq)]
pub struct FaaSummary {
    /// Any disruption flag set.
    pub disrupted: bool,
    /// Dominant disruption kind label.
    pub kind: String,
    /// Retrieval timestamp of the FAA evidence.
    pub retrieved_at: Timestamp,
}

/// METAR signal summary.
#[derive(Debug, Clone, PartialEq)]
pub struct MetarSummary {
    /// Flight category at the published boundaries.
    pub category: FlightCategory,
    /// Visibility in statute miles.
    pub visibility_sm: f64,
    /// Ceiling in feet AGL.
    pub ceiling_ft: Option<u32>,
    /// Weather-risk claim, when one was produced.
    pub claim: Option<ClaimId>,
}

/// TAF signal summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TafSummary {
    /// Forecast validity window.
    pub window: TimeWindow,
}

/// NWS signal summary.
#[derive(Debug, Clone, PartialEq)]
pub struct NwsSummary {
    /// At least one Severe/Extreme alert is active.
    pub severe: bool,
    /// Active alert count.
    pub alert_count: u32,
}

/// Movement signal summary.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementSummary {
    /// Aircraft observed.
    pub count: u32,
    /// Baseline count.
    pub baseline: u32,
    /// Strict collapse flag.
    pub collapse: bool,
    /// Movement-collapse claim, when one was produced.
    pub claim: Option<ClaimId>,
}

/// A payload that could not be projected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationIssue {
    /// Source whose payload failed.
    pub source: SourceSystem,
    /// Failure description.
    pub reason: String,
}

/// Result of one derivation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Derived {
    /// Edges written this pass.
    pub edges: Vec<EdgeId>,
    /// Claims written this pass.
    pub claims: Vec<ClaimId>,
    /// Contradictions written this pass.
    pub contradictions: Vec<ContradictionId>,
    /// Per-source summaries.
    pub summary: SignalSummary,
    /// Payloads that failed projection.
    pub issues: Vec<DerivationIssue>,
}

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Projects ingested samples into graph rows for one case scope.
///
/// Every produced edge and claim is bound to the evidence row that supplied
/// its attributes. Sources absent from `samples` produce nothing here; the
/// orchestrator records their missing-evidence requests.
///
/// # Errors
///
/// Returns [`StoreError`] when a graph write fails or an invariant fires.
pub fn derive_signals(
    graph: &dyn GraphStore,
    case_id: CaseId,
    scope: &ScopeId,
    airport: NodeId,
    samples: &[SourceSample],
    now: Timestamp,
) -> Result<Derived, StoreError> {
    let mut derived = Derived::default();
    for sample in samples {
        let projected = match sample.source {
            SourceSystem::FaaNas => project_faa(graph, scope, airport, sample, now, &mut derived),
            SourceSystem::Metar => project_metar(graph, scope, airport, sample, now, &mut derived),
            SourceSystem::Taf => project_taf(graph, scope, airport, sample, now, &mut derived),
            SourceSystem::NwsAlerts => project_nws(graph, scope, airport, sample, now, &mut derived),
            SourceSystem::Adsb => project_adsb(graph, scope, airport, sample, now, &mut derived),
            SourceSystem::Booking | SourceSystem::Simulation => Ok(()),
        };
        match projected {
            Ok(()) => {}
            Err(ProjectError::Payload(reason)) => derived.issues.push(DerivationIssue {
                source: sample.source,
                reason,
            }),
            Err(ProjectError::Store(err)) => return Err(err),
        }
    }
    mark_stale_sources(samples, now, &mut derived.summary);
    derived.contradictions = detect_contradictions(graph, case_id, &derived.summary, now)?;
    Ok(derived)
}

/// Internal projection failure.
enum ProjectError {
    /// Payload failed validation; surfaced as a derivation issue.
    Payload(String),
    /// Store write failed; aborts the pass.
    Store(StoreError),
}

impl From<StoreError> for ProjectError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Parses a sample payload into a typed document.
fn parse_payload<T: for<'de> Deserialize<'de>>(sample: &SourceSample) -> Result<T, ProjectError> {
    serde_json::from_value(sample.payload.clone())
        .map_err(|err| ProjectError::Payload(err.to_string()))
}

/// Projects FAA NAS status into a `DisruptedBy` edge.
fn project_faa(
    graph: &dyn GraphStore,
    scope: &ScopeId,
    airport: NodeId,
    sample: &SourceSample,
    now: Timestamp,
    derived: &mut Derived,
) -> Result<(), ProjectError> {
    let payload: FaaNasPayload = parse_payload(sample)?;
    if payload.disrupted() {
        let condition = graph.upsert_node(
            NodeKind::Condition,
            &format!("{scope}:nas:{}", payload.kind()),
            now,
        )?;
        let edge = graph.insert_edge(
            NewEdge {
                src: airport,
                dst: condition,
                kind: EdgeKind::DisruptedBy,
                status: EdgeStatus::Fact,
                attrs: json!({
                    "kind": payload.kind(),
                    "magnitude": payload.avg_delay_minutes,
                    "end_time": payload.end_time,
                }),
                event_time: sample.event_time,
                valid: TimeWindow::open(now),
                source_system: SourceSystem::FaaNas,
                confidence: 0.95,
                supersedes: None,
                evidence: vec![sample.evidence_id],
            },
            now,
        )?;
        derived.edges.push(edge);
    }
    derived.summary.faa = Some(FaaSummary {
        disrupted: payload.disrupted(),
        kind: payload.kind().to_string(),
        retrieved_at: sample.retrieved_at,
    });
    Ok(())
}

/// Projects a METAR observation into a `HasWeather` edge and, below the
/// instrument thresholds, a weather-risk claim.
fn project_metar(
    graph: &dyn GraphStore,
    scope: &ScopeId,
    airport: NodeId,
    sample: &SourceSample,
    now: Timestamp,
    derived: &mut Derived,
) -> Result<(), ProjectError> {
    let payload: MetarPayload = parse_payload(sample)?;
    let category = payload.flight_category();
    let observation = graph.upsert_node(
        NodeKind::WeatherObservation,
        &format!("{scope}:metar:{}", sample.retrieved_at.as_unix_millis()),
        now,
    )?;
    let edge = graph.insert_edge(
        NewEdge {
            src: airport,
            dst: observation,
            kind: EdgeKind::HasWeather,
            status: EdgeStatus::Fact,
            attrs: json!({
                "visibility_sm": payload.visibility_sm,
                "wind_kt": payload.wind_kt,
                "ceiling_ft": payload.ceiling_ft,
                "category": category.as_str(),
            }),
            event_time: sample.event_time,
            valid: TimeWindow::open(now),
            source_system: SourceSystem::Metar,
            confidence: 0.95,
            supersedes: None,
            evidence: vec![sample.evidence_id],
        },
        now,
    )?;
    derived.edges.push(edge);
    let claim = if category.is_instrument() {
        let ceiling = payload.ceiling_ft.map_or_else(|| "unlimited".to_string(), |c| c.to_string());
        let claim = graph.insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::WeatherRisk,
                text: format!(
                    "surface weather at {scope} is {}: visibility {} sm, ceiling {ceiling} ft",
                    category.as_str(),
                    payload.visibility_sm,
                ),
                status: ClaimStatus::Fact,
                confidence: 0.9,
                event_time: sample.event_time,
                supersedes: None,
                evidence: vec![sample.evidence_id],
            },
            now,
        )?;
        derived.claims.push(claim);
        Some(claim)
    } else {
        None
    };
    derived.summary.metar = Some(MetarSummary {
        category,
        visibility_sm: payload.visibility_sm,
        ceiling_ft: payload.ceiling_ft,
        claim,
    });
    Ok(())
}

/// Projects a TAF forecast into a `HasForecast` edge with validity equal to
/// the forecast window.
fn project_taf(
    graph: &dyn GraphStore,
    scope: &ScopeId,
    airport: NodeId,
    sample: &SourceSample,
    now: Timestamp,
    derived: &mut Derived,
) -> Result<(), ProjectError> {
    let payload: TafPayload = parse_payload(sample)?;
    let start = Timestamp::from_rfc3339(&payload.valid_from)
        .map_err(|err| ProjectError::Payload(err.to_string()))?;
    let end = Timestamp::from_rfc3339(&payload.valid_to)
        .map_err(|err| ProjectError::Payload(err.to_string()))?;
    let window = TimeWindow::closed(start, end);
    let forecast = graph.upsert_node(
        NodeKind::WeatherForecast,
        &format!("{scope}:taf:{}", start.as_unix_millis()),
        now,
    )?;
    let edge = graph.insert_edge(
        NewEdge {
            src: airport,
            dst: forecast,
            kind: EdgeKind::HasForecast,
            status: EdgeStatus::Fact,
            attrs: json!({ "summary": payload.summary }),
            event_time: window,
            valid: window,
            source_system: SourceSystem::Taf,
            confidence: 0.9,
            supersedes: None,
            evidence: vec![sample.evidence_id],
        },
        now,
    )?;
    derived.edges.push(edge);
    derived.summary.taf = Some(TafSummary {
        window,
    });
    Ok(())
}

/// Projects NWS alerts into `HasAlert` edges; Severe/Extreme promote to FACT.
fn project_nws(
    graph: &dyn GraphStore,
    scope: &ScopeId,
    airport: NodeId,
    sample: &SourceSample,
    now: Timestamp,
    derived: &mut Derived,
) -> Result<(), ProjectError> {
    let payload: NwsAlertsPayload = parse_payload(sample)?;
    let mut severe = false;
    for (index, alert) in payload.alerts.iter().enumerate() {
        severe = severe || alert.severe();
        let node = graph.upsert_node(
            NodeKind::Alert,
            &format!("{scope}:nws:{}:{index}", sample.retrieved_at.as_unix_millis()),
            now,
        )?;
        let status = if alert.severe() {
            EdgeStatus::Fact
        } else {
            EdgeStatus::Draft
        };
        let edge = graph.insert_edge(
            NewEdge {
                src: airport,
                dst: node,
                kind: EdgeKind::HasAlert,
                status,
                attrs: json!({
                    "severity": alert.severity,
                    "certainty": alert.certainty,
                    "headline": alert.headline,
                    "event": alert.event,
                }),
                event_time: sample.event_time,
                valid: TimeWindow::open(now),
                source_system: SourceSystem::NwsAlerts,
                confidence: 0.9,
                supersedes: None,
                evidence: vec![sample.evidence_id],
            },
            now,
        )?;
        derived.edges.push(edge);
    }
    derived.summary.nws = Some(NwsSummary {
        severe,
        alert_count: u32::try_from(payload.alerts.len()).unwrap_or(u32::MAX),
    });
    Ok(())
}

/// Projects an ADS-B snapshot into a `HasMovement` edge and, strictly below
/// half the baseline, a movement-collapse claim.
fn project_adsb(
    graph: &dyn GraphStore,
    scope: &ScopeId,
    airport: NodeId,
    sample: &SourceSample,
    now: Timestamp,
    derived: &mut Derived,
) -> Result<(), ProjectError> {
    let payload: AdsbPayload = parse_payload(sample)?;
    let snapshot = graph.upsert_node(
        NodeKind::MovementSnapshot,
        &format!("{scope}:adsb:{}", sample.retrieved_at.as_unix_millis()),
        now,
    )?;
    let edge = graph.insert_edge(
        NewEdge {
            src: airport,
            dst: snapshot,
            kind: EdgeKind::HasMovement,
            status: EdgeStatus::Fact,
            attrs: json!({
                "aircraft_count": payload.aircraft_count,
                "baseline_count": payload.baseline_count,
            }),
            event_time: sample.event_time,
            valid: TimeWindow::open(now),
            source_system: SourceSystem::Adsb,
            confidence: 0.85,
            supersedes: None,
            evidence: vec![sample.evidence_id],
        },
        now,
    )?;
    derived.edges.push(edge);
    let claim = if payload.collapsed() {
        let claim = graph.insert_claim(
            NewClaim {
                subject: airport,
                kind: ClaimKind::MovementCollapse,
                text: format!(
                    "aircraft movement at {scope} collapsed: {} observed against baseline {}",
                    payload.aircraft_count, payload.baseline_count,
                ),
                status: ClaimStatus::Fact,
                confidence: 0.85,
                event_time: sample.event_time,
                supersedes: None,
                evidence: vec![sample.evidence_id],
            },
            now,
        )?;
        derived.claims.push(claim);
        Some(claim)
    } else {
        None
    };
    derived.summary.movement = Some(MovementSummary {
        count: payload.aircraft_count,
        baseline: payload.baseline_count,
        collapse: payload.collapsed(),
        claim,
    });
    Ok(())
}

/// Flags samples retrieved beyond the staleness bound.
fn mark_stale_sources(samples: &[SourceSample], now: Timestamp, summary: &mut SignalSummary) {
    let bound = STALE_FAA_MINUTES * 60_000;
    for sample in samples {
        if now.millis_since(sample.retrieved_at) > bound
            && !summary.stale_sources.contains(&sample.source)
        {
            summary.stale_sources.push(sample.source);
        }
    }
}

// ============================================================================
// SECTION: Contradiction Detection
// ============================================================================

/// Detects the four fixed contradiction patterns over the signal summaries.
///
/// # Errors
///
/// Returns [`StoreError`] when a contradiction write fails.
pub fn detect_contradictions(
    graph: &dyn GraphStore,
    case_id: CaseId,
    summary: &SignalSummary,
    now: Timestamp,
) -> Result<Vec<ContradictionId>, StoreError> {
    let mut found = Vec::new();
    let faa_normal = summary.faa.as_ref().is_some_and(|faa| !faa.disrupted);
    if faa_normal
        && let Some(metar) = &summary.metar
        && metar.category.is_instrument()
    {
        found.push(graph.insert_contradiction(
            NewContradiction {
                case_id,
                kind: ContradictionKind::FaaNormalVsIfr,
                left_claim: metar.claim,
                right_claim: None,
                detail: format!(
                    "faa reports normal operations while surface weather is {}",
                    metar.category.as_str(),
                ),
            },
            now,
        )?);
    }
    if faa_normal
        && let Some(movement) = &summary.movement
        && movement.collapse
    {
        found.push(graph.insert_contradiction(
            NewContradiction {
                case_id,
                kind: ContradictionKind::FaaNormalVsCollapse,
                left_claim: movement.claim,
                right_claim: None,
                detail: format!(
                    "faa reports normal operations while movement is {} of baseline {}",
                    movement.count, movement.baseline,
                ),
            },
            now,
        )?);
    }
    if let Some(metar) = &summary.metar
        && metar.category == FlightCategory::Vfr
        && let Some(movement) = &summary.movement
        && movement.collapse
    {
        found.push(graph.insert_contradiction(
            NewContradiction {
                case_id,
                kind: ContradictionKind::VfrVsCollapse,
                left_claim: movement.claim,
                right_claim: None,
                detail: "vfr weather with collapsed movement".to_string(),
            },
            now,
        )?);
    }
    if let Some(faa) = &summary.faa
        && summary.stale_sources.contains(&SourceSystem::FaaNas)
        && fresher_source_exists(summary)
    {
        found.push(graph.insert_contradiction(
            NewContradiction {
                case_id,
                kind: ContradictionKind::StaleFaa,
                left_claim: None,
                right_claim: None,
                detail: format!(
                    "faa data from {} is older than {STALE_FAA_MINUTES} minutes while other sources are fresh",
                    faa.retrieved_at.as_unix_millis(),
                ),
            },
            now,
        )?);
    }
    Ok(found)
}

/// Returns true when any non-FAA source escaped the stale set.
fn fresher_source_exists(summary: &SignalSummary) -> bool {
    let fresh = |source: SourceSystem, present: bool| {
        present && !summary.stale_sources.contains(&source)
    };
    fresh(SourceSystem::Metar, summary.metar.is_some())
        || fresh(SourceSystem::Taf, summary.taf.is_some())
        || fresh(SourceSystem::NwsAlerts, summary.nws.is_some())
        || fresh(SourceSystem::Adsb, summary.movement.is_some())
}
