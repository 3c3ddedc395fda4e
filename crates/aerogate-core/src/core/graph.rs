// crates/aerogate-core/src/core/graph.rs
// ============================================================================
// Module: Aerogate Context Graph Model
// Description: Append-only nodes, versioned attributes, bi-temporal edges and claims.
// Purpose: Capture evidence-bound facts with full event-time/ingest-time history.
// Dependencies: crate::core::{evidence, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The context graph is append-only. Nodes are immutable; attribute changes
//! create chained `NodeVersion` rows. Edges and claims carry bi-temporal
//! stamps (event-time window plus ingest time) and a supersedes back-reference
//! so every audit read can be replayed point-in-time. FACT status always
//! requires at least one evidence binding; the stores enforce that invariant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::evidence::SourceSystem;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::ContradictionId;
use crate::core::identifiers::EdgeId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::NodeVersionId;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Nodes
// ============================================================================

/// Graph node kinds.
///
/// # Invariants
/// - Variants are stable for serialization and identity matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Airport gateway.
    Airport,
    /// Scheduled flight.
    Flight,
    /// Shipment in transit.
    Shipment,
    /// Customer booking.
    Booking,
    /// Forwarding customer.
    Customer,
    /// Disruption condition (ground stop, delay program, closure).
    Condition,
    /// Surface weather observation.
    WeatherObservation,
    /// Terminal weather forecast.
    WeatherForecast,
    /// Weather service alert.
    Alert,
    /// Aircraft movement snapshot.
    MovementSnapshot,
}

impl NodeKind {
    /// Returns a stable label for the node kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Airport => "airport",
            Self::Flight => "flight",
            Self::Shipment => "shipment",
            Self::Booking => "booking",
            Self::Customer => "customer",
            Self::Condition => "condition",
            Self::WeatherObservation => "weather_observation",
            Self::WeatherForecast => "weather_forecast",
            Self::Alert => "alert",
            Self::MovementSnapshot => "movement_snapshot",
        }
    }
}

/// Immutable graph node row.
///
/// # Invariants
/// - `(kind, identifier)` is unique in the store.
/// - Node rows never change after insert; attributes live on versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node identifier.
    pub node_id: NodeId,
    /// Node kind.
    pub kind: NodeKind,
    /// Kind-scoped identity string (e.g. `KJFK`, `TRK-1234`).
    pub identifier: String,
    /// Insert timestamp.
    pub created_at: Timestamp,
}

/// Versioned node attributes with a validity window and supersedes chain.
///
/// # Invariants
/// - At most one version per node has an open `valid` window.
/// - `supersedes` chains versions oldest-to-newest without cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersionRecord {
    /// Version identifier.
    pub version_id: NodeVersionId,
    /// Owning node.
    pub node_id: NodeId,
    /// Attribute document for this version.
    pub attrs: Value,
    /// Validity window; open end means current.
    pub valid: TimeWindow,
    /// Previous version superseded by this one.
    pub supersedes: Option<NodeVersionId>,
}

// ============================================================================
// SECTION: Edges
// ============================================================================

/// Typed edge kinds.
///
/// # Invariants
/// - Variants are stable for serialization and traversal matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Airport is disrupted by a condition.
    DisruptedBy,
    /// Airport has a surface weather observation.
    HasWeather,
    /// Airport has a terminal forecast.
    HasForecast,
    /// Airport has an active weather alert.
    HasAlert,
    /// Airport has a movement snapshot.
    HasMovement,
    /// Airport serves a flight.
    Serves,
    /// Flight carries a shipment.
    Carries,
    /// Shipment is booked under a booking.
    BookedUnder,
}

impl EdgeKind {
    /// Returns a stable label for the edge kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisruptedBy => "disrupted_by",
            Self::HasWeather => "has_weather",
            Self::HasForecast => "has_forecast",
            Self::HasAlert => "has_alert",
            Self::HasMovement => "has_movement",
            Self::Serves => "serves",
            Self::Carries => "carries",
            Self::BookedUnder => "booked_under",
        }
    }
}

/// Edge lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    /// Derived but not yet promoted.
    Draft,
    /// Promoted fact; requires at least one evidence binding.
    Fact,
    /// Retracted; kept for audit.
    Retracted,
}

/// Directed typed edge with bi-temporal stamps.
///
/// # Invariants
/// - `status == Fact` implies at least one evidence binding exists.
/// - `confidence` lies in `[0, 1]`.
/// - Rows are never updated destructively; supersession chains replacements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge identifier.
    pub edge_id: EdgeId,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Edge kind.
    pub kind: EdgeKind,
    /// Lifecycle status.
    pub status: EdgeStatus,
    /// Attribute document.
    pub attrs: Value,
    /// Event-time window (when the fact is true in the world).
    pub event_time: TimeWindow,
    /// Ingest timestamp (when the system learned the fact).
    pub ingested_at: Timestamp,
    /// Validity window for reads.
    pub valid: TimeWindow,
    /// Source system that supplied the fact.
    pub source_system: SourceSystem,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Edge superseded by this row.
    pub supersedes: Option<EdgeId>,
}

/// Input for an edge insert.
///
/// # Invariants
/// - `status == Fact` requires a non-empty `evidence` list; the store binds the
///   rows in the same logical transaction as the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Edge kind.
    pub kind: EdgeKind,
    /// Lifecycle status at insert.
    pub status: EdgeStatus,
    /// Attribute document.
    pub attrs: Value,
    /// Event-time window.
    pub event_time: TimeWindow,
    /// Validity window.
    pub valid: TimeWindow,
    /// Source system that supplied the fact.
    pub source_system: SourceSystem,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Edge superseded by this row.
    pub supersedes: Option<EdgeId>,
    /// Evidence rows bound at insert.
    pub evidence: Vec<EvidenceId>,
}

/// Traversal direction for neighbor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edges leaving the node.
    Out,
    /// Edges arriving at the node.
    In,
    /// Both directions.
    Both,
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Claim lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Derived but not yet promoted.
    Draft,
    /// Promoted fact; requires at least one evidence binding.
    Fact,
    /// Asserted without sufficient evidence.
    Hypothesis,
    /// Retracted; kept for audit.
    Retracted,
}

impl ClaimStatus {
    /// Returns a stable label for the claim status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Fact => "fact",
            Self::Hypothesis => "hypothesis",
            Self::Retracted => "retracted",
        }
    }
}

/// Claim kinds produced by signal derivation and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// Weather conditions threaten gateway operations.
    WeatherRisk,
    /// Observed aircraft movement collapsed below baseline.
    MovementCollapse,
    /// An active disruption condition applies to the scope.
    Disruption,
    /// Forecast-driven assertion about a future window.
    Forecast,
    /// Resolution claim superseding one side of a contradiction.
    Resolution,
}

impl ClaimKind {
    /// Returns a stable label for the claim kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeatherRisk => "weather_risk",
            Self::MovementCollapse => "movement_collapse",
            Self::Disruption => "disruption",
            Self::Forecast => "forecast",
            Self::Resolution => "resolution",
        }
    }
}

/// Textual assertion about a subject node.
///
/// # Invariants
/// - `status == Fact` implies at least one evidence binding exists.
/// - `confidence` lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Claim identifier.
    pub claim_id: ClaimId,
    /// Subject node.
    pub subject: NodeId,
    /// Claim kind.
    pub kind: ClaimKind,
    /// Assertion text.
    pub text: String,
    /// Lifecycle status.
    pub status: ClaimStatus,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Event-time window.
    pub event_time: TimeWindow,
    /// Ingest timestamp.
    pub ingested_at: Timestamp,
    /// Claim superseded by this row.
    pub supersedes: Option<ClaimId>,
}

/// Input for a claim insert.
///
/// # Invariants
/// - `status == Fact` requires a non-empty `evidence` list; the store binds the
///   rows in the same logical transaction as the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClaim {
    /// Subject node.
    pub subject: NodeId,
    /// Claim kind.
    pub kind: ClaimKind,
    /// Assertion text.
    pub text: String,
    /// Lifecycle status at insert.
    pub status: ClaimStatus,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Event-time window.
    pub event_time: TimeWindow,
    /// Claim superseded by this row.
    pub supersedes: Option<ClaimId>,
    /// Evidence rows bound at insert.
    pub evidence: Vec<EvidenceId>,
}

// ============================================================================
// SECTION: Contradictions
// ============================================================================

/// Contradiction patterns detected after derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// FAA reports normal operations while METAR shows IFR/LIFR.
    FaaNormalVsIfr,
    /// FAA reports normal operations while movement collapsed.
    FaaNormalVsCollapse,
    /// METAR shows VFR while movement collapsed.
    VfrVsCollapse,
    /// FAA data is older than the staleness bound while other sources are fresh.
    StaleFaa,
}

impl ContradictionKind {
    /// Returns a stable label for the contradiction kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FaaNormalVsIfr => "faa_normal_vs_ifr",
            Self::FaaNormalVsCollapse => "faa_normal_vs_collapse",
            Self::VfrVsCollapse => "vfr_vs_collapse",
            Self::StaleFaa => "stale_faa",
        }
    }
}

/// Contradiction resolution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionStatus {
    /// Unresolved.
    Open,
    /// Resolved by a decision and resolution claim.
    Resolved,
    /// Dismissed without resolution.
    Ignored,
}

/// Record pairing two claims, or a claim and a measured signal.
///
/// # Invariants
/// - At least one of `left_claim` / `right_claim` is set, or `detail`
///   describes the measured signals for signal-only patterns.
/// - `Resolved` rows cite a resolution claim superseding one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionRecord {
    /// Contradiction identifier.
    pub contradiction_id: ContradictionId,
    /// Case in which the contradiction was detected.
    pub case_id: CaseId,
    /// Contradiction pattern.
    pub kind: ContradictionKind,
    /// Left-hand claim when one exists.
    pub left_claim: Option<ClaimId>,
    /// Right-hand claim when one exists.
    pub right_claim: Option<ClaimId>,
    /// Human-readable description of the conflicting observations.
    pub detail: String,
    /// Detection timestamp.
    pub detected_at: Timestamp,
    /// Resolution status.
    pub status: ContradictionStatus,
    /// Resolution claim for `Resolved` rows.
    pub resolved_by: Option<ClaimId>,
}

/// Input for a contradiction insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContradiction {
    /// Case in which the contradiction was detected.
    pub case_id: CaseId,
    /// Contradiction pattern.
    pub kind: ContradictionKind,
    /// Left-hand claim when one exists.
    pub left_claim: Option<ClaimId>,
    /// Right-hand claim when one exists.
    pub right_claim: Option<ClaimId>,
    /// Human-readable description of the conflicting observations.
    pub detail: String,
}

// ============================================================================
// SECTION: Bi-Temporal Reads
// ============================================================================

/// Point-in-time projection of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    /// Event time of the projection.
    pub event_time: Timestamp,
    /// Ingest time of the projection.
    pub ingest_time: Timestamp,
    /// Edges visible at the requested instants.
    pub edges: Vec<EdgeRecord>,
    /// Claims visible at the requested instants.
    pub claims: Vec<ClaimRecord>,
}

/// The canonical bi-temporal visibility predicate.
///
/// A row is visible iff its event-time window contains `event_time` (half-open
/// end) and it was ingested at or before `ingest_time`. Supersession filtering
/// is applied separately by the store, which knows which rows replace which.
#[must_use]
pub fn bitemporal_visible(
    event_window: &TimeWindow,
    ingested_at: Timestamp,
    event_time: Timestamp,
    ingest_time: Timestamp,
) -> bool {
    event_window.contains(event_time) && ingested_at <= ingest_time
}
