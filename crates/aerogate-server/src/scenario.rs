// crates/aerogate-server/src/scenario.rs
// ============================================================================
// Module: Scenario Signal Source
// Description: Deterministic canned-scenario signal source and graph fixtures.
// Purpose: Drive the control plane end-to-end without live upstream feeds.
// Dependencies: aerogate-core, serde_json
// ============================================================================

//! ## Overview
//! Scenario mode replaces the live signal clients with canned payloads keyed
//! by airport scope: a ground-stop storm at KJFK, a source contradiction at
//! KSEA, an ADS-B timeout at KDFW, and clear skies at KLAX. Unknown scopes
//! get benign payloads. Seeding builds the downstream cascade fixture
//! (flights, shipments, bookings) so cascade reads and booking guardrails
//! have something real to traverse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aerogate_core::Clock;
use aerogate_core::ControlStores;
use aerogate_core::Direction;
use aerogate_core::EdgeKind;
use aerogate_core::EdgeStatus;
use aerogate_core::EvidenceIngest;
use aerogate_core::NewEdge;
use aerogate_core::NodeKind;
use aerogate_core::ScopeId;
use aerogate_core::SignalError;
use aerogate_core::SignalFetch;
use aerogate_core::SignalSource;
use aerogate_core::SourceSystem;
use aerogate_core::StoreError;
use aerogate_core::TimeWindow;
use aerogate_core::Timestamp;
use serde_json::json;

// ============================================================================
// SECTION: Scenario Catalog
// ============================================================================

/// Canned scenario descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Scenario identifier.
    pub id: &'static str,
    /// Airport scope the scenario drives.
    pub scope: &'static str,
    /// Operator-facing description.
    pub description: &'static str,
}

/// Returns the canned scenario catalog.
#[must_use]
pub const fn scenarios() -> [Scenario; 4] {
    [
        Scenario {
            id: "jfk-ground-stop",
            scope: "KJFK",
            description: "ground stop with LIFR weather and a severe winter storm warning",
        },
        Scenario {
            id: "sea-contradiction",
            scope: "KSEA",
            description: "FAA reports normal operations while METAR and movement disagree",
        },
        Scenario {
            id: "dfw-adsb-timeout",
            scope: "KDFW",
            description: "movement snapshot times out; remaining sources support normal ops",
        },
        Scenario {
            id: "lax-clear",
            scope: "KLAX",
            description: "all sources benign",
        },
    ]
}

/// Looks up a scenario by id.
#[must_use]
pub fn scenario_by_id(id: &str) -> Option<Scenario> {
    scenarios().into_iter().find(|scenario| scenario.id == id)
}

// ============================================================================
// SECTION: Signal Source
// ============================================================================

/// Deterministic signal source serving the canned scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioSignalSource;

impl ScenarioSignalSource {
    /// Builds a fetch from a canned JSON payload.
    fn canned(scope: &ScopeId, source: SourceSystem, payload: serde_json::Value) -> SignalFetch {
        SignalFetch {
            bytes: payload.to_string().into_bytes(),
            content_type: "application/json".to_string(),
            source_ref: format!("scenario:{}:{}", scope.as_str(), source.as_str()),
            source_time: None,
        }
    }
}

impl SignalSource for ScenarioSignalSource {
    fn fetch(&self, source: SourceSystem, scope: &ScopeId) -> Result<SignalFetch, SignalError> {
        let payload = match (scope.as_str(), source) {
            ("KJFK", SourceSystem::FaaNas) => {
                json!({ "ground_stop": true, "avg_delay_minutes": 95.0 })
            }
            ("KJFK", SourceSystem::Metar) => {
                json!({ "visibility_sm": 0.5, "wind_kt": 28.0, "ceiling_ft": 200 })
            }
            ("KJFK", SourceSystem::NwsAlerts) => json!({
                "alerts": [{
                    "severity": "Severe",
                    "certainty": "Observed",
                    "headline": "Winter Storm Warning",
                    "event": "Winter Storm Warning"
                }]
            }),
            ("KJFK", SourceSystem::Adsb) => {
                json!({ "aircraft_count": 32, "baseline_count": 110 })
            }
            ("KSEA", SourceSystem::Metar) => {
                json!({ "visibility_sm": 0.5, "wind_kt": 10.0, "ceiling_ft": 300 })
            }
            ("KSEA", SourceSystem::Adsb) => {
                json!({ "aircraft_count": 25, "baseline_count": 90 })
            }
            ("KDFW", SourceSystem::Adsb) => {
                return Err(SignalError::Timeout {
                    seconds: 10,
                });
            }
            (_, SourceSystem::FaaNas) => json!({}),
            (_, SourceSystem::Metar) => {
                json!({ "visibility_sm": 10.0, "wind_kt": 6.0, "ceiling_ft": 25_000 })
            }
            (_, SourceSystem::Taf) => json!({
                "valid_from": "2026-08-01T00:00:00Z",
                "valid_to": "2026-08-02T00:00:00Z",
                "summary": "no significant weather"
            }),
            (_, SourceSystem::NwsAlerts) => json!({ "alerts": [] }),
            (_, SourceSystem::Adsb) => json!({ "aircraft_count": 95, "baseline_count": 100 }),
            (_, SourceSystem::Booking | SourceSystem::Simulation) => {
                return Err(SignalError::Permanent("source not fetchable".to_string()));
            }
        };
        Ok(Self::canned(scope, source, payload))
    }
}

// ============================================================================
// SECTION: Seeding
// ============================================================================

/// Result of seeding one airport fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Nodes created (or found existing).
    pub nodes_created: u32,
    /// Edges retracted by a refresh.
    pub cleared: u32,
}

/// Seeds the downstream cascade fixture for an airport scope.
///
/// Creates two flights, two shipments, and two bookings (with SLA exposure
/// attributes) wired `Serves -> Carries -> BookedUnder`, plus booking
/// evidence rows so shipment-level actions pass the booking guardrail.
///
/// # Errors
///
/// Returns [`StoreError`] when a graph write fails.
pub fn seed_airport(
    stores: &dyn ControlStores,
    scope: &ScopeId,
    refresh: bool,
    clock: &dyn Clock,
) -> Result<SeedReport, StoreError> {
    let now = clock.now();
    let mut report = SeedReport::default();
    if refresh {
        report.cleared = clear_airport(stores, scope, now)?;
    }
    let airport = stores.upsert_node(NodeKind::Airport, scope.as_str(), now)?;
    report.nodes_created += 1;
    for index in 1..=2_u32 {
        let flight = stores.upsert_node(
            NodeKind::Flight,
            &format!("{}-FL{index:02}", scope.as_str()),
            now,
        )?;
        let shipment = stores.upsert_node(
            NodeKind::Shipment,
            &format!("TRK-{}{index:03}", scope.as_str()),
            now,
        )?;
        let booking = stores.upsert_node(
            NodeKind::Booking,
            &format!("BKG-{}{index:03}", scope.as_str()),
            now,
        )?;
        report.nodes_created += 3;
        stores.new_node_version(
            booking,
            json!({ "sla_usd": 2_500.0 * f64::from(index), "tier": "express" }),
            now,
        )?;
        let booking_evidence = stores.put_evidence(
            EvidenceIngest {
                source_system: SourceSystem::Booking,
                source_ref: format!("BKG-{}{index:03}", scope.as_str()),
                content_type: "application/json".to_string(),
                payload: json!({ "booking": format!("BKG-{}{index:03}", scope.as_str()) })
                    .to_string()
                    .into_bytes(),
                event_time: None,
                meta: json!({ "scope": scope.as_str() }),
            },
            now,
        )?;
        for (src, dst, kind) in [
            (airport, flight, EdgeKind::Serves),
            (flight, shipment, EdgeKind::Carries),
            (shipment, booking, EdgeKind::BookedUnder),
        ] {
            stores.insert_edge(
                NewEdge {
                    src,
                    dst,
                    kind,
                    status: EdgeStatus::Fact,
                    attrs: json!({ "seeded": true }),
                    event_time: TimeWindow::at(now),
                    valid: TimeWindow::open(now),
                    source_system: SourceSystem::Booking,
                    confidence: 1.0,
                    supersedes: None,
                    evidence: vec![booking_evidence],
                },
                now,
            )?;
        }
    }
    Ok(report)
}

/// Retracts previously seeded cascade edges; the graph stays append-only.
///
/// # Errors
///
/// Returns [`StoreError`] when a graph write fails.
pub fn clear_airport(
    stores: &dyn ControlStores,
    scope: &ScopeId,
    now: Timestamp,
) -> Result<u32, StoreError> {
    let Some(airport) = stores.node(NodeKind::Airport, scope.as_str())? else {
        return Ok(0);
    };
    let mut cleared = 0_u32;
    let mut frontier = vec![airport.node_id];
    for kind in [EdgeKind::Serves, EdgeKind::Carries, EdgeKind::BookedUnder] {
        let mut next = Vec::new();
        for node in frontier.drain(..) {
            for edge in stores.neighbors(node, Some(kind), Direction::Out, now)? {
                if edge.attrs.get("seeded").and_then(serde_json::Value::as_bool) == Some(true) {
                    stores.retract_edge(edge.edge_id)?;
                    cleared += 1;
                }
                next.push(edge.dst);
            }
        }
        frontier = next;
    }
    Ok(cleared)
}
