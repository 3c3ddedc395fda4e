// crates/aerogate-core/src/runtime/packet.rs
// ============================================================================
// Module: Aerogate Packet Builder
// Description: Assembles the immutable decision packet from the stores.
// Purpose: Seal one auditable artifact per case with citations, trace, and gaps.
// Dependencies: crate::{core, interfaces, runtime::policy}, serde_json
// ============================================================================

//! ## Overview
//! The packet builder reads a completed (or blocked) case back out of the
//! stores and assembles the decision packet: evidence citations with
//! excerpts, claims, contradictions, applied policies, governed actions with
//! outcomes, the blocked section, the ordered workflow trace, downstream
//! cascade exposure, and the posture-decision-latency metric. The packet is
//! sealed once; identical re-seals are no-ops at the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::belief::ConfidenceBreakdown;
use crate::core::belief::Posture;
use crate::core::belief::RiskLevel;
use crate::core::graph::ContradictionStatus;
use crate::core::graph::EdgeKind;
use crate::core::graph::NodeKind;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::packet::BlockedSection;
use crate::core::packet::CascadeImpact;
use crate::core::packet::DecisionPacket;
use crate::core::packet::PacketEvidence;
use crate::core::packet::PacketExecution;
use crate::core::packet::PacketMetrics;
use crate::core::packet::PacketPolicy;
use crate::core::packet::PacketTimestamps;
use crate::core::time::Timestamp;
use crate::interfaces::ControlStores;
use crate::interfaces::StoreError;
use crate::runtime::policy::PolicyResult;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Run context handed to the builder by the orchestrator.
#[derive(Debug, Clone)]
pub struct PacketInputs<'a> {
    /// Declared posture.
    pub posture: Posture,
    /// Assessed risk level.
    pub risk_level: RiskLevel,
    /// Human-readable rationale.
    pub rationale: String,
    /// Confidence breakdown.
    pub confidence: ConfidenceBreakdown,
    /// Final policy evaluation.
    pub policy: &'a PolicyResult,
    /// Evidence rows ingested during the run.
    pub evidence_ids: &'a [EvidenceId],
    /// Claims recorded during the run.
    pub claim_ids: &'a [ClaimId],
    /// Airport node for cascade traversal.
    pub airport: NodeId,
    /// INVESTIGATE passes performed.
    pub investigate_passes: u32,
    /// First signal ingest time, when any signal arrived.
    pub first_signal_at: Option<Timestamp>,
    /// Posture emission time, when a posture was emitted.
    pub posture_emitted_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the decision packet for a case.
///
/// # Errors
///
/// Returns [`StoreError`] when any read fails.
pub fn build_packet(
    stores: &dyn ControlStores,
    case_id: CaseId,
    inputs: &PacketInputs<'_>,
    now: Timestamp,
) -> Result<DecisionPacket, StoreError> {
    let case = stores.case(case_id)?;
    let mut evidence = Vec::with_capacity(inputs.evidence_ids.len());
    for id in inputs.evidence_ids {
        let (row, _) = stores.get_evidence(*id)?;
        evidence.push(PacketEvidence {
            evidence_id: row.evidence_id,
            source_system: row.source_system,
            source_ref: row.source_ref,
            content_sha256: row.content_sha256,
            excerpt: row.excerpt,
        });
    }
    let mut claims = Vec::with_capacity(inputs.claim_ids.len());
    for id in inputs.claim_ids {
        claims.push(stores.claim(*id)?);
    }
    let contradictions = stores.contradictions_for_case(case_id)?;
    let open_contradictions = contradictions
        .iter()
        .filter(|row| row.status == ContradictionStatus::Open)
        .count();
    let actions = stores.actions_for_case(case_id)?;
    let mut executions = Vec::new();
    for action in &actions {
        if action.state.is_terminal() {
            executions.push(PacketExecution {
                action: action.clone(),
                outcome: stores.outcome(action.action_id)?,
            });
        }
    }
    let missing = stores.open_missing(case_id)?;
    let is_blocked = case.status == crate::core::case::CaseStatus::Blocked;
    let policies_applied = inputs
        .policy
        .effects
        .iter()
        .map(|effect| PacketPolicy {
            policy_id: effect.policy_id,
            text_hash: effect.text_hash.clone(),
            text: effect.text.clone(),
            verdict: effect.verdict,
            note: effect.note.clone(),
        })
        .collect();
    let cascade_impact = cascade_impact(stores, inputs.airport, now)?;
    let posture_decision_latency_ms = match (inputs.first_signal_at, inputs.posture_emitted_at) {
        (Some(first), Some(emitted)) => Some(emitted.millis_since(first)),
        _ => None,
    };
    Ok(DecisionPacket {
        case_id,
        scope: case.scope,
        case_type: case.case_type,
        posture: inputs.posture,
        risk_level: inputs.risk_level,
        rationale: inputs.rationale.clone(),
        claims,
        evidence,
        contradictions,
        policies_applied,
        actions_proposed: actions,
        actions_executed: executions,
        blocked_section: BlockedSection {
            is_blocked,
            missing_evidence_requests: missing,
        },
        workflow_trace: stores.trace(case_id)?,
        confidence_breakdown: inputs.confidence.clone(),
        cascade_impact,
        timestamps: PacketTimestamps {
            case_created_at: case.created_at,
            first_signal_at: inputs.first_signal_at,
            posture_emitted_at: inputs.posture_emitted_at,
            sealed_at: now,
        },
        metrics: PacketMetrics {
            posture_decision_latency_ms,
            evidence_rows: u32::try_from(inputs.evidence_ids.len()).unwrap_or(u32::MAX),
            claims_recorded: u32::try_from(inputs.claim_ids.len()).unwrap_or(u32::MAX),
            contradictions_open: u32::try_from(open_contradictions).unwrap_or(u32::MAX),
            investigate_passes: inputs.investigate_passes,
        },
    })
}

// ============================================================================
// SECTION: Cascade Traversal
// ============================================================================

/// Collects downstream flights, shipments, and bookings from the scope node.
///
/// # Errors
///
/// Returns [`StoreError`] when traversal or node reads fail.
pub fn cascade_impact(
    stores: &dyn ControlStores,
    airport: NodeId,
    at: Timestamp,
) -> Result<CascadeImpact, StoreError> {
    let edges = stores.traverse(
        airport,
        &[EdgeKind::Serves, EdgeKind::Carries, EdgeKind::BookedUnder],
        3,
        at,
    )?;
    let mut impact = CascadeImpact::default();
    let mut seen: BTreeSet<u64> = BTreeSet::new();
    for edge in edges {
        if !seen.insert(edge.dst.get()) {
            continue;
        }
        let node = stores.node_by_id(edge.dst)?;
        match node.kind {
            NodeKind::Flight => impact.flights.push(node.identifier),
            NodeKind::Shipment => impact.shipments.push(node.identifier),
            NodeKind::Booking => {
                if let Some(version) = stores.current_node_version(node.node_id)? {
                    impact.sla_exposure_usd += version
                        .attrs
                        .get("sla_usd")
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.0);
                }
                impact.bookings.push(node.identifier);
            }
            _ => {}
        }
    }
    Ok(impact)
}
