// crates/aerogate-core/src/core/packet.rs
// ============================================================================
// Module: Aerogate Decision Packet
// Description: The immutable, case-sealed audit artifact.
// Purpose: Declare a posture with every claim, citation, and gap that produced it.
// Dependencies: crate::core::{belief, case, graph, hashing, identifiers, policy, time}, serde
// ============================================================================

//! ## Overview
//! The decision packet is the one artifact consumers hold. It cites evidence
//! by id and excerpt (never raw payloads), lists every policy that
//! contributed, carries the full workflow trace, and states what could not be
//! fetched. Once sealed it is never mutated; determinism is checked by
//! hashing a timestamp-free digest view.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::belief::ConfidenceBreakdown;
use crate::core::belief::Posture;
use crate::core::belief::RiskLevel;
use crate::core::case::ActionRecord;
use crate::core::case::CaseType;
use crate::core::case::MissingEvidenceRecord;
use crate::core::case::OutcomeRecord;
use crate::core::case::TraceEvent;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ClaimRecord;
use crate::core::graph::ContradictionRecord;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::ScopeId;
use crate::core::policy::Verdict;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Packet Sections
// ============================================================================

/// Evidence citation carried in a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEvidence {
    /// Evidence identifier.
    pub evidence_id: EvidenceId,
    /// Source system.
    pub source_system: SourceSystem,
    /// Source-scoped reference.
    pub source_ref: String,
    /// Content hash of the raw payload.
    pub content_sha256: String,
    /// Redacted excerpt.
    pub excerpt: String,
}

/// Applied-policy citation carried in a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketPolicy {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// 12-hex snapshot hash of the policy text.
    pub text_hash: String,
    /// Policy text.
    pub text: String,
    /// Verdict the policy contributed.
    pub verdict: Verdict,
    /// Operator-facing note.
    pub note: String,
}

/// Executed action with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketExecution {
    /// Executed action.
    pub action: ActionRecord,
    /// Handler outcome, when recorded.
    pub outcome: Option<OutcomeRecord>,
}

/// Blocked-state section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSection {
    /// Whether the case is blocked.
    pub is_blocked: bool,
    /// Open missing-evidence requests at sealing time.
    pub missing_evidence_requests: Vec<MissingEvidenceRecord>,
}

/// Downstream exposure reached from the case scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CascadeImpact {
    /// Downstream flight identifiers.
    pub flights: Vec<String>,
    /// Downstream shipment identifiers.
    pub shipments: Vec<String>,
    /// Downstream booking identifiers.
    pub bookings: Vec<String>,
    /// Aggregate SLA exposure in USD.
    pub sla_exposure_usd: f64,
}

/// Wall-clock stamps for the packet lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTimestamps {
    /// Case creation time.
    pub case_created_at: Timestamp,
    /// First signal ingested in the case, when any was.
    pub first_signal_at: Option<Timestamp>,
    /// Posture emission time, when a posture was emitted.
    pub posture_emitted_at: Option<Timestamp>,
    /// Packet sealing time.
    pub sealed_at: Timestamp,
}

/// Run metrics carried in a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMetrics {
    /// Posture decision latency: first signal ingested to posture emitted, ms.
    pub posture_decision_latency_ms: Option<i64>,
    /// Evidence rows bound in the case.
    pub evidence_rows: u32,
    /// Claims recorded in the case.
    pub claims_recorded: u32,
    /// Contradictions still open at sealing time.
    pub contradictions_open: u32,
    /// INVESTIGATE passes performed.
    pub investigate_passes: u32,
}

// ============================================================================
// SECTION: Decision Packet
// ============================================================================

/// The immutable audit artifact emitted per case.
///
/// # Invariants
/// - Sealed packets are never mutated; re-sealing an identical case is a no-op.
/// - Every claim listed here cites evidence reachable through the stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPacket {
    /// Owning case.
    pub case_id: CaseId,
    /// Case scope.
    pub scope: ScopeId,
    /// Case type.
    pub case_type: CaseType,
    /// Declared gateway posture.
    pub posture: Posture,
    /// Assessed risk level.
    pub risk_level: RiskLevel,
    /// Human-readable rationale.
    pub rationale: String,
    /// Claims recorded for the case.
    pub claims: Vec<ClaimRecord>,
    /// Evidence citations.
    pub evidence: Vec<PacketEvidence>,
    /// Contradictions detected for the case.
    pub contradictions: Vec<ContradictionRecord>,
    /// Policies that contributed to the verdict.
    pub policies_applied: Vec<PacketPolicy>,
    /// Actions proposed by the planner.
    pub actions_proposed: Vec<ActionRecord>,
    /// Actions driven through governance, with outcomes.
    pub actions_executed: Vec<PacketExecution>,
    /// Blocked-state section.
    pub blocked_section: BlockedSection,
    /// Ordered workflow trace.
    pub workflow_trace: Vec<TraceEvent>,
    /// Confidence breakdown.
    pub confidence_breakdown: ConfidenceBreakdown,
    /// Downstream exposure.
    pub cascade_impact: CascadeImpact,
    /// Lifecycle timestamps.
    pub timestamps: PacketTimestamps,
    /// Run metrics.
    pub metrics: PacketMetrics,
}

// ============================================================================
// SECTION: Determinism Digest
// ============================================================================

/// Timestamp-free projection used for the determinism digest.
#[derive(Serialize)]
struct DigestView<'a> {
    /// Case scope.
    scope: &'a ScopeId,
    /// Declared posture.
    posture: Posture,
    /// Assessed risk level.
    risk_level: RiskLevel,
    /// Evidence content hashes, in citation order.
    evidence: Vec<&'a str>,
    /// Claim kind/text/status triples, in record order.
    claims: Vec<(&'a str, &'a str, &'a str)>,
    /// Contributing policy text hashes.
    policies: Vec<&'a str>,
    /// Blocked flag.
    is_blocked: bool,
}

impl DecisionPacket {
    /// Hashes the packet's deterministic content, excluding timestamps.
    ///
    /// Two runs over identical evidence, policies, and a deterministic
    /// assessor produce identical digests even when wall-clock stamps differ.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn digest(&self) -> Result<HashDigest, HashError> {
        let view = DigestView {
            scope: &self.scope,
            posture: self.posture,
            risk_level: self.risk_level,
            evidence: self.evidence.iter().map(|row| row.content_sha256.as_str()).collect(),
            claims: self
                .claims
                .iter()
                .map(|claim| (claim.kind.as_str(), claim.text.as_str(), claim.status.as_str()))
                .collect(),
            policies: self.policies_applied.iter().map(|policy| policy.text_hash.as_str()).collect(),
            is_blocked: self.blocked_section.is_blocked,
        };
        hash_canonical_json(&view)
    }
}
