// crates/aerogate-core/src/runtime/memory.rs
// ============================================================================
// Module: Aerogate In-Memory Stores
// Description: Reference store implementations backed by process memory.
// Purpose: Provide invariant-enforcing storage for tests and simulation runs.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The in-memory stores implement every store trait with the same invariant
//! enforcement as the durable backend: evidence dedup on the identity triple,
//! FACT rows rejected without bindings, immutable nodes with version chains,
//! and action governance checks. They exist so the orchestrator can be
//! exercised end-to-end without a database.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Value;

use crate::core::belief::Posture;
use crate::core::case::ActionRecord;
use crate::core::case::ActionRisk;
use crate::core::case::ActionState;
use crate::core::case::CaseRecord;
use crate::core::case::CaseStatus;
use crate::core::case::CaseType;
use crate::core::case::MissingEvidenceRecord;
use crate::core::case::NewAction;
use crate::core::case::NewMissingEvidence;
use crate::core::case::OutcomeRecord;
use crate::core::case::TraceEvent;
use crate::core::case::TraceKind;
use crate::core::evidence::EvidenceIngest;
use crate::core::evidence::EvidenceRecord;
use crate::core::evidence::SourceSystem;
use crate::core::evidence::redacted_excerpt;
use crate::core::graph::ClaimRecord;
use crate::core::graph::ClaimStatus;
use crate::core::graph::ContradictionRecord;
use crate::core::graph::ContradictionStatus;
use crate::core::graph::Direction;
use crate::core::graph::EdgeKind;
use crate::core::graph::EdgeRecord;
use crate::core::graph::EdgeStatus;
use crate::core::graph::GraphView;
use crate::core::graph::NewClaim;
use crate::core::graph::NewContradiction;
use crate::core::graph::NewEdge;
use crate::core::graph::NodeKind;
use crate::core::graph::NodeRecord;
use crate::core::graph::NodeVersionRecord;
use crate::core::graph::bitemporal_visible;
use crate::core::hashing::sha256_hex;
use crate::core::identifiers::ActionId;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ClaimId;
use crate::core::identifiers::ContradictionId;
use crate::core::identifiers::EdgeId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::NodeVersionId;
use crate::core::identifiers::PlaybookId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ScopeId;
use crate::core::packet::DecisionPacket;
use crate::core::playbook::NewPlaybook;
use crate::core::playbook::PlaybookRecord;
use crate::core::playbook::PlaybookStats;
use crate::core::policy::NewPolicy;
use crate::core::policy::PolicyRecord;
use crate::core::time::TimeWindow;
use crate::core::time::Timestamp;
use crate::interfaces::CaseStore;
use crate::interfaces::EvidenceStore;
use crate::interfaces::GraphStore;
use crate::interfaces::InvariantKind;
use crate::interfaces::PlaybookStore;
use crate::interfaces::PolicyStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Inner State
// ============================================================================

/// All tables behind one lock.
#[derive(Debug, Default)]
struct Inner {
    /// Evidence rows by id.
    evidence: BTreeMap<u64, EvidenceRecord>,
    /// Raw payload bytes by evidence id.
    payloads: BTreeMap<u64, Vec<u8>>,
    /// Node rows by id.
    nodes: BTreeMap<u64, NodeRecord>,
    /// Node versions by id.
    node_versions: BTreeMap<u64, NodeVersionRecord>,
    /// Edge rows by id.
    edges: BTreeMap<u64, EdgeRecord>,
    /// Edge evidence bindings.
    edge_evidence: BTreeMap<u64, BTreeSet<u64>>,
    /// Claim rows by id.
    claims: BTreeMap<u64, ClaimRecord>,
    /// Claim evidence bindings.
    claim_evidence: BTreeMap<u64, BTreeSet<u64>>,
    /// Contradiction rows by id.
    contradictions: BTreeMap<u64, ContradictionRecord>,
    /// Case rows by id.
    cases: BTreeMap<u64, CaseRecord>,
    /// Missing-evidence rows by id.
    missing: BTreeMap<u64, MissingEvidenceRecord>,
    /// Action rows by id.
    actions: BTreeMap<u64, ActionRecord>,
    /// Outcomes by action id.
    outcomes: BTreeMap<u64, OutcomeRecord>,
    /// Trace events by case id.
    traces: BTreeMap<u64, Vec<TraceEvent>>,
    /// Sealed packets by case id.
    packets: BTreeMap<u64, DecisionPacket>,
    /// Policy rows by id.
    policies: BTreeMap<u64, PolicyRecord>,
    /// Playbook rows by id.
    playbooks: BTreeMap<u64, PlaybookRecord>,
    /// Next row id per table family.
    next_id: u64,
}

impl Inner {
    /// Allocates the next row id.
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory reference implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStores {
    /// Guarded tables.
    inner: Mutex<Inner>,
}

impl MemoryStores {
    /// Creates empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the table lock.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Db("store lock poisoned".to_string()))
    }
}

/// Converts a raw id into a typed id, treating zero as corruption.
fn typed<T>(raw: u64, make: impl Fn(u64) -> Option<T>) -> Result<T, StoreError> {
    make(raw).ok_or_else(|| StoreError::Corrupt("zero row id".to_string()))
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

impl EvidenceStore for MemoryStores {
    fn put_evidence(
        &self,
        ingest: EvidenceIngest,
        now: Timestamp,
    ) -> Result<EvidenceId, StoreError> {
        let mut inner = self.lock()?;
        let content_sha256 = sha256_hex(&ingest.payload);
        if let Some(existing) = inner.evidence.values().find(|row| {
            row.source_system == ingest.source_system
                && row.source_ref == ingest.source_ref
                && row.content_sha256 == content_sha256
        }) {
            return Ok(existing.evidence_id);
        }
        let raw = inner.allocate();
        let evidence_id = typed(raw, EvidenceId::from_raw)?;
        let record = EvidenceRecord {
            evidence_id,
            source_system: ingest.source_system,
            source_ref: ingest.source_ref,
            content_sha256: content_sha256.clone(),
            content_type: ingest.content_type,
            retrieved_at: now,
            event_time: ingest.event_time.unwrap_or_else(|| TimeWindow::at(now)),
            payload_path: format!("{content_sha256}.bin"),
            excerpt: redacted_excerpt(&ingest.payload),
            meta: ingest.meta,
        };
        inner.payloads.insert(raw, ingest.payload);
        inner.evidence.insert(raw, record);
        Ok(evidence_id)
    }

    fn get_evidence(&self, id: EvidenceId) -> Result<(EvidenceRecord, Vec<u8>), StoreError> {
        let inner = self.lock()?;
        let record = inner.evidence.get(&id.get()).cloned().ok_or(StoreError::NotFound {
            entity: "evidence",
            id: id.get(),
        })?;
        let payload = inner.payloads.get(&id.get()).cloned().unwrap_or_default();
        Ok((record, payload))
    }

    fn evidence_by_source(
        &self,
        source: SourceSystem,
        source_ref: Option<&str>,
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .evidence
            .values()
            .filter(|row| {
                row.source_system == source
                    && source_ref.is_none_or(|wanted| row.source_ref == wanted)
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Graph Store
// ============================================================================

impl GraphStore for MemoryStores {
    fn upsert_node(
        &self,
        kind: NodeKind,
        identifier: &str,
        now: Timestamp,
    ) -> Result<NodeId, StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) =
            inner.nodes.values().find(|node| node.kind == kind && node.identifier == identifier)
        {
            return Ok(existing.node_id);
        }
        let raw = inner.allocate();
        let node_id = typed(raw, NodeId::from_raw)?;
        inner.nodes.insert(
            raw,
            NodeRecord {
                node_id,
                kind,
                identifier: identifier.to_string(),
                created_at: now,
            },
        );
        Ok(node_id)
    }

    fn node(&self, kind: NodeKind, identifier: &str) -> Result<Option<NodeRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .nodes
            .values()
            .find(|node| node.kind == kind && node.identifier == identifier)
            .cloned())
    }

    fn node_by_id(&self, id: NodeId) -> Result<NodeRecord, StoreError> {
        let inner = self.lock()?;
        inner.nodes.get(&id.get()).cloned().ok_or(StoreError::NotFound {
            entity: "node",
            id: id.get(),
        })
    }

    fn new_node_version(
        &self,
        node_id: NodeId,
        attrs: Value,
        now: Timestamp,
    ) -> Result<NodeVersionId, StoreError> {
        let mut inner = self.lock()?;
        if !inner.nodes.contains_key(&node_id.get()) {
            return Err(StoreError::NotFound {
                entity: "node",
                id: node_id.get(),
            });
        }
        let previous = inner
            .node_versions
            .values()
            .find(|version| version.node_id == node_id && version.valid.end.is_none())
            .map(|version| version.version_id);
        if let Some(previous_id) = previous
            && let Some(version) = inner.node_versions.get_mut(&previous_id.get())
        {
            version.valid = version.valid.closed_at(now);
        }
        let raw = inner.allocate();
        let version_id = typed(raw, NodeVersionId::from_raw)?;
        inner.node_versions.insert(
            raw,
            NodeVersionRecord {
                version_id,
                node_id,
                attrs,
                valid: TimeWindow::open(now),
                supersedes: previous,
            },
        );
        Ok(version_id)
    }

    fn current_node_version(
        &self,
        node_id: NodeId,
    ) -> Result<Option<NodeVersionRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .node_versions
            .values()
            .find(|version| version.node_id == node_id && version.valid.end.is_none())
            .cloned())
    }

    fn insert_edge(&self, edge: NewEdge, now: Timestamp) -> Result<EdgeId, StoreError> {
        let mut inner = self.lock()?;
        if edge.status == EdgeStatus::Fact && edge.evidence.is_empty() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: 0,
                message: "edge inserted as fact without evidence".to_string(),
            });
        }
        let raw = inner.allocate();
        let edge_id = typed(raw, EdgeId::from_raw)?;
        let bindings: BTreeSet<u64> = edge.evidence.iter().map(|id| id.get()).collect();
        inner.edges.insert(
            raw,
            EdgeRecord {
                edge_id,
                src: edge.src,
                dst: edge.dst,
                kind: edge.kind,
                status: edge.status,
                attrs: edge.attrs,
                event_time: edge.event_time,
                ingested_at: now,
                valid: edge.valid,
                source_system: edge.source_system,
                confidence: edge.confidence,
                supersedes: edge.supersedes,
            },
        );
        inner.edge_evidence.insert(raw, bindings);
        Ok(edge_id)
    }

    fn bind_edge_evidence(&self, edge: EdgeId, evidence: EvidenceId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.edges.contains_key(&edge.get()) {
            return Err(StoreError::NotFound {
                entity: "edge",
                id: edge.get(),
            });
        }
        inner.edge_evidence.entry(edge.get()).or_default().insert(evidence.get());
        Ok(())
    }

    fn promote_edge(&self, edge: EdgeId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let bound =
            inner.edge_evidence.get(&edge.get()).is_some_and(|bindings| !bindings.is_empty());
        let row = inner.edges.get_mut(&edge.get()).ok_or(StoreError::NotFound {
            entity: "edge",
            id: edge.get(),
        })?;
        if !bound {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: edge.get(),
                message: "edge promoted to fact without evidence".to_string(),
            });
        }
        row.status = EdgeStatus::Fact;
        Ok(())
    }

    fn retract_edge(&self, edge: EdgeId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.edges.get_mut(&edge.get()).ok_or(StoreError::NotFound {
            entity: "edge",
            id: edge.get(),
        })?;
        row.status = EdgeStatus::Retracted;
        Ok(())
    }

    fn edge_evidence(&self, edge: EdgeId) -> Result<Vec<EvidenceId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .edge_evidence
            .get(&edge.get())
            .map(|bindings| bindings.iter().filter_map(|raw| EvidenceId::from_raw(*raw)).collect())
            .unwrap_or_default())
    }

    fn insert_claim(&self, claim: NewClaim, now: Timestamp) -> Result<ClaimId, StoreError> {
        let mut inner = self.lock()?;
        if claim.status == ClaimStatus::Fact && claim.evidence.is_empty() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: 0,
                message: "claim inserted as fact without evidence".to_string(),
            });
        }
        let raw = inner.allocate();
        let claim_id = typed(raw, ClaimId::from_raw)?;
        let bindings: BTreeSet<u64> = claim.evidence.iter().map(|id| id.get()).collect();
        inner.claims.insert(
            raw,
            ClaimRecord {
                claim_id,
                subject: claim.subject,
                kind: claim.kind,
                text: claim.text,
                status: claim.status,
                confidence: claim.confidence,
                event_time: claim.event_time,
                ingested_at: now,
                supersedes: claim.supersedes,
            },
        );
        inner.claim_evidence.insert(raw, bindings);
        Ok(claim_id)
    }

    fn bind_claim_evidence(
        &self,
        claim: ClaimId,
        evidence: EvidenceId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.claims.contains_key(&claim.get()) {
            return Err(StoreError::NotFound {
                entity: "claim",
                id: claim.get(),
            });
        }
        inner.claim_evidence.entry(claim.get()).or_default().insert(evidence.get());
        Ok(())
    }

    fn set_claim_status(&self, claim: ClaimId, status: ClaimStatus) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let bound =
            inner.claim_evidence.get(&claim.get()).is_some_and(|bindings| !bindings.is_empty());
        let row = inner.claims.get_mut(&claim.get()).ok_or(StoreError::NotFound {
            entity: "claim",
            id: claim.get(),
        })?;
        if status == ClaimStatus::Fact && !bound {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::EvidenceBinding,
                row: claim.get(),
                message: "claim promoted to fact without evidence".to_string(),
            });
        }
        row.status = status;
        Ok(())
    }

    fn supersede_claim(
        &self,
        old: ClaimId,
        replacement: NewClaim,
        now: Timestamp,
    ) -> Result<ClaimId, StoreError> {
        {
            let inner = self.lock()?;
            if !inner.claims.contains_key(&old.get()) {
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
        let inner = self.lock()?;
        inner.claims.get(&id.get()).cloned().ok_or(StoreError::NotFound {
            entity: "claim",
            id: id.get(),
        })
    }

    fn claims_for_subject(&self, node: NodeId) -> Result<Vec<ClaimRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.claims.values().filter(|claim| claim.subject == node).cloned().collect())
    }

    fn claim_evidence(&self, claim: ClaimId) -> Result<Vec<EvidenceId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .claim_evidence
            .get(&claim.get())
            .map(|bindings| bindings.iter().filter_map(|raw| EvidenceId::from_raw(*raw)).collect())
            .unwrap_or_default())
    }

    fn insert_contradiction(
        &self,
        contradiction: NewContradiction,
        now: Timestamp,
    ) -> Result<ContradictionId, StoreError> {
        let mut inner = self.lock()?;
        let raw = inner.allocate();
        let contradiction_id = typed(raw, ContradictionId::from_raw)?;
        inner.contradictions.insert(
            raw,
            ContradictionRecord {
                contradiction_id,
                case_id: contradiction.case_id,
                kind: contradiction.kind,
                left_claim: contradiction.left_claim,
                right_claim: contradiction.right_claim,
                detail: contradiction.detail,
                detected_at: now,
                status: ContradictionStatus::Open,
                resolved_by: None,
            },
        );
        Ok(contradiction_id)
    }

    fn contradictions_for_case(
        &self,
        case: CaseId,
    ) -> Result<Vec<ContradictionRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.contradictions.values().filter(|row| row.case_id == case).cloned().collect())
    }

    fn resolve_contradiction(
        &self,
        id: ContradictionId,
        status: ContradictionStatus,
        resolved_by: Option<ClaimId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.contradictions.get_mut(&id.get()).ok_or(StoreError::NotFound {
            entity: "contradiction",
            id: id.get(),
        })?;
        row.status = status;
        row.resolved_by = resolved_by;
        Ok(())
    }

    fn neighbors(
        &self,
        node: NodeId,
        kind: Option<EdgeKind>,
        direction: Direction,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .edges
            .values()
            .filter(|edge| {
                let touches = match direction {
                    Direction::Out => edge.src == node,
                    Direction::In => edge.dst == node,
                    Direction::Both => edge.src == node || edge.dst == node,
                };
                touches
                    && edge.status != EdgeStatus::Retracted
                    && edge.valid.contains(at)
                    && kind.is_none_or(|wanted| edge.kind == wanted)
            })
            .cloned()
            .collect())
    }

    fn traverse(
        &self,
        root: NodeId,
        kinds: &[EdgeKind],
        max_depth: u32,
        at: Timestamp,
    ) -> Result<Vec<EdgeRecord>, StoreError> {
        let mut out = Vec::new();
        let mut visited: BTreeSet<u64> = BTreeSet::new();
        let mut queue: VecDeque<(NodeId, u32)> = VecDeque::new();
        visited.insert(root.get());
        queue.push_back((root, 0));
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
        let inner = self.lock()?;
        let edge_superseded: BTreeSet<u64> = inner
            .edges
            .values()
            .filter(|edge| edge.ingested_at <= ingest_time)
            .filter_map(|edge| edge.supersedes.map(|old| old.get()))
            .collect();
        let claim_superseded: BTreeSet<u64> = inner
            .claims
            .values()
            .filter(|claim| claim.ingested_at <= ingest_time)
            .filter_map(|claim| claim.supersedes.map(|old| old.get()))
            .collect();
        let edges = inner
            .edges
            .values()
            .filter(|edge| {
                bitemporal_visible(&edge.event_time, edge.ingested_at, event_time, ingest_time)
                    && !edge_superseded.contains(&edge.edge_id.get())
            })
            .cloned()
            .collect();
        let claims = inner
            .claims
            .values()
            .filter(|claim| {
                bitemporal_visible(&claim.event_time, claim.ingested_at, event_time, ingest_time)
                    && !claim_superseded.contains(&claim.claim_id.get())
            })
            .cloned()
            .collect();
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

impl CaseStore for MemoryStores {
    fn create_case(
        &self,
        case_type: CaseType,
        scope: &ScopeId,
        now: Timestamp,
    ) -> Result<CaseId, StoreError> {
        let mut inner = self.lock()?;
        let raw = inner.allocate();
        let case_id = typed(raw, CaseId::from_raw)?;
        inner.cases.insert(
            raw,
            CaseRecord {
                case_id,
                case_type,
                scope: scope.clone(),
                status: CaseStatus::Open,
                posture: None,
                created_at: now,
                resolved_at: None,
            },
        );
        Ok(case_id)
    }

    fn case(&self, id: CaseId) -> Result<CaseRecord, StoreError> {
        let inner = self.lock()?;
        inner.cases.get(&id.get()).cloned().ok_or(StoreError::NotFound {
            entity: "case",
            id: id.get(),
        })
    }

    fn cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<CaseRecord> = inner.cases.values().cloned().collect();
        rows.sort_by(|a, b| b.case_id.cmp(&a.case_id));
        Ok(rows)
    }

    fn set_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
        posture: Option<Posture>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.cases.get_mut(&id.get()).ok_or(StoreError::NotFound {
            entity: "case",
            id: id.get(),
        })?;
        if row.status == CaseStatus::Resolved {
            return Err(StoreError::Conflict("case is resolved and append-only".to_string()));
        }
        row.status = status;
        if posture.is_some() {
            row.posture = posture;
        }
        if status == CaseStatus::Resolved {
            row.resolved_at = Some(now);
        }
        Ok(())
    }

    fn record_missing(
        &self,
        request: NewMissingEvidence,
        now: Timestamp,
    ) -> Result<RequestId, StoreError> {
        let mut inner = self.lock()?;
        let raw = inner.allocate();
        let request_id = typed(raw, RequestId::from_raw)?;
        inner.missing.insert(
            raw,
            MissingEvidenceRecord {
                request_id,
                case_id: request.case_id,
                source_system: request.source_system,
                request_type: request.request_type,
                params: request.params,
                reason: request.reason,
                criticality: request.criticality,
                retryable: request.retryable,
                created_at: now,
                resolved_by_evidence: None,
            },
        );
        Ok(request_id)
    }

    fn open_missing(&self, case: CaseId) -> Result<Vec<MissingEvidenceRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .missing
            .values()
            .filter(|row| row.case_id == case && row.resolved_by_evidence.is_none())
            .cloned()
            .collect())
    }

    fn resolve_missing(
        &self,
        request: RequestId,
        evidence: EvidenceId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.missing.get_mut(&request.get()).ok_or(StoreError::NotFound {
            entity: "missing_evidence",
            id: request.get(),
        })?;
        row.resolved_by_evidence = Some(evidence);
        Ok(())
    }

    fn insert_action(&self, action: NewAction, now: Timestamp) -> Result<ActionId, StoreError> {
        let mut inner = self.lock()?;
        if action.risk == ActionRisk::High && !action.requires_approval {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::ActionGovernance,
                row: 0,
                message: "high risk action must require approval".to_string(),
            });
        }
        let raw = inner.allocate();
        let action_id = typed(raw, ActionId::from_raw)?;
        inner.actions.insert(
            raw,
            ActionRecord {
                action_id,
                case_id: action.case_id,
                action_type: action.action_type,
                args: action.args,
                risk: action.risk,
                requires_approval: action.requires_approval,
                state: ActionState::Proposed,
                approved_at: None,
                approved_by: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(action_id)
    }

    fn action(&self, id: ActionId) -> Result<ActionRecord, StoreError> {
        let inner = self.lock()?;
        inner.actions.get(&id.get()).cloned().ok_or(StoreError::NotFound {
            entity: "action",
            id: id.get(),
        })
    }

    fn actions_for_case(&self, case: CaseId) -> Result<Vec<ActionRecord>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<ActionRecord> =
            inner.actions.values().filter(|action| action.case_id == case).cloned().collect();
        rows.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        Ok(rows)
    }

    fn set_action_state(
        &self,
        id: ActionId,
        state: ActionState,
        approval: Option<(String, Timestamp)>,
        failure_reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.actions.get_mut(&id.get()).ok_or(StoreError::NotFound {
            entity: "action",
            id: id.get(),
        })?;
        if let Some((actor, at)) = approval {
            row.approved_by = Some(actor);
            row.approved_at = Some(at);
        }
        if state == ActionState::Executing && row.requires_approval && row.approved_at.is_none() {
            return Err(StoreError::InvariantViolation {
                kind: InvariantKind::ActionGovernance,
                row: id.get(),
                message: "action requires approval before executing".to_string(),
            });
        }
        row.state = state;
        row.failure_reason = failure_reason.or(row.failure_reason.take());
        row.updated_at = now;
        Ok(())
    }

    fn record_outcome(&self, outcome: OutcomeRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.outcomes.insert(outcome.action_id.get(), outcome);
        Ok(())
    }

    fn outcome(&self, action: ActionId) -> Result<Option<OutcomeRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.outcomes.get(&action.get()).cloned())
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
        let mut inner = self.lock()?;
        let log = inner.traces.entry(case.get()).or_default();
        let seq = u64::try_from(log.len()).unwrap_or(u64::MAX).saturating_add(1);
        log.push(TraceEvent {
            case_id: case,
            seq,
            kind,
            label: label.to_string(),
            reference,
            meta,
            at: now,
        });
        Ok(seq)
    }

    fn trace(&self, case: CaseId) -> Result<Vec<TraceEvent>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.traces.get(&case.get()).cloned().unwrap_or_default())
    }

    fn save_packet(&self, packet: &DecisionPacket) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.packets.get(&packet.case_id.get()) {
            if existing == packet {
                return Ok(());
            }
            return Err(StoreError::Conflict("packet already sealed for case".to_string()));
        }
        inner.packets.insert(packet.case_id.get(), packet.clone());
        Ok(())
    }

    fn packet(&self, case: CaseId) -> Result<Option<DecisionPacket>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.packets.get(&case.get()).cloned())
    }
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

impl PolicyStore for MemoryStores {
    fn seed_policies(&self, policies: &[NewPolicy], now: Timestamp) -> Result<u32, StoreError> {
        let mut inner = self.lock()?;
        let mut inserted = 0_u32;
        for policy in policies {
            if inner.policies.values().any(|row| row.text == policy.text) {
                continue;
            }
            let raw = inner.allocate();
            let policy_id = typed(raw, PolicyId::from_raw)?;
            inner.policies.insert(
                raw,
                PolicyRecord {
                    policy_id,
                    text: policy.text.clone(),
                    conditions: policy.conditions.clone(),
                    effect: policy.effect.clone(),
                    valid: policy.valid,
                    created_at: now,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    fn policies_active_at(&self, at: Timestamp) -> Result<Vec<PolicyRecord>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<PolicyRecord> =
            inner.policies.values().filter(|row| row.valid.contains(at)).cloned().collect();
        rows.sort_by(|a, b| a.policy_id.cmp(&b.policy_id));
        Ok(rows)
    }
}

// ============================================================================
// SECTION: Playbook Store
// ============================================================================

impl PlaybookStore for MemoryStores {
    fn insert_playbook(
        &self,
        playbook: NewPlaybook,
        now: Timestamp,
    ) -> Result<PlaybookId, StoreError> {
        let mut inner = self.lock()?;
        let raw = inner.allocate();
        let playbook_id = typed(raw, PlaybookId::from_raw)?;
        inner.playbooks.insert(
            raw,
            PlaybookRecord {
                playbook_id,
                domain: playbook.domain,
                pattern: playbook.pattern,
                actions: playbook.actions,
                stats: PlaybookStats {
                    times_used: 1,
                    successes: 1,
                },
                mined_at: now,
                last_used_at: None,
                policy_snapshot: playbook.policy_snapshot,
                source_case: playbook.source_case,
            },
        );
        Ok(playbook_id)
    }

    fn playbooks(&self) -> Result<Vec<PlaybookRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.playbooks.values().cloned().collect())
    }

    fn touch_playbook(
        &self,
        id: PlaybookId,
        success: bool,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner.playbooks.get_mut(&id.get()).ok_or(StoreError::NotFound {
            entity: "playbook",
            id: id.get(),
        })?;
        row.stats.times_used += 1;
        if success {
            row.stats.successes += 1;
        }
        row.last_used_at = Some(now);
        Ok(())
    }
}
