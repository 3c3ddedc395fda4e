// crates/aerogate-core/src/runtime/learner.rs
// ============================================================================
// Module: Aerogate Playbook Learner
// Description: Mines resolved cases into playbooks and retrieves them scored.
// Purpose: Reuse experience with decay and policy-drift discounting.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! On case resolution the learner extracts the matchable pattern and the
//! executed actions into a playbook tagged with the current policy snapshot.
//! Retrieval scores combine success rate, a domain half-life decay, Jaccard
//! policy alignment, and a pattern-similarity confidence penalty, so stale or
//! drifted experience loses influence without being deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::case::ActionState;
use crate::core::evidence::SourceSystem;
use crate::core::graph::ClaimKind;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::PlaybookId;
use crate::core::packet::DecisionPacket;
use crate::core::playbook::MILLIS_PER_DAY;
use crate::core::playbook::NewPlaybook;
use crate::core::playbook::PlaybookAction;
use crate::core::playbook::PlaybookDomain;
use crate::core::playbook::PlaybookPattern;
use crate::core::playbook::PlaybookRecord;
use crate::core::playbook::decay_factor;
use crate::core::playbook::policy_alignment;
use crate::core::time::Timestamp;
use crate::interfaces::ControlStores;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Mining
// ============================================================================

/// Chooses the domain tag for a resolved case.
fn classify_domain(packet: &DecisionPacket) -> PlaybookDomain {
    let weather = packet.claims.iter().any(|claim| claim.kind == ClaimKind::WeatherRisk)
        || packet
            .evidence
            .iter()
            .any(|row| matches!(row.source_system, SourceSystem::NwsAlerts | SourceSystem::Taf));
    let customs = packet
        .actions_executed
        .iter()
        .any(|execution| execution.action.action_type == crate::core::case::ActionType::FileClaim);
    if customs {
        PlaybookDomain::Customs
    } else if weather {
        PlaybookDomain::Weather
    } else {
        PlaybookDomain::Operational
    }
}

/// Mines a resolved case's packet into a playbook.
///
/// The policy snapshot is the sorted 12-hex hash list of policies active at
/// mining time; the stats start with one successful use.
///
/// # Errors
///
/// Returns [`StoreError`] when reads or the insert fail.
pub fn mine_case(
    stores: &dyn ControlStores,
    case_id: CaseId,
    packet: &DecisionPacket,
    now: Timestamp,
) -> Result<PlaybookId, StoreError> {
    let mut evidence_sources: Vec<SourceSystem> =
        packet.evidence.iter().map(|row| row.source_system).collect();
    evidence_sources.sort_unstable();
    evidence_sources.dedup();
    let mut contradiction_kinds: Vec<_> =
        packet.contradictions.iter().map(|row| row.kind).collect();
    contradiction_kinds.dedup();
    let actions = packet
        .actions_executed
        .iter()
        .filter(|execution| execution.action.state == ActionState::Completed)
        .map(|execution| PlaybookAction {
            action_type: execution.action.action_type,
            args: execution.action.args.clone(),
        })
        .collect();
    let mut policy_snapshot: Vec<String> = stores
        .policies_active_at(now)?
        .iter()
        .map(crate::core::policy::PolicyRecord::text_hash)
        .collect();
    policy_snapshot.sort_unstable();
    policy_snapshot.dedup();
    stores.insert_playbook(
        NewPlaybook {
            domain: classify_domain(packet),
            pattern: PlaybookPattern {
                case_type: packet.case_type,
                evidence_sources,
                contradiction_kinds,
                risk_level: packet.risk_level,
            },
            actions,
            policy_snapshot,
            source_case: case_id,
        },
        now,
    )
}

// ============================================================================
// SECTION: Retrieval
// ============================================================================

/// One scored retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPlaybook {
    /// The stored playbook.
    pub playbook: PlaybookRecord,
    /// Combined retrieval score.
    pub score: f64,
}

/// Similarity between a query pattern and a stored pattern, in `[0, 1]`.
fn pattern_similarity(query: &PlaybookPattern, stored: &PlaybookPattern) -> f64 {
    let type_match = if query.case_type == stored.case_type {
        1.0
    } else {
        0.0
    };
    let risk_match = if query.risk_level == stored.risk_level {
        1.0
    } else {
        0.5
    };
    let sources = jaccard_sources(&query.evidence_sources, &stored.evidence_sources);
    (type_match + risk_match + sources) / 3.0
}

/// Jaccard similarity over source sets; both empty scores 1.
fn jaccard_sources(left: &[SourceSystem], right: &[SourceSystem]) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.iter().filter(|source| right.contains(source)).count();
    let union = left.len() + right.len() - intersection;
    if union == 0 {
        1.0
    } else {
        f64::from(u32::try_from(intersection).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(union).unwrap_or(u32::MAX))
    }
}

/// Retrieves playbooks scored for the query pattern.
///
/// Score = `success_rate × decay_factor × policy_alignment ×
/// confidence_penalty`, where decay halves every domain half-life and the
/// confidence penalty discounts weak pattern matches.
///
/// # Errors
///
/// Returns [`StoreError`] when reads fail.
pub fn retrieve(
    stores: &dyn ControlStores,
    query: &PlaybookPattern,
    now: Timestamp,
) -> Result<Vec<ScoredPlaybook>, StoreError> {
    let mut current_policies: Vec<String> = stores
        .policies_active_at(now)?
        .iter()
        .map(crate::core::policy::PolicyRecord::text_hash)
        .collect();
    current_policies.sort_unstable();
    current_policies.dedup();
    let mut hits: Vec<ScoredPlaybook> = stores
        .playbooks()?
        .into_iter()
        .map(|playbook| {
            let age_days = now.millis_since(playbook.mined_at).max(0) as f64 / MILLIS_PER_DAY;
            let decay = decay_factor(age_days, playbook.domain.half_life_days());
            let alignment = policy_alignment(&playbook.policy_snapshot, &current_policies);
            let confidence_penalty = 0.5 + 0.5 * pattern_similarity(query, &playbook.pattern);
            let score =
                playbook.stats.success_rate() * decay * alignment * confidence_penalty;
            ScoredPlaybook {
                playbook,
                score,
            }
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.playbook.playbook_id.cmp(&b.playbook.playbook_id))
    });
    Ok(hits)
}
