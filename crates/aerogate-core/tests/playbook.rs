// crates/aerogate-core/tests/playbook.rs
// ============================================================================
// Module: Playbook Tests
// Description: Decay law, policy alignment, and retrieval scoring.
// Purpose: Validate that experience decays and drifts exactly as specified.
// ============================================================================

//! ## Overview
//! Tests for the playbook learner:
//! - `decay_factor` equals exactly 0.5 at one half-life
//! - Policy alignment is Jaccard over sorted 12-hex snapshots
//! - Retrieval orders fresher, aligned playbooks first

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use aerogate_core::CaseId;
use aerogate_core::CaseType;
use aerogate_core::MemoryStores;
use aerogate_core::NewPlaybook;
use aerogate_core::PlaybookDomain;
use aerogate_core::PlaybookPattern;
use aerogate_core::PlaybookStore;
use aerogate_core::PolicyStore;
use aerogate_core::RiskLevel;
use aerogate_core::SourceSystem;
use aerogate_core::Timestamp;
use aerogate_core::decay_factor;
use aerogate_core::policy_alignment;
use aerogate_core::runtime::retrieve;
use aerogate_core::seed_policies;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

#[test]
fn decay_factor_is_exactly_half_at_one_half_life() {
    assert_eq!(decay_factor(30.0, 30.0), 0.5);
    assert_eq!(decay_factor(90.0, 90.0), 0.5);
    assert_eq!(decay_factor(180.0, 180.0), 0.5);
    assert_eq!(decay_factor(0.0, 30.0), 1.0);
    assert_eq!(decay_factor(60.0, 30.0), 0.25);
}

#[test]
fn domain_half_lives_match_the_table() {
    assert_eq!(PlaybookDomain::Weather.half_life_days(), 30.0);
    assert_eq!(PlaybookDomain::Operational.half_life_days(), 90.0);
    assert_eq!(PlaybookDomain::Customs.half_life_days(), 180.0);
}

#[test]
fn policy_alignment_is_jaccard_over_snapshots() {
    let a = vec!["aaa111aaa111".to_string(), "bbb222bbb222".to_string()];
    let b = vec!["aaa111aaa111".to_string(), "ccc333ccc333".to_string()];
    // |intersection| = 1, |union| = 3.
    assert!((policy_alignment(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(policy_alignment(&a, &a), 1.0);
    assert_eq!(policy_alignment(&[], &[]), 1.0);
    assert_eq!(policy_alignment(&a, &[]), 0.0);
}

#[test]
fn retrieval_scores_decay_and_similarity() {
    let stores = MemoryStores::new();
    stores.seed_policies(&seed_policies(ts(0)), ts(0)).expect("seed");
    let mut snapshot: Vec<String> = stores
        .policies_active_at(ts(0))
        .expect("policies")
        .iter()
        .map(aerogate_core::PolicyRecord::text_hash)
        .collect();
    snapshot.sort_unstable();

    let pattern = PlaybookPattern {
        case_type: CaseType::AirportDisruption,
        evidence_sources: vec![SourceSystem::FaaNas, SourceSystem::Metar],
        contradiction_kinds: Vec::new(),
        risk_level: RiskLevel::High,
    };
    // Fresh weather playbook mined now.
    let fresh = stores
        .insert_playbook(
            NewPlaybook {
                domain: PlaybookDomain::Weather,
                pattern: pattern.clone(),
                actions: Vec::new(),
                policy_snapshot: snapshot.clone(),
                source_case: CaseId::from_raw(1).expect("nonzero case id"),
            },
            ts(0),
        )
        .expect("insert");
    // Same pattern mined sixty days (two weather half-lives) earlier.
    let stale = stores
        .insert_playbook(
            NewPlaybook {
                domain: PlaybookDomain::Weather,
                pattern: pattern.clone(),
                actions: Vec::new(),
                policy_snapshot: snapshot,
                source_case: CaseId::from_raw(2).expect("nonzero case id"),
            },
            ts(-60 * 86_400_000),
        )
        .expect("insert");

    let hits = retrieve(&stores, &pattern, ts(0)).expect("retrieve");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].playbook.playbook_id, fresh);
    assert_eq!(hits[1].playbook.playbook_id, stale);
    // Two half-lives: the stale score is a quarter of the fresh score.
    assert!((hits[1].score - hits[0].score * 0.25).abs() < 1e-9);
}

#[test]
fn drifted_policy_snapshots_lose_influence() {
    let stores = MemoryStores::new();
    let pattern = PlaybookPattern {
        case_type: CaseType::AirportDisruption,
        evidence_sources: Vec::new(),
        contradiction_kinds: Vec::new(),
        risk_level: RiskLevel::Low,
    };
    stores
        .insert_playbook(
            NewPlaybook {
                domain: PlaybookDomain::Operational,
                pattern: pattern.clone(),
                actions: Vec::new(),
                policy_snapshot: vec!["deadbeef0000".to_string()],
                source_case: CaseId::from_raw(1).expect("nonzero case id"),
            },
            ts(0),
        )
        .expect("insert");
    // No seeded policies: the snapshot no longer intersects the active set.
    let hits = retrieve(&stores, &pattern, ts(0)).expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 0.0);
}
