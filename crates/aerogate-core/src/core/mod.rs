// crates/aerogate-core/src/core/mod.rs
// ============================================================================
// Module: Aerogate Core Types
// Description: Data model shared by every Aerogate component.
// Purpose: Re-export the canonical record types with stable wire forms.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! The core module holds the canonical data model: identifiers, time,
//! hashing, evidence, graph, case, belief, policy, packet, and playbook
//! types. Everything here is serializable with stable wire forms and free of
//! I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod belief;
pub mod case;
pub mod evidence;
pub mod graph;
pub mod hashing;
pub mod identifiers;
pub mod packet;
pub mod playbook;
pub mod policy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use belief::BeliefState;
pub use belief::ConfidenceBreakdown;
pub use belief::ConfidencePenalty;
pub use belief::FlightCategory;
pub use belief::Posture;
pub use belief::RiskAssessment;
pub use belief::RiskLevel;
pub use belief::ServiceTier;
pub use case::ActionRecord;
pub use case::ActionRisk;
pub use case::ActionState;
pub use case::ActionType;
pub use case::CaseRecord;
pub use case::CaseStatus;
pub use case::CaseType;
pub use case::Criticality;
pub use case::MissingEvidenceRecord;
pub use case::NewAction;
pub use case::NewMissingEvidence;
pub use case::OutcomeRecord;
pub use case::TraceEvent;
pub use case::TraceKind;
pub use evidence::EvidenceIngest;
pub use evidence::EvidenceRecord;
pub use evidence::MAX_EXCERPT_CHARS;
pub use evidence::SourceSystem;
pub use evidence::redacted_excerpt;
pub use graph::ClaimKind;
pub use graph::ClaimRecord;
pub use graph::ClaimStatus;
pub use graph::ContradictionKind;
pub use graph::ContradictionRecord;
pub use graph::ContradictionStatus;
pub use graph::Direction;
pub use graph::EdgeKind;
pub use graph::EdgeRecord;
pub use graph::EdgeStatus;
pub use graph::GraphView;
pub use graph::NewClaim;
pub use graph::NewContradiction;
pub use graph::NewEdge;
pub use graph::NodeKind;
pub use graph::NodeRecord;
pub use graph::NodeVersionRecord;
pub use graph::bitemporal_visible;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::normalize_policy_text;
pub use hashing::policy_text_hash;
pub use hashing::sha256_hex;
pub use identifiers::ActionId;
pub use identifiers::CaseId;
pub use identifiers::ClaimId;
pub use identifiers::ContradictionId;
pub use identifiers::DeliveryId;
pub use identifiers::EdgeId;
pub use identifiers::EvidenceId;
pub use identifiers::NodeId;
pub use identifiers::NodeVersionId;
pub use identifiers::PlaybookId;
pub use identifiers::PolicyId;
pub use identifiers::RequestId;
pub use identifiers::ScopeId;
pub use identifiers::WebhookId;
pub use packet::BlockedSection;
pub use packet::CascadeImpact;
pub use packet::DecisionPacket;
pub use packet::PacketEvidence;
pub use packet::PacketExecution;
pub use packet::PacketMetrics;
pub use packet::PacketPolicy;
pub use packet::PacketTimestamps;
pub use playbook::NewPlaybook;
pub use playbook::PlaybookAction;
pub use playbook::PlaybookDomain;
pub use playbook::PlaybookPattern;
pub use playbook::PlaybookRecord;
pub use playbook::PlaybookStats;
pub use playbook::decay_factor;
pub use playbook::policy_alignment;
pub use policy::NewPolicy;
pub use policy::PolicyCondition;
pub use policy::PolicyEffect;
pub use policy::PolicyRecord;
pub use policy::Verdict;
pub use policy::seed_policies;
pub use time::TimeError;
pub use time::TimeWindow;
pub use time::Timestamp;
