// crates/aerogate-core/src/runtime/mod.rs
// ============================================================================
// Module: Aerogate Runtime
// Description: Derivation, policy, planning, governance, orchestration, sealing.
// Purpose: Deterministic engines over the core data model and interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime holds every engine that turns signals into a sealed decision
//! packet. All engines are deterministic functions of their inputs; the only
//! non-deterministic collaborators (signal sources, risk assessors) sit
//! behind interfaces and return structured records.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod derivation;
pub mod governance;
pub mod learner;
pub mod memory;
pub mod orchestrator;
pub mod packet;
pub mod planner;
pub mod policy;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use derivation::Derived;
pub use derivation::SourceSample;
pub use derivation::derive_signals;
pub use derivation::detect_contradictions;
pub use derivation::fetch_criticality;
pub use governance::ActionGovernor;
pub use governance::ActionHandler;
pub use governance::GovernanceError;
pub use governance::transition_allowed;
pub use learner::ScoredPlaybook;
pub use learner::mine_case;
pub use learner::retrieve;
pub use memory::MemoryStores;
pub use orchestrator::CancelToken;
pub use orchestrator::MAX_INVESTIGATE_RETRIES;
pub use orchestrator::NullObserver;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::OrchestratorError;
pub use orchestrator::OrchestratorState;
pub use orchestrator::ProgressSnapshot;
pub use orchestrator::RunObserver;
pub use orchestrator::RunReport;
pub use packet::PacketInputs;
pub use packet::build_packet;
pub use packet::cascade_impact;
pub use planner::BEAM_DEPTH;
pub use planner::BEAM_WIDTH;
pub use planner::PlanContext;
pub use planner::PlannedAction;
pub use planner::estimated_cost_usd;
pub use planner::plan;
pub use policy::AppliedPolicy;
pub use policy::PolicyResult;
pub use policy::evaluate;
