// crates/aerogate-core/src/lib.rs
// ============================================================================
// Module: Aerogate Core Library
// Description: Public API surface for the Aerogate control plane core.
// Purpose: Expose the data model, interfaces, and runtime engines.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Aerogate ingests aviation disruption signals, binds every derived fact to
//! the raw bytes that produced it, and emits governed decision packets
//! declaring a gateway posture. The core is backend-agnostic: durable
//! storage, signal clients, risk assessors, and delivery sinks integrate
//! through explicit interfaces rather than embedded dependencies.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::AssessorError;
pub use interfaces::CaseStore;
pub use interfaces::Clock;
pub use interfaces::ControlStores;
pub use interfaces::EventSink;
pub use interfaces::EvidenceStore;
pub use interfaces::ExportError;
pub use interfaces::FixedClock;
pub use interfaces::GatewayEvent;
pub use interfaces::GatewayEventKind;
pub use interfaces::GraphStore;
pub use interfaces::InvariantKind;
pub use interfaces::NullEventSink;
pub use interfaces::NullPacketSink;
pub use interfaces::PacketSink;
pub use interfaces::PlaybookStore;
pub use interfaces::PolicyStore;
pub use interfaces::RiskAssessor;
pub use interfaces::SignalError;
pub use interfaces::SignalFetch;
pub use interfaces::SignalSource;
pub use interfaces::NewDelivery;
pub use interfaces::StoreError;
pub use interfaces::WebhookRegistration;
pub use interfaces::WebhookStore;
pub use runtime::ActionGovernor;
pub use runtime::CancelToken;
pub use runtime::MemoryStores;
pub use runtime::Orchestrator;
pub use runtime::OrchestratorConfig;
pub use runtime::OrchestratorError;
pub use runtime::RunObserver;
pub use runtime::RunReport;
