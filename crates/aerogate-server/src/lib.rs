// crates/aerogate-server/src/lib.rs
// ============================================================================
// Module: Aerogate Server Library
// Description: HTTP surface, configuration, scenarios, and telemetry.
// Purpose: Expose the REST control plane over the Aerogate core.
// Dependencies: crate::{app, assess, config, error, scenario, telemetry}
// ============================================================================

//! ## Overview
//! The server crate hosts the REST surface of the control plane: case
//! creation and orchestration (with SSE streaming), evidence pre-seeding,
//! packet and bi-temporal audit reads, simulation fixtures, and SSRF-guarded
//! webhook registration. The core stays synchronous; async lives only here.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod app;
pub mod assess;
pub mod config;
pub mod error;
pub mod scenario;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use app::AppState;
pub use app::SystemClock;
pub use app::router;
pub use assess::HeuristicRiskAssessor;
pub use config::ConfigError;
pub use config::ServerConfig;
pub use error::ApiError;
pub use scenario::ScenarioSignalSource;
pub use scenario::scenarios;
pub use scenario::seed_airport;
