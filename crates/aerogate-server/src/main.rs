// crates/aerogate-server/src/main.rs
// ============================================================================
// Module: Aerogate Server Binary
// Description: Entrypoint wiring configuration, stores, and the router.
// Purpose: Serve the control plane over HTTP.
// Dependencies: aerogate-server, tokio
// ============================================================================

//! ## Overview
//! Thin serving entrypoint: load configuration (optional TOML file named by
//! `AEROGATE_CONFIG`, environment overrides on top), bootstrap the state,
//! bind, and serve. Failures are written to stderr and exit non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use aerogate_server::AppState;
use aerogate_server::ServerConfig;
use aerogate_server::router;

// ============================================================================
// SECTION: Entrypoint
// ============================================================================

/// Writes a failure line to stderr without panicking.
fn report_failure(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln_to(&mut stderr, message);
}

/// Writes one line to the given writer.
fn writeln_to(writer: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writer.write_all(message.as_bytes())?;
    writer.write_all(b"\n")
}

/// Serves the control plane.
fn main() -> ExitCode {
    let config_path = std::env::var("AEROGATE_CONFIG").ok().map(PathBuf::from);
    let config = match ServerConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            report_failure(&format!("configuration error: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let state = match AppState::bootstrap(&config) {
        Ok(state) => state,
        Err(err) => {
            report_failure(&format!("bootstrap error: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            report_failure(&format!("runtime error: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        axum::serve(listener, router(state)).await
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&format!("server error: {err}"));
            ExitCode::FAILURE
        }
    }
}
