// crates/aerogate-server/tests/config_validation.rs
// ============================================================================
// Module: Server Configuration Tests
// Description: TOML loading, defaults, and validation failures.
// Purpose: Validate that deployments fail closed on malformed configuration.
// ============================================================================

//! ## Overview
//! Tests for configuration loading:
//! - A complete TOML file loads with defaults applied
//! - Missing required settings and invalid values are rejected with the
//!   offending key

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io::Write;

use aerogate_server::ConfigError;
use aerogate_server::ServerConfig;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
fn complete_config_loads_with_defaults() {
    let file = write_config(
        r#"
database_path = "/var/lib/aerogate/aerogate.db"
evidence_root = "/var/lib/aerogate/evidence"
"#,
    );
    let config = ServerConfig::load(Some(file.path())).expect("load");
    assert_eq!(config.database_path.to_string_lossy(), "/var/lib/aerogate/aerogate.db");
    assert_eq!(config.webhook_timeout_ms, 5_000);
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    assert!(config.scenario_mode);
}

#[test]
fn explicit_settings_override_defaults() {
    let file = write_config(
        r#"
database_path = "/tmp/a.db"
evidence_root = "/tmp/evidence"
bind_addr = "0.0.0.0:9090"
webhook_timeout_ms = 2500
scenario_mode = false
"#,
    );
    let config = ServerConfig::load(Some(file.path())).expect("load");
    assert_eq!(config.bind_addr, "0.0.0.0:9090");
    assert_eq!(config.webhook_timeout_ms, 2_500);
    assert!(!config.scenario_mode);
}

#[test]
fn missing_database_path_is_rejected() {
    let file = write_config("evidence_root = \"/tmp/evidence\"\n");
    let err = ServerConfig::load(Some(file.path())).expect_err("missing database path");
    assert!(matches!(err, ConfigError::Missing("database_path")));
}

#[test]
fn missing_evidence_root_is_rejected() {
    let file = write_config("database_path = \"/tmp/a.db\"\n");
    let err = ServerConfig::load(Some(file.path())).expect_err("missing evidence root");
    assert!(matches!(err, ConfigError::Missing("evidence_root")));
}

#[test]
fn zero_webhook_timeout_is_rejected() {
    let file = write_config(
        r#"
database_path = "/tmp/a.db"
evidence_root = "/tmp/evidence"
webhook_timeout_ms = 0
"#,
    );
    let err = ServerConfig::load(Some(file.path())).expect_err("zero timeout");
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "webhook_timeout_ms",
            ..
        }
    ));
}

#[test]
fn malformed_toml_is_rejected() {
    let file = write_config("database_path = [not toml");
    let err = ServerConfig::load(Some(file.path())).expect_err("malformed toml");
    assert!(matches!(err, ConfigError::Parse(_)));
}
