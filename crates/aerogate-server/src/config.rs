// crates/aerogate-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: TOML file plus environment overrides with strict validation.
// Purpose: Fail closed on malformed deployment configuration.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration loads from an optional TOML file and is overridden by
//! environment variables. Required settings are the database path and the
//! evidence store root; everything else has conservative defaults.
//! Validation failures carry the offending key so operators can fix the
//! deployment without reading source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment variable for the database path.
pub const ENV_DATABASE_PATH: &str = "AEROGATE_DATABASE_PATH";
/// Environment variable for the evidence store root.
pub const ENV_EVIDENCE_ROOT: &str = "AEROGATE_EVIDENCE_ROOT";
/// Environment variable for the bind address.
pub const ENV_BIND_ADDR: &str = "AEROGATE_BIND_ADDR";
/// Environment variable for the webhook timeout (ms).
pub const ENV_WEBHOOK_TIMEOUT_MS: &str = "AEROGATE_WEBHOOK_TIMEOUT_MS";
/// Environment variable enabling scenario mode.
pub const ENV_SCENARIO_MODE: &str = "AEROGATE_SCENARIO_MODE";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config file unreadable: {0}")]
    Io(String),
    /// Config file failed to parse.
    #[error("config file invalid: {0}")]
    Parse(String),
    /// A required setting is missing.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    /// A setting failed validation.
    #[error("invalid setting {key}: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Raw TOML shape; all fields optional so env overrides can complete it.
#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    /// Database path.
    database_path: Option<PathBuf>,
    /// Evidence store root.
    evidence_root: Option<PathBuf>,
    /// Bind address.
    bind_addr: Option<String>,
    /// Webhook timeout (ms).
    webhook_timeout_ms: Option<u64>,
    /// Scenario mode flag.
    scenario_mode: Option<bool>,
}

/// Validated server configuration.
///
/// # Invariants
/// - `database_path` and `evidence_root` are non-empty.
/// - `webhook_timeout_ms` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path to the `SQLite` database file.
    pub database_path: PathBuf,
    /// Directory for content-addressed evidence payload files.
    pub evidence_root: PathBuf,
    /// Socket address the server binds to.
    pub bind_addr: String,
    /// Webhook delivery timeout in milliseconds.
    pub webhook_timeout_ms: u64,
    /// Whether the deterministic scenario signal source is active.
    pub scenario_mode: bool,
}

impl ServerConfig {
    /// Loads configuration from an optional TOML file plus env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is malformed or required
    /// settings are missing after overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut raw = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                toml::from_str::<RawConfig>(&text)
                    .map_err(|err| ConfigError::Parse(err.to_string()))?
            }
            None => RawConfig::default(),
        };
        if let Ok(value) = std::env::var(ENV_DATABASE_PATH) {
            raw.database_path = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var(ENV_EVIDENCE_ROOT) {
            raw.evidence_root = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var(ENV_BIND_ADDR) {
            raw.bind_addr = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_WEBHOOK_TIMEOUT_MS) {
            raw.webhook_timeout_ms = Some(value.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_WEBHOOK_TIMEOUT_MS,
                message: format!("not a millisecond count: {value}"),
            })?);
        }
        if let Ok(value) = std::env::var(ENV_SCENARIO_MODE) {
            raw.scenario_mode = Some(matches!(value.as_str(), "1" | "true" | "yes"));
        }
        Self::validate(raw)
    }

    /// Validates the merged raw configuration.
    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let database_path = raw.database_path.ok_or(ConfigError::Missing("database_path"))?;
        let evidence_root = raw.evidence_root.ok_or(ConfigError::Missing("evidence_root"))?;
        if database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "database_path",
                message: "must not be empty".to_string(),
            });
        }
        if evidence_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "evidence_root",
                message: "must not be empty".to_string(),
            });
        }
        let webhook_timeout_ms = raw.webhook_timeout_ms.unwrap_or(5_000);
        if webhook_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "webhook_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            database_path,
            evidence_root,
            bind_addr: raw.bind_addr.unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            webhook_timeout_ms,
            scenario_mode: raw.scenario_mode.unwrap_or(true),
        })
    }
}
