//! Application configuration.
//!
//! Aggregates configuration for storage, job scheduling and collaborator
//! endpoints into a single Config struct that can be loaded from YAML files
//! or environment variables.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ROUNDUP_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ROUNDUP";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ROUNDUP_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Job scheduling configuration.
    pub jobs: JobsConfig,
    /// External collaborator endpoints.
    pub collaborators: CollaboratorsConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend: `sqlite` or `memory`.
    pub storage_type: String,
    /// SQLite database path.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "sqlite".to_string(),
            path: "data/roundup.db".to_string(),
        }
    }
}

/// Job scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Seconds between sync/threshold processing runs.
    pub sync_interval_secs: u64,
    /// Per-request timeout for collaborator calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            // Sync/threshold processing every four hours.
            sync_interval_secs: 4 * 60 * 60,
            request_timeout_secs: 30,
        }
    }
}

/// External collaborator endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub bank_sync_url: String,
    pub payments_url: String,
    pub donors_url: String,
    pub tax_url: String,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            bank_sync_url: "http://localhost:8101".to_string(),
            payments_url: "http://localhost:8102".to_string(),
            donors_url: "http://localhost:8103".to_string(),
            tax_url: "http://localhost:8104".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `ROUNDUP_CONFIG` environment variable (if set)
    /// 4. Environment variables with `ROUNDUP` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }
}
