//! Pipeline settings shared by the CLI and the API server.
//!
//! Read from the `[pipeline]` table of the TOML file named by
//! `INDEX_CLAIMS_CONFIG`:
//!
//! ```toml
//! [pipeline]
//! database_path = "data/claims.db"
//!
//! [pipeline.gateway]
//! policy_service_url = "http://policy_service:8000"
//! max_retries = 2
//!
//! [pipeline.scheduler]
//! workers = 16
//! ```

use std::path::Path;

use index_claims_gateway::GatewayConfig;
use serde::Deserialize;

use crate::scheduler::SchedulerConfig;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "INDEX_CLAIMS_CONFIG";

/// Store, gateway and scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path of the claims `SQLite` database.
    pub database_path: String,
    /// External data services.
    pub gateway: GatewayConfig,
    /// Worker pool sizing.
    pub scheduler: SchedulerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: index_claims_database::db::DEFAULT_DB_PATH.to_string(),
            gateway: GatewayConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pipeline: PipelineConfig,
}

/// Errors loading the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this shape.
    #[error("Invalid config file {path}: {source}")]
    Toml {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },
}

impl PipelineConfig {
    /// Parses the `[pipeline]` table out of a full config document.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] if the document is not valid TOML or the
    /// table has the wrong shape.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        Ok(toml::from_str::<ConfigFile>(s)?.pipeline)
    }

    /// Reads the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the file named by `INDEX_CLAIMS_CONFIG` (defaults when unset),
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the named file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                log::info!("Loading pipeline config from {path}");
                Self::from_file(Path::new(&path))?
            }
            Err(_) => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Overrides `database_path` from `DATABASE_PATH` and the gateway URLs
    /// from their environment variables.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database_path = path;
        }
        self.gateway = self.gateway.with_env_overrides();
        self
    }
}
