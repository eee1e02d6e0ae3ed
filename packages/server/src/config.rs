//! Server configuration.
//!
//! One TOML file, named by `INDEX_CLAIMS_CONFIG`, holds a `[server]` table
//! for this crate and a `[pipeline]` table shared with the pipeline CLI.
//! Every field has a default, and environment variables override the file.

use std::path::Path;

use index_claims_pipeline::PipelineConfig;
use index_claims_pipeline::config::{CONFIG_PATH_ENV, ConfigError};
use serde::Deserialize;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Store, gateway and scheduler.
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Parses a full config document.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] if the document has the wrong shape.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
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
                log::info!("Loading config from {path}");
                let text = std::fs::read_to_string(Path::new(&path)).map_err(|source| {
                    ConfigError::Io {
                        path: path.clone(),
                        source,
                    }
                })?;
                Self::from_toml_str(&text).map_err(|source| ConfigError::Toml { path, source })?
            }
            Err(_) => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Applies `BIND_ADDR` and `PORT`, then the pipeline overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        self.pipeline = self.pipeline.with_env_overrides();
        self
    }
}
