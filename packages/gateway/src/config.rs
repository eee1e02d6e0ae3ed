//! Gateway endpoints, timeouts, and retry settings.
//!
//! Loaded from the `[gateway]` table of the application TOML config, with
//! service URLs overridable from the environment.

use std::time::Duration;

use serde::Deserialize;

/// Connection and per-operation settings for [`crate::HttpGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the policy roster service.
    pub policy_service_url: String,
    /// Base URL of the zone configuration and growing season service.
    pub config_service_url: String,
    /// Base URL of the index reading service.
    pub index_service_url: String,
    /// TCP connect timeout shared by every operation.
    pub connect_timeout_secs: u64,
    /// Request timeout for the roster fetch.
    pub roster_timeout_secs: u64,
    /// Request timeout for zone/period configuration reads.
    pub zone_config_timeout_secs: u64,
    /// Request timeout for index reads.
    pub index_timeout_secs: u64,
    /// Request timeout for growing season reads.
    pub season_timeout_secs: u64,
    /// Extra attempts for transient failures. `0` sends each request once.
    pub max_retries: u32,
    /// How long a fetched roster is reused. `0` disables the cache.
    pub roster_cache_ttl_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            policy_service_url: "http://policy_service:8000".to_string(),
            config_service_url: "http://config_service:8000".to_string(),
            index_service_url: "http://config_service:8000".to_string(),
            connect_timeout_secs: 5,
            roster_timeout_secs: 30,
            zone_config_timeout_secs: 10,
            index_timeout_secs: 15,
            season_timeout_secs: 10,
            max_retries: 0,
            roster_cache_ttl_secs: 0,
        }
    }
}

impl GatewayConfig {
    /// Parses a `[gateway]`-shaped TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] if the document is not valid for this
    /// shape.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Overrides service URLs from `POLICY_SERVICE_URL`,
    /// `CONFIG_SERVICE_URL` and `INDEX_SERVICE_URL` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("POLICY_SERVICE_URL") {
            self.policy_service_url = url;
        }
        if let Ok(url) = std::env::var("CONFIG_SERVICE_URL") {
            self.config_service_url = url;
        }
        if let Ok(url) = std::env::var("INDEX_SERVICE_URL") {
            self.index_service_url = url;
        }
        self
    }

    /// TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Roster cache lifetime, or `None` when caching is disabled.
    #[must_use]
    pub const fn roster_cache_ttl(&self) -> Option<Duration> {
        if self.roster_cache_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.roster_cache_ttl_secs))
        }
    }
}
