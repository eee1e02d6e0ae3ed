#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! External data gateway for the claim settlement pipeline.
//!
//! The pipeline depends on four independent services: the policy roster,
//! the zone/period trigger configuration, index readings, and growing
//! seasons. Each read is exposed through the [`DataGateway`] trait and
//! classified into exactly one of `Ok`, [`GatewayError::Unavailable`] or
//! [`GatewayError::Malformed`]. [`HttpGateway`] is the production
//! implementation.

pub mod config;
pub mod http;
pub mod parsing;
pub mod retry;
pub mod roster_cache;

use async_trait::async_trait;
use index_claims_models::{GrowingSeason, IndexThresholds, PolicyRecord};

pub use config::GatewayConfig;
pub use http::HttpGateway;

/// The external services the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataService {
    /// Policy roster service.
    PolicyRoster,
    /// Zone/period trigger and exit configuration.
    ZoneConfig,
    /// Vegetation index readings.
    IndexReading,
    /// Growing season windows per grid.
    GrowingSeason,
}

impl std::fmt::Display for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PolicyRoster => "policy roster service",
            Self::ZoneConfig => "zone config service",
            Self::IndexReading => "index service",
            Self::GrowingSeason => "growing season service",
        })
    }
}

/// Errors returned by gateway reads.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Network failure, timeout, or a non-2xx response.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Which service failed.
        service: DataService,
        /// Description of what went wrong.
        message: String,
    },

    /// A 2xx response whose payload failed a structural check.
    #[error("{service} returned a malformed payload: {message}")]
    Malformed {
        /// Which service failed.
        service: DataService,
        /// Description of what went wrong.
        message: String,
    },
}

impl GatewayError {
    /// Returns the service this error came from.
    #[must_use]
    pub const fn service(&self) -> DataService {
        match self {
            Self::Unavailable { service, .. } | Self::Malformed { service, .. } => *service,
        }
    }

    /// Whether this is a malformed-payload error.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Read access to the services the settlement pipeline depends on.
///
/// Implementations are shared across concurrently running orchestrator
/// tasks.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Fetches every policy on the roster. Entries missing a required field
    /// are dropped and logged rather than failing the whole fetch.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the roster cannot be fetched or is not a
    /// list.
    async fn fetch_policy_roster(&self) -> Result<Vec<PolicyRecord>, GatewayError>;

    /// Fetches the trigger and exit points for a zone and period. A missing
    /// record yields [`IndexThresholds::INACTIVE`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service fails or the payload is
    /// malformed.
    async fn fetch_zone_period_config(
        &self,
        zone_id: i64,
        period: i32,
    ) -> Result<IndexThresholds, GatewayError>;

    /// Fetches the index reading for a grid and period.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] if the numeric field is absent or
    /// not a number, [`GatewayError::Unavailable`] on transport failure.
    async fn fetch_index(&self, grid_id: i64, period: i32) -> Result<f64, GatewayError>;

    /// Fetches the growing season for a grid, or `None` if none is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the service fails or the payload is
    /// malformed.
    async fn fetch_growing_season(
        &self,
        grid_id: i64,
    ) -> Result<Option<GrowingSeason>, GatewayError>;
}
