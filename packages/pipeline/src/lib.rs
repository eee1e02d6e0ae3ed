#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Claim settlement pipeline.
//!
//! A [`batch::BatchTrigger`] run fetches the policy roster once, creates one
//! claim per eligible `(policy, period)` and hands each new claim to the
//! [`scheduler::ClaimScheduler`]. Scheduler workers drive every claim through
//! the [`orchestrator::Orchestrator`] state machine until it reaches
//! `PENDING` or `SETTLED`.
//!
//! Every component receives its store and gateway handles explicitly; there
//! is no process-wide state.

pub mod batch;
pub mod config;
pub mod orchestrator;
pub mod scheduler;

use index_claims_database::DbError;
use index_claims_gateway::GatewayError;
use index_claims_models::Resolution;
use strum_macros::{AsRefStr, Display};

pub use batch::{BatchReport, BatchRequest, BatchTrigger};
pub use config::PipelineConfig;
pub use orchestrator::{ClaimJob, ClaimOutcome, Orchestrator};
pub use scheduler::{ClaimScheduler, SchedulerConfig};

/// Errors surfaced by the pipeline.
///
/// Per-claim failures never escape as errors; they settle the claim. These
/// are the failures a caller can act on.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An external data service failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The claim store failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A policy record failed validation.
    #[error("Invalid policy record {policy_id}: {message}")]
    InvalidRecord {
        /// Policy the record belongs to.
        policy_id: i64,
        /// What was wrong with it.
        message: String,
    },

    /// The scheduler has shut down and accepts no more work.
    #[error("Claim scheduler is closed")]
    SchedulerClosed,
}

/// Orchestrator steps, named in logs when a claim settles early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    /// Validating the policy record.
    ParseRecord,
    /// Fetching zone/period trigger and exit points.
    ZoneConfig,
    /// Fetching the grid's growing season.
    GrowingSeason,
    /// Fetching the index reading.
    IndexReading,
    /// Applying the payout formula.
    Compute,
    /// Anything else, including store writes and panics.
    Internal,
}

/// Maps a gateway failure to the resolution recorded on the settled claim.
#[must_use]
pub const fn resolution_for(error: &GatewayError) -> Resolution {
    match error {
        GatewayError::Unavailable { .. } => Resolution::SourceUnavailable,
        GatewayError::Malformed { .. } => Resolution::MalformedData,
    }
}

#[cfg(test)]
pub(crate) mod testing;
