#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Claim store for the settlement pipeline.
//!
//! Claims live in a single `SQLite` table accessed through
//! `switchy_database` with raw parameterized SQL. The store enforces one
//! claim per `(policy_id, period)` and only applies status changes the
//! claim state machine allows.

pub mod db;
pub mod queries;

use index_claims_models::ClaimStatus;

/// Errors that can occur during claim store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be opened.
    #[error("Failed to open database: {0}")]
    Init(String),

    /// An I/O operation failed (e.g., creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// No claim with this id.
    #[error("Claim {id} not found")]
    NotFound {
        /// The requested claim id.
        id: i64,
    },

    /// The state machine does not allow this status change.
    #[error("Claim {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The claim id.
        id: i64,
        /// Current status.
        from: ClaimStatus,
        /// Requested status.
        to: ClaimStatus,
    },

    /// Amounts must be finite and non-negative.
    #[error("Invalid claim amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: f64,
    },
}
