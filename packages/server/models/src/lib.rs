#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the claim settlement server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use index_claims_database_models::{Claim, CustomerClaimSummary};
use index_claims_models::{ClaimCategory, ClaimStatus, Resolution};
use serde::{Deserialize, Serialize};

/// A claim as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClaim {
    /// Claim id.
    pub id: i64,
    /// Policy the claim was raised against.
    pub policy_id: i64,
    /// Underwriting company.
    pub company_id: i64,
    /// Policy holder.
    pub customer_id: i64,
    /// Zone whose thresholds apply.
    pub zone_id: i64,
    /// Grid cell whose index readings apply.
    pub grid_id: i64,
    /// Period evaluated.
    pub period: i32,
    /// Product family.
    pub category: ClaimCategory,
    /// Sum insured for the period.
    pub sum_insured: f64,
    /// Computed payout, absent while processing.
    pub amount: Option<f64>,
    /// Lifecycle status.
    pub status: ClaimStatus,
    /// Why the claim ended where it did.
    pub resolution: Option<Resolution>,
    /// When the claim was created (ISO 8601).
    pub created_at: DateTime<Utc>,
    /// When the claim was last modified (ISO 8601).
    pub updated_at: DateTime<Utc>,
}

impl From<Claim> for ApiClaim {
    fn from(claim: Claim) -> Self {
        Self {
            id: claim.id,
            policy_id: claim.policy_id,
            company_id: claim.company_id,
            customer_id: claim.customer_id,
            zone_id: claim.zone_id,
            grid_id: claim.grid_id,
            period: claim.period,
            category: claim.category,
            sum_insured: claim.sum_insured,
            amount: claim.amount,
            status: claim.status,
            resolution: claim.resolution,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
        }
    }
}

/// Per-customer claim totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCustomerClaims {
    /// Policy holder.
    pub customer_id: i64,
    /// Number of claims.
    pub claim_count: i64,
    /// Sum of computed amounts.
    pub total_amount: f64,
    /// Claims still processing.
    pub processing: i64,
    /// Claims awaiting authorization.
    pub pending: i64,
    /// Authorized claims.
    pub authorized: i64,
    /// Settled claims.
    pub settled: i64,
    /// Failed claims.
    pub failed: i64,
}

impl From<CustomerClaimSummary> for ApiCustomerClaims {
    fn from(summary: CustomerClaimSummary) -> Self {
        Self {
            customer_id: summary.customer_id,
            claim_count: summary.claim_count,
            total_amount: summary.total_amount,
            processing: summary.processing,
            pending: summary.pending,
            authorized: summary.authorized,
            settled: summary.settled,
            failed: summary.failed,
        }
    }
}

/// Query parameters for `POST /api/claims/trigger`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerParams {
    /// Only policies for this period.
    pub period: Option<i32>,
    /// Only policies of this category (`crop` or `livestock`).
    pub category: Option<String>,
}

/// Query parameters for `POST /api/claims/crop`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodParams {
    /// Only policies for this period.
    pub period: Option<i32>,
}

/// Acknowledgement returned when a batch run is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTriggerAccepted {
    /// Always `true`; the batch runs in the background.
    pub accepted: bool,
    /// Period filter applied, if any.
    pub period: Option<i32>,
    /// Category filter applied, if any.
    pub category: Option<ClaimCategory>,
    /// Human-readable summary.
    pub message: String,
}

/// Server health response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}
