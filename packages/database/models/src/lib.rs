#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Stored claim rows and aggregate shapes.
//!
//! These types represent claims as stored in and retrieved from the claim
//! store. They are distinct from the API response types in
//! `index_claims_server_models` and the roster records in
//! `index_claims_models`.

use chrono::{DateTime, Utc};
use index_claims_models::{ClaimCategory, ClaimStatus, PolicyRecord, Resolution};
use serde::{Deserialize, Serialize};

/// A claim row as retrieved from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Primary key.
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
    /// Period being evaluated.
    pub period: i32,
    /// Product family.
    pub category: ClaimCategory,
    /// Sum insured for the period.
    pub sum_insured: f64,
    /// Computed payout. `None` while processing.
    pub amount: Option<f64>,
    /// Lifecycle status.
    pub status: ClaimStatus,
    /// Why the claim ended where it did. `None` while processing.
    pub resolution: Option<Resolution>,
    /// When the claim was created.
    pub created_at: DateTime<Utc>,
    /// When the claim was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Rebuilds the policy record this claim was created from.
    #[must_use]
    pub const fn policy_record(&self) -> PolicyRecord {
        PolicyRecord {
            policy_id: self.policy_id,
            customer_id: self.customer_id,
            company_id: self.company_id,
            zone_id: self.zone_id,
            grid_id: self.grid_id,
            period: self.period,
            product_type: self.category.product_code(),
            sum_insured: self.sum_insured,
        }
    }
}

/// Fields needed to insert a new claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    /// Policy the claim is raised against.
    pub policy_id: i64,
    /// Underwriting company.
    pub company_id: i64,
    /// Policy holder.
    pub customer_id: i64,
    /// Zone whose thresholds apply.
    pub zone_id: i64,
    /// Grid cell whose index readings apply.
    pub grid_id: i64,
    /// Period being evaluated.
    pub period: i32,
    /// Product family.
    pub category: ClaimCategory,
    /// Sum insured for the period.
    pub sum_insured: f64,
}

impl NewClaim {
    /// Builds the insert fields from a roster record. Returns `None` if the
    /// product code is not a known category.
    #[must_use]
    pub const fn from_record(record: &PolicyRecord) -> Option<Self> {
        let Some(category) = record.category() else {
            return None;
        };
        Some(Self {
            policy_id: record.policy_id,
            company_id: record.company_id,
            customer_id: record.customer_id,
            zone_id: record.zone_id,
            grid_id: record.grid_id,
            period: record.period,
            category,
            sum_insured: record.sum_insured,
        })
    }
}

/// Per-customer claim totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerClaimSummary {
    /// Policy holder.
    pub customer_id: i64,
    /// Number of claims.
    pub claim_count: i64,
    /// Sum of computed amounts (unset amounts count as zero).
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
