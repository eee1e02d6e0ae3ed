#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Claim lifecycle and policy roster types for index-based claim settlement.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: the claim state machine, the claim category derived from a
//! product code, the settlement resolution recorded on terminal claims, and
//! the read-only records fetched from the external data services.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Highest period number for crop-style products (dekads in a year).
pub const MAX_PERIOD: i32 = 36;

/// Lifecycle status of a claim.
///
/// `Processing` is the only initial state. The settlement pipeline moves a
/// claim to `Pending` or `Settled`; an external authorization moves `Pending`
/// to `Authorized`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ClaimStatus {
    /// Created, payout not yet computed.
    Processing,
    /// Payout computed, awaiting human authorization.
    Pending,
    /// Payout authorized for payment.
    Authorized,
    /// Finalized without further processing.
    Settled,
    /// Could not be resolved at all. Readable for legacy rows; the pipeline
    /// never writes it.
    Failed,
}

impl ClaimStatus {
    /// Returns the statuses a claim may move to `self` from.
    ///
    /// `Processing` has no predecessors: a claim never re-enters it.
    #[must_use]
    pub const fn predecessors(self) -> &'static [Self] {
        match self {
            Self::Processing => &[],
            Self::Pending | Self::Settled | Self::Failed => &[Self::Processing],
            Self::Authorized => &[Self::Pending],
        }
    }

    /// Whether a claim in `self` may move to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next.predecessors().contains(&self)
    }

    /// Whether the settlement pipeline is done with a claim in this status.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Processing,
            Self::Pending,
            Self::Authorized,
            Self::Settled,
            Self::Failed,
        ]
    }
}

/// Insurance product family a claim belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ClaimCategory {
    /// Vegetation-index crop cover, gated by the growing season.
    Crop,
    /// Forage cover evaluated on a z-score derived from the index.
    Livestock,
}

impl ClaimCategory {
    /// Maps a roster `product_type` code to a category (`1` = crop,
    /// `2` = livestock).
    #[must_use]
    pub const fn from_product_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Crop),
            2 => Some(Self::Livestock),
            _ => None,
        }
    }

    /// Returns the roster `product_type` code for this category.
    #[must_use]
    pub const fn product_code(self) -> i64 {
        match self {
            Self::Crop => 1,
            Self::Livestock => 2,
        }
    }
}

/// Why a claim ended where it did.
///
/// Every external failure settles at zero, so the status alone cannot tell
/// "confirmed no loss" from "could not determine". The resolution keeps that
/// distinction for reporting.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// A positive payout was computed.
    Payable,
    /// The index was at or above the trigger point.
    NoLoss,
    /// No trigger/exit configuration for the zone and period.
    NoCoverage,
    /// Crop period outside the grid's growing season.
    OutOfSeason,
    /// An external service timed out, refused, or answered non-2xx.
    SourceUnavailable,
    /// An external service answered with an unusable payload.
    MalformedData,
    /// The policy record itself failed validation.
    InvalidRecord,
    /// The run failed for any other reason, including a panic.
    InternalError,
}

impl Resolution {
    /// Whether this resolution reflects a confirmed outcome rather than
    /// missing or broken inputs.
    #[must_use]
    pub const fn is_determined(self) -> bool {
        matches!(
            self,
            Self::Payable | Self::NoLoss | Self::NoCoverage | Self::OutOfSeason
        )
    }
}

/// One policy entry from the policy roster service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Policy identifier.
    pub policy_id: i64,
    /// Customer holding the policy.
    pub customer_id: i64,
    /// Insurance company underwriting the policy.
    pub company_id: i64,
    /// Zone whose trigger/exit configuration applies.
    #[serde(rename = "cps_zone")]
    pub zone_id: i64,
    /// Grid cell whose index readings apply.
    #[serde(rename = "grid")]
    pub grid_id: i64,
    /// Period being evaluated.
    pub period: i32,
    /// Raw product code (`1` = crop, `2` = livestock).
    pub product_type: i64,
    /// Sum insured for one period.
    #[serde(rename = "period_sum_insured")]
    pub sum_insured: f64,
}

impl PolicyRecord {
    /// Returns the claim category for this record's product code, if known.
    #[must_use]
    pub const fn category(&self) -> Option<ClaimCategory> {
        ClaimCategory::from_product_code(self.product_type)
    }
}

/// Trigger and exit points for one zone and period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexThresholds {
    /// Index value at or above which nothing is paid.
    #[serde(rename = "trigger_point")]
    pub trigger: f64,
    /// Index value at or below which the full sum insured is paid.
    #[serde(rename = "exit_point")]
    pub exit: f64,
}

impl IndexThresholds {
    /// The "no active coverage window" configuration.
    pub const INACTIVE: Self = Self {
        trigger: 0.0,
        exit: 0.0,
    };

    /// Whether these thresholds mean no active coverage.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_inactive(&self) -> bool {
        self.trigger == 0.0 && self.exit == 0.0
    }
}

/// Inclusive period range during which a crop policy is evaluated.
///
/// When `start > end` the season wraps the year boundary, e.g. `33..=4`
/// covers periods 33-36 and 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowingSeason {
    /// First period of the season.
    #[serde(rename = "start_period")]
    pub start: i32,
    /// Last period of the season.
    #[serde(rename = "end_period")]
    pub end: i32,
}

impl GrowingSeason {
    /// Creates a season from its first and last period.
    #[must_use]
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Whether the season crosses the year boundary.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Whether `period` falls inside the season.
    #[must_use]
    pub const fn contains(&self, period: i32) -> bool {
        if self.wraps() {
            period >= self.start || period <= self.end
        } else {
            period >= self.start && period <= self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_is_never_reentered() {
        for status in ClaimStatus::all() {
            assert!(!status.can_transition_to(ClaimStatus::Processing));
        }
    }

    #[test]
    fn pipeline_transitions_leave_processing_only() {
        assert!(ClaimStatus::Processing.can_transition_to(ClaimStatus::Pending));
        assert!(ClaimStatus::Processing.can_transition_to(ClaimStatus::Settled));
        assert!(ClaimStatus::Pending.can_transition_to(ClaimStatus::Authorized));
        assert!(!ClaimStatus::Settled.can_transition_to(ClaimStatus::Pending));
        assert!(!ClaimStatus::Processing.can_transition_to(ClaimStatus::Authorized));
        assert!(!ClaimStatus::Authorized.can_transition_to(ClaimStatus::Settled));
    }

    #[test]
    fn status_round_trips_through_strum() {
        for status in ClaimStatus::all() {
            let parsed: ClaimStatus = status.as_ref().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert_eq!(ClaimStatus::Processing.to_string(), "PROCESSING");
    }

    #[test]
    fn category_from_product_code() {
        assert_eq!(ClaimCategory::from_product_code(1), Some(ClaimCategory::Crop));
        assert_eq!(
            ClaimCategory::from_product_code(2),
            Some(ClaimCategory::Livestock)
        );
        assert_eq!(ClaimCategory::from_product_code(3), None);
        assert_eq!("livestock".parse::<ClaimCategory>().unwrap(), ClaimCategory::Livestock);
    }

    #[test]
    fn season_contains_inclusive_bounds() {
        let season = GrowingSeason::new(1, 10);
        assert!(season.contains(1));
        assert!(season.contains(10));
        assert!(!season.contains(11));
        assert!(!season.contains(40));
    }

    #[test]
    fn wrapped_season_spans_year_boundary() {
        let season = GrowingSeason::new(33, 4);
        assert!(season.wraps());
        assert!(season.contains(35));
        assert!(season.contains(2));
        assert!(!season.contains(20));
    }

    #[test]
    fn inactive_thresholds() {
        assert!(IndexThresholds::INACTIVE.is_inactive());
        assert!(
            !IndexThresholds {
                trigger: 0.15,
                exit: 0.0
            }
            .is_inactive()
        );
    }

    #[test]
    fn policy_record_uses_roster_field_names() {
        let record: PolicyRecord = serde_json::from_value(serde_json::json!({
            "policy_id": 7,
            "customer_id": 3,
            "company_id": 2,
            "cps_zone": 11,
            "grid": 450,
            "period": 5,
            "product_type": 1,
            "period_sum_insured": 10000.0
        }))
        .unwrap();
        assert_eq!(record.zone_id, 11);
        assert_eq!(record.grid_id, 450);
        assert_eq!(record.category(), Some(ClaimCategory::Crop));
    }
}
