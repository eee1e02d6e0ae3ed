//! Drives one claim from `PROCESSING` to `PENDING` or `SETTLED`.
//!
//! Steps run strictly in order for a claim:
//!
//! 1. validate the policy record;
//! 2. fetch the zone/period thresholds, settling on inactive coverage;
//! 3. crop only: fetch the growing season and settle outside it;
//! 4. fetch the index reading and apply the payout formula;
//! 5. write amount, resolution, then status.
//!
//! Any failure along the way settles the claim at zero with a resolution
//! naming the cause. Nothing a gateway returns can leave a claim in
//! `PROCESSING`.

use std::sync::Arc;

use index_claims_calculator::{crop_payout, livestock_payout, livestock_z_score};
use index_claims_database::{DbError, queries};
use index_claims_database_models::Claim;
use index_claims_gateway::DataGateway;
use index_claims_models::{ClaimCategory, ClaimStatus, IndexThresholds, PolicyRecord, Resolution};
use serde::Serialize;
use switchy_database::Database;

use crate::{PipelineError, Step, resolution_for};

/// One unit of scheduled work: a stored claim and the record it was
/// created from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimJob {
    /// Claim to drive.
    pub claim_id: i64,
    /// Policy record the claim was created from.
    pub record: PolicyRecord,
}

impl ClaimJob {
    /// Builds a job from a stored claim.
    #[must_use]
    pub const fn from_claim(claim: &Claim) -> Self {
        Self {
            claim_id: claim.id,
            record: claim.policy_record(),
        }
    }
}

/// The terminal state an orchestrator run left a claim in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClaimOutcome {
    /// Claim id.
    pub claim_id: i64,
    /// Final status.
    pub status: ClaimStatus,
    /// Final amount.
    pub amount: f64,
    /// Why the claim ended here.
    pub resolution: Resolution,
}

/// What the evaluation steps decided, before anything is written.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Decision {
    amount: f64,
    resolution: Resolution,
}

impl Decision {
    const fn zero(resolution: Resolution) -> Self {
        Self {
            amount: 0.0,
            resolution,
        }
    }

    fn computed(amount: f64) -> Self {
        if amount > 0.0 {
            Self {
                amount,
                resolution: Resolution::Payable,
            }
        } else {
            Self::zero(Resolution::NoLoss)
        }
    }

    const fn status(&self) -> ClaimStatus {
        match self.resolution {
            Resolution::Payable => ClaimStatus::Pending,
            _ => ClaimStatus::Settled,
        }
    }
}

/// A step that could not complete.
#[derive(Debug)]
struct StepFailure {
    step: Step,
    resolution: Resolution,
    message: String,
}

impl StepFailure {
    fn gateway(step: Step, error: &index_claims_gateway::GatewayError) -> Self {
        Self {
            step,
            resolution: resolution_for(error),
            message: error.to_string(),
        }
    }
}

/// Runs the claim state machine against a store and a gateway.
///
/// Cheap to share: hold it in an [`Arc`] and call [`Orchestrator::run`]
/// from as many tasks as needed.
pub struct Orchestrator {
    db: Arc<dyn Database>,
    gateway: Arc<dyn DataGateway>,
}

impl Orchestrator {
    /// Creates an orchestrator over the given handles.
    #[must_use]
    pub fn new(db: Arc<dyn Database>, gateway: Arc<dyn DataGateway>) -> Self {
        Self { db, gateway }
    }

    /// The store handle.
    #[must_use]
    pub fn db(&self) -> &dyn Database {
        self.db.as_ref()
    }

    /// The gateway handle.
    #[must_use]
    pub fn gateway(&self) -> &dyn DataGateway {
        self.gateway.as_ref()
    }

    /// Drives one claim to a terminal state.
    ///
    /// Gateway and validation failures settle the claim at zero. If writing
    /// the outcome fails, a zero settlement with
    /// [`Resolution::InternalError`] is attempted instead.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Database`] only when the store rejects even
    /// the fallback settlement.
    pub async fn run(&self, job: &ClaimJob) -> Result<ClaimOutcome, PipelineError> {
        let claim_id = job.claim_id;
        let policy_id = job.record.policy_id;

        let decision = match self.evaluate(&job.record).await {
            Ok(decision) => decision,
            Err(failure) => {
                log::warn!(
                    "Claim {claim_id} (policy {policy_id}): settling at 0 after {} failed: {}",
                    failure.step,
                    failure.message
                );
                Decision::zero(failure.resolution)
            }
        };

        match self.finalize(claim_id, decision).await {
            Ok(outcome) => {
                log::debug!(
                    "Claim {claim_id} (policy {policy_id}): {} {:.2} ({})",
                    outcome.status,
                    outcome.amount,
                    outcome.resolution
                );
                Ok(outcome)
            }
            Err(e) => {
                log::error!(
                    "Claim {claim_id} (policy {policy_id}): failed to record outcome: {e}"
                );
                self.settle(claim_id, Resolution::InternalError, Step::Internal)
                    .await
            }
        }
    }

    /// Settles a claim at zero without evaluating it.
    ///
    /// Used for early exits by the batch trigger and for runs that could not
    /// complete. A claim that is already resolved is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Database`] if the store write fails.
    pub async fn settle(
        &self,
        claim_id: i64,
        resolution: Resolution,
        step: Step,
    ) -> Result<ClaimOutcome, PipelineError> {
        log::warn!("Claim {claim_id}: settling at 0 at step {step} ({resolution})");
        self.finalize(claim_id, Decision::zero(resolution)).await
    }

    /// Evaluates a policy record without touching the store.
    async fn evaluate(&self, record: &PolicyRecord) -> Result<Decision, StepFailure> {
        let category = validate_record(record)?;

        let thresholds = self
            .gateway
            .fetch_zone_period_config(record.zone_id, record.period)
            .await
            .map_err(|e| StepFailure::gateway(Step::ZoneConfig, &e))?;

        if thresholds.is_inactive() {
            log::debug!(
                "Policy {}: no coverage for zone {} period {}",
                record.policy_id,
                record.zone_id,
                record.period
            );
            return Ok(Decision::zero(Resolution::NoCoverage));
        }

        match category {
            ClaimCategory::Crop => self.evaluate_crop(record, thresholds).await,
            ClaimCategory::Livestock => self.evaluate_livestock(record).await,
        }
    }

    async fn evaluate_crop(
        &self,
        record: &PolicyRecord,
        thresholds: IndexThresholds,
    ) -> Result<Decision, StepFailure> {
        let season = self
            .gateway
            .fetch_growing_season(record.grid_id)
            .await
            .map_err(|e| StepFailure::gateway(Step::GrowingSeason, &e))?;

        let Some(season) = season.filter(|s| s.contains(record.period)) else {
            log::debug!(
                "Policy {}: period {} outside growing season of grid {}",
                record.policy_id,
                record.period,
                record.grid_id
            );
            return Ok(Decision::zero(Resolution::OutOfSeason));
        };
        log::trace!("Policy {}: in season {season:?}", record.policy_id);

        let index = self.fetch_index(record).await?;
        let amount = crop_payout(
            index,
            thresholds.trigger,
            thresholds.exit,
            record.sum_insured,
        );
        checked_amount(amount)
    }

    async fn evaluate_livestock(&self, record: &PolicyRecord) -> Result<Decision, StepFailure> {
        let index = self.fetch_index(record).await?;
        let amount = livestock_payout(livestock_z_score(index), record.sum_insured);
        checked_amount(amount)
    }

    async fn fetch_index(&self, record: &PolicyRecord) -> Result<f64, StepFailure> {
        self.gateway
            .fetch_index(record.grid_id, record.period)
            .await
            .map_err(|e| StepFailure::gateway(Step::IndexReading, &e))
    }

    /// Writes amount, then resolution, then status, so a reader that sees a
    /// terminal status always sees the amount too.
    async fn finalize(
        &self,
        claim_id: i64,
        decision: Decision,
    ) -> Result<ClaimOutcome, PipelineError> {
        let db = self.db.as_ref();

        let claim = queries::get(db, claim_id)
            .await?
            .ok_or(DbError::NotFound { id: claim_id })?;

        if claim.status.is_resolved() {
            log::warn!(
                "Claim {claim_id} is already {}; leaving it unchanged",
                claim.status
            );
            return Ok(ClaimOutcome {
                claim_id,
                status: claim.status,
                amount: claim.amount.unwrap_or(0.0),
                resolution: claim.resolution.unwrap_or(Resolution::InternalError),
            });
        }

        let status = decision.status();
        queries::set_amount(db, claim_id, decision.amount).await?;
        queries::set_resolution(db, claim_id, decision.resolution).await?;
        queries::set_status(db, claim_id, status).await?;

        Ok(ClaimOutcome {
            claim_id,
            status,
            amount: decision.amount,
            resolution: decision.resolution,
        })
    }
}

/// Checks the fields the later steps rely on and returns the category.
fn validate_record(record: &PolicyRecord) -> Result<ClaimCategory, StepFailure> {
    let invalid = |message: String| StepFailure {
        step: Step::ParseRecord,
        resolution: Resolution::InvalidRecord,
        message,
    };

    let category = record
        .category()
        .ok_or_else(|| invalid(format!("unknown product type {}", record.product_type)))?;

    if record.period < 1 {
        return Err(invalid(format!("period {} is not positive", record.period)));
    }

    if !record.sum_insured.is_finite() || record.sum_insured < 0.0 {
        return Err(invalid(format!(
            "sum insured {} is not a non-negative number",
            record.sum_insured
        )));
    }

    Ok(category)
}

fn checked_amount(amount: f64) -> Result<Decision, StepFailure> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(Decision::computed(amount))
    } else {
        Err(StepFailure {
            step: Step::Compute,
            resolution: Resolution::InternalError,
            message: format!("payout formula produced {amount}"),
        })
    }
}
