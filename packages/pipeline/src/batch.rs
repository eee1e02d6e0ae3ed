//! Fans one roster fetch out into per-claim orchestrator runs.
//!
//! The roster is fetched once. Each record then gets its own
//! `create_or_get`; records whose claim already exists are skipped, so a
//! batch can be re-run for the same period without creating duplicates.
//! Zone configuration is checked inline so claims with no active coverage
//! settle immediately instead of occupying a worker.

use std::sync::Arc;
use std::time::Instant;

use index_claims_database::{DbError, queries};
use index_claims_database_models::NewClaim;
use index_claims_models::{ClaimCategory, ClaimStatus, PolicyRecord, Resolution};
use serde::{Deserialize, Serialize};

use crate::orchestrator::{ClaimJob, Orchestrator};
use crate::scheduler::ClaimScheduler;
use crate::{PipelineError, Step, resolution_for};

/// Restricts a batch run to part of the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Only records for this period.
    pub period: Option<i32>,
    /// Only records of this category.
    pub category: Option<ClaimCategory>,
}

impl BatchRequest {
    /// Whether a roster record falls inside this request.
    #[must_use]
    pub fn matches(&self, record: &PolicyRecord) -> bool {
        self.period.is_none_or(|p| record.period == p)
            && self
                .category
                .is_none_or(|c| record.category() == Some(c))
    }
}

/// Counts of what a batch run did with each roster record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records returned by the roster service.
    pub roster_size: usize,
    /// Records outside the requested period or category.
    pub filtered_out: usize,
    /// Records with a product code that is neither crop nor livestock.
    pub unknown_product: usize,
    /// Records that already had a claim for their period.
    pub existing: usize,
    /// New claims created.
    pub created: usize,
    /// New claims settled inline because the zone had no usable
    /// configuration.
    pub settled_inline: usize,
    /// New claims handed to the scheduler.
    pub scheduled: usize,
    /// Records that failed with an unexpected error.
    pub errors: usize,
}

/// What happened to a single roster record.
enum RecordOutcome {
    FilteredOut,
    UnknownProduct,
    Existing,
    SettledInline,
    Scheduled,
}

/// A record that failed partway, with the claim id if one was obtained.
struct RecordFailure {
    claim_id: Option<i64>,
    error: PipelineError,
}

/// Runs batch claim creation against a shared orchestrator and scheduler.
pub struct BatchTrigger {
    orchestrator: Arc<Orchestrator>,
    scheduler: Arc<ClaimScheduler>,
}

impl BatchTrigger {
    /// Creates a trigger that schedules onto `scheduler`.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator>, scheduler: Arc<ClaimScheduler>) -> Self {
        Self {
            orchestrator,
            scheduler,
        }
    }

    /// Fetches the roster and creates and schedules claims for every
    /// eligible record.
    ///
    /// Returns once every claim is created and either settled or queued;
    /// scheduled runs complete in the background.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Gateway`] if the roster cannot be fetched.
    /// No claim is created in that case. Per-record failures are logged and
    /// counted in [`BatchReport::errors`] instead.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchReport, PipelineError> {
        let start = Instant::now();

        let roster = match self.orchestrator.gateway().fetch_policy_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                log::error!("Batch aborted, roster fetch failed: {e}");
                return Err(e.into());
            }
        };

        let mut report = BatchReport {
            roster_size: roster.len(),
            ..BatchReport::default()
        };

        log::info!(
            "Batch started: {} roster records (period={:?}, category={:?})",
            roster.len(),
            request.period,
            request.category
        );

        for record in roster {
            match self.process_record(request, record).await {
                Ok(RecordOutcome::FilteredOut) => report.filtered_out += 1,
                Ok(RecordOutcome::UnknownProduct) => report.unknown_product += 1,
                Ok(RecordOutcome::Existing) => report.existing += 1,
                Ok(RecordOutcome::SettledInline) => {
                    report.created += 1;
                    report.settled_inline += 1;
                }
                Ok(RecordOutcome::Scheduled) => {
                    report.created += 1;
                    report.scheduled += 1;
                }
                Err(failure) => {
                    report.errors += 1;
                    if let Some(claim_id) = failure.claim_id {
                        report.created += 1;
                        self.settle_quietly(claim_id, Resolution::InternalError, Step::Internal)
                            .await;
                    }
                    log::error!("Batch record failed: {}", failure.error);
                }
            }
        }

        log::info!(
            "Batch finished in {:.1}s: {} created ({} scheduled, {} settled inline), \
             {} existing, {} filtered, {} unknown product, {} errors",
            start.elapsed().as_secs_f64(),
            report.created,
            report.scheduled,
            report.settled_inline,
            report.existing,
            report.filtered_out,
            report.unknown_product,
            report.errors
        );

        Ok(report)
    }

    /// Re-queues every claim still in `PROCESSING`.
    ///
    /// The scheduler queue does not survive a restart, and a batch skips
    /// claims that already exist, so this runs once at start-up before any
    /// new batch. Returns the number of claims queued.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Database`] if the claims cannot be listed.
    pub async fn resume_processing(&self) -> Result<usize, PipelineError> {
        let orphaned =
            queries::list_by_status(self.orchestrator.db(), ClaimStatus::Processing).await?;
        if orphaned.is_empty() {
            return Ok(0);
        }

        log::info!("Resuming {} claims left in PROCESSING", orphaned.len());

        let mut queued = 0;
        for claim in &orphaned {
            match self.scheduler.schedule(ClaimJob::from_claim(claim)).await {
                Ok(()) => queued += 1,
                Err(e) => {
                    log::error!("Claim {}: could not be re-queued: {e}", claim.id);
                    self.settle_quietly(claim.id, Resolution::InternalError, Step::Internal)
                        .await;
                }
            }
        }

        Ok(queued)
    }

    async fn process_record(
        &self,
        request: &BatchRequest,
        record: PolicyRecord,
    ) -> Result<RecordOutcome, RecordFailure> {
        if !request.matches(&record) {
            return Ok(RecordOutcome::FilteredOut);
        }

        let Some(new_claim) = NewClaim::from_record(&record) else {
            log::warn!(
                "Policy {}: skipping unknown product type {}",
                record.policy_id,
                record.product_type
            );
            return Ok(RecordOutcome::UnknownProduct);
        };

        let (claim, created) = queries::create_or_get(self.orchestrator.db(), &new_claim)
            .await
            .map_err(|e| RecordFailure {
                claim_id: None,
                error: match e {
                    DbError::InvalidAmount { .. } => PipelineError::InvalidRecord {
                        policy_id: record.policy_id,
                        message: e.to_string(),
                    },
                    other => other.into(),
                },
            })?;

        if !created {
            log::debug!(
                "Policy {} period {}: claim {} already exists ({})",
                record.policy_id,
                record.period,
                claim.id,
                claim.status
            );
            return Ok(RecordOutcome::Existing);
        }

        let thresholds = self
            .orchestrator
            .gateway()
            .fetch_zone_period_config(record.zone_id, record.period)
            .await;

        let inline_resolution = match &thresholds {
            Ok(t) if t.is_inactive() => Some(Resolution::NoCoverage),
            Ok(_) => None,
            Err(e) => {
                log::warn!(
                    "Claim {} (policy {}): zone config unavailable: {e}",
                    claim.id,
                    record.policy_id
                );
                Some(resolution_for(e))
            }
        };

        if let Some(resolution) = inline_resolution {
            self.orchestrator
                .settle(claim.id, resolution, Step::ZoneConfig)
                .await
                .map_err(|error| RecordFailure {
                    claim_id: Some(claim.id),
                    error,
                })?;
            return Ok(RecordOutcome::SettledInline);
        }

        self.scheduler
            .schedule(ClaimJob {
                claim_id: claim.id,
                record,
            })
            .await
            .map_err(|error| RecordFailure {
                claim_id: Some(claim.id),
                error,
            })?;

        Ok(RecordOutcome::Scheduled)
    }

    async fn settle_quietly(&self, claim_id: i64, resolution: Resolution, step: Step) {
        if let Err(e) = self.orchestrator.settle(claim_id, resolution, step).await {
            log::error!("Claim {claim_id}: could not be settled: {e}");
        }
    }
}
