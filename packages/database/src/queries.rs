//! Claim store queries.
//!
//! Every function takes a `&dyn Database` so callers pass in whichever
//! handle they own. Timestamps are stored as RFC 3339 text and enums as
//! their `SCREAMING_SNAKE_CASE` names.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use index_claims_database_models::{Claim, CustomerClaimSummary, NewClaim};
use index_claims_models::{ClaimStatus, Resolution};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

const CLAIM_COLUMNS: &str = "id, policy_id, company_id, customer_id, zone_id, grid_id, period, \
     category, sum_insured, amount, status, resolution, created_at, updated_at";

/// Returns the claim for `(policy_id, period)`, inserting a new one in
/// `PROCESSING` with no amount if none exists.
///
/// The insert relies on the `UNIQUE(policy_id, period)` constraint, so two
/// concurrent callers for the same pair get the same claim and exactly one
/// of them sees `created == true`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or the amount is
/// invalid.
pub async fn create_or_get(db: &dyn Database, new: &NewClaim) -> Result<(Claim, bool), DbError> {
    if !new.sum_insured.is_finite() || new.sum_insured < 0.0 {
        return Err(DbError::InvalidAmount {
            amount: new.sum_insured,
        });
    }

    let now = Utc::now().to_rfc3339();

    let inserted = db
        .exec_raw_params(
            "INSERT INTO claims (
                policy_id, company_id, customer_id, zone_id, grid_id, period,
                category, sum_insured, amount, status, resolution,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, NULL, $10, $11)
            ON CONFLICT (policy_id, period) DO NOTHING",
            &[
                DatabaseValue::Int64(new.policy_id),
                DatabaseValue::Int64(new.company_id),
                DatabaseValue::Int64(new.customer_id),
                DatabaseValue::Int64(new.zone_id),
                DatabaseValue::Int64(new.grid_id),
                DatabaseValue::Int32(new.period),
                DatabaseValue::String(new.category.as_ref().to_string()),
                DatabaseValue::Real64(new.sum_insured),
                DatabaseValue::String(ClaimStatus::Processing.as_ref().to_string()),
                DatabaseValue::String(now.clone()),
                DatabaseValue::String(now),
            ],
        )
        .await?;

    let claim = get_by_policy_period(db, new.policy_id, new.period)
        .await?
        .ok_or_else(|| DbError::Conversion {
            message: format!(
                "Claim for policy {} period {} missing after insert",
                new.policy_id, new.period
            ),
        })?;

    let created = inserted > 0;
    if created {
        log::debug!(
            "Created claim {} for policy {} period {}",
            claim.id,
            claim.policy_id,
            claim.period
        );
    }

    Ok((claim, created))
}

/// Loads a claim by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or the row cannot
/// be decoded.
pub async fn get(db: &dyn Database, id: i64) -> Result<Option<Claim>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1"),
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    rows.first().map(row_to_claim).transpose()
}

/// Loads the claim for a policy and period.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or the row cannot
/// be decoded.
pub async fn get_by_policy_period(
    db: &dyn Database,
    policy_id: i64,
    period: i32,
) -> Result<Option<Claim>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE policy_id = $1 AND period = $2"),
            &[DatabaseValue::Int64(policy_id), DatabaseValue::Int32(period)],
        )
        .await?;

    rows.first().map(row_to_claim).transpose()
}

/// Lists every claim, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_all(db: &dyn Database) -> Result<Vec<Claim>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims ORDER BY id"),
            &[],
        )
        .await?;

    rows.iter().map(row_to_claim).collect()
}

/// Lists the claims underwritten by one company, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_by_company(db: &dyn Database, company_id: i64) -> Result<Vec<Claim>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE company_id = $1 ORDER BY id"),
            &[DatabaseValue::Int64(company_id)],
        )
        .await?;

    rows.iter().map(row_to_claim).collect()
}

/// Lists claims currently in `status`, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_by_status(db: &dyn Database, status: ClaimStatus) -> Result<Vec<Claim>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE status = $1 ORDER BY id"),
            &[DatabaseValue::String(status.as_ref().to_string())],
        )
        .await?;

    rows.iter().map(row_to_claim).collect()
}

/// Sets the computed amount of a claim.
///
/// # Errors
///
/// Returns [`DbError::InvalidAmount`] for a negative or non-finite amount,
/// [`DbError::NotFound`] if the claim does not exist.
pub async fn set_amount(db: &dyn Database, id: i64, amount: f64) -> Result<(), DbError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DbError::InvalidAmount { amount });
    }

    let updated = db
        .exec_raw_params(
            "UPDATE claims SET amount = $1, updated_at = $2 WHERE id = $3",
            &[
                DatabaseValue::Real64(amount),
                DatabaseValue::String(Utc::now().to_rfc3339()),
                DatabaseValue::Int64(id),
            ],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound { id });
    }

    Ok(())
}

/// Records why a claim ended where it did.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the claim does not exist.
pub async fn set_resolution(
    db: &dyn Database,
    id: i64,
    resolution: Resolution,
) -> Result<(), DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE claims SET resolution = $1, updated_at = $2 WHERE id = $3",
            &[
                DatabaseValue::String(resolution.as_ref().to_string()),
                DatabaseValue::String(Utc::now().to_rfc3339()),
                DatabaseValue::Int64(id),
            ],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound { id });
    }

    Ok(())
}

/// Moves a claim to `status` if the state machine allows it from the
/// claim's current status.
///
/// The check and the write are one conditional `UPDATE`, so concurrent
/// callers cannot both move the same claim out of a status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the claim does not exist and
/// [`DbError::InvalidTransition`] if the current status does not permit
/// the move.
pub async fn set_status(db: &dyn Database, id: i64, status: ClaimStatus) -> Result<(), DbError> {
    let allowed = status.predecessors();

    if !allowed.is_empty() {
        let allowed_sql = allowed
            .iter()
            .map(|s| format!("'{}'", s.as_ref()))
            .collect::<Vec<_>>()
            .join(", ");

        let updated = db
            .exec_raw_params(
                &format!(
                    "UPDATE claims SET status = $1, updated_at = $2
                     WHERE id = $3 AND status IN ({allowed_sql})"
                ),
                &[
                    DatabaseValue::String(status.as_ref().to_string()),
                    DatabaseValue::String(Utc::now().to_rfc3339()),
                    DatabaseValue::Int64(id),
                ],
            )
            .await?;

        if updated > 0 {
            return Ok(());
        }
    }

    match get(db, id).await? {
        None => Err(DbError::NotFound { id }),
        Some(claim) => Err(DbError::InvalidTransition {
            id,
            from: claim.status,
            to: status,
        }),
    }
}

/// Moves a `PENDING` claim to `AUTHORIZED` and returns the updated claim.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the claim does not exist and
/// [`DbError::InvalidTransition`] if it is not pending.
pub async fn authorize(db: &dyn Database, id: i64) -> Result<Claim, DbError> {
    set_status(db, id, ClaimStatus::Authorized).await?;
    log::info!("Authorized claim {id}");
    get(db, id).await?.ok_or(DbError::NotFound { id })
}

/// Aggregates claim counts and totals per customer, ordered by customer id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn customer_summaries(db: &dyn Database) -> Result<Vec<CustomerClaimSummary>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT customer_id,
                    COUNT(*) AS claim_count,
                    CAST(COALESCE(SUM(amount), 0) AS REAL) AS total_amount,
                    SUM(CASE WHEN status = 'PROCESSING' THEN 1 ELSE 0 END) AS processing,
                    SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END) AS pending,
                    SUM(CASE WHEN status = 'AUTHORIZED' THEN 1 ELSE 0 END) AS authorized,
                    SUM(CASE WHEN status = 'SETTLED' THEN 1 ELSE 0 END) AS settled,
                    SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END) AS failed
             FROM claims
             GROUP BY customer_id
             ORDER BY customer_id",
            &[],
        )
        .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        summaries.push(CustomerClaimSummary {
            customer_id: row.to_value("customer_id").map_err(conversion("customer_id"))?,
            claim_count: row.to_value("claim_count").map_err(conversion("claim_count"))?,
            total_amount: row.to_value("total_amount").map_err(conversion("total_amount"))?,
            processing: row.to_value("processing").map_err(conversion("processing"))?,
            pending: row.to_value("pending").map_err(conversion("pending"))?,
            authorized: row.to_value("authorized").map_err(conversion("authorized"))?,
            settled: row.to_value("settled").map_err(conversion("settled"))?,
            failed: row.to_value("failed").map_err(conversion("failed"))?,
        });
    }

    Ok(summaries)
}

fn row_to_claim(row: &Row) -> Result<Claim, DbError> {
    let category: String = row.to_value("category").map_err(conversion("category"))?;
    let status: String = row.to_value("status").map_err(conversion("status"))?;
    let resolution: Option<String> = row
        .to_value("resolution")
        .map_err(conversion("resolution"))?;
    let created_at: String = row.to_value("created_at").map_err(conversion("created_at"))?;
    let updated_at: String = row.to_value("updated_at").map_err(conversion("updated_at"))?;

    Ok(Claim {
        id: row.to_value("id").map_err(conversion("id"))?,
        policy_id: row.to_value("policy_id").map_err(conversion("policy_id"))?,
        company_id: row.to_value("company_id").map_err(conversion("company_id"))?,
        customer_id: row.to_value("customer_id").map_err(conversion("customer_id"))?,
        zone_id: row.to_value("zone_id").map_err(conversion("zone_id"))?,
        grid_id: row.to_value("grid_id").map_err(conversion("grid_id"))?,
        period: row.to_value("period").map_err(conversion("period"))?,
        category: parse_enum(&category, "category")?,
        sum_insured: row.to_value("sum_insured").map_err(conversion("sum_insured"))?,
        amount: row.to_value("amount").map_err(conversion("amount"))?,
        status: parse_enum(&status, "status")?,
        resolution: resolution
            .as_deref()
            .map(|r| parse_enum(r, "resolution"))
            .transpose()?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_enum<T: FromStr>(value: &str, column: &str) -> Result<T, DbError> {
    value.parse().map_err(|_| DbError::Conversion {
        message: format!("Unknown {column} value: {value}"),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Conversion {
            message: format!("Invalid timestamp {value}: {e}"),
        })
}

fn conversion<E: std::fmt::Display>(column: &'static str) -> impl FnOnce(E) -> DbError {
    move |e| DbError::Conversion {
        message: format!("Failed to read column {column}: {e}"),
    }
}
