//! HTTP handler functions for the claim settlement API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use index_claims_database::{DbError, queries};
use index_claims_database_models::NewClaim;
use index_claims_models::{ClaimCategory, PolicyRecord, Resolution};
use index_claims_pipeline::{BatchRequest, BatchTrigger, ClaimJob, Step};
use index_claims_server_models::{
    ApiClaim, ApiCustomerClaims, ApiHealth, ApiTriggerAccepted, PeriodParams, TriggerParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/claims/trigger`
///
/// Starts a batch run over the policy roster, optionally restricted to one
/// period and category, and returns before any claim is processed.
pub async fn trigger(
    state: web::Data<AppState>,
    params: web::Query<TriggerParams>,
) -> HttpResponse {
    let category = match params.category.as_deref().map(str::parse::<ClaimCategory>) {
        None => None,
        Some(Ok(category)) => Some(category),
        Some(Err(_)) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "category must be one of: crop, livestock"
            }));
        }
    };

    accept_batch(
        &state,
        BatchRequest {
            period: params.period,
            category,
        },
    )
}

/// `POST /api/claims/crop`
pub async fn trigger_crop(
    state: web::Data<AppState>,
    params: web::Query<PeriodParams>,
) -> HttpResponse {
    accept_batch(
        &state,
        BatchRequest {
            period: params.period,
            category: Some(ClaimCategory::Crop),
        },
    )
}

/// `POST /api/claims/livestock`
pub async fn trigger_livestock(
    state: web::Data<AppState>,
    params: web::Query<PeriodParams>,
) -> HttpResponse {
    accept_batch(
        &state,
        BatchRequest {
            period: params.period,
            category: Some(ClaimCategory::Livestock),
        },
    )
}

/// Spawns the batch on the current worker and acknowledges it. The outcome
/// of the run is only visible through the claim reads.
fn accept_batch(state: &AppState, request: BatchRequest) -> HttpResponse {
    let trigger: Arc<BatchTrigger> = state.trigger.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = trigger.run(&request).await {
            log::error!("Background batch run failed: {e}");
        }
    });

    let scope = match (request.period, request.category) {
        (Some(period), Some(category)) => format!("{category} policies in period {period}"),
        (Some(period), None) => format!("all policies in period {period}"),
        (None, Some(category)) => format!("all {category} policies"),
        (None, None) => "all policies".to_string(),
    };

    HttpResponse::Accepted().json(ApiTriggerAccepted {
        accepted: true,
        period: request.period,
        category: request.category,
        message: format!("Claim creation started for {}", scope.to_lowercase()),
    })
}

/// `POST /api/claims/process`
///
/// Creates (or finds) the claim for one policy record and schedules it.
/// Returns 202 with the new claim, or 200 with the claim that already
/// exists for the same policy and period.
pub async fn process_claim(
    state: web::Data<AppState>,
    record: web::Json<PolicyRecord>,
) -> HttpResponse {
    let record = record.into_inner();

    let Some(new_claim) = NewClaim::from_record(&record) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Unknown product type {}", record.product_type)
        }));
    };

    let (claim, created) = match queries::create_or_get(state.db.as_ref(), &new_claim).await {
        Ok(result) => result,
        Err(e) => return db_error_response("create claim", &e),
    };

    if !created {
        return HttpResponse::Ok().json(ApiClaim::from(claim));
    }

    if let Err(e) = state.scheduler.schedule(ClaimJob::from_claim(&claim)).await {
        log::error!("Claim {}: could not be scheduled: {e}", claim.id);
        if let Err(e) = state
            .orchestrator
            .settle(claim.id, Resolution::InternalError, Step::Internal)
            .await
        {
            log::error!("Claim {}: could not be settled: {e}", claim.id);
        }
        return HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "Claim scheduler is not running"
        }));
    }

    HttpResponse::Accepted().json(ApiClaim::from(claim))
}

/// `GET /api/claims`
pub async fn list_claims(state: web::Data<AppState>) -> HttpResponse {
    match queries::list_all(state.db.as_ref()).await {
        Ok(claims) => {
            let claims: Vec<ApiClaim> = claims.into_iter().map(ApiClaim::from).collect();
            HttpResponse::Ok().json(claims)
        }
        Err(e) => db_error_response("list claims", &e),
    }
}

/// `GET /api/claims/by-customer`
pub async fn claims_by_customer(state: web::Data<AppState>) -> HttpResponse {
    match queries::customer_summaries(state.db.as_ref()).await {
        Ok(summaries) => {
            let summaries: Vec<ApiCustomerClaims> =
                summaries.into_iter().map(ApiCustomerClaims::from).collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(e) => db_error_response("summarize claims", &e),
    }
}

/// `GET /api/claims/company/{company_id}`
pub async fn company_claims(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let company_id = path.into_inner();
    match queries::list_by_company(state.db.as_ref(), company_id).await {
        Ok(claims) => {
            let claims: Vec<ApiClaim> = claims.into_iter().map(ApiClaim::from).collect();
            HttpResponse::Ok().json(claims)
        }
        Err(e) => db_error_response("list company claims", &e),
    }
}

/// `GET /api/claims/{id}`
pub async fn get_claim(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    match queries::get(state.db.as_ref(), id).await {
        Ok(Some(claim)) => HttpResponse::Ok().json(ApiClaim::from(claim)),
        Ok(None) => db_error_response("get claim", &DbError::NotFound { id }),
        Err(e) => db_error_response("get claim", &e),
    }
}

/// `POST /api/claims/{id}/authorize`
///
/// Moves a `PENDING` claim to `AUTHORIZED`.
pub async fn authorize_claim(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    match queries::authorize(state.db.as_ref(), id).await {
        Ok(claim) => {
            log::info!("Claim {id} authorized");
            HttpResponse::Ok().json(ApiClaim::from(claim))
        }
        Err(e) => db_error_response("authorize claim", &e),
    }
}

/// Maps a store error to a JSON error response.
fn db_error_response(action: &str, error: &DbError) -> HttpResponse {
    let body = serde_json::json!({ "error": error.to_string() });
    match error {
        DbError::NotFound { .. } => HttpResponse::NotFound().json(body),
        DbError::InvalidTransition { .. } => HttpResponse::Conflict().json(body),
        DbError::InvalidAmount { .. } => HttpResponse::BadRequest().json(body),
        _ => {
            log::error!("Failed to {action}: {error}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to {action}")
            }))
        }
    }
}
