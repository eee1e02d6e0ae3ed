#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for index claim settlement.
//!
//! Exposes batch triggers, single-claim processing, claim reads and
//! authorization over REST. Claims are stored in a local `SQLite` database
//! and processed by a worker pool that lives for the whole server process.

pub mod config;
mod handlers;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use index_claims_database::db;
use index_claims_gateway::HttpGateway;
use index_claims_pipeline::{BatchTrigger, ClaimScheduler, Orchestrator};
use switchy_database::Database;

use crate::config::AppConfig;

/// Shared application state.
pub struct AppState {
    /// Claim store.
    pub db: Arc<dyn Database>,
    /// Orchestrator shared with the worker pool, for direct settlement.
    pub orchestrator: Arc<Orchestrator>,
    /// Worker pool for orchestrator runs.
    pub scheduler: Arc<ClaimScheduler>,
    /// Batch trigger sharing the scheduler above.
    pub trigger: Arc<BatchTrigger>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/claims", web::get().to(handlers::list_claims))
            .route("/claims/trigger", web::post().to(handlers::trigger))
            .route("/claims/crop", web::post().to(handlers::trigger_crop))
            .route("/claims/livestock", web::post().to(handlers::trigger_livestock))
            .route("/claims/process", web::post().to(handlers::process_claim))
            .route("/claims/by-customer", web::get().to(handlers::claims_by_customer))
            .route(
                "/claims/company/{company_id}",
                web::get().to(handlers::company_claims),
            )
            .route("/claims/{id}", web::get().to(handlers::get_claim))
            .route(
                "/claims/{id}/authorize",
                web::post().to(handlers::authorize_claim),
            ),
    );
}

/// Starts the claim settlement API server.
///
/// Loads configuration, opens the claim store, starts the orchestrator
/// worker pool, re-queues claims a previous run left in `PROCESSING`, and
/// serves HTTP until shut down. Queued claims are drained before returning.
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration cannot be loaded,
/// the store cannot be opened, the HTTP client cannot be built, or the HTTP
/// server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = AppConfig::load().map_err(std::io::Error::other)?;

    log::info!("Opening claim store at {}...", config.pipeline.database_path);
    let db: Arc<dyn Database> = Arc::from(
        db::open_db(Path::new(&config.pipeline.database_path))
            .await
            .map_err(std::io::Error::other)?,
    );

    let gateway =
        Arc::new(HttpGateway::new(config.pipeline.gateway.clone()).map_err(std::io::Error::other)?);
    let orchestrator = Arc::new(Orchestrator::new(db.clone(), gateway));
    let scheduler = Arc::new(ClaimScheduler::start(
        orchestrator.clone(),
        &config.pipeline.scheduler,
    ));
    let trigger = Arc::new(BatchTrigger::new(orchestrator.clone(), scheduler.clone()));

    let resumed = trigger
        .resume_processing()
        .await
        .map_err(std::io::Error::other)?;
    if resumed > 0 {
        log::info!("Re-queued {resumed} claims left in PROCESSING");
    }

    let state = web::Data::new(AppState {
        db,
        orchestrator,
        scheduler: scheduler.clone(),
        trigger,
    });

    let bind_addr = config.server.bind_addr;
    let port = config.server.port;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    log::info!("Server stopped, draining {} queued claims", scheduler.in_flight());
    scheduler.shutdown().await;

    Ok(())
}
