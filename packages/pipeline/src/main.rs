#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the claim settlement pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use index_claims_database::{db, queries};
use index_claims_database_models::Claim;
use index_claims_gateway::HttpGateway;
use index_claims_models::{ClaimCategory, ClaimStatus};
use index_claims_pipeline::{
    BatchRequest, BatchTrigger, ClaimScheduler, Orchestrator, PipelineConfig,
};
use switchy_database::Database;

#[derive(Parser)]
#[command(name = "index_claims_pipeline", about = "Index claim settlement pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create claims for the policy roster and run them to completion
    Trigger {
        /// Only policies for this period
        #[arg(long)]
        period: Option<i32>,
        /// Only policies of this category (`crop` or `livestock`)
        #[arg(long)]
        category: Option<ClaimCategory>,
    },
    /// List stored claims
    Claims {
        /// Only claims for this company
        #[arg(long, conflicts_with = "status")]
        company: Option<i64>,
        /// Only claims in this status (e.g. `pending`)
        #[arg(long)]
        status: Option<ClaimStatus>,
    },
    /// Show one claim as JSON
    Show {
        /// Claim id
        id: i64,
    },
    /// Authorize a pending claim
    Authorize {
        /// Claim id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = PipelineConfig::load()?;
    let db: Arc<dyn Database> = Arc::from(db::open_db(Path::new(&config.database_path)).await?);

    match cli.command {
        Commands::Trigger { period, category } => {
            let start = Instant::now();
            let gateway = Arc::new(HttpGateway::new(config.gateway.clone())?);
            let orchestrator = Arc::new(Orchestrator::new(db.clone(), gateway));
            let scheduler = Arc::new(ClaimScheduler::start(
                orchestrator.clone(),
                &config.scheduler,
            ));
            let trigger = BatchTrigger::new(orchestrator, scheduler.clone());

            let resumed = trigger.resume_processing().await?;
            if resumed > 0 {
                log::info!("Re-queued {resumed} claims left in PROCESSING");
            }
            let report = trigger.run(&BatchRequest { period, category }).await?;
            log::info!("Waiting for {} scheduled claims...", scheduler.in_flight());
            scheduler.wait_idle().await;

            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("Finished in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::Claims { company, status } => {
            let claims = match (company, status) {
                (Some(company_id), _) => queries::list_by_company(db.as_ref(), company_id).await?,
                (None, Some(status)) => queries::list_by_status(db.as_ref(), status).await?,
                (None, None) => queries::list_all(db.as_ref()).await?,
            };
            print_claims(&claims);
        }
        Commands::Show { id } => match queries::get(db.as_ref(), id).await? {
            Some(claim) => println!("{}", serde_json::to_string_pretty(&claim)?),
            None => return Err(format!("Claim {id} not found").into()),
        },
        Commands::Authorize { id } => {
            let claim = queries::authorize(db.as_ref(), id).await?;
            println!(
                "Claim {} authorized ({:.2})",
                claim.id,
                claim.amount.unwrap_or(0.0)
            );
        }
    }

    Ok(())
}

fn print_claims(claims: &[Claim]) {
    println!(
        "{:<8} {:<10} {:<8} {:<10} {:>12} {:<11} RESOLUTION",
        "ID", "POLICY", "PERIOD", "CATEGORY", "AMOUNT", "STATUS"
    );
    println!("{}", "-".repeat(80));
    for claim in claims {
        println!(
            "{:<8} {:<10} {:<8} {:<10} {:>12} {:<11} {}",
            claim.id,
            claim.policy_id,
            claim.period,
            claim.category.as_ref(),
            claim
                .amount
                .map_or_else(|| "-".to_string(), |a| format!("{a:.2}")),
            claim.status.as_ref(),
            claim
                .resolution
                .map_or_else(|| "-".to_string(), |r| r.to_string()),
        );
    }
    println!("\n{} claims", claims.len());
}
