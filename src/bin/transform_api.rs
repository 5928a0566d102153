//! transform-api: turn staged raw records into announcements.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use announcement_ingest::telemetry::init_tracing;
use announcement_ingest::{
    run_transformation, DynStore, PipelineConfig, RestStore, StoreConfig, TransformOptions,
    TransformSummary, Transformer,
};

/// Transform fetched raw announcements using each source's mapping_config.
#[derive(Parser, Debug)]
#[command(name = "transform-api", version, about)]
struct Cli {
    /// Map and validate only: no database writes.
    #[arg(long)]
    dry_run: bool,

    /// Transform this raw record only.
    #[arg(long, value_name = "ID")]
    raw_id: Option<String>,
}

async fn run(cli: Cli) -> Result<TransformSummary> {
    let store_cfg = StoreConfig::from_env().context("loading store configuration")?;
    let cfg = PipelineConfig::load_default()?;
    info!(store = %store_cfg.url, dry_run = cli.dry_run, raw_id = ?cli.raw_id, "starting transformation");

    let store: DynStore = Arc::new(RestStore::new(&store_cfg).context("building store client")?);
    let transformer = Transformer::new(store.clone(), cfg.coercion_table()?);
    let opts = TransformOptions {
        dry_run: cli.dry_run,
        raw_id: cli.raw_id,
        record_delay: cfg.record_delay(),
    };
    run_transformation(&store, &transformer, &opts)
        .await
        .context("loading raw announcements")
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(summary) => {
            println!("{}", summary.render());
            if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = ?e, "transformation aborted");
            eprintln!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
