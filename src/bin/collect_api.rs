//! collect-api: pull every active API source once and stage raw records.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use announcement_ingest::telemetry::init_tracing;
use announcement_ingest::{
    run_collection, CollectOptions, CollectionSummary, Collector, DynStore, PipelineConfig,
    RestStore, StoreConfig,
};

/// Collect raw announcements from the configured external APIs.
#[derive(Parser, Debug)]
#[command(name = "collect-api", version, about)]
struct Cli {
    /// Validate source configuration only: no fetch, no writes.
    #[arg(long)]
    dry_run: bool,

    /// Collect from this source only (active or not).
    #[arg(long, value_name = "ID")]
    source_id: Option<String>,
}

async fn run(cli: Cli) -> Result<CollectionSummary> {
    let store_cfg = StoreConfig::from_env().context("loading store configuration")?;
    let cfg = PipelineConfig::load_default()?;
    info!(store = %store_cfg.url, dry_run = cli.dry_run, source_filter = ?cli.source_id, "starting collection");

    let store: DynStore = Arc::new(RestStore::new(&store_cfg).context("building store client")?);
    let collector = Collector::new(store.clone(), &cfg).context("building HTTP client")?;
    let opts = CollectOptions {
        dry_run: cli.dry_run,
        source_id: cli.source_id,
        source_delay: cfg.source_delay(),
    };
    run_collection(&store, &collector, &opts)
        .await
        .context("loading API sources")
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in prod environments.
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
            error!(error = ?e, "collection aborted");
            eprintln!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
