// src/ingest/runner.rs
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::collector::{CollectionOutcome, Collector};
use crate::error::StoreError;
use crate::model::{RunStatus, SourceFilter};
use crate::store::DynStore;

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub dry_run: bool,
    pub source_id: Option<String>,
    pub source_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub outcomes: Vec<CollectionOutcome>,
    pub duration: Duration,
    pub dry_run: bool,
}

impl CollectionSummary {
    pub fn failed(&self) -> impl Iterator<Item = &CollectionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RunStatus::Failed)
    }

    /// True when any source's run failed outright. Partial runs do not count.
    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn render(&self) -> String {
        let total = |f: fn(&CollectionOutcome) -> u32| -> u32 { self.outcomes.iter().map(f).sum() };
        let mut out = String::new();
        let _ = writeln!(out, "Collection summary{}", if self.dry_run { " (dry run)" } else { "" });
        let _ = writeln!(out, "  duration:          {:.2}s", self.duration.as_secs_f64());
        let _ = writeln!(out, "  sources:           {}", self.outcomes.len());
        for status in [RunStatus::Success, RunStatus::Partial, RunStatus::Failed] {
            let n = self.outcomes.iter().filter(|o| o.status == status).count();
            let _ = writeln!(out, "  {:<18} {}", format!("{status}:"), n);
        }
        let _ = writeln!(out, "  records fetched:   {}", total(|o| o.records_fetched));
        let _ = writeln!(out, "  records staged:    {}", total(|o| o.records_processed));
        let _ = writeln!(out, "  records failed:    {}", total(|o| o.records_failed));

        if self.has_failures() {
            let _ = writeln!(out, "Failed sources:");
            for o in self.failed() {
                let _ = writeln!(
                    out,
                    "  - {} ({}): {}",
                    o.source_name,
                    o.source_id,
                    o.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        let run_ids: Vec<&str> = self.outcomes.iter().filter_map(|o| o.run_id.as_deref()).collect();
        if !run_ids.is_empty() {
            let _ = writeln!(out, "Collection log ids:");
            for id in run_ids {
                let _ = writeln!(out, "  - {id}");
            }
        }
        out
    }
}

/// Collect from every active source (or one by id), one at a time, pausing
/// between sources. Only loading the source list can fail.
pub async fn run_collection(
    store: &DynStore,
    collector: &Collector,
    opts: &CollectOptions,
) -> Result<CollectionSummary, StoreError> {
    let t0 = Instant::now();
    let filter = match &opts.source_id {
        Some(id) => SourceFilter::ById(id.clone()),
        None => SourceFilter::Active,
    };
    let sources = store.list_sources(filter).await?;

    if sources.is_empty() {
        match &opts.source_id {
            Some(id) => warn!(source_id = %id, "source not found"),
            None => warn!("no active API sources found"),
        }
    } else {
        info!(count = sources.len(), dry_run = opts.dry_run, "sources to collect");
    }

    let mut outcomes = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        info!(position = i + 1, total = sources.len(), source = %source.name, "processing source");
        if !source.is_active {
            warn!(source = %source.name, "source is inactive; collecting because it was requested by id");
        }
        outcomes.push(collector.collect(source, opts.dry_run).await);

        if i + 1 < sources.len() && !opts.dry_run && !opts.source_delay.is_zero() {
            info!(delay_ms = opts.source_delay.as_millis() as u64, "waiting before next source");
            tokio::time::sleep(opts.source_delay).await;
        }
    }

    Ok(CollectionSummary {
        outcomes,
        duration: t0.elapsed(),
        dry_run: opts.dry_run,
    })
}
