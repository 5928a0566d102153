// src/transform/runner.rs
use metrics::counter;
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::upsert::{TransformAction, TransformResult, Transformer};
use crate::error::StoreError;
use crate::model::{RawRecord, RawStatus};
use crate::store::DynStore;

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub dry_run: bool,
    pub raw_id: Option<String>,
    pub record_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct TransformSummary {
    pub results: Vec<TransformResult>,
    pub duration: Duration,
    pub dry_run: bool,
}

impl TransformSummary {
    pub fn count(&self, action: TransformAction) -> usize {
        self.results.iter().filter(|r| r.action == action).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(TransformAction::Failed) > 0
    }

    /// Operator-facing tally.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Transformation summary{}", if self.dry_run { " (dry run)" } else { "" });
        let _ = writeln!(out, "  duration: {:.2}s", self.duration.as_secs_f64());
        let _ = writeln!(out, "  records:  {}", self.results.len());
        for action in [
            TransformAction::Created,
            TransformAction::Updated,
            TransformAction::Skipped,
            TransformAction::Failed,
        ] {
            let _ = writeln!(out, "  {:<8}  {}", format!("{}:", action.as_str()), self.count(action));
        }
        let problems: Vec<&TransformResult> =
            self.results.iter().filter(|r| r.error.is_some()).collect();
        if !problems.is_empty() {
            let _ = writeln!(out, "Errors:");
            for (i, r) in problems.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. [{}] {} (raw {})",
                    i + 1,
                    r.action.as_str(),
                    r.error.as_deref().unwrap_or_default(),
                    r.raw_id
                );
            }
        }
        out
    }
}

async fn load_records(
    store: &DynStore,
    raw_id: Option<&str>,
) -> Result<Vec<RawRecord>, StoreError> {
    let Some(id) = raw_id else {
        return store.list_pending_raw().await;
    };
    match store.get_raw(id).await? {
        None => Err(StoreError::NotFound {
            table: "raw_announcements",
            id: id.to_string(),
        }),
        Some(raw) if raw.status != RawStatus::Fetched => {
            warn!(raw_id = %id, status = raw.status.as_str(), "raw record is not pending; nothing to do");
            Ok(Vec::new())
        }
        Some(raw) => Ok(vec![raw]),
    }
}

/// Transform every pending raw record (or one by id), strictly in order.
/// Only failing to load the work list is an error; per-record failures are
/// in the summary.
pub async fn run_transformation(
    store: &DynStore,
    transformer: &Transformer,
    opts: &TransformOptions,
) -> Result<TransformSummary, StoreError> {
    let t0 = Instant::now();
    let records = load_records(store, opts.raw_id.as_deref()).await?;
    info!(count = records.len(), dry_run = opts.dry_run, "raw records to transform");

    let mut results = Vec::with_capacity(records.len());
    for (i, raw) in records.iter().enumerate() {
        info!(raw_id = %raw.id, position = i + 1, total = records.len(), "processing raw record");
        let result = transformer.transform(raw, opts.dry_run).await;
        counter!("transform_records_total", "action" => result.action.as_str()).increment(1);
        results.push(result);

        if i + 1 < records.len() && !opts.record_delay.is_zero() {
            tokio::time::sleep(opts.record_delay).await;
        }
    }

    Ok(TransformSummary {
        results,
        duration: t0.elapsed(),
        dry_run: opts.dry_run,
    })
}
