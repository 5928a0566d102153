// src/ingest/collector.rs
//! One collection run for one source: fetch, normalize the envelope, stage
//! raw records, close the run log.

use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, histogram};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{error, info, warn};

use super::auth::{build_headers, redacted};
use super::{ensure_metrics_described, normalize_envelope};
use crate::config::PipelineConfig;
use crate::error::CollectError;
use crate::model::{NewRawRecord, NewRun, RunCompletion, RunStatus, Source};
use crate::store::DynStore;

/// What a dry run would have sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionOutcome {
    pub source_id: String,
    pub source_name: String,
    pub run_id: Option<String>,
    pub status: RunStatus,
    pub records_fetched: u32,
    pub records_processed: u32,
    pub records_failed: u32,
    pub error: Option<String>,
    pub error_summary: Option<Value>,
    pub dry_run: Option<DryRunReport>,
}

impl CollectionOutcome {
    fn new(source: &Source, run_id: Option<String>, status: RunStatus) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            run_id,
            status,
            records_fetched: 0,
            records_processed: 0,
            records_failed: 0,
            error: None,
            error_summary: None,
            dry_run: None,
        }
    }

    fn fatal(source: &Source, run_id: Option<String>, err: &CollectError) -> Self {
        let mut out = Self::new(source, run_id, RunStatus::Failed);
        out.error = Some(err.to_string());
        out.error_summary = Some(json!({
            "error_type": err.kind(),
            "message": err.to_string(),
        }));
        out
    }
}

/// Result of staging a fetched batch.
struct StageTally {
    processed: u32,
    failed: u32,
    errors: Vec<String>,
}

pub struct Collector {
    http: Client,
    store: DynStore,
    user_agent: String,
}

impl Collector {
    pub fn new(store: DynStore, cfg: &PipelineConfig) -> Result<Self, CollectError> {
        let http = Client::builder().timeout(cfg.fetch_timeout()).build()?;
        Ok(Self {
            http,
            store,
            user_agent: cfg.user_agent.clone(),
        })
    }

    /// Run one collection attempt. Never returns an error: every failure is
    /// reflected in the outcome and, when a run row exists, in the run log.
    pub async fn collect(&self, source: &Source, dry_run: bool) -> CollectionOutcome {
        ensure_metrics_described();
        info!(
            source = %source.name,
            endpoint = %source.endpoint_url,
            auth = source.auth_type.as_str(),
            dry_run,
            "collecting"
        );

        if dry_run {
            return self.dry_run(source);
        }

        let started_at = Utc::now();
        let run = match self
            .store
            .insert_run(NewRun::started(&source.id, started_at))
            .await
        {
            Ok(run) => run,
            Err(e) => {
                let err = CollectError::Store(e);
                error!(source = %source.name, error = %err, "failed to create collection log");
                counter!("collect_runs_total", "status" => RunStatus::Failed.as_str()).increment(1);
                return CollectionOutcome::fatal(source, None, &err);
            }
        };

        let items = match self.fetch(source).await {
            Ok(items) => items,
            Err(err) => return self.fail_run(source, run.id, err).await,
        };

        let fetched = items.len() as u32;
        counter!("collect_records_fetched_total").increment(u64::from(fetched));
        let tally = self.stage(source, &run.id, items).await;

        let status = RunStatus::derive(tally.processed, tally.failed);
        let error_summary = (tally.failed > 0).then(|| {
            json!({
                "failed_records": tally.failed,
                "errors": tally.errors,
            })
        });
        let completed_at = Utc::now();
        let done = RunCompletion {
            status,
            records_fetched: fetched,
            records_processed: tally.processed,
            records_failed: tally.failed,
            error_message: None,
            error_summary: error_summary.clone(),
            completed_at,
        };
        if let Err(e) = self.store.finish_run(&run.id, done).await {
            error!(run_id = %run.id, error = %e, "failed to update collection log");
        }
        // The fetch itself succeeded, so the source counts as collected.
        if let Err(e) = self.store.mark_source_collected(&source.id, completed_at).await {
            error!(source = %source.name, error = %e, "failed to update last_collected_at");
        }

        counter!("collect_runs_total", "status" => status.as_str()).increment(1);
        info!(
            source = %source.name,
            run_id = %run.id,
            %status,
            fetched,
            processed = tally.processed,
            failed = tally.failed,
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "collection finished"
        );

        let mut out = CollectionOutcome::new(source, Some(run.id), status);
        out.records_fetched = fetched;
        out.records_processed = tally.processed;
        out.records_failed = tally.failed;
        out.error_summary = error_summary;
        out
    }

    fn dry_run(&self, source: &Source) -> CollectionOutcome {
        match build_headers(source, &self.user_agent) {
            Ok(headers) => {
                let report = DryRunReport {
                    endpoint: source.endpoint_url.clone(),
                    headers: redacted(&headers),
                };
                info!(endpoint = %report.endpoint, headers = ?report.headers, "[dry run] would fetch");
                let mut out = CollectionOutcome::new(source, None, RunStatus::Success);
                out.dry_run = Some(report);
                out
            }
            Err(err) => {
                warn!(source = %source.name, error = %err, "[dry run] source configuration is unusable");
                CollectionOutcome::fatal(source, None, &err)
            }
        }
    }

    /// GET the endpoint and flatten the body into items. Any non-2xx status
    /// or non-JSON content type is fatal to the run.
    async fn fetch(&self, source: &Source) -> Result<Vec<Value>, CollectError> {
        let headers = build_headers(source, &self.user_agent)?;
        let t0 = Instant::now();
        let resp = self
            .http
            .get(&source.endpoint_url)
            .headers(headers)
            .send()
            .await?;
        histogram!("collect_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let status = resp.status();
        if !status.is_success() {
            return Err(CollectError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("application/json") {
            return Err(CollectError::ContentType(if content_type.is_empty() {
                "none".to_string()
            } else {
                content_type
            }));
        }

        let bytes = resp.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        let items = normalize_envelope(body);
        info!(source = %source.name, http_status = status.as_u16(), records = items.len(), "received API response");
        Ok(items)
    }

    /// Insert one raw record per item. Inserts run concurrently and every
    /// outcome is awaited; a failed insert never stops the others.
    async fn stage(&self, source: &Source, run_id: &str, items: Vec<Value>) -> StageTally {
        let inserts = items.into_iter().map(|payload| {
            self.store
                .insert_raw(NewRawRecord::fetched(&source.id, Some(run_id), payload))
        });
        let outcomes = join_all(inserts).await;

        let mut tally = StageTally {
            processed: 0,
            failed: 0,
            errors: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(_) => tally.processed += 1,
                Err(e) => {
                    tally.failed += 1;
                    tally.errors.push(e.to_string());
                }
            }
        }
        if tally.failed > 0 {
            warn!(source = %source.name, failed = tally.failed, "some raw records could not be stored");
            counter!("collect_raw_insert_errors_total").increment(u64::from(tally.failed));
        }
        tally
    }

    async fn fail_run(&self, source: &Source, run_id: String, err: CollectError) -> CollectionOutcome {
        error!(source = %source.name, run_id = %run_id, kind = err.kind(), error = %err, "collection failed");
        let out = CollectionOutcome::fatal(source, Some(run_id.clone()), &err);
        let done = RunCompletion {
            status: RunStatus::Failed,
            records_fetched: 0,
            records_processed: 0,
            records_failed: 0,
            error_message: out.error.clone(),
            error_summary: out.error_summary.clone(),
            completed_at: Utc::now(),
        };
        if let Err(e) = self.store.finish_run(&run_id, done).await {
            error!(run_id = %run_id, error = %e, "failed to mark collection log as failed");
        }
        counter!("collect_runs_total", "status" => RunStatus::Failed.as_str()).increment(1);
        out
    }
}
