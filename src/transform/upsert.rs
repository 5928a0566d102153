// src/transform/upsert.rs
//! Per-record transformation: map, validate, then create or update the
//! announcement matched by its natural key `(title, organization)`.
//!
//! Every failure is caught here and recorded on the raw record; nothing
//! propagates to the orchestrator.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::coerce::CoercionTable;
use super::mapper::map_record;
use super::validate::validate_announcement;
use crate::error::TransformError;
use crate::model::{Announcement, RawRecord, RawStatus, RawUpdate};
use crate::store::DynStore;

pub const SKIP_NOTE: &str = "No mapping_config available - skipped transformation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformAction {
    Created,
    Updated,
    Skipped,
    Failed,
}

impl TransformAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformAction::Created => "created",
            TransformAction::Updated => "updated",
            TransformAction::Skipped => "skipped",
            TransformAction::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformResult {
    pub raw_id: String,
    pub announcement_id: Option<String>,
    pub action: TransformAction,
    pub error: Option<String>,
}

impl TransformResult {
    fn done(raw_id: &str, announcement_id: Option<String>, action: TransformAction) -> Self {
        Self {
            raw_id: raw_id.to_string(),
            announcement_id,
            action,
            error: None,
        }
    }

    fn skipped(raw_id: &str, reason: impl Into<String>) -> Self {
        Self {
            raw_id: raw_id.to_string(),
            announcement_id: None,
            action: TransformAction::Skipped,
            error: Some(reason.into()),
        }
    }

    fn failed(raw_id: &str, reason: impl Into<String>) -> Self {
        Self {
            raw_id: raw_id.to_string(),
            announcement_id: None,
            action: TransformAction::Failed,
            error: Some(reason.into()),
        }
    }
}

pub struct Transformer {
    store: DynStore,
    table: CoercionTable,
}

impl Transformer {
    pub fn new(store: DynStore, table: CoercionTable) -> Self {
        Self { store, table }
    }

    /// Transform one staged record. `dry_run` reads and reports, never writes.
    pub async fn transform(&self, raw: &RawRecord, dry_run: bool) -> TransformResult {
        // `error` is terminal. A `processed` record may be re-applied; it
        // resolves to the same natural key and updates in place.
        if raw.status == RawStatus::Error {
            return TransformResult::skipped(&raw.id, "raw record is already in error");
        }

        match self.try_transform(raw, dry_run).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                error!(raw_id = %raw.id, error = %message, "transformation failed");
                if !dry_run {
                    if let Err(e) = self.store.update_raw(&raw.id, RawUpdate::error(&message)).await
                    {
                        warn!(raw_id = %raw.id, error = %e, "could not record raw error");
                    }
                }
                TransformResult::failed(&raw.id, message)
            }
        }
    }

    async fn try_transform(
        &self,
        raw: &RawRecord,
        dry_run: bool,
    ) -> Result<TransformResult, TransformError> {
        let source = self
            .store
            .get_source(&raw.source_id)
            .await?
            .ok_or_else(|| TransformError::SourceNotFound(raw.source_id.clone()))?;
        let mapping = &source.mapping_config;

        let Some(fields) = &mapping.fields else {
            warn!(raw_id = %raw.id, source = %source.name, "no mapping_config fields, skipping");
            if !dry_run {
                // Status stays `fetched` so the record is retried once a mapping exists.
                if let Err(e) = self.store.update_raw(&raw.id, RawUpdate::note(SKIP_NOTE)).await {
                    warn!(raw_id = %raw.id, error = %e, "could not annotate skipped record");
                }
            }
            return Ok(TransformResult::skipped(&raw.id, "No mapping_config available"));
        };
        debug!(raw_id = %raw.id, source = %source.name, mapped_fields = fields.len(), "transforming");

        let mapped = map_record(&raw.raw_payload, mapping, &self.table)?;

        let validation = validate_announcement(&mapped);
        if !validation.valid {
            let message = validation.message();
            warn!(raw_id = %raw.id, errors = ?validation.errors, "validation failed");
            if !dry_run {
                if let Err(e) = self.store.update_raw(&raw.id, RawUpdate::error(&message)).await {
                    warn!(raw_id = %raw.id, error = %e, "could not record validation failure");
                }
            }
            return Ok(TransformResult::failed(&raw.id, message));
        }

        let record = Announcement::from_mapped(&mapped)?;
        let existing = self
            .store
            .find_announcement(&record.title, &record.organization)
            .await?;

        if dry_run {
            let action = match existing {
                Some(_) => TransformAction::Updated,
                None => TransformAction::Created,
            };
            info!(raw_id = %raw.id, action = action.as_str(), title = %record.title, "[dry run] would upsert announcement");
            return Ok(TransformResult::done(&raw.id, existing, action));
        }

        // Look-up-then-write: not atomic across concurrent transformer runs.
        let (id, action) = match existing {
            Some(id) => (
                self.store.update_announcement(&id, &record).await?,
                TransformAction::Updated,
            ),
            None => (
                self.store.insert_announcement(&record).await?,
                TransformAction::Created,
            ),
        };

        self.store
            .update_raw(&raw.id, RawUpdate::processed(Utc::now()))
            .await?;

        info!(raw_id = %raw.id, announcement_id = %id, action = action.as_str(), "announcement upserted");
        Ok(TransformResult::done(&raw.id, Some(id), action))
    }
}
