// src/store/memory.rs
//! In-process store used by tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::error::StoreError;
use crate::model::{
    Announcement, AnnouncementRow, CollectionRun, NewRawRecord, NewRun, RawRecord, RawUpdate,
    RunCompletion, Source, SourceFilter,
};

type RawInsertGate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Default)]
struct Tables {
    sources: Vec<Source>,
    runs: Vec<CollectionRun>,
    raw: Vec<RawRecord>,
    announcements: Vec<AnnouncementRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
    reject_raw: Option<RawInsertGate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject raw inserts whose payload matches `gate`, emulating per-row
    /// write failures (constraint violations, dropped connections).
    pub fn with_raw_insert_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.reject_raw = Some(Box::new(gate));
        self
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().expect("memory store mutex poisoned")
    }

    pub fn add_source(&self, source: Source) {
        self.tables().sources.push(source);
    }

    /// Stage a raw record directly, bypassing the collector.
    pub fn seed_raw(&self, source_id: &str, payload: Value) -> RawRecord {
        let row = raw_row(NewRawRecord::fetched(source_id, None, payload));
        self.tables().raw.push(row.clone());
        row
    }

    pub fn sources(&self) -> Vec<Source> {
        self.tables().sources.clone()
    }

    pub fn runs(&self) -> Vec<CollectionRun> {
        self.tables().runs.clone()
    }

    pub fn raw_records(&self) -> Vec<RawRecord> {
        self.tables().raw.clone()
    }

    pub fn announcements(&self) -> Vec<AnnouncementRow> {
        self.tables().announcements.clone()
    }
}

fn raw_row(raw: NewRawRecord) -> RawRecord {
    RawRecord {
        id: Uuid::new_v4().to_string(),
        source_id: raw.api_source_id,
        run_id: raw.collection_log_id,
        raw_payload: raw.raw_payload,
        status: raw.status,
        error_log: None,
        collected_at: raw.collected_at,
        processed_at: None,
        is_active: raw.is_active,
    }
}

fn not_found(table: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        table,
        id: id.to_string(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_sources(&self, filter: SourceFilter) -> StoreResult<Vec<Source>> {
        let t = self.tables();
        let mut out: Vec<Source> = match &filter {
            SourceFilter::Active => t.sources.iter().filter(|s| s.is_active).cloned().collect(),
            SourceFilter::ById(id) => t.sources.iter().filter(|s| &s.id == id).cloned().collect(),
        };
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>> {
        Ok(self.tables().sources.iter().find(|s| s.id == id).cloned())
    }

    async fn mark_source_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables();
        let src = t
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("api_sources", id))?;
        src.last_collected_at = Some(at);
        Ok(())
    }

    async fn insert_run(&self, run: NewRun) -> StoreResult<CollectionRun> {
        let row = CollectionRun {
            id: Uuid::new_v4().to_string(),
            source_id: run.api_source_id,
            status: run.status,
            records_fetched: run.records_fetched,
            records_processed: run.records_processed,
            records_failed: run.records_failed,
            error_message: None,
            error_summary: None,
            started_at: run.started_at,
            completed_at: None,
        };
        self.tables().runs.push(row.clone());
        Ok(row)
    }

    async fn finish_run(&self, run_id: &str, done: RunCompletion) -> StoreResult<()> {
        let mut t = self.tables();
        let run = t
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| not_found("api_collection_logs", run_id))?;
        run.status = done.status;
        run.records_fetched = done.records_fetched;
        run.records_processed = done.records_processed;
        run.records_failed = done.records_failed;
        run.error_message = done.error_message;
        run.error_summary = done.error_summary;
        run.completed_at = Some(done.completed_at);
        Ok(())
    }

    async fn insert_raw(&self, raw: NewRawRecord) -> StoreResult<RawRecord> {
        if let Some(gate) = &self.reject_raw {
            if gate(&raw.raw_payload) {
                return Err(StoreError::Rejected("raw_announcements insert".into()));
            }
        }
        let row = raw_row(raw);
        self.tables().raw.push(row.clone());
        Ok(row)
    }

    async fn list_pending_raw(&self) -> StoreResult<Vec<RawRecord>> {
        let mut out: Vec<RawRecord> = self
            .tables()
            .raw
            .iter()
            .filter(|r| r.is_active && r.status == crate::model::RawStatus::Fetched)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.collected_at);
        Ok(out)
    }

    async fn get_raw(&self, id: &str) -> StoreResult<Option<RawRecord>> {
        Ok(self.tables().raw.iter().find(|r| r.id == id).cloned())
    }

    async fn update_raw(&self, id: &str, update: RawUpdate) -> StoreResult<()> {
        let mut t = self.tables();
        let row = t
            .raw
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("raw_announcements", id))?;
        if let Some(next) = update.status {
            if !row.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: row.status.as_str(),
                    to: next.as_str(),
                });
            }
            row.status = next;
        }
        if let Some(log) = update.error_log {
            row.error_log = log;
        }
        if let Some(at) = update.processed_at {
            row.processed_at = Some(at);
        }
        Ok(())
    }

    async fn find_announcement(
        &self,
        title: &str,
        organization: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .tables()
            .announcements
            .iter()
            .find(|a| a.record.title == title && a.record.organization == organization)
            .map(|a| a.id.clone()))
    }

    async fn insert_announcement(&self, record: &Announcement) -> StoreResult<String> {
        let now = Utc::now();
        let row = AnnouncementRow {
            id: Uuid::new_v4().to_string(),
            record: record.clone(),
            created_at: now,
            updated_at: now,
        };
        let id = row.id.clone();
        self.tables().announcements.push(row);
        Ok(id)
    }

    async fn update_announcement(&self, id: &str, record: &Announcement) -> StoreResult<String> {
        let mut t = self.tables();
        let row = t
            .announcements
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("announcements", id))?;
        row.record.merge(record);
        row.updated_at = Utc::now();
        Ok(row.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawStatus;
    use serde_json::json;

    #[tokio::test]
    async fn raw_status_cannot_move_backwards() {
        let store = MemoryStore::new();
        let raw = store.seed_raw("s1", json!({"a": 1}));
        store
            .update_raw(&raw.id, RawUpdate::processed(Utc::now()))
            .await
            .unwrap();
        let err = store
            .update_raw(&raw.id, RawUpdate::error("late failure"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let after = store.get_raw(&raw.id).await.unwrap().unwrap();
        assert_eq!(after.status, RawStatus::Processed);
    }

    #[tokio::test]
    async fn pending_excludes_terminal_and_inactive() {
        let store = MemoryStore::new();
        let a = store.seed_raw("s1", json!({"n": 1}));
        let b = store.seed_raw("s1", json!({"n": 2}));
        store
            .update_raw(&b.id, RawUpdate::error("bad"))
            .await
            .unwrap();
        let pending = store.list_pending_raw().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }
}
