// src/store/mod.rs
//! Backing store seam. The binaries construct one client and hand it to every
//! component as `Arc<dyn Store>`.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{
    Announcement, CollectionRun, NewRawRecord, NewRun, RawRecord, RawUpdate, RunCompletion,
    Source, SourceFilter,
};

pub use memory::MemoryStore;
pub use rest::RestStore;

pub type StoreResult<T> = Result<T, StoreError>;

pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_sources(&self, filter: SourceFilter) -> StoreResult<Vec<Source>>;
    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>>;
    async fn mark_source_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    async fn insert_run(&self, run: NewRun) -> StoreResult<CollectionRun>;
    async fn finish_run(&self, run_id: &str, done: RunCompletion) -> StoreResult<()>;

    async fn insert_raw(&self, raw: NewRawRecord) -> StoreResult<RawRecord>;
    /// Active raw records still in `fetched`, oldest first.
    async fn list_pending_raw(&self) -> StoreResult<Vec<RawRecord>>;
    async fn get_raw(&self, id: &str) -> StoreResult<Option<RawRecord>>;
    async fn update_raw(&self, id: &str, update: RawUpdate) -> StoreResult<()>;

    /// Natural-key lookup; returns the announcement id.
    async fn find_announcement(
        &self,
        title: &str,
        organization: &str,
    ) -> StoreResult<Option<String>>;
    async fn insert_announcement(&self, record: &Announcement) -> StoreResult<String>;
    async fn update_announcement(&self, id: &str, record: &Announcement) -> StoreResult<String>;
}
