// src/store/rest.rs
//! PostgREST (Supabase REST) store over reqwest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Store, StoreResult};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{
    Announcement, CollectionRun, NewRawRecord, NewRun, RawRecord, RawStatus, RawUpdate,
    RunCompletion, Source, SourceFilter,
};

const SOURCES: &str = "api_sources";
const RUNS: &str = "api_collection_logs";
const RAW: &str = "raw_announcements";
const ANNOUNCEMENTS: &str = "announcements";

#[derive(Clone)]
pub struct RestStore {
    base: String,
    key: String,
    http: Client,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

impl RestStore {
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            base: format!("{}/rest/v1", cfg.url.trim_end_matches('/')),
            key: cfg.service_key.clone(),
            http,
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Content-Type", "application/json")
    }

    fn get(&self, table: &str) -> RequestBuilder {
        self.authed(self.http.get(self.table(table)))
    }

    fn write(&self, req: RequestBuilder) -> RequestBuilder {
        self.authed(req).header("Prefer", "return=representation")
    }

    async fn checked(resp: Response) -> StoreResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn rows<T: DeserializeOwned>(req: RequestBuilder) -> StoreResult<Vec<T>> {
        let resp = Self::checked(req.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn first<T: DeserializeOwned>(
        req: RequestBuilder,
        table: &'static str,
        id: &str,
    ) -> StoreResult<T> {
        Self::rows::<T>(req)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })
    }
}

fn eq(v: &str) -> String {
    format!("eq.{v}")
}

#[async_trait]
impl Store for RestStore {
    async fn list_sources(&self, filter: SourceFilter) -> StoreResult<Vec<Source>> {
        let mut q = vec![("select", "*".to_string()), ("order", "name.asc".to_string())];
        match filter {
            SourceFilter::Active => q.push(("is_active", eq("true"))),
            SourceFilter::ById(id) => q.push(("id", eq(&id))),
        }
        Self::rows(self.get(SOURCES).query(&q)).await
    }

    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>> {
        let q = [("select", "*".to_string()), ("id", eq(id))];
        Ok(Self::rows(self.get(SOURCES).query(&q)).await?.into_iter().next())
    }

    async fn mark_source_collected(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let req = self
            .write(self.http.patch(self.table(SOURCES)))
            .query(&[("id", eq(id))])
            .json(&json!({ "last_collected_at": at }));
        Self::first::<IdRow>(req, SOURCES, id).await.map(|_| ())
    }

    async fn insert_run(&self, run: NewRun) -> StoreResult<CollectionRun> {
        let source_id = run.api_source_id.clone();
        let req = self.write(self.http.post(self.table(RUNS))).json(&run);
        Self::first(req, RUNS, &source_id).await
    }

    async fn finish_run(&self, run_id: &str, done: RunCompletion) -> StoreResult<()> {
        let req = self
            .write(self.http.patch(self.table(RUNS)))
            .query(&[("id", eq(run_id))])
            .json(&done);
        Self::first::<IdRow>(req, RUNS, run_id).await.map(|_| ())
    }

    async fn insert_raw(&self, raw: NewRawRecord) -> StoreResult<RawRecord> {
        let source_id = raw.api_source_id.clone();
        let req = self.write(self.http.post(self.table(RAW))).json(&raw);
        Self::first(req, RAW, &source_id).await
    }

    async fn list_pending_raw(&self) -> StoreResult<Vec<RawRecord>> {
        let q = [
            ("select", "*".to_string()),
            ("status", eq(RawStatus::Fetched.as_str())),
            ("is_active", eq("true")),
            ("order", "collected_at.asc".to_string()),
        ];
        Self::rows(self.get(RAW).query(&q)).await
    }

    async fn get_raw(&self, id: &str) -> StoreResult<Option<RawRecord>> {
        let q = [("select", "*".to_string()), ("id", eq(id))];
        Ok(Self::rows(self.get(RAW).query(&q)).await?.into_iter().next())
    }

    async fn update_raw(&self, id: &str, update: RawUpdate) -> StoreResult<()> {
        let mut req = self
            .write(self.http.patch(self.table(RAW)))
            .query(&[("id", eq(id))]);
        // Status only moves forward; the filter makes an illegal change match no row.
        match update.status {
            Some(RawStatus::Processed) => {
                req = req.query(&[("status", "in.(fetched,processed)")]);
            }
            Some(RawStatus::Error) => {
                req = req.query(&[("status", eq(RawStatus::Fetched.as_str()))]);
            }
            Some(RawStatus::Fetched) | None => {}
        }
        match Self::first::<IdRow>(req.json(&update), RAW, id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) if update.status.is_some() => {
                Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: "terminal",
                    to: update.status.map(|s| s.as_str()).unwrap_or("?"),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn find_announcement(
        &self,
        title: &str,
        organization: &str,
    ) -> StoreResult<Option<String>> {
        let q = [
            ("select", "id".to_string()),
            ("title", eq(title)),
            ("organization", eq(organization)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<IdRow> = Self::rows(self.get(ANNOUNCEMENTS).query(&q)).await?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }

    async fn insert_announcement(&self, record: &Announcement) -> StoreResult<String> {
        let req = self
            .write(self.http.post(self.table(ANNOUNCEMENTS)))
            .query(&[("select", "id")])
            .json(record);
        let row: IdRow = Self::first(req, ANNOUNCEMENTS, &record.title).await?;
        Ok(row.id)
    }

    async fn update_announcement(&self, id: &str, record: &Announcement) -> StoreResult<String> {
        let mut body = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".into(), json!(Utc::now()));
        }
        let req = self
            .write(self.http.patch(self.table(ANNOUNCEMENTS)))
            .query(&[("id", eq(id)), ("select", "id".to_string())])
            .json(&body);
        let row: IdRow = Self::first(req, ANNOUNCEMENTS, id).await?;
        Ok(row.id)
    }
}
