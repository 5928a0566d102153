// tests/collector_http.rs
//! Collector against a local axum API with an in-memory store.

mod common;

use announcement_ingest::model::{RawStatus, RunStatus};
use announcement_ingest::{Collector, MemoryStore, PipelineConfig};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

fn items(n: u64) -> Vec<Value> {
    (1..=n)
        .map(|i| json!({ "n": i, "title": format!("Program {i}") }))
        .collect()
}

fn header(headers: &HeaderMap, name: &str) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| json!(s))
        .unwrap_or(Value::Null)
}

async fn echo(headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "authorization": header(&headers, "authorization"),
        "api_key": header(&headers, "x-api-key"),
        "user_agent": header(&headers, "user-agent"),
        "content_type": header(&headers, "content-type"),
    }))
}

fn test_api() -> Router {
    Router::new()
        .route("/bare", get(|| async { Json(json!(items(3))) }))
        .route("/results", get(|| async { Json(json!({ "results": items(3), "total": 3 })) }))
        .route("/data", get(|| async { Json(json!({ "data": items(2) })) }))
        .route("/single", get(|| async { Json(json!({ "title": "Only one" })) }))
        .route("/ten", get(|| async { Json(json!(items(10))) }))
        .route("/empty", get(|| async { Json(json!([])) }))
        .route(
            "/boom",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "down" }))) }),
        )
        .route("/html", get(|| async { "<html>maintenance</html>" }))
        .route("/echo", get(echo))
}

fn collector(store: announcement_ingest::DynStore) -> Collector {
    Collector::new(store, &PipelineConfig::default()).expect("collector")
}

#[tokio::test]
async fn http_500_fails_run_and_stages_nothing() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source("s-boom", "Broken", &format!("{base}/boom"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Failed);
    assert!(out.error.as_deref().unwrap_or_default().contains("500"));
    let runs = mem.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error_message.is_some());
    assert!(runs[0].completed_at.is_some());
    assert_eq!(runs[0].error_summary.as_ref().unwrap()["error_type"], "http_status");
    assert!(mem.raw_records().is_empty());
    assert!(mem.sources()[0].last_collected_at.is_none());
}

#[tokio::test]
async fn envelope_and_bare_array_stage_the_same_items() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let bare = common::source("s-bare", "Bare", &format!("{base}/bare"));
    let wrapped = common::source("s-wrap", "Wrapped", &format!("{base}/results"));
    mem.add_source(bare.clone());
    mem.add_source(wrapped.clone());

    let c = collector(store);
    assert_eq!(c.collect(&bare, false).await.status, RunStatus::Success);
    assert_eq!(c.collect(&wrapped, false).await.status, RunStatus::Success);

    let payloads = |sid: &str| -> Vec<Value> {
        let mut v: Vec<Value> = mem
            .raw_records()
            .into_iter()
            .filter(|r| r.source_id == sid)
            .map(|r| r.raw_payload)
            .collect();
        v.sort_by_key(|p| p["n"].as_u64());
        v
    };
    assert_eq!(payloads("s-bare").len(), 3);
    assert_eq!(payloads("s-bare"), payloads("s-wrap"));
}

#[tokio::test]
async fn single_object_body_is_one_item() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source("s1", "Single", &format!("{base}/single"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.records_fetched, 1);
    let raws = mem.raw_records();
    assert_eq!(raws.len(), 1);
    assert_eq!(raws[0].raw_payload, json!({ "title": "Only one" }));
    assert_eq!(raws[0].status, RawStatus::Fetched);
    assert_eq!(raws[0].run_id, out.run_id);
}

#[tokio::test]
async fn failed_inserts_make_the_run_partial() {
    let base = common::spawn(test_api()).await;
    let gated = MemoryStore::new().with_raw_insert_gate(|p| matches!(p["n"].as_u64(), Some(3 | 7)));
    let (mem, store) = common::stores(gated);
    let src = common::source("s-ten", "Ten", &format!("{base}/ten"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Partial);
    assert_eq!(
        (out.records_fetched, out.records_processed, out.records_failed),
        (10, 8, 2)
    );
    assert_eq!(mem.raw_records().len(), 8);

    let run = &mem.runs()[0];
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.records_fetched, 10);
    assert_eq!(run.records_processed, 8);
    assert_eq!(run.records_failed, 2);
    let summary = run.error_summary.as_ref().expect("error summary");
    assert_eq!(summary["failed_records"], 2);
    assert_eq!(summary["errors"].as_array().map(Vec::len), Some(2));
    assert!(mem.sources()[0].last_collected_at.is_some());
}

#[tokio::test]
async fn every_insert_failing_fails_the_run() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new().with_raw_insert_gate(|_| true));
    let src = common::source("s-bare", "Bare", &format!("{base}/bare"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Failed);
    assert_eq!((out.records_processed, out.records_failed), (0, 3));
    assert_eq!(mem.runs()[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn empty_response_is_a_successful_run() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source("s-empty", "Empty", &format!("{base}/empty"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Success);
    assert_eq!(out.records_fetched, 0);
    assert!(mem.runs()[0].error_summary.is_none());
    assert!(mem.sources()[0].last_collected_at.is_some());
}

#[tokio::test]
async fn api_key_and_bearer_credentials_reach_the_server() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let keyed = common::source_from(json!({
        "id": "s-key",
        "name": "Keyed",
        "endpoint_url": format!("{base}/echo"),
        "auth_type": "api_key",
        "auth_key": "k-123",
    }));
    let bearer = common::source_from(json!({
        "id": "s-bearer",
        "name": "Bearer",
        "endpoint_url": format!("{base}/echo"),
        "auth_type": "bearer",
        "auth_key": "t-456",
    }));
    mem.add_source(keyed.clone());
    mem.add_source(bearer.clone());

    let c = collector(store);
    c.collect(&keyed, false).await;
    c.collect(&bearer, false).await;

    let seen = |sid: &str| -> Value {
        mem.raw_records()
            .into_iter()
            .find(|r| r.source_id == sid)
            .map(|r| r.raw_payload)
            .expect("echoed headers")
    };
    let k = seen("s-key");
    assert_eq!(k["api_key"], "k-123");
    assert_eq!(k["authorization"], Value::Null);
    assert_eq!(k["user_agent"], "Announcement-API-Collector/1.0");
    assert_eq!(k["content_type"], "application/json");

    let b = seen("s-bearer");
    assert_eq!(b["authorization"], "Bearer t-456");
    assert_eq!(b["api_key"], Value::Null);
}

#[tokio::test]
async fn non_json_content_type_fails_the_run() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source("s-html", "Html", &format!("{base}/html"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Failed);
    assert!(out
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Invalid content type"));
    assert_eq!(mem.runs()[0].error_summary.as_ref().unwrap()["error_type"], "content_type");
    assert!(mem.raw_records().is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_fails_the_run() {
    let (mem, store) = common::stores(MemoryStore::new());
    // Bind then drop to get a port with nothing listening.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        l.local_addr().expect("addr").port()
    };
    let src = common::source("s-gone", "Gone", &format!("http://127.0.0.1:{port}/x"));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Failed);
    assert_eq!(mem.runs()[0].status, RunStatus::Failed);
    assert!(mem.sources()[0].last_collected_at.is_none());
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let base = common::spawn(test_api()).await;
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source_from(json!({
        "id": "s-dry",
        "name": "Dry",
        "endpoint_url": format!("{base}/bare"),
        "auth_type": "bearer",
        "auth_key": "secret-token",
    }));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, true).await;

    let report = out.dry_run.expect("dry run report");
    assert_eq!(report.endpoint, format!("{base}/bare"));
    let auth = report
        .headers
        .iter()
        .find(|(k, _)| k == "authorization")
        .map(|(_, v)| v.clone())
        .expect("authorization header listed");
    assert!(!auth.contains("secret-token"));
    assert!(out.run_id.is_none());
    assert!(mem.runs().is_empty());
    assert!(mem.raw_records().is_empty());
    assert!(mem.sources()[0].last_collected_at.is_none());
}

#[tokio::test]
async fn oauth_source_is_refused() {
    let (mem, store) = common::stores(MemoryStore::new());
    let src = common::source_from(json!({
        "id": "s-oauth",
        "name": "OAuth",
        "endpoint_url": "http://127.0.0.1:9/never",
        "auth_type": "oauth",
        "auth_key": "x",
    }));
    mem.add_source(src.clone());

    let out = collector(store).collect(&src, false).await;

    assert_eq!(out.status, RunStatus::Failed);
    assert_eq!(mem.runs()[0].error_summary.as_ref().unwrap()["error_type"], "config");
}
