// tests/common/mod.rs
#![allow(dead_code)]

use announcement_ingest::model::Source;
use announcement_ingest::{DynStore, MemoryStore};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test api");
    });
    format!("http://{addr}")
}

pub fn source(id: &str, name: &str, endpoint: &str) -> Source {
    source_from(json!({
        "id": id,
        "name": name,
        "endpoint_url": endpoint,
        "auth_type": "none",
        "is_active": true,
    }))
}

pub fn source_from(v: Value) -> Source {
    serde_json::from_value(v).expect("source fixture")
}

pub fn stores(mem: MemoryStore) -> (Arc<MemoryStore>, DynStore) {
    let mem = Arc::new(mem);
    let dyn_store: DynStore = mem.clone();
    (mem, dyn_store)
}
