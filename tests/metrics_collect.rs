// tests/metrics_collect.rs
#![cfg(feature = "strict-metrics")]

mod common;

use announcement_ingest::transform::coerce::CoercionTable;
use announcement_ingest::{
    run_collection, run_transformation, CollectOptions, Collector, MemoryStore, PipelineConfig,
    TransformOptions, Transformer,
};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn metrics_exposed_after_collect_and_transform() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let app = Router::new().route("/ok", get(|| async { Json(json!([{ "t": "A", "o": "B" }])) }));
    let base = common::spawn(app).await;
    let (mem, store) = common::stores(MemoryStore::new());
    mem.add_source(common::source_from(json!({
        "id": "m1",
        "name": "Metered",
        "endpoint_url": format!("{base}/ok"),
        "mapping_config": { "fields": { "title": "t", "organization": "o" } }
    })));

    let collector = Collector::new(store.clone(), &PipelineConfig::default()).expect("collector");
    let opts = CollectOptions {
        source_delay: Duration::ZERO,
        ..CollectOptions::default()
    };
    run_collection(&store, &collector, &opts).await.expect("collect");

    let transformer = Transformer::new(store.clone(), CoercionTable::builtin());
    run_transformation(&store, &transformer, &TransformOptions::default())
        .await
        .expect("transform");

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    assert!(out.contains("collect_runs_total"));
    assert!(out.contains("collect_records_fetched_total"));
    assert!(out.contains("collect_fetch_ms"));
    assert!(out.contains("transform_records_total"));
}
