// src/ingest/mod.rs
pub mod auth;
pub mod collector;
pub mod runner;

pub use collector::{CollectionOutcome, Collector, DryRunReport};
pub use runner::{run_collection, CollectOptions, CollectionSummary};

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use serde_json::Value;

/// One-time metrics registration (so series show up once a recorder is installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_runs_total", "Collection runs by terminal status.");
        describe_counter!(
            "collect_records_fetched_total",
            "Items found in source responses."
        );
        describe_counter!(
            "collect_raw_insert_errors_total",
            "Raw record inserts that failed during staging."
        );
        describe_histogram!("collect_fetch_ms", "Source fetch time in milliseconds.");
        describe_counter!(
            "transform_records_total",
            "Raw records transformed, by action."
        );
    });
}

/// Flatten an arbitrary API response into items. Precedence: bare array,
/// then a `data`, `items` or `results` array, else the whole body is one item.
pub fn normalize_envelope(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["data", "items", "results"] {
                if matches!(map.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return items;
                    }
                }
            }
            vec![Value::Object(map)]
        }
        other => vec![other],
    }
}
