// src/lib.rs
// Public library surface for the two binaries and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod transform;

// ---- Re-exports for stable public API ----
pub use crate::config::{PipelineConfig, StoreConfig};
pub use crate::ingest::{run_collection, CollectOptions, CollectionSummary, Collector};
pub use crate::store::{DynStore, MemoryStore, RestStore, Store};
pub use crate::transform::{run_transformation, TransformOptions, TransformSummary, Transformer};
