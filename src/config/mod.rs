// src/config/mod.rs
pub mod pipeline;
pub mod store;

pub use pipeline::PipelineConfig;
pub use store::StoreConfig;
