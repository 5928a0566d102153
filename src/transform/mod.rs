// src/transform/mod.rs
//! Staged raw payload → normalized announcement.

pub mod coerce;
pub mod mapper;
pub mod path;
pub mod runner;
pub mod upsert;
pub mod validate;

pub use mapper::{apply_field_mapping, map_record, Mapped};
pub use path::get_nested_value;
pub use runner::{run_transformation, TransformOptions, TransformSummary};
pub use upsert::{TransformAction, TransformResult, Transformer};
pub use validate::{validate_announcement, Validation};
