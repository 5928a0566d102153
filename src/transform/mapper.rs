// src/transform/mapper.rs
use serde_json::{Map, Value};

use super::coerce::CoercionTable;
use super::path::get_nested_value;
use crate::error::TransformError;
use crate::model::MappingConfig;

pub type Mapped = Map<String, Value>;

const RECORD_DEFAULTS: &[(&str, &str)] = &[("status", "recruiting"), ("link_type", "external")];

fn is_unset(mapped: &Mapped, field: &str) -> bool {
    match mapped.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Raw payload → target fields, driven only by `mapping.fields`. Fields the
/// map does not name are dropped. Pure: the same payload and mapping always
/// give the same output.
pub fn apply_field_mapping(
    payload: &Value,
    mapping: &MappingConfig,
    table: &CoercionTable,
) -> Result<Mapped, TransformError> {
    let mut mapped = Mapped::new();
    let Some(fields) = &mapping.fields else {
        return Ok(mapped);
    };

    for (target, source_path) in fields {
        match get_nested_value(payload, source_path) {
            None | Some(Value::Null) => {}
            Some(v) => {
                mapped.insert(target.clone(), table.apply(target, v.clone())?);
            }
        }
    }

    for (field, value) in &mapping.defaults {
        if !mapped.contains_key(field) {
            mapped.insert(field.clone(), value.clone());
        }
    }

    if let Some(cat) = &mapping.target_category {
        if is_unset(&mapped, "category_id") {
            mapped.insert("category_id".into(), Value::String(cat.clone()));
        }
    }
    if let Some(sub) = &mapping.target_subcategory {
        if is_unset(&mapped, "subcategory_id") {
            mapped.insert("subcategory_id".into(), Value::String(sub.clone()));
        }
    }

    Ok(mapped)
}

/// Field mapping followed by the announcement's own defaults
/// (`status = recruiting`, `link_type = external`).
pub fn map_record(
    payload: &Value,
    mapping: &MappingConfig,
    table: &CoercionTable,
) -> Result<Mapped, TransformError> {
    let mut mapped = apply_field_mapping(payload, mapping, table)?;
    for (field, value) in RECORD_DEFAULTS {
        if is_unset(&mapped, field) {
            mapped.insert((*field).to_string(), Value::String((*value).to_string()));
        }
    }
    Ok(mapped)
}
