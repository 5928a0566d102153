// src/transform/path.rs
use serde_json::Value;

/// Walk a dot-delimited path (`"response.org.name"`). Numeric segments index
/// into arrays. Returns `None` as soon as a segment is missing or its parent
/// is null or a scalar; never panics.
pub fn get_nested_value<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = obj;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
