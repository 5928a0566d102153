// src/transform/validate.rs
use serde_json::Value;

use super::mapper::Mapped;
use crate::model::{AnnouncementStatus, LinkType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    /// `Validation failed: a, b` as stored in the raw record's error_log.
    pub fn message(&self) -> String {
        format!("Validation failed: {}", self.errors.join(", "))
    }
}

fn require_text(mapped: &Mapped, field: &str, errors: &mut Vec<String>) {
    match mapped.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(Value::String(_)) | Some(Value::Null) | None => {
            errors.push(format!("{field} is required"));
        }
        Some(other) => errors.push(format!("{field} must be a string, got {other}")),
    }
}

fn check_enum(mapped: &Mapped, field: &str, allowed: &[&str], errors: &mut Vec<String>) {
    match mapped.get(field) {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.is_empty() || allowed.contains(&s.as_str()) => {}
        Some(Value::String(s)) => errors.push(format!("Invalid {field}: {s}")),
        Some(other) => errors.push(format!("Invalid {field}: {other}")),
    }
}

/// Required natural-key fields and the two enum columns.
pub fn validate_announcement(mapped: &Mapped) -> Validation {
    let mut errors = Vec::new();
    require_text(mapped, "title", &mut errors);
    require_text(mapped, "organization", &mut errors);
    check_enum(mapped, "status", &AnnouncementStatus::ALL, &mut errors);
    check_enum(mapped, "link_type", &LinkType::ALL, &mut errors);
    Validation {
        valid: errors.is_empty(),
        errors,
    }
}
