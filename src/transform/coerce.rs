// src/transform/coerce.rs
//! Name-convention type coercion for mapped fields.
//!
//! The target field's *name* decides how a raw value is typed: `tags` splits
//! comma lists, `is_*`/`has_*` become booleans, `*_count`/`*priority*` become
//! numbers, `*_date*` become canonical UTC timestamps. The rules live in an
//! ordered table (first match wins) that a deployment can replace through
//! `PipelineConfig::coercion`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ConfigError, TransformError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    Tags,
    Boolean,
    Number,
    DateTime,
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
    Suffix,
    Contains,
    Regex,
}

/// One row of a configured table, e.g.
/// `{ match = "prefix", pattern = "is_", coerce = "boolean" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "match")]
    pub kind: MatchKind,
    pub pattern: String,
    pub coerce: Coercion,
}

#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(Regex),
}

impl NamePattern {
    pub fn matches(&self, field: &str) -> bool {
        match self {
            NamePattern::Exact(p) => field == p,
            NamePattern::Prefix(p) => field.starts_with(p.as_str()),
            NamePattern::Suffix(p) => field.ends_with(p.as_str()),
            NamePattern::Contains(p) => field.contains(p.as_str()),
            NamePattern::Regex(re) => re.is_match(field),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoercionRule {
    pub pattern: NamePattern,
    pub coerce: Coercion,
}

#[derive(Debug, Clone)]
pub struct CoercionTable {
    rules: Vec<CoercionRule>,
}

impl Default for CoercionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CoercionTable {
    /// Conventions used by the announcement schema. Booleans are checked
    /// before numbers so `is_priority` stays a flag.
    pub fn builtin() -> Self {
        let rule = |pattern: NamePattern, coerce: Coercion| CoercionRule { pattern, coerce };
        let s = |p: &str| p.to_string();
        Self {
            rules: vec![
                rule(NamePattern::Exact(s("tags")), Coercion::Tags),
                rule(NamePattern::Suffix(s("_tags")), Coercion::Tags),
                rule(NamePattern::Prefix(s("is_")), Coercion::Boolean),
                rule(NamePattern::Prefix(s("has_")), Coercion::Boolean),
                rule(NamePattern::Suffix(s("_count")), Coercion::Number),
                rule(NamePattern::Exact(s("count")), Coercion::Number),
                rule(NamePattern::Contains(s("priority")), Coercion::Number),
                rule(NamePattern::Contains(s("_date")), Coercion::DateTime),
                rule(NamePattern::Exact(s("date")), Coercion::DateTime),
            ],
        }
    }

    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(specs.len());
        for s in specs {
            let pattern = match s.kind {
                MatchKind::Exact => NamePattern::Exact(s.pattern.clone()),
                MatchKind::Prefix => NamePattern::Prefix(s.pattern.clone()),
                MatchKind::Suffix => NamePattern::Suffix(s.pattern.clone()),
                MatchKind::Contains => NamePattern::Contains(s.pattern.clone()),
                MatchKind::Regex => {
                    NamePattern::Regex(Regex::new(&s.pattern).map_err(|source| {
                        ConfigError::Pattern {
                            pattern: s.pattern.clone(),
                            source,
                        }
                    })?)
                }
            };
            rules.push(CoercionRule {
                pattern,
                coerce: s.coerce,
            });
        }
        Ok(Self { rules })
    }

    pub fn rule_for(&self, field: &str) -> Coercion {
        self.rules
            .iter()
            .find(|r| r.pattern.matches(field))
            .map(|r| r.coerce)
            .unwrap_or(Coercion::PassThrough)
    }

    pub fn apply(&self, field: &str, value: Value) -> Result<Value, TransformError> {
        coerce(self.rule_for(field), field, value)
    }
}

/// Apply one coercion. Only date parsing can fail.
pub fn coerce(rule: Coercion, field: &str, value: Value) -> Result<Value, TransformError> {
    match rule {
        Coercion::Tags => Ok(split_tags(value)),
        Coercion::Boolean => Ok(Value::Bool(truthy(&value))),
        Coercion::Number => Ok(to_number(&value)),
        Coercion::DateTime => parse_datetime(&value)
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .ok_or_else(|| TransformError::InvalidDate {
                field: field.to_string(),
                value: value.to_string(),
            }),
        Coercion::PassThrough => Ok(value),
    }
}

fn split_tags(value: Value) -> Value {
    match value {
        Value::String(s) => Value::Array(
            s.split(',')
                .map(|t| Value::String(t.trim().to_string()))
                .collect(),
        ),
        other => other,
    }
}

/// JSON truthiness: false, 0, "" and null are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Lenient numeric parse; anything unusable becomes 0.
pub fn to_number(value: &Value) -> Value {
    let f = match value {
        Value::Number(n) => return Value::Number(n.clone()),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0)
            }
        }
        _ => 0.0,
    };
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        json!(f as i64)
    } else {
        json!(f)
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Accepts RFC 3339, RFC 2822, common zone-less date/time layouts (read as
/// UTC) and integer epoch milliseconds.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in NAIVE_DATETIME_FORMATS {
                if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(ndt.and_utc());
                }
            }
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        }
        _ => None,
    }
}
