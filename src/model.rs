// src/model.rs
//! Persisted entities: sources, collection runs, staged raw records and the
//! normalized announcement. Wire names follow the store's column names.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn default_true() -> bool {
    true
}

/* ----------------------------
Source registry
---------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Bearer,
    #[serde(rename = "oauth")]
    OAuth,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::ApiKey => "api_key",
            AuthType::Bearer => "bearer",
            AuthType::OAuth => "oauth",
        }
    }
}

/// Declarative raw → normalized rules. Unknown keys are ignored so the admin
/// UI can add fields ahead of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// target field → dot path into the raw payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
    /// target field → literal used when the field map left it unset
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub defaults: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subcategory: Option<String>,
    /// Stored for the admin UI; not evaluated by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub endpoint_url: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mapping_config: MappingConfig,
    /// Cron-style string kept for the admin UI. Never executed here.
    #[serde(default)]
    pub collection_schedule: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilter {
    /// Every active source, ordered by name.
    Active,
    /// One source by id, whether active or not.
    ById(String),
}

/* ----------------------------
Collection run log
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    /// Terminal status from the insert tally of a fetched response.
    pub fn derive(processed: u32, failed: u32) -> Self {
        if failed == 0 {
            RunStatus::Success
        } else if processed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRun {
    pub id: String,
    #[serde(rename = "api_source_id")]
    pub source_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub records_fetched: u32,
    #[serde(default)]
    pub records_processed: u32,
    #[serde(default)]
    pub records_failed: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_summary: Option<Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert body for a run that has just started.
#[derive(Debug, Clone, Serialize)]
pub struct NewRun {
    pub api_source_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub records_fetched: u32,
    pub records_processed: u32,
    pub records_failed: u32,
}

impl NewRun {
    pub fn started(source_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            api_source_id: source_id.to_string(),
            status: RunStatus::Running,
            started_at,
            records_fetched: 0,
            records_processed: 0,
            records_failed: 0,
        }
    }
}

/// Patch body moving a run to its terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub records_fetched: u32,
    pub records_processed: u32,
    pub records_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub error_summary: Option<Value>,
    pub completed_at: DateTime<Utc>,
}

/* ----------------------------
Raw record staging
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawStatus {
    Fetched,
    Processed,
    Error,
}

impl RawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawStatus::Fetched => "fetched",
            RawStatus::Processed => "processed",
            RawStatus::Error => "error",
        }
    }

    /// Status only moves forward: fetched → processed | error.
    pub fn can_transition_to(&self, next: RawStatus) -> bool {
        *self == next || (*self == RawStatus::Fetched && next != RawStatus::Fetched)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(rename = "api_source_id")]
    pub source_id: String,
    #[serde(rename = "collection_log_id", default)]
    pub run_id: Option<String>,
    pub raw_payload: Value,
    pub status: RawStatus,
    #[serde(default)]
    pub error_log: Option<String>,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRawRecord {
    pub api_source_id: String,
    pub collection_log_id: Option<String>,
    pub raw_payload: Value,
    pub status: RawStatus,
    pub collected_at: DateTime<Utc>,
    pub is_active: bool,
}

impl NewRawRecord {
    pub fn fetched(source_id: &str, run_id: Option<&str>, payload: Value) -> Self {
        Self {
            api_source_id: source_id.to_string(),
            collection_log_id: run_id.map(str::to_string),
            raw_payload: payload,
            status: RawStatus::Fetched,
            collected_at: Utc::now(),
            is_active: true,
        }
    }
}

/// Patch body for a raw record. `error_log: Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RawStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl RawUpdate {
    pub fn processed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(RawStatus::Processed),
            error_log: Some(None),
            processed_at: Some(at),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(RawStatus::Error),
            error_log: Some(Some(message.into())),
            processed_at: None,
        }
    }

    /// Leave the status alone, only annotate.
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_log: Some(Some(message.into())),
            processed_at: None,
        }
    }
}

/* ----------------------------
Normalized announcement
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    Recruiting,
    Closed,
    Upcoming,
    Draft,
}

impl AnnouncementStatus {
    pub const ALL: [&'static str; 4] = ["recruiting", "closed", "upcoming", "draft"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Internal,
    External,
    None,
}

impl LinkType {
    pub const ALL: [&'static str; 3] = ["internal", "external", "none"];
}

/// The canonical record produced by transformation. `(title, organization)`
/// is the natural key used for upsert matching.
/// Text columns take any JSON scalar: numbers and booleans keep their
/// textual form, as the store would cast them.
fn lenient_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a scalar, got {other}"))),
    }
}

/// Integer columns round fractional values and parse numeric strings.
fn lenient_int<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let f = match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => return Ok(Some(i)),
            None => n.as_f64(),
        },
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(f64::from(u8::from(b))),
        Some(_) => None,
    };
    match f.filter(|f| f.is_finite()) {
        Some(f) => Ok(Some(f.round() as i64)),
        None => Err(D::Error::custom("expected an integer")),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Announcement {
    pub title: String,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub subcategory_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub external_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub detail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AnnouncementStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_home_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_priority: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_int")]
    pub display_priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_int")]
    pub views_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_end_date: Option<DateTime<Utc>>,
}

macro_rules! merge_present {
    ($dst:expr, $src:expr; $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field.clone();
            }
        )+
    };
}

impl Announcement {
    /// Typed view of a mapped field set. Target fields the record does not
    /// know are dropped.
    pub fn from_mapped(mapped: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(mapped.clone()))
    }

    /// Partial update: only fields present in `patch` overwrite.
    pub fn merge(&mut self, patch: &Announcement) {
        self.title = patch.title.clone();
        self.organization = patch.organization.clone();
        merge_present!(self, patch;
            subtitle, category_id, subcategory_id, thumbnail_url, external_url,
            detail_url, status, link_type, is_featured, is_home_visible,
            is_priority, display_priority, views_count, tags, content, region,
            deadline_date, application_start_date, application_end_date,
        );
    }
}

/// A stored announcement with its identity and bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRow {
    pub id: String,
    #[serde(flatten)]
    pub record: Announcement,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_status_derivation() {
        assert_eq!(RunStatus::derive(10, 0), RunStatus::Success);
        assert_eq!(RunStatus::derive(0, 0), RunStatus::Success);
        assert_eq!(RunStatus::derive(8, 2), RunStatus::Partial);
        assert_eq!(RunStatus::derive(0, 3), RunStatus::Failed);
    }

    #[test]
    fn raw_status_never_regresses() {
        use RawStatus::*;
        assert!(Fetched.can_transition_to(Processed));
        assert!(Fetched.can_transition_to(Error));
        assert!(!Processed.can_transition_to(Fetched));
        assert!(!Error.can_transition_to(Processed));
        assert!(!Processed.can_transition_to(Error));
    }

    #[test]
    fn mapping_config_tolerates_unknown_and_null() {
        let src: Source = serde_json::from_value(json!({
            "id": "s1",
            "name": "LH",
            "endpoint_url": "https://example.test/api",
            "auth_type": "oauth",
            "mapping_config": {
                "fields": {"title": "a.b"},
                "defaults": null,
                "future_option": {"x": 1}
            }
        }))
        .unwrap();
        assert_eq!(src.auth_type, AuthType::OAuth);
        assert!(src.is_active);
        assert!(src.mapping_config.defaults.is_empty());
        assert_eq!(
            src.mapping_config.fields.unwrap().get("title").map(String::as_str),
            Some("a.b")
        );

        let bare: Source = serde_json::from_value(json!({
            "id": "s2",
            "name": "Bare",
            "endpoint_url": "https://example.test",
            "mapping_config": null
        }))
        .unwrap();
        assert_eq!(bare.mapping_config, MappingConfig::default());
    }

    #[test]
    fn raw_update_clears_error_log_with_null() {
        let at = Utc::now();
        let v = serde_json::to_value(RawUpdate::processed(at)).unwrap();
        assert_eq!(v["status"], "processed");
        assert!(v["error_log"].is_null());
        assert!(v.as_object().unwrap().contains_key("error_log"));

        let note = serde_json::to_value(RawUpdate::note("skipped")).unwrap();
        assert!(note.get("status").is_none());
    }

    #[test]
    fn scalar_columns_accept_numbers_and_fractions() {
        let mut m = Map::new();
        for (k, v) in [
            ("title", json!("T")),
            ("organization", json!("O")),
            ("region", json!(11)),
            ("subtitle", json!(true)),
            ("display_priority", json!(2.5)),
            ("views_count", json!("40")),
        ] {
            m.insert(k.to_string(), v);
        }
        let a = Announcement::from_mapped(&m).unwrap();
        assert_eq!(a.region.as_deref(), Some("11"));
        assert_eq!(a.subtitle.as_deref(), Some("true"));
        assert_eq!(a.display_priority, Some(3));
        assert_eq!(a.views_count, Some(40));

        m.insert("region".to_string(), json!({"code": 11}));
        assert!(Announcement::from_mapped(&m).is_err());
    }

    #[test]
    fn merge_keeps_fields_missing_from_patch() {
        let mut stored = Announcement {
            title: "T".into(),
            organization: "O".into(),
            region: Some("Seoul".into()),
            views_count: Some(4),
            ..Default::default()
        };
        let patch = Announcement {
            title: "T".into(),
            organization: "O".into(),
            views_count: Some(9),
            ..Default::default()
        };
        stored.merge(&patch);
        assert_eq!(stored.region.as_deref(), Some("Seoul"));
        assert_eq!(stored.views_count, Some(9));
    }
}
