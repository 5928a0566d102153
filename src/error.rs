// src/error.rs
//! Error types shared by the store, collector and transformer.

use thiserror::Error;

/// Failures talking to the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("store payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{table} row not found: {id}")]
    NotFound { table: &'static str, id: String },
    #[error("raw record {id}: illegal status change {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Failures that abort a single collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("auth_type {0} is not supported")]
    UnsupportedAuth(&'static str),
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("Invalid content type: {0}. Expected application/json")]
    ContentType(String),
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CollectError {
    /// Short machine-readable label written to the run's error summary.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::UnsupportedAuth(_) | CollectError::InvalidHeader(_) => "config",
            CollectError::Transport(e) if e.is_timeout() => "timeout",
            CollectError::Transport(_) => "transport",
            CollectError::Status { .. } => "http_status",
            CollectError::ContentType(_) => "content_type",
            CollectError::Decode(_) => "decode",
            CollectError::Store(_) => "store",
        }
    }
}

/// Failures scoped to one raw record during transformation.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to fetch api_source: {0} not found")]
    SourceNotFound(String),
    #[error("field {field}: cannot parse {value} as a date")]
    InvalidDate { field: String, value: String },
    #[error("mapped record could not be typed: {0}")]
    Shape(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY must be set")]
    MissingCredential,
    #[error("invalid coercion pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
