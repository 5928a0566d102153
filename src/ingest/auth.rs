// src/ingest/auth.rs
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::error::CollectError;
use crate::model::{AuthType, Source};

pub const API_KEY_HEADER: &str = "X-API-Key";

fn value(name: &'static str, v: &str) -> Result<HeaderValue, CollectError> {
    HeaderValue::from_str(v).map_err(|_| CollectError::InvalidHeader(name))
}

/// Request headers for a source: JSON content type, the collector's user
/// agent and at most one credential header. `api_key`/`bearer` without a key
/// send no credential. `oauth` has no token flow and is refused.
pub fn build_headers(source: &Source, user_agent: &str) -> Result<HeaderMap, CollectError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, value("User-Agent", user_agent)?);

    let key = source
        .auth_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    match (source.auth_type, key) {
        (AuthType::None, _) | (AuthType::ApiKey, None) | (AuthType::Bearer, None) => {}
        (AuthType::ApiKey, Some(k)) => {
            headers.insert(
                HeaderName::from_static("x-api-key"),
                value(API_KEY_HEADER, k)?,
            );
        }
        (AuthType::Bearer, Some(k)) => {
            headers.insert(AUTHORIZATION, value("Authorization", &format!("Bearer {k}"))?);
        }
        (AuthType::OAuth, _) => return Err(CollectError::UnsupportedAuth("oauth")),
    }
    Ok(headers)
}

/// Header pairs safe to log: credential values are masked.
pub fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, v)| {
            let shown = if *name == AUTHORIZATION || name.as_str() == "x-api-key" {
                format!("<redacted, {} bytes>", v.len())
            } else {
                v.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}
