// src/config/store.rs
use std::env;

use crate::error::ConfigError;

pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:54321";

pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Store endpoint and write credential, read once at startup.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key itself.
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("key_len", &self.service_key.len())
            .finish()
    }
}

fn non_blank(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl StoreConfig {
    /// `SUPABASE_URL` (defaults to the local stack) plus the service-role key,
    /// falling back to the anon key. Errors when neither key is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = non_blank(ENV_STORE_URL).unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
        let service_key = non_blank(ENV_SERVICE_KEY)
            .or_else(|| non_blank(ENV_ANON_KEY))
            .ok_or(ConfigError::MissingCredential)?;
        Ok(Self { url, service_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear() {
        env::remove_var(ENV_STORE_URL);
        env::remove_var(ENV_SERVICE_KEY);
        env::remove_var(ENV_ANON_KEY);
    }

    #[serial_test::serial]
    #[test]
    fn missing_credential_fails_fast() {
        clear();
        assert!(matches!(
            StoreConfig::from_env(),
            Err(ConfigError::MissingCredential)
        ));
        env::set_var(ENV_SERVICE_KEY, "   ");
        assert!(StoreConfig::from_env().is_err());
        clear();
    }

    #[serial_test::serial]
    #[test]
    fn service_key_wins_over_anon_and_url_defaults() {
        clear();
        env::set_var(ENV_ANON_KEY, "anon");
        let cfg = StoreConfig::from_env().unwrap();
        assert_eq!(cfg.service_key, "anon");
        assert_eq!(cfg.url, DEFAULT_STORE_URL);

        env::set_var(ENV_SERVICE_KEY, "service");
        env::set_var(ENV_STORE_URL, "https://db.example.test");
        let cfg = StoreConfig::from_env().unwrap();
        assert_eq!(cfg.service_key, "service");
        assert_eq!(cfg.url, "https://db.example.test");
        assert!(!format!("{cfg:?}").contains("service\""));
        clear();
    }
}
