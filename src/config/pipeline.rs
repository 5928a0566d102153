// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transform::coerce::{CoercionTable, RuleSpec};

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";

pub const DEFAULT_USER_AGENT: &str = "Announcement-API-Collector/1.0";

fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_source_delay_ms() -> u64 {
    2_000
}
fn default_record_delay_ms() -> u64 {
    100
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Runtime tunables for both orchestrators.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Pause between sources; backpressure for unknown rate limits.
    #[serde(default = "default_source_delay_ms")]
    pub source_delay_ms: u64,
    /// Pause between raw records during transformation.
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Replaces the built-in coercion table when present.
    #[serde(default)]
    pub coercion: Option<Vec<RuleSpec>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            source_delay_ms: default_source_delay_ms(),
            record_delay_ms: default_record_delay_ms(),
            user_agent: default_user_agent(),
            coercion: None,
        }
    }
}

impl PipelineConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        // Fail at startup rather than on the first record.
        cfg.coercion_table()?;
        Ok(cfg)
    }

    /// 1) $PIPELINE_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("PIPELINE_CONFIG_PATH points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.record_delay_ms)
    }

    pub fn coercion_table(&self) -> Result<CoercionTable> {
        match &self.coercion {
            Some(specs) => Ok(CoercionTable::from_specs(specs)?),
            None => Ok(CoercionTable::builtin()),
        }
    }
}
