//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default so a missing file or partial file still
//! yields a runnable engine.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub closer: CloserConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Currency code used in notification messages.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Minimum amount an auto-bid must raise the current highest bid by.
    #[serde(default = "default_min_increment")]
    pub min_increment: Decimal,
    /// Internal retries for optimistic-lock conflicts before surfacing
    /// a transient failure.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CascadeConfig {
    /// Cascade triggers accepted per auction within one window before the
    /// governor starts dropping them.
    #[serde(default = "default_max_triggers")]
    pub max_triggers_per_auction: u32,
    /// Sliding window length for the trigger governor.
    #[serde(default = "default_trigger_window_secs")]
    pub trigger_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloserConfig {
    /// How often the binary enqueues a close sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_min_increment() -> Decimal {
    Decimal::ONE
}

fn default_conflict_retries() -> u32 {
    3
}

fn default_max_triggers() -> u32 {
    50
}

fn default_trigger_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            min_increment: default_min_increment(),
            conflict_retries: default_conflict_retries(),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_triggers_per_auction: default_max_triggers(),
            trigger_window_secs: default_trigger_window_secs(),
        }
    }
}

impl Default for CloserConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults if the file is
    /// missing. A malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
