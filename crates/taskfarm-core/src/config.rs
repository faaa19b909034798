use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding `workers`.
pub const ENV_WORKERS: &str = "TASKFARM_WORKERS";
/// Environment variable overriding `channel_capacity`.
pub const ENV_CAPACITY: &str = "TASKFARM_CAPACITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var}={value:?} is not a valid count")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Farm settings, parsed from `taskfarm.toml`.
///
/// ```toml
/// workers = 4
/// channel_capacity = 32
/// verbose = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Number of worker ranks (the world has `workers + 1` ranks).
    pub workers: usize,

    /// Messages buffered per inbox before a blocking send waits.
    pub channel_capacity: usize,

    /// Log every allot and collect.
    pub verbose: bool,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            channel_capacity: 16,
            verbose: false,
        }
    }
}

impl FarmConfig {
    /// Parse config from a TOML string. No env overrides are applied.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path and apply `TASKFARM_*` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `TASKFARM_*` overrides, for runs without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    /// - `TASKFARM_WORKERS` → `workers`
    /// - `TASKFARM_CAPACITY` → `channel_capacity`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup(ENV_WORKERS) {
            self.workers = parse_count(ENV_WORKERS, v)?;
        }
        if let Some(v) = lookup(ENV_CAPACITY) {
            self.channel_capacity = parse_count(ENV_CAPACITY, v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid(
                "at least one worker is required".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_count(var: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}
