//! Pipeline configuration.
//!
//! Values are resolved in layers: built-in defaults, then an optional TOML
//! file, then `BATON_*` environment variables. Command-line flags are applied
//! on top by the CLI.
//!
//! # Example file
//!
//! ```toml
//! capacity = 3
//! item_count = 10
//! producer_delay_ms = 100
//! consumer_delay_ms = 250
//! ```

use crate::error::{BatonError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

// Environment variable overrides
pub const ENV_CAPACITY: &str = "BATON_CAPACITY";
pub const ENV_ITEM_COUNT: &str = "BATON_ITEM_COUNT";
pub const ENV_PRODUCER_DELAY_MS: &str = "BATON_PRODUCER_DELAY_MS";
pub const ENV_CONSUMER_DELAY_MS: &str = "BATON_CONSUMER_DELAY_MS";

/// Settings for one producer/consumer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Buffer capacity, must be positive
    pub capacity: usize,
    /// Number of items the CLI generates as the source
    pub item_count: usize,
    /// Delay before each `put`, in milliseconds
    pub producer_delay_ms: u64,
    /// Delay before each `take`, in milliseconds
    pub consumer_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            item_count: 10,
            producer_delay_ms: 100,
            consumer_delay_ms: 250,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading pipeline config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BatonError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply `BATON_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_CAPACITY) {
            self.capacity = parse_var(ENV_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_ITEM_COUNT) {
            self.item_count = parse_var(ENV_ITEM_COUNT, &value)?;
        }
        if let Some(value) = lookup(ENV_PRODUCER_DELAY_MS) {
            self.producer_delay_ms = parse_var(ENV_PRODUCER_DELAY_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_CONSUMER_DELAY_MS) {
            self.consumer_delay_ms = parse_var(ENV_CONSUMER_DELAY_MS, &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BatonError::config("capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn producer_delay(&self) -> Duration {
        Duration::from_millis(self.producer_delay_ms)
    }

    pub fn consumer_delay(&self) -> Duration {
        Duration::from_millis(self.consumer_delay_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BatonError::config(format!("Invalid value '{}' for {}", value, key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_scenario() {
        let config = PipelineConfig::default();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.item_count, 10);
        assert_eq!(config.producer_delay(), Duration::from_millis(100));
        assert_eq!(config.consumer_delay(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str("capacity = 7\n").unwrap();
        assert_eq!(config.capacity, 7);
        assert_eq!(config.consumer_delay_ms, 250);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = PipelineConfig::from_toml_str("capacity = 0").unwrap_err();
        assert!(matches!(err, BatonError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = PipelineConfig::from_toml_str("capacity = \"three\"").unwrap_err();
        assert!(matches!(err, BatonError::TomlParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "capacity = 1\nproducer_delay_ms = 0\nconsumer_delay_ms = 5").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.capacity, 1);
        assert_eq!(config.producer_delay(), Duration::ZERO);
        assert_eq!(config.consumer_delay_ms, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load("/nonexistent/baton.toml").unwrap_err();
        assert!(matches!(err, BatonError::Io(_)));
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(lookup(&[(ENV_CAPACITY, "8"), (ENV_CONSUMER_DELAY_MS, " 0 ")]))
            .unwrap();

        assert_eq!(config.capacity, 8);
        assert_eq!(config.consumer_delay_ms, 0);
        assert_eq!(config.producer_delay_ms, 100);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_ITEM_COUNT, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ITEM_COUNT));

        let err = config
            .apply_overrides(lookup(&[(ENV_CAPACITY, "0")]))
            .unwrap_err();
        assert!(matches!(err, BatonError::Config(_)));
    }

    #[test]
    fn test_override_names_share_prefix() {
        for key in [ENV_CAPACITY, ENV_ITEM_COUNT, ENV_PRODUCER_DELAY_MS, ENV_CONSUMER_DELAY_MS] {
            assert!(key.starts_with("BATON_"), "{}", key);
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig {
            capacity: 5,
            ..PipelineConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }
}
