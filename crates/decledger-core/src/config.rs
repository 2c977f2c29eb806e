//! Pipeline configuration.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional TOML file, and `DECLEDGER_*` environment variables:
//!
//! | variable | field |
//! |---|---|
//! | `DECLEDGER_MAX_RETRIES` | `retry.max_retries` |
//! | `DECLEDGER_INITIAL_DELAY_MS` | `retry.initial_delay_ms` |
//! | `DECLEDGER_MAX_DELAY_MS` | `retry.max_delay_ms` |
//! | `DECLEDGER_LEAKAGE_THRESHOLD` | `leakage_threshold_percent` |
//! | `DECLEDGER_MODEL` | `model` |

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{LedgerError, Result};
use crate::leakage::DEFAULT_THRESHOLD_PERCENT;
use crate::prompt::DEFAULT_CITATION_WORD_LIMIT;
use crate::retry::RetryPolicy;

pub const DEFAULT_MODEL: &str = "decledger-reasoner-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub leakage_threshold_percent: f64,
    /// Longest excerpt (in words) any prompt may carry.
    pub citation_word_limit: usize,
    /// Model name forwarded to the reasoning service.
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            leakage_threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            citation_word_limit: DEFAULT_CITATION_WORD_LIMIT,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `DECLEDGER_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parsed(&lookup, "DECLEDGER_MAX_RETRIES")? {
            self.retry.max_retries = v;
        }
        if let Some(v) = parsed(&lookup, "DECLEDGER_INITIAL_DELAY_MS")? {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "DECLEDGER_MAX_DELAY_MS")? {
            self.retry.max_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "DECLEDGER_LEAKAGE_THRESHOLD")? {
            self.leakage_threshold_percent = v;
        }
        if let Some(model) = lookup("DECLEDGER_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(LedgerError::Config(
                "retry.max_delay_ms must be >= retry.initial_delay_ms".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(LedgerError::Config(
                "retry.backoff_multiplier must be >= 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.leakage_threshold_percent) {
            return Err(LedgerError::Config(format!(
                "leakage_threshold_percent must be within 0..=100, got {}",
                self.leakage_threshold_percent
            )));
        }
        if self.citation_word_limit == 0 {
            return Err(LedgerError::Config(
                "citation_word_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| LedgerError::Config(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.leakage_threshold_percent, 30.0);
        assert_eq!(config.citation_word_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            model = "house-model"

            [retry]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.model, "house-model");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert_eq!(config.retry.retryable_codes, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decledger.toml");
        std::fs::write(&path, "leakage_threshold_percent = 45.0\n").unwrap();
        let config = PipelineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.leakage_threshold_percent, 45.0);
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::default()
            .with_overrides(env(&[
                ("DECLEDGER_MAX_RETRIES", "1"),
                ("DECLEDGER_INITIAL_DELAY_MS", "10"),
                ("DECLEDGER_MAX_DELAY_MS", "20"),
                ("DECLEDGER_LEAKAGE_THRESHOLD", "50"),
                ("DECLEDGER_MODEL", "alt"),
            ]))
            .unwrap();
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_ms, 10);
        assert_eq!(config.retry.max_delay_ms, 20);
        assert_eq!(config.leakage_threshold_percent, 50.0);
        assert_eq!(config.model, "alt");
    }

    #[test]
    fn test_malformed_override_names_the_variable() {
        let err = PipelineConfig::default()
            .with_overrides(env(&[("DECLEDGER_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("DECLEDGER_MAX_RETRIES"));
    }

    #[test]
    fn test_inverted_delays_are_rejected() {
        let err = PipelineConfig::default()
            .with_overrides(env(&[("DECLEDGER_MAX_DELAY_MS", "5")]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        assert!(PipelineConfig::from_toml_str("leakage_threshold_percent = 150.0").is_err());
    }
}
