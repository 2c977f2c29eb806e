//! Gateway configuration

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8700";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Where the reasoning service lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Service base URL, without a trailing slash
    pub base_url: String,
    /// Bearer token (optional for local services)
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Config for a specific service URL
    pub fn new(base_url: &str) -> Self {
        GatewayConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Read `DECLEDGER_GATEWAY_URL`, `DECLEDGER_GATEWAY_KEY` and
    /// `DECLEDGER_GATEWAY_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("DECLEDGER_GATEWAY_URL") {
            Some(url) => Self::new(&url),
            None => Self::default(),
        };
        config.api_key = lookup("DECLEDGER_GATEWAY_KEY").filter(|k| !k.trim().is_empty());
        if let Some(raw) = lookup("DECLEDGER_GATEWAY_TIMEOUT_SECS") {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                GatewayError::Config(format!(
                    "DECLEDGER_GATEWAY_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(GatewayError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(GatewayError::Config("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub(crate) fn invocation_url(&self, stage_id: &str) -> String {
        format!("{}/v1/stages/{}/invocations", self.base_url, stage_id)
    }

    pub(crate) fn documents_url(&self) -> String {
        format!("{}/v1/documents", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = GatewayConfig::new("https://reasoner.example.com/");
        assert_eq!(
            config.invocation_url("decision_flow"),
            "https://reasoner.example.com/v1/stages/decision_flow/invocations"
        );
        assert_eq!(config.documents_url(), "https://reasoner.example.com/v1/documents");
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("DECLEDGER_GATEWAY_URL", "https://reasoner.internal"),
            ("DECLEDGER_GATEWAY_KEY", "secret-token"),
            ("DECLEDGER_GATEWAY_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://reasoner.internal");
        assert_eq!(config.api_key.as_deref(), Some("secret-token"));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("DECLEDGER_GATEWAY_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[("DECLEDGER_GATEWAY_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("DECLEDGER_GATEWAY_TIMEOUT_SECS"));

        let err = GatewayConfig::from_lookup(lookup(&[("DECLEDGER_GATEWAY_URL", "ftp://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("http(s)"));

        assert!(GatewayConfig::default().with_timeout_secs(0).validate().is_err());
    }
}
