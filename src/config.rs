//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::RetryPolicy;
use crate::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine behavior
    #[serde(default)]
    pub engine: EngineConfig,
    /// Prompt-decision cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Alert dispatch retries
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Telemetry counters
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Engine behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Response substituted when the output stage refuses
    #[serde(default = "default_refusal_message")]
    pub refusal_message: String,
    /// Subject attribute holding the numeric clearance level
    #[serde(default = "default_clearance_attribute")]
    pub clearance_attribute: String,
    /// Object attribute holding the numeric sensitivity level
    #[serde(default = "default_sensitivity_attribute")]
    pub sensitivity_attribute: String,
}

fn default_refusal_message() -> String {
    "I cannot provide that information.".to_string()
}

fn default_clearance_attribute() -> String {
    "clearance".to_string()
}

fn default_sensitivity_attribute() -> String {
    "sensitivity".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refusal_message: default_refusal_message(),
            clearance_attribute: default_clearance_attribute(),
            sensitivity_attribute: default_sensitivity_attribute(),
        }
    }
}

/// Prompt-decision cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache is consulted at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum cached decisions
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_entries() -> usize {
    10_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Alert dispatch retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Total delivery attempts per channel
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry, in milliseconds
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Upper bound on any single backoff, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl AlertConfig {
    /// Build the dispatcher retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether counters are recorded
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Service name used in log output
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "rag-policy-engine".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: default_service_name(),
        }
    }
}

impl Config {
    /// Build a configuration from `RAG_POLICY_*` environment variables,
    /// falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        if let Ok(v) = std::env::var("RAG_POLICY_REFUSAL_MESSAGE") {
            config.engine.refusal_message = v;
        }
        if let Ok(v) = std::env::var("RAG_POLICY_CACHE_ENABLED") {
            config.cache.enabled = parse_key("RAG_POLICY_CACHE_ENABLED", &v)?;
        }
        if let Ok(v) = std::env::var("RAG_POLICY_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = parse_key("RAG_POLICY_CACHE_MAX_ENTRIES", &v)?;
        }
        if let Ok(v) = std::env::var("RAG_POLICY_CACHE_TTL_SECS") {
            config.cache.ttl_secs = parse_key("RAG_POLICY_CACHE_TTL_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("RAG_POLICY_ALERT_MAX_ATTEMPTS") {
            config.alerts.max_attempts = parse_key("RAG_POLICY_ALERT_MAX_ATTEMPTS", &v)?;
        }
        if let Ok(v) = std::env::var("RAG_POLICY_TELEMETRY_ENABLED") {
            config.telemetry.enabled = parse_key("RAG_POLICY_TELEMETRY_ENABLED", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(Error::Config {
                message: "cache.max_entries must be positive".to_string(),
                key: Some("cache.max_entries".to_string()),
            });
        }
        if self.alerts.max_attempts == 0 {
            return Err(Error::Config {
                message: "alerts.max_attempts must be positive".to_string(),
                key: Some("alerts.max_attempts".to_string()),
            });
        }
        if self.engine.refusal_message.is_empty() {
            return Err(Error::Config {
                message: "engine.refusal_message cannot be empty".to_string(),
                key: Some("engine.refusal_message".to_string()),
            });
        }
        Ok(())
    }
}

fn parse_key<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::Config {
        message: format!("Invalid value '{}'", value),
        key: Some(key.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.alerts.retry_policy().max_attempts, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.refusal_message.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
engine:
  refusal_message: "Access to that content is restricted."
cache:
  max_entries: 128
  ttl_secs: 60
alerts:
  max_attempts: 2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cache.max_entries, 128);
        assert_eq!(config.alerts.max_attempts, 2);
        assert!(config.telemetry.enabled);
        assert!(config.validate().is_ok());
    }
}
