//! Router configuration types.
//!
//! `RouterConfig` is the top-level `modelrelay.toml` document: per-provider
//! breaker/concurrency/retry settings, the global fallback chain and the
//! response cache. All fields have sensible defaults.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ProviderId;

/// Which adapter implementation backs a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Built-in deterministic local adapter.
    Echo,
    /// Adapter supplied by the embedding application at startup.
    Hosted,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Echo => write!(f, "echo"),
            ProviderKind::Hosted => write!(f, "hosted"),
        }
    }
}

/// Backoff settings for retrying the same provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_base")]
    pub base: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

/// Upper bound accepted for `retry.max_delay_ms` (one day).
pub const MAX_RETRY_DELAY_MS: u64 = 86_400_000;

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_base() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            base: default_base(),
        }
    }
}

impl RetryPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Settings for a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub id: ProviderId,
    pub kind: ProviderKind,
    /// Model identifier the adapter should use by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_half_open_max_trials")]
    pub half_open_max_trials: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Deadline for a single adapter call; elapsed calls count as `Timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    2
}

fn default_half_open_max_trials() -> u32 {
    1
}

fn default_max_concurrent() -> usize {
    8
}

impl ProviderSettings {
    /// Settings with all defaults for the given provider.
    pub fn new(id: impl Into<ProviderId>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            model: None,
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            success_threshold: default_success_threshold(),
            half_open_max_trials: default_half_open_max_trials(),
            max_concurrent: default_max_concurrent(),
            call_timeout_ms: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_max_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    /// Fallback order; empty means provider declaration order.
    #[serde(default)]
    pub fallback_chain: Vec<ProviderId>,
    /// How long a request may wait for a concurrency slot. `None` waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_timeout_ms: Option<u64>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl RouterConfig {
    /// The effective fallback chain.
    pub fn effective_chain(&self) -> Vec<ProviderId> {
        if self.fallback_chain.is_empty() {
            self.providers.iter().map(|p| p.id.clone()).collect()
        } else {
            self.fallback_chain.clone()
        }
    }

    pub fn slot_timeout(&self) -> Option<Duration> {
        self.slot_timeout_ms.map(Duration::from_millis)
    }

    /// Reject configurations the router cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for p in &self.providers {
            if !seen.insert(&p.id) {
                return Err(ConfigError::Invalid(format!("duplicate provider id '{}'", p.id)));
            }
            if p.failure_threshold == 0 {
                return Err(invalid(&p.id, "failure_threshold must be at least 1"));
            }
            if p.success_threshold == 0 {
                return Err(invalid(&p.id, "success_threshold must be at least 1"));
            }
            if p.half_open_max_trials == 0 {
                return Err(invalid(&p.id, "half_open_max_trials must be at least 1"));
            }
            if p.max_concurrent == 0 {
                return Err(invalid(&p.id, "max_concurrent must be at least 1"));
            }
            if p.retry.max_attempts == 0 {
                return Err(invalid(&p.id, "retry.max_attempts must be at least 1"));
            }
            if !(p.retry.base >= 1.0 && p.retry.base.is_finite()) {
                return Err(invalid(&p.id, "retry.base must be a finite number >= 1"));
            }
            if p.retry.max_delay_ms > MAX_RETRY_DELAY_MS {
                return Err(invalid(&p.id, "retry.max_delay_ms exceeds one day"));
            }
            if p.retry.initial_delay_ms > p.retry.max_delay_ms {
                return Err(invalid(&p.id, "retry.initial_delay_ms exceeds retry.max_delay_ms"));
            }
        }

        let mut chained = HashSet::new();
        for id in &self.fallback_chain {
            if !seen.contains(id) {
                return Err(ConfigError::Invalid(format!(
                    "fallback_chain references unknown provider '{id}'"
                )));
            }
            if !chained.insert(id) {
                return Err(ConfigError::Invalid(format!(
                    "fallback_chain lists '{id}' more than once"
                )));
            }
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1 when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(id: &ProviderId, reason: &str) -> ConfigError {
    ConfigError::Invalid(format!("provider '{id}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let toml_str = r#"
[[providers]]
id = "local"
kind = "echo"
"#;
        let config: RouterConfig = toml::from_str(toml_str).unwrap();
        let p = &config.providers[0];
        assert_eq!(p.failure_threshold, 5);
        assert_eq!(p.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(p.success_threshold, 2);
        assert_eq!(p.half_open_max_trials, 1);
        assert_eq!(p.retry.max_attempts, 3);
        assert!((p.retry.base - 2.0).abs() < f64::EPSILON);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert!(config.slot_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_chain_defaults_to_declaration_order() {
        let config = RouterConfig {
            providers: vec![
                ProviderSettings::new("b", ProviderKind::Echo),
                ProviderSettings::new("a", ProviderKind::Echo),
            ],
            ..Default::default()
        };
        assert_eq!(
            config.effective_chain(),
            vec![ProviderId::from("b"), ProviderId::from("a")]
        );
    }

    #[test]
    fn test_explicit_chain_wins() {
        let toml_str = r#"
fallback_chain = ["a"]

[[providers]]
id = "b"
kind = "hosted"

[[providers]]
id = "a"
kind = "echo"

[providers.retry]
max_attempts = 5
"#;
        let config: RouterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.effective_chain(), vec![ProviderId::from("a")]);
        assert_eq!(config.providers[1].retry.max_attempts, 5);
        assert_eq!(config.providers[1].retry.initial_delay_ms, 500);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let config = RouterConfig {
            providers: vec![
                ProviderSettings::new("a", ProviderKind::Echo),
                ProviderSettings::new("a", ProviderKind::Hosted),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate provider id 'a'"));
    }

    #[test]
    fn test_validate_rejects_unknown_chain_entry() {
        let config = RouterConfig {
            providers: vec![ProviderSettings::new("a", ProviderKind::Echo)],
            fallback_chain: vec![ProviderId::from("ghost")],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("ghost"));
    }

    #[test]
    fn test_validate_rejects_zero_thresholds() {
        let mut settings = ProviderSettings::new("a", ProviderKind::Echo);
        settings.failure_threshold = 0;
        let config = RouterConfig {
            providers: vec![settings],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut settings = ProviderSettings::new("a", ProviderKind::Echo);
        settings.retry.base = 0.5;
        let config = RouterConfig {
            providers: vec![settings],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut settings = ProviderSettings::new("a", ProviderKind::Echo);
        settings.retry.max_delay_ms = u64::MAX;
        let config = RouterConfig {
            providers: vec![settings],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("max_delay_ms"));
    }
}
