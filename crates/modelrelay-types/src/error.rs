use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{ProviderError, ProviderId};

/// One exhausted provider inside an aggregate failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    /// Number of adapter calls made against this provider.
    pub attempts: u32,
    /// The last error the provider returned.
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} attempt{}): {}",
            self.provider,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            self.error
        )
    }
}

fn join_failures(attempts: &[ProviderFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_ids(ids: &[ProviderId]) -> String {
    ids.iter().map(ProviderId::as_str).collect::<Vec<_>>().join(", ")
}

/// Errors surfaced by the router to its callers.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// Every remaining candidate has an open circuit; nothing was called.
    #[error("circuit open for provider(s): {}", join_ids(.providers))]
    CircuitOpen { providers: Vec<ProviderId> },

    /// A concurrency slot could not be acquired in time.
    #[error("timed out after {waited:?} waiting for a concurrency slot on '{provider}'")]
    Timeout { provider: ProviderId, waited: Duration },

    /// Every candidate provider was tried and exhausted.
    #[error("all providers failed: {}", join_failures(.attempts))]
    AllProvidersFailed { attempts: Vec<ProviderFailure> },

    /// A stream failed after its first chunk was delivered.
    #[error("stream from '{provider}' failed: {error}")]
    Stream {
        provider: ProviderId,
        error: ProviderError,
    },

    #[error("no providers configured")]
    NoProviders,
}

impl RouterError {
    /// Per-provider diagnostics for an aggregate failure, empty otherwise.
    pub fn attempts(&self) -> &[ProviderFailure] {
        match self {
            RouterError::AllProvidersFailed { attempts } => attempts,
            _ => &[],
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RouterError::CircuitOpen { .. })
    }
}

/// Errors from loading or validating router configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid environment override {key}: {message}")]
    EnvOverride { key: String, message: String },

    #[error("no adapter registered for provider '{0}'")]
    MissingAdapter(ProviderId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_providers_failed_display_lists_each_provider() {
        let err = RouterError::AllProvidersFailed {
            attempts: vec![
                ProviderFailure {
                    provider: ProviderId::from("a"),
                    attempts: 3,
                    error: ProviderError::server("500"),
                },
                ProviderFailure {
                    provider: ProviderId::from("b"),
                    attempts: 1,
                    error: ProviderError::auth("bad key"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("a (3 attempts): server_error: 500"));
        assert!(msg.contains("b (1 attempt): auth_error: bad key"));
        assert_eq!(err.attempts().len(), 2);
    }

    #[test]
    fn test_circuit_open_display() {
        let err = RouterError::CircuitOpen {
            providers: vec![ProviderId::from("a"), ProviderId::from("b")],
        };
        assert_eq!(err.to_string(), "circuit open for provider(s): a, b");
        assert!(err.is_circuit_open());
        assert!(err.attempts().is_empty());
    }

    #[test]
    fn test_missing_adapter_display() {
        let err = ConfigError::MissingAdapter(ProviderId::from("hosted-1"));
        assert_eq!(
            err.to_string(),
            "no adapter registered for provider 'hosted-1'"
        );
    }
}
