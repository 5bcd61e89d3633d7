//! Request/response types for routed inference calls.
//!
//! These types model the data shapes that flow between callers, the router
//! and provider adapters: completion requests, buffered results, streamed
//! chunks, usage tracking and provider-reported failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Stable identifier of a configured provider (e.g., "openai-primary").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in a conversation.
///
/// Role sequencing is not validated here; adapters may reject sequences
/// their upstream does not accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_cache_allowed() -> bool {
    true
}

/// A completion request as submitted by a caller.
///
/// Treated as immutable once handed to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Provider to try first, if its circuit allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_hint: Option<ProviderId>,
    #[serde(default = "default_cache_allowed")]
    pub cache_allowed: bool,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the configured concurrency-slot wait for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_timeout: Option<Duration>,
}

impl CompletionRequest {
    /// Create a request with default sampling settings.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model_hint: None,
            temperature: default_temperature(),
            max_output_tokens: None,
            provider_hint: None,
            cache_allowed: default_cache_allowed(),
            stream: false,
            slot_timeout: None,
        }
    }

    pub fn with_provider_hint(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider_hint = Some(provider.into());
        self
    }

    pub fn with_model_hint(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    pub fn with_cache_allowed(mut self, allowed: bool) -> Self {
        self.cache_allowed = allowed;
        self
    }

    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout = Some(timeout);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// What an adapter returns for a buffered completion.
///
/// The router stamps provider id and latency on top of this to build
/// a [`CompletionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCompletion {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

/// Final result of a routed, non-streaming completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub provider_id: ProviderId,
    pub model_used: String,
    pub usage: Usage,
    pub latency: Duration,
    /// Served from the response cache rather than a provider call.
    #[serde(default)]
    pub cached: bool,
}

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Error => write!(f, "error"),
        }
    }
}

impl FromStr for FinishReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(FinishReason::Stop),
            "length" => Ok(FinishReason::Length),
            "error" => Ok(FinishReason::Error),
            other => Err(format!("invalid finish reason: '{other}'")),
        }
    }
}

/// A piece of streamed output as produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub content_delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChunkDelta {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            content_delta: delta.into(),
            finish_reason: None,
        }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self {
            content_delta: String::new(),
            finish_reason: Some(reason),
        }
    }
}

/// A streamed chunk delivered to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content_delta: String,
    pub provider_id: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimit,
    ServerError,
    NetworkError,
    Timeout,
    InvalidRequest,
    AuthError,
    Unknown,
}

impl ErrorCategory {
    /// Transient faults worth retrying against the same provider.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit
                | ErrorCategory::ServerError
                | ErrorCategory::NetworkError
                | ErrorCategory::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::AuthError => "auth_error",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ProviderError {
    pub category: ErrorCategory,
    pub message: String,
    /// Upstream-requested minimum wait before the next attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            category: ErrorCategory::RateLimit,
            message: "rate limited".to_string(),
            retry_after,
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ServerError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidRequest, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::AuthError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

/// Externally visible circuit state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Status snapshot for a provider (for diagnostics and health endpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusInfo {
    pub id: ProviderId,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
    /// Human-readable time since last success (e.g., "2m ago").
    pub last_success_ago: Option<String>,
    pub available_slots: usize,
    pub max_concurrent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_finish_reason_parse_rejects_unknown() {
        assert_eq!("STOP".parse::<FinishReason>().unwrap(), FinishReason::Stop);
        assert!("halted".parse::<FinishReason>().is_err());
    }

    #[test]
    fn test_retryable_categories() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::ServerError.is_retryable());
        assert!(ErrorCategory::NetworkError.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());

        assert!(!ErrorCategory::InvalidRequest.is_retryable());
        assert!(!ErrorCategory::AuthError.is_retryable());
        assert!(!ErrorCategory::Unknown.is_retryable());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let json = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let request: CompletionRequest = serde_json::from_str(json).unwrap();
        assert!(request.cache_allowed);
        assert!(!request.stream);
        assert!((request.temperature - 0.7).abs() < f64::EPSILON);
        assert!(request.messages[0].name.is_none());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::server("upstream 503");
        assert_eq!(err.to_string(), "server_error: upstream 503");
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = Usage {
            prompt_tokens: u32::MAX,
            completion_tokens: 5,
        };
        assert_eq!(usage.total(), u32::MAX);
    }

    #[test]
    fn test_error_category_serde() {
        let json = serde_json::to_string(&ErrorCategory::RateLimit).unwrap();
        assert_eq!(json, "\"rate_limit\"");
        let parsed: ErrorCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ErrorCategory::RateLimit);
    }
}
