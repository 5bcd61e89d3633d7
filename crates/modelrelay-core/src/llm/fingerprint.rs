//! Request fingerprints for the response cache.
//!
//! A fingerprint is the lowercase hex SHA-256 of a canonical JSON encoding
//! of the cache-relevant request fields: messages, model hint, temperature
//! and max output tokens. Provider hint, streaming flag and slot timeout are
//! excluded, so the cache is provider-agnostic.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use modelrelay_types::llm::{CompletionRequest, Message};

/// Deterministic digest identifying cache-equivalent requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint(String);

#[derive(Serialize)]
struct CacheKey<'a> {
    messages: &'a [Message],
    model_hint: Option<&'a str>,
    temperature: f64,
    max_output_tokens: Option<u32>,
}

impl RequestFingerprint {
    pub fn of(request: &CompletionRequest) -> Self {
        let key = CacheKey {
            messages: &request.messages,
            model_hint: request.model_hint.as_deref(),
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        };
        // Serializing plain structs of strings and numbers cannot fail; fall
        // back to the debug form rather than panic if it ever does.
        let canonical = serde_json::to_vec(&key)
            .unwrap_or_else(|_| format!("{:?}", request.messages).into_bytes());
        let digest = Sha256::digest(&canonical);
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![
            Message::system("be brief"),
            Message::user("hello").with_name("ana"),
        ])
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = RequestFingerprint::of(&request());
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_routing_fields_do_not_affect_fingerprint() {
        let base = RequestFingerprint::of(&request());
        let hinted = request()
            .with_provider_hint("other")
            .with_slot_timeout(Duration::from_secs(1))
            .with_cache_allowed(false)
            .streaming();
        assert_eq!(base, RequestFingerprint::of(&hinted));
    }

    #[test]
    fn test_content_fields_change_fingerprint() {
        let base = RequestFingerprint::of(&request());
        assert_ne!(base, RequestFingerprint::of(&request().with_temperature(0.1)));
        assert_ne!(base, RequestFingerprint::of(&request().with_model_hint("m")));
        assert_ne!(base, RequestFingerprint::of(&request().with_max_output_tokens(10)));

        let mut renamed = request();
        renamed.messages[1].name = None;
        assert_ne!(base, RequestFingerprint::of(&renamed));
    }
}
