//! Deterministic local adapter.
//!
//! Answers with the last user message, streams it word by word, and derives
//! embeddings from a SHA-256 digest of each text. Needs no network access.

use sha2::{Digest, Sha256};

use modelrelay_core::llm::provider::{ChunkDeltaStream, LlmProvider};
use modelrelay_types::llm::{
    ChunkDelta, CompletionRequest, FinishReason, MessageRole, ProviderCompletion, ProviderError,
    Usage,
};

/// Embedding width when none is configured.
pub const DEFAULT_DIMENSION: usize = 16;

/// Largest supported width (one value per digest byte).
pub const MAX_DIMENSION: usize = 32;

/// Echo adapter, selectable as `kind = "echo"`.
#[derive(Debug, Clone)]
pub struct EchoProvider {
    name: String,
    model: String,
    dimension: usize,
}

impl EchoProvider {
    pub fn new(name: impl Into<String>, model: Option<String>) -> Self {
        Self {
            name: name.into(),
            model: model.unwrap_or_else(|| "echo-1".to_string()),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Set the embedding width, clamped to `1..=MAX_DIMENSION`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.clamp(1, MAX_DIMENSION);
        self
    }

    /// Reply words (with trailing spaces kept) and whether `max_output_tokens`
    /// cut the reply short.
    fn reply_words(request: &CompletionRequest) -> (Vec<String>, bool) {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let mut words: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let limit = request
            .max_output_tokens
            .map(|max| usize::try_from(max).unwrap_or(usize::MAX));
        let truncated = limit.is_some_and(|max| words.len() > max);
        if let Some(max) = limit {
            words.truncate(max);
        }
        (words, truncated)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let raw: Vec<f32> = digest
            .iter()
            .take(self.dimension)
            .map(|&b| f32::from(b) / 127.5 - 1.0)
            .collect();
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            raw.into_iter().map(|v| v / norm).collect()
        } else {
            raw
        }
    }
}

fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProviderCompletion, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::invalid_request("no messages to echo"));
        }
        let (words, _) = Self::reply_words(request);
        let content = words.concat();
        let prompt_tokens = request.messages.iter().map(|m| count_words(&m.content)).sum();
        Ok(ProviderCompletion {
            usage: Usage {
                prompt_tokens,
                completion_tokens: count_words(&content),
            },
            content,
            model: request
                .model_hint
                .clone()
                .unwrap_or_else(|| self.model.clone()),
        })
    }

    fn stream_complete(&self, request: CompletionRequest) -> ChunkDeltaStream {
        let (words, truncated) = Self::reply_words(&request);
        let empty = request.messages.is_empty();

        Box::pin(async_stream::stream! {
            if empty {
                yield Err(ProviderError::invalid_request("no messages to echo"));
                return;
            }
            for word in words {
                yield Ok(ChunkDelta::text(word));
            }
            let reason = if truncated { FinishReason::Length } else { FinishReason::Stop };
            yield Ok(ChunkDelta::finish(reason));
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use modelrelay_types::llm::Message;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new(vec![
            Message::system("be brief"),
            Message::user(text),
        ])
    }

    #[tokio::test]
    async fn test_complete_echoes_last_user_message() {
        let provider = EchoProvider::new("local", None);
        let out = provider.complete(&request("hello there")).await.unwrap();
        assert_eq!(out.content, "hello there");
        assert_eq!(out.model, "echo-1");
        assert_eq!(out.usage.prompt_tokens, 4);
        assert_eq!(out.usage.completion_tokens, 2);
    }

    #[tokio::test]
    async fn test_complete_without_messages_is_invalid() {
        let provider = EchoProvider::new("local", None);
        let err = provider
            .complete(&CompletionRequest::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_stream_chunks_by_word() {
        let provider = EchoProvider::new("local", Some("echo-2".to_string()));
        let chunks: Vec<_> = provider
            .stream_complete(request("a b c"))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].content_delta, "b ");
        assert_eq!(chunks[3].finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_stream_respects_max_output_tokens() {
        let provider = EchoProvider::new("local", None);
        let chunks: Vec<_> = provider
            .stream_complete(request("one two three").with_max_output_tokens(2))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::Length));
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic_and_normalized() {
        let provider = EchoProvider::new("local", None).with_dimension(8);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = provider.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dimension_is_clamped() {
        let provider = EchoProvider::new("local", None).with_dimension(1_000);
        assert_eq!(provider.dimension, MAX_DIMENSION);
    }
}
