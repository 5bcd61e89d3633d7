//! Deterministic scripted provider for tests and local wiring.
//!
//! Each call pops the next scripted outcome; when the script runs dry the
//! provider falls back to its default behavior. Call counters are shared,
//! so a test can keep a [`ScriptedProvider::counters`] handle after the
//! provider has been moved into a registry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use modelrelay_types::llm::{
    ChunkDelta, CompletionRequest, FinishReason, ProviderCompletion, ProviderError, Usage,
};

use super::provider::{ChunkDeltaStream, LlmProvider};

/// Outcome of one scripted `complete` call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Reply(String),
    Fail(ProviderError),
    /// Reply after sleeping.
    Delayed(Duration, String),
    /// Never resolve.
    Hang,
}

/// Shape of one scripted stream.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit the chunks, then a terminal chunk with `finish`.
    Chunks {
        chunks: Vec<String>,
        finish: FinishReason,
    },
    /// Emit the chunks, then fail. No chunks means failing before the first.
    FailAfter {
        chunks: Vec<String>,
        error: ProviderError,
    },
    /// Emit the chunks, then stall forever.
    StallAfter { chunks: Vec<String> },
}

/// Shared call counters.
#[derive(Debug, Default)]
pub struct Counters {
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    chunks_pulled: AtomicUsize,
}

impl Counters {
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Text chunks actually pulled out of streams by consumers.
    pub fn chunks_pulled(&self) -> usize {
        self.chunks_pulled.load(Ordering::SeqCst)
    }
}

/// Scripted adapter.
pub struct ScriptedProvider {
    name: String,
    model: String,
    completions: Mutex<VecDeque<Outcome>>,
    default_completion: Outcome,
    streams: Mutex<VecDeque<StreamScript>>,
    default_stream: StreamScript,
    embed_error: Option<ProviderError>,
    fixed_embeddings: Option<Vec<Vec<f32>>>,
    counters: Arc<Counters>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    /// A provider that always answers `reply` (streamed word by word).
    pub fn replying(name: impl Into<String>, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let chunks = reply.split_inclusive(' ').map(str::to_string).collect();
        let name = name.into();
        Self {
            model: format!("{name}-model"),
            name,
            completions: Mutex::new(VecDeque::new()),
            default_completion: Outcome::Reply(reply),
            streams: Mutex::new(VecDeque::new()),
            default_stream: StreamScript::Chunks {
                chunks,
                finish: FinishReason::Stop,
            },
            embed_error: None,
            fixed_embeddings: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A provider that fails every call with `error`.
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        let mut provider = Self::replying(name, "");
        provider.default_completion = Outcome::Fail(error.clone());
        provider.default_stream = StreamScript::FailAfter {
            chunks: Vec::new(),
            error: error.clone(),
        };
        provider.embed_error = Some(error);
        provider
    }

    /// Queue an outcome for the next unscripted `complete` call.
    pub fn then_complete(self, outcome: Outcome) -> Self {
        lock(&self.completions).push_back(outcome);
        self
    }

    /// Queue a script for the next unscripted `stream_complete` call.
    pub fn then_stream(self, script: StreamScript) -> Self {
        lock(&self.streams).push_back(script);
        self
    }

    /// Replace the default stream behavior.
    pub fn with_default_stream(mut self, script: StreamScript) -> Self {
        self.default_stream = script;
        self
    }

    /// Return exactly these vectors from every `embed` call, whatever the input.
    pub fn with_fixed_embeddings(mut self, vectors: Vec<Vec<f32>>) -> Self {
        self.fixed_embeddings = Some(vectors);
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    fn next_completion(&self) -> Outcome {
        lock(&self.completions)
            .pop_front()
            .unwrap_or_else(|| self.default_completion.clone())
    }

    fn next_stream(&self) -> StreamScript {
        lock(&self.streams)
            .pop_front()
            .unwrap_or_else(|| self.default_stream.clone())
    }

    fn completion(&self, content: String, request: &CompletionRequest) -> ProviderCompletion {
        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum::<usize>();
        let completion_tokens = content.split_whitespace().count();
        ProviderCompletion {
            content,
            model: request.model_hint.clone().unwrap_or_else(|| self.model.clone()),
            usage: Usage {
                prompt_tokens: u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
                completion_tokens: u32::try_from(completion_tokens).unwrap_or(u32::MAX),
            },
        }
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<ProviderCompletion, ProviderError>> + Send {
        self.counters.complete_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_completion();
        let ready = match &outcome {
            Outcome::Reply(text) | Outcome::Delayed(_, text) => {
                Some(self.completion(text.clone(), request))
            }
            _ => None,
        };
        async move {
            match outcome {
                Outcome::Reply(_) => ready.ok_or_else(|| ProviderError::unknown("no reply")),
                Outcome::Delayed(delay, _) => {
                    tokio::time::sleep(delay).await;
                    ready.ok_or_else(|| ProviderError::unknown("no reply"))
                }
                Outcome::Fail(err) => Err(err),
                Outcome::Hang => std::future::pending().await,
            }
        }
    }

    fn stream_complete(&self, _request: CompletionRequest) -> ChunkDeltaStream {
        self.counters.stream_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.next_stream();
        let counters = Arc::clone(&self.counters);

        Box::pin(async_stream::stream! {
            let (chunks, ending) = match script {
                StreamScript::Chunks { chunks, finish } => (chunks, Ok(Some(finish))),
                StreamScript::FailAfter { chunks, error } => (chunks, Err(error)),
                StreamScript::StallAfter { chunks } => (chunks, Ok(None)),
            };
            for chunk in chunks {
                counters.chunks_pulled.fetch_add(1, Ordering::SeqCst);
                yield Ok(ChunkDelta::text(chunk));
            }
            match ending {
                Ok(Some(finish)) => yield Ok(ChunkDelta::finish(finish)),
                Err(error) => yield Err(error),
                Ok(None) => std::future::pending::<()>().await,
            }
        })
    }

    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, ProviderError>> + Send {
        self.counters.embed_calls.fetch_add(1, Ordering::SeqCst);
        let result = match (&self.embed_error, &self.fixed_embeddings) {
            (Some(err), _) => Err(err.clone()),
            (None, Some(vectors)) => Ok(vectors.clone()),
            (None, None) => Ok(texts
                .iter()
                .enumerate()
                .map(|(i, text)| vec![text.len() as f32, i as f32])
                .collect()),
        };
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use modelrelay_types::llm::Message;

    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![Message::user("two words")])
    }

    #[tokio::test]
    async fn test_script_then_default() {
        let provider = ScriptedProvider::replying("p", "fine thanks")
            .then_complete(Outcome::Fail(ProviderError::server("boom")));
        let counters = provider.counters();

        assert!(provider.complete(&request()).await.is_err());
        let ok = provider.complete(&request()).await.unwrap();
        assert_eq!(ok.content, "fine thanks");
        assert_eq!(ok.usage.prompt_tokens, 2);
        assert_eq!(ok.usage.completion_tokens, 2);
        assert_eq!(ok.model, "p-model");
        assert_eq!(counters.complete_calls(), 2);
    }

    #[tokio::test]
    async fn test_stream_words_then_stop() {
        let provider = ScriptedProvider::replying("p", "a b c");
        let chunks: Vec<_> = provider.stream_complete(request()).collect().await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].as_ref().unwrap().content_delta, "a ");
        assert_eq!(
            chunks[3].as_ref().unwrap().finish_reason,
            Some(FinishReason::Stop)
        );
        assert_eq!(provider.counters().chunks_pulled(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider_fails_everything() {
        let provider = ScriptedProvider::failing("p", ProviderError::auth("nope"));
        assert!(provider.complete(&request()).await.is_err());
        assert!(provider.embed(&["x".to_string()]).await.is_err());
        let first = provider.stream_complete(request()).next().await.unwrap();
        assert!(first.is_err());
    }

    #[tokio::test]
    async fn test_embed_preserves_order() {
        let provider = ScriptedProvider::replying("p", "");
        let vectors = provider
            .embed(&["a".to_string(), "abc".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![3.0, 1.0]]);
    }
}
