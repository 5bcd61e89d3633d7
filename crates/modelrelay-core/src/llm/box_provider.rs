//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. Define an object-safe `LlmProviderDyn` trait with boxed futures
//! 2. Blanket-impl `LlmProviderDyn` for all `T: LlmProvider`
//! 3. `BoxLlmProvider` wraps `Arc<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use modelrelay_types::llm::{CompletionRequest, ProviderCompletion, ProviderError};

use super::provider::{ChunkDeltaStream, LlmProvider};

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderCompletion, ProviderError>> + Send + 'a>>;

    fn stream_boxed(&self, request: CompletionRequest) -> ChunkDeltaStream;

    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, ProviderError>> + Send + 'a>>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderCompletion, ProviderError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn stream_boxed(&self, request: CompletionRequest) -> ChunkDeltaStream {
        self.stream_complete(request)
    }

    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, ProviderError>> + Send + 'a>> {
        Box::pin(self.embed(texts))
    }
}

/// Type-erased provider adapter for runtime selection.
///
/// Since `LlmProvider` uses RPITIT it cannot be a trait object directly.
/// Cloning is cheap: the adapter sits behind an `Arc` so a streaming task
/// can keep it alive across retries.
#[derive(Clone)]
pub struct BoxLlmProvider {
    inner: Arc<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    /// Wrap a concrete `LlmProvider` in a type-erased box.
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Wrap an already shared adapter (lets tests keep a handle to it).
    pub fn from_arc<T: LlmProvider + 'static>(provider: Arc<T>) -> Self {
        Self { inner: provider }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProviderCompletion, ProviderError> {
        self.inner.complete_boxed(request).await
    }

    pub fn stream_complete(&self, request: CompletionRequest) -> ChunkDeltaStream {
        self.inner.stream_boxed(request)
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.inner.embed_boxed(texts).await
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish()
    }
}
