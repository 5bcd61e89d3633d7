//! LlmProvider trait definition.
//!
//! This is the capability surface every provider adapter implements.
//! Uses RPITIT for `complete` and `embed`, and `Pin<Box<dyn Stream>>`
//! for `stream_complete` (streams need to be object-safe for the
//! BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use modelrelay_types::llm::{ChunkDelta, CompletionRequest, ProviderCompletion, ProviderError};

/// Boxed stream of adapter chunks.
pub type ChunkDeltaStream =
    Pin<Box<dyn Stream<Item = Result<ChunkDelta, ProviderError>> + Send + 'static>>;

/// Trait for upstream inference services.
///
/// Adapters translate a generic request into vendor calls and report every
/// failure as a categorized [`ProviderError`]. They never retry and never
/// consult the response cache; both belong to the router.
pub trait LlmProvider: Send + Sync {
    /// Human-readable adapter name (e.g., "echo", "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<ProviderCompletion, ProviderError>> + Send;

    /// Start a streaming completion.
    ///
    /// The stream is lazy: no upstream work happens until it is polled, and
    /// dropping it must stop upstream consumption and release held resources.
    /// A well-behaved stream ends with a chunk carrying a finish reason.
    fn stream_complete(&self, request: CompletionRequest) -> ChunkDeltaStream;

    /// Embed texts into vectors, one per input, in input order.
    ///
    /// Fails wholesale if any part of the batch fails.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, ProviderError>> + Send;
}
