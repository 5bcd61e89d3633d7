//! Multi-provider request router.
//!
//! Orchestrates one logical request across the configured providers:
//! cache lookup, provider ordering, circuit-breaker gating, bounded
//! concurrency, same-provider retry, and fallback to the next provider.
//!
//! Attempts within one request are strictly sequential. Per-provider state
//! (breaker records, concurrency slots) and the response cache are the only
//! state shared between requests.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use modelrelay_types::config::{RetryPolicy, RouterConfig};
use modelrelay_types::error::{ConfigError, ProviderFailure, RouterError};
use modelrelay_types::event::{AttemptEvent, Operation};
use modelrelay_types::llm::{
    ChunkDelta, CompletionRequest, CompletionResult, FinishReason, ProviderCompletion,
    ProviderError, ProviderId, ProviderStatusInfo, StreamChunk,
};

use super::box_provider::BoxLlmProvider;
use super::breaker::{format_ago, BreakerConfig, CircuitBreaker};
use super::cache::ResponseCache;
use super::fingerprint::RequestFingerprint;
use super::provider::ChunkDeltaStream;
use super::registry::ProviderRegistry;
use super::retry::{RetryController, RetryDecision};
use crate::metrics::MetricsRecorder;

/// Stream of routed chunks.
///
/// Ends after a chunk carrying a finish reason, or after a single error.
pub type RouterStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, RouterError>> + Send + 'static>>;

/// One configured provider and the runtime state guarding it.
struct ProviderEntry {
    id: ProviderId,
    provider: BoxLlmProvider,
    breaker: Arc<CircuitBreaker>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
    model: Option<String>,
}

struct RouterInner {
    /// Declaration order.
    entries: Vec<ProviderEntry>,
    index: HashMap<ProviderId, usize>,
    /// Fallback chain as indices into `entries`.
    chain: Vec<usize>,
    cache: Option<ResponseCache>,
    slot_timeout: Option<Duration>,
    recorder: Arc<dyn MetricsRecorder>,
}

/// Routes completion, streaming, and embedding requests across providers.
///
/// Cloning is cheap and every clone shares the same breakers, slots, and
/// cache.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// Per-request routing parameters.
struct RequestContext {
    request_id: Uuid,
    operation: Operation,
    hint: Option<ProviderId>,
    slot_timeout: Option<Duration>,
}

/// A successful adapter call.
struct Served<T> {
    value: T,
    provider: ProviderId,
    latency: Duration,
}

/// Adapter outputs that carry accounting information for attempt events.
trait AttemptOutput {
    fn model(&self) -> Option<&str> {
        None
    }

    fn tokens_used(&self) -> Option<u32> {
        None
    }
}

impl AttemptOutput for ProviderCompletion {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn tokens_used(&self) -> Option<u32> {
        Some(self.usage.total())
    }
}

impl AttemptOutput for Vec<Vec<f32>> {}

/// How one adapter call ended, as reported in its attempt event.
struct AttemptRecord<'a> {
    attempt: u32,
    latency: Duration,
    model: Option<&'a str>,
    error: Option<&'a ProviderError>,
    tokens_used: Option<u32>,
}

impl<'a> AttemptRecord<'a> {
    fn failed(attempt: u32, latency: Duration, error: &'a ProviderError) -> Self {
        Self {
            attempt,
            latency,
            model: None,
            error: Some(error),
            tokens_used: None,
        }
    }
}

/// How the attempts against one provider ended.
enum ProviderRun<T> {
    Served(Served<T>),
    /// The breaker refused the first call; nothing was attempted.
    Skipped,
    Failed(ProviderFailure),
}

impl Router {
    /// Build a router over `registry` using `config`.
    ///
    /// Every configured provider must have an adapter in the registry.
    pub fn new(
        config: RouterConfig,
        registry: ProviderRegistry,
        recorder: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut entries = Vec::with_capacity(config.providers.len());
        let mut index = HashMap::new();
        for settings in &config.providers {
            let provider = registry
                .get(&settings.id)
                .cloned()
                .ok_or_else(|| ConfigError::MissingAdapter(settings.id.clone()))?;
            index.insert(settings.id.clone(), entries.len());
            entries.push(ProviderEntry {
                id: settings.id.clone(),
                provider,
                breaker: Arc::new(CircuitBreaker::new(
                    settings.id.clone(),
                    BreakerConfig::from(settings),
                )),
                slots: Arc::new(Semaphore::new(settings.max_concurrent)),
                max_concurrent: settings.max_concurrent,
                retry: settings.retry.clone(),
                call_timeout: settings.call_timeout(),
                model: settings.model.clone(),
            });
        }

        let chain = config
            .effective_chain()
            .iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::from_config(&config.cache));

        tracing::debug!(
            providers = entries.len(),
            cache = cache.is_some(),
            "Router initialized"
        );

        Ok(Self {
            inner: Arc::new(RouterInner {
                entries,
                index,
                chain,
                cache,
                slot_timeout: config.slot_timeout(),
                recorder,
            }),
        })
    }

    /// The response cache, if enabled.
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.inner.cache.as_ref()
    }

    /// The fallback chain in effect.
    pub fn chain(&self) -> Vec<ProviderId> {
        self.inner
            .chain
            .iter()
            .map(|&idx| self.inner.entries[idx].id.clone())
            .collect()
    }

    /// Health and capacity of every provider, in declaration order.
    pub fn provider_status(&self) -> Vec<ProviderStatusInfo> {
        self.inner
            .entries
            .iter()
            .map(|entry| {
                let snap = entry.breaker.snapshot();
                ProviderStatusInfo {
                    id: entry.id.clone(),
                    circuit_state: snap.state,
                    consecutive_failures: snap.consecutive_failures,
                    total_calls: snap.total_calls,
                    total_failures: snap.total_failures,
                    last_error: snap.last_error,
                    last_success_ago: snap.last_success.map(format_ago),
                    available_slots: entry.slots.available_permits(),
                    max_concurrent: entry.max_concurrent,
                }
            })
            .collect()
    }

    /// Candidate order for one request: the hinted provider first (when it
    /// is configured), then the fallback chain without duplicates.
    ///
    /// Open circuits are not filtered here; the breaker refuses them at
    /// attempt time, so a circuit that opens mid-request is still honored.
    fn candidates(&self, hint: Option<&ProviderId>) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.inner.chain.len() + 1);
        if let Some(hint) = hint {
            match self.inner.index.get(hint) {
                Some(&idx) => order.push(idx),
                None => tracing::warn!(provider = %hint, "Unknown provider hint, ignoring"),
            }
        }
        for &idx in &self.inner.chain {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
        order
    }

    /// Wait for a concurrency slot on `entry`.
    async fn acquire_slot(
        &self,
        entry: &ProviderEntry,
        wait: Option<Duration>,
    ) -> Result<OwnedSemaphorePermit, RouterError> {
        let started = Instant::now();
        let acquire = Arc::clone(&entry.slots).acquire_owned();
        let acquired = match wait {
            Some(limit) => match tokio::time::timeout(limit, acquire).await {
                Ok(acquired) => acquired,
                Err(_) => {
                    tracing::warn!(provider = %entry.id, waited_ms = limit.as_millis() as u64, "Timed out waiting for a concurrency slot");
                    return Err(RouterError::Timeout {
                        provider: entry.id.clone(),
                        waited: limit,
                    });
                }
            },
            None => acquire.await,
        };
        // The semaphore is never closed.
        acquired.map_err(|_| RouterError::Timeout {
            provider: entry.id.clone(),
            waited: started.elapsed(),
        })
    }

    /// Forward an event to the recorder. A panicking recorder loses the
    /// event but never the request.
    fn emit(&self, event: AttemptEvent) {
        let recorder = &self.inner.recorder;
        if std::panic::catch_unwind(AssertUnwindSafe(|| recorder.record(&event))).is_err() {
            tracing::warn!(provider = %event.provider_id, "Metrics recorder panicked, event dropped");
        }
    }

    fn attempt_event(
        &self,
        ctx: &RequestContext,
        entry: &ProviderEntry,
        record: AttemptRecord<'_>,
    ) -> AttemptEvent {
        AttemptEvent {
            request_id: ctx.request_id,
            provider_id: entry.id.clone(),
            model: record
                .model
                .map(str::to_string)
                .or_else(|| entry.model.clone()),
            operation: ctx.operation,
            attempt: record.attempt,
            latency: record.latency,
            success: record.error.is_none(),
            error_category: record.error.map(|e| e.category),
            tokens_used: record.tokens_used,
            timestamp: Utc::now(),
        }
    }

    /// Run one adapter call, bounded by the provider's call timeout.
    async fn bounded_call<T, Fut>(entry: &ProviderEntry, call: Fut) -> Result<T, ProviderError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match entry.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout(format!(
                    "no response within {}ms",
                    limit.as_millis()
                ))),
            },
            None => call.await,
        }
    }

    /// Gate, slot, and retry loop for one provider.
    async fn run_provider<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        entry: &ProviderEntry,
        call: &mut F,
    ) -> Result<ProviderRun<T>, RouterError>
    where
        T: AttemptOutput,
        F: FnMut(BoxLlmProvider) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = RetryController::new(&entry.retry);
        let mut last_error: Option<ProviderError> = None;

        loop {
            if !entry.breaker.is_available() {
                tracing::debug!(provider = %entry.id, "Circuit unavailable, skipping");
                return Ok(refusal(entry, retry.attempts(), last_error).into());
            }
            let permit = self.acquire_slot(entry, ctx.slot_timeout).await?;
            // The circuit may have opened while this request queued for the slot.
            let ticket = match entry.breaker.admit() {
                Ok(ticket) => ticket,
                Err(rejection) => {
                    drop(permit);
                    tracing::debug!(provider = %entry.id, ?rejection, "Circuit refused call, skipping");
                    return Ok(refusal(entry, retry.attempts(), last_error).into());
                }
            };

            let attempt = retry.begin_attempt();
            let started = Instant::now();
            let outcome = Self::bounded_call(entry, call(entry.provider.clone())).await;
            let latency = started.elapsed();

            // Settle the breaker before a queued request can take the slot.
            let error = match outcome {
                Ok(value) => {
                    ticket.succeed();
                    drop(permit);
                    self.emit(self.attempt_event(
                        ctx,
                        entry,
                        AttemptRecord {
                            attempt,
                            latency,
                            model: value.model(),
                            error: None,
                            tokens_used: value.tokens_used(),
                        },
                    ));
                    return Ok(ProviderRun::Served(Served {
                        value,
                        provider: entry.id.clone(),
                        latency,
                    }));
                }
                Err(error) => error,
            };

            ticket.fail(&error);
            drop(permit);
            self.emit(self.attempt_event(ctx, entry, AttemptRecord::failed(attempt, latency, &error)));

            match retry.after_failure(&error) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        provider = %entry.id,
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(error);
                }
                RetryDecision::NotRetryable | RetryDecision::Exhausted => {
                    return Ok(ProviderRun::Failed(ProviderFailure {
                        provider: entry.id.clone(),
                        attempts: retry.attempts(),
                        error,
                    }));
                }
            }
        }
    }

    /// Try every candidate in order until one serves the request.
    async fn route<T, F, Fut>(&self, ctx: &RequestContext, mut call: F) -> Result<Served<T>, RouterError>
    where
        T: AttemptOutput,
        F: FnMut(BoxLlmProvider) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut failures = Vec::new();
        let mut skipped = Vec::new();

        for idx in self.candidates(ctx.hint.as_ref()) {
            let entry = &self.inner.entries[idx];
            match self.run_provider(ctx, entry, &mut call).await? {
                ProviderRun::Served(served) => {
                    if !failures.is_empty() || !skipped.is_empty() {
                        tracing::info!(provider = %served.provider, "Request served by fallback provider");
                    }
                    return Ok(served);
                }
                ProviderRun::Skipped => skipped.push(entry.id.clone()),
                ProviderRun::Failed(failure) => {
                    tracing::warn!(
                        provider = %failure.provider,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Provider failed, trying next in chain"
                    );
                    failures.push(failure);
                }
            }
        }

        Err(exhausted(failures, skipped))
    }

    fn context(&self, operation: Operation, hint: Option<ProviderId>, slot_timeout: Option<Duration>) -> RequestContext {
        RequestContext {
            request_id: Uuid::now_v7(),
            operation,
            hint,
            slot_timeout: slot_timeout.or(self.inner.slot_timeout),
        }
    }

    /// Serve a completion request from the cache or the first provider able
    /// to answer it.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, RouterError> {
        let ctx = self.context(
            Operation::Complete,
            request.provider_hint.clone(),
            request.slot_timeout,
        );
        let span = tracing::info_span!("router.complete", request_id = %ctx.request_id);

        async move {
            let cache = self
                .inner
                .cache
                .as_ref()
                .filter(|_| request.cache_allowed && !request.stream);
            let fingerprint = cache.map(|_| RequestFingerprint::of(request));

            if let (Some(cache), Some(fp)) = (cache, fingerprint.as_ref()) {
                if let Some(mut hit) = cache.get(fp) {
                    tracing::debug!(fingerprint = %fp, provider = %hit.provider_id, "Cache hit");
                    hit.cached = true;
                    return Ok(hit);
                }
            }

            let served = self
                .route(&ctx, |provider| {
                    let request = request.clone();
                    async move { provider.complete(&request).await }
                })
                .await?;

            let result = CompletionResult {
                content: served.value.content,
                provider_id: served.provider,
                model_used: served.value.model,
                usage: served.value.usage,
                latency: served.latency,
                cached: false,
            };
            if let (Some(cache), Some(fp)) = (cache, fingerprint) {
                cache.insert(fp, result.clone());
            }
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Embed `texts`, one vector per input in input order.
    ///
    /// Follows the same ordering and retry rules as [`Router::complete`];
    /// embeddings are never cached. An empty input returns no vectors
    /// without calling any provider.
    pub async fn embed(
        &self,
        texts: &[String],
        provider_hint: Option<&ProviderId>,
    ) -> Result<Vec<Vec<f32>>, RouterError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let ctx = self.context(Operation::Embed, provider_hint.cloned(), None);
        let span = tracing::info_span!("router.embed", request_id = %ctx.request_id, texts = texts.len());

        let expected = texts.len();
        let served = self
            .route(&ctx, |provider| {
                let texts = texts.to_vec();
                async move {
                    let vectors = provider.embed(&texts).await?;
                    if vectors.len() != expected {
                        return Err(ProviderError::unknown(format!(
                            "expected {expected} embeddings, provider returned {}",
                            vectors.len()
                        )));
                    }
                    Ok(vectors)
                }
            })
            .instrument(span)
            .await?;
        Ok(served.value)
    }

    /// Stream a completion. Dropping the returned stream cancels it.
    pub fn stream_complete(&self, request: CompletionRequest) -> RouterStream {
        self.stream_complete_with_cancel(request, CancellationToken::new())
    }

    /// Stream a completion that also stops when `cancel` fires.
    ///
    /// Nothing happens until the stream is first polled. Retry and fallback
    /// apply only until the first chunk arrives; after that a provider
    /// failure ends the stream with [`RouterError::Stream`]. Cancellation
    /// ends the stream without an error, releases the concurrency slot,
    /// and is not counted against the provider.
    pub fn stream_complete_with_cancel(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> RouterStream {
        let router = self.clone();
        let ctx = self.context(
            Operation::Stream,
            request.provider_hint.clone(),
            request.slot_timeout,
        );
        let span = tracing::info_span!("router.stream", request_id = %ctx.request_id);

        let stream = async_stream::stream! {
            let mut failures = Vec::new();
            let mut skipped = Vec::new();

            for idx in router.candidates(ctx.hint.as_ref()) {
                let entry = &router.inner.entries[idx];
                let mut retry = RetryController::new(&entry.retry);
                let mut last_error: Option<ProviderError> = None;

                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    if !entry.breaker.is_available() {
                        tracing::debug!(provider = %entry.id, "Circuit unavailable, skipping");
                        match refusal(entry, retry.attempts(), last_error.take()) {
                            None => skipped.push(entry.id.clone()),
                            Some(failure) => failures.push(failure),
                        }
                        break;
                    }

                    let acquired = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        acquired = router.acquire_slot(entry, ctx.slot_timeout) => Some(acquired),
                    };
                    let permit = match acquired {
                        None => return,
                        Some(Ok(permit)) => permit,
                        Some(Err(err)) => {
                            yield Err(err);
                            return;
                        }
                    };
                    let ticket = match entry.breaker.admit() {
                        Ok(ticket) => ticket,
                        Err(rejection) => {
                            drop(permit);
                            tracing::debug!(provider = %entry.id, ?rejection, "Circuit refused stream, skipping");
                            match refusal(entry, retry.attempts(), last_error.take()) {
                                None => skipped.push(entry.id.clone()),
                                Some(failure) => failures.push(failure),
                            }
                            break;
                        }
                    };

                    let attempt = retry.begin_attempt();
                    let started = Instant::now();
                    let mut upstream = entry.provider.stream_complete(request.clone());
                    let first = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        item = first_delta(&mut upstream, entry.call_timeout) => Some(item),
                    };
                    let first = match first {
                        None => return,
                        Some(Some(Ok(delta))) => FirstDelta::Chunk(delta),
                        Some(Some(Err(error))) => FirstDelta::Failed(error),
                        Some(None) => FirstDelta::Failed(ProviderError::unknown(
                            "stream ended before the first chunk",
                        )),
                    };

                    let error = match first {
                        FirstDelta::Failed(error) => error,
                        FirstDelta::Chunk(delta) => {
                            if !failures.is_empty() || !skipped.is_empty() {
                                tracing::info!(provider = %entry.id, "Stream served by fallback provider");
                            }
                            let mut ticket = Some(ticket);
                            let mut permit = Some(permit);
                            let mut pending = Some(delta);

                            loop {
                                let delta = match pending.take() {
                                    Some(delta) => delta,
                                    None => {
                                        let next = tokio::select! {
                                            biased;
                                            _ = cancel.cancelled() => None,
                                            item = upstream.next() => Some(item),
                                        };
                                        match next {
                                            None => return,
                                            Some(Some(Ok(delta))) => delta,
                                            Some(item) => {
                                                let error = match item {
                                                    Some(Err(error)) => error,
                                                    _ => ProviderError::unknown(
                                                        "stream ended without a finish reason",
                                                    ),
                                                };
                                                if let Some(ticket) = ticket.take() {
                                                    ticket.fail(&error);
                                                }
                                                drop(permit.take());
                                                router.emit(router.attempt_event(
                                                    &ctx,
                                                    entry,
                                                    AttemptRecord::failed(attempt, started.elapsed(), &error),
                                                ));
                                                tracing::warn!(provider = %entry.id, error = %error, "Stream failed mid-way");
                                                yield Err(RouterError::Stream {
                                                    provider: entry.id.clone(),
                                                    error,
                                                });
                                                return;
                                            }
                                        }
                                    }
                                };

                                let chunk = StreamChunk {
                                    content_delta: delta.content_delta,
                                    provider_id: entry.id.clone(),
                                    finish_reason: delta.finish_reason,
                                };
                                if chunk.is_terminal() {
                                    let failure = (chunk.finish_reason == Some(FinishReason::Error))
                                        .then(|| ProviderError::unknown("provider reported a stream error"));
                                    if let Some(ticket) = ticket.take() {
                                        match &failure {
                                            Some(error) => ticket.fail(error),
                                            None => ticket.succeed(),
                                        }
                                    }
                                    drop(permit.take());
                                    router.emit(router.attempt_event(
                                        &ctx,
                                        entry,
                                        AttemptRecord {
                                            attempt,
                                            latency: started.elapsed(),
                                            model: None,
                                            error: failure.as_ref(),
                                            tokens_used: None,
                                        },
                                    ));
                                    yield Ok(chunk);
                                    return;
                                }
                                yield Ok(chunk);
                            }
                        }
                    };

                    drop(upstream);
                    ticket.fail(&error);
                    drop(permit);
                    router.emit(router.attempt_event(
                        &ctx,
                        entry,
                        AttemptRecord::failed(attempt, started.elapsed(), &error),
                    ));

                    match retry.after_failure(&error) {
                        RetryDecision::Retry(delay) => {
                            tracing::warn!(
                                provider = %entry.id,
                                attempt,
                                error = %error,
                                delay_ms = delay.as_millis() as u64,
                                "Stream failed before first chunk, retrying"
                            );
                            let slept = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => false,
                                _ = tokio::time::sleep(delay) => true,
                            };
                            if !slept {
                                return;
                            }
                            last_error = Some(error);
                        }
                        RetryDecision::NotRetryable | RetryDecision::Exhausted => {
                            tracing::warn!(
                                provider = %entry.id,
                                attempts = retry.attempts(),
                                error = %error,
                                "Provider failed, trying next in chain"
                            );
                            failures.push(ProviderFailure {
                                provider: entry.id.clone(),
                                attempts: retry.attempts(),
                                error,
                            });
                            break;
                        }
                    }
                }
            }

            yield Err(exhausted(failures, skipped));
        };

        // Enter the request span on every poll.
        let mut stream = Box::pin(stream);
        Box::pin(futures_util::stream::poll_fn(move |cx| {
            let _entered = span.enter();
            stream.as_mut().poll_next(cx)
        }))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("providers", &self.inner.entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>())
            .field("chain", &self.chain())
            .field("cache", &self.inner.cache.is_some())
            .finish()
    }
}

/// First item of an upstream stream, classified.
enum FirstDelta {
    Chunk(ChunkDelta),
    Failed(ProviderError),
}

/// Wait for the first upstream item, bounded by the call timeout.
async fn first_delta(
    upstream: &mut ChunkDeltaStream,
    call_timeout: Option<Duration>,
) -> Option<Result<ChunkDelta, ProviderError>> {
    match call_timeout {
        Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(ProviderError::timeout(format!(
                "no chunk within {}ms",
                limit.as_millis()
            )))),
        },
        None => upstream.next().await,
    }
}

impl<T> From<Option<ProviderFailure>> for ProviderRun<T> {
    fn from(failure: Option<ProviderFailure>) -> Self {
        match failure {
            Some(failure) => ProviderRun::Failed(failure),
            None => ProviderRun::Skipped,
        }
    }
}

/// What a provider contributes to the final error once its circuit refuses a
/// call: nothing if it was never attempted, else its last error.
fn refusal(
    entry: &ProviderEntry,
    attempts: u32,
    last_error: Option<ProviderError>,
) -> Option<ProviderFailure> {
    last_error.map(|error| ProviderFailure {
        provider: entry.id.clone(),
        attempts,
        error,
    })
}

/// The terminal error once every candidate has been tried or skipped.
fn exhausted(failures: Vec<ProviderFailure>, skipped: Vec<ProviderId>) -> RouterError {
    if !failures.is_empty() {
        tracing::error!(attempted = failures.len(), skipped = skipped.len(), "All providers failed");
        RouterError::AllProvidersFailed { attempts: failures }
    } else if !skipped.is_empty() {
        tracing::warn!(providers = skipped.len(), "Every candidate circuit is open");
        RouterError::CircuitOpen { providers: skipped }
    } else {
        RouterError::NoProviders
    }
}
