//! Provider abstractions and the request router.
//!
//! - `LlmProvider`: RPITIT trait every upstream adapter implements
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `CircuitBreaker`, `RetryController`, `ResponseCache`: per-request policy
//! - `Router`: ordering, gating, retry and fallback across providers

pub mod box_provider;
pub mod breaker;
pub mod cache;
pub mod fingerprint;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod router;
pub mod scripted;
