//! Shared domain types for modelrelay.
//!
//! Requests, results, stream chunks, provider errors, attempt events and
//! router configuration. Zero runtime dependencies -- only serde, thiserror,
//! chrono and uuid.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
