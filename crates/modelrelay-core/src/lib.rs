//! Routing core for modelrelay.
//!
//! Defines the provider adapter trait and everything the router layers on
//! top of it: circuit breakers, retry policy, the response cache and
//! attempt metrics. Depends only on `modelrelay-types`; concrete adapters
//! and configuration loading live in `modelrelay-infra`.

pub mod llm;
pub mod metrics;
