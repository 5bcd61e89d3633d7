//! Infrastructure layer for modelrelay.
//!
//! Loads router configuration from TOML and the environment, provides the
//! built-in adapters behind `ProviderKind`, and assembles a ready-to-use
//! [`modelrelay_core::llm::router::Router`].

pub mod bootstrap;
pub mod config;
pub mod llm;
