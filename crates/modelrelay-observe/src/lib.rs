//! Observability for modelrelay: subscriber setup and a recorder that turns
//! attempt events into structured log lines.

pub mod recorder;
pub mod tracing_setup;
