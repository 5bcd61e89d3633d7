//! Attempt-event logging.
//!
//! Field names follow the OpenTelemetry GenAI semantic conventions
//! (`gen_ai.operation.name`, `gen_ai.provider.name`, `gen_ai.request.model`)
//! so log pipelines can correlate them with exported spans.

use modelrelay_core::metrics::MetricsRecorder;
use modelrelay_types::event::AttemptEvent;

/// Target used for every attempt log line.
pub const ATTEMPT_TARGET: &str = "modelrelay::attempt";

/// Logs each attempt: successes at `info`, failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl MetricsRecorder for TracingRecorder {
    fn record(&self, event: &AttemptEvent) {
        let latency_ms = event.latency.as_millis() as u64;
        let model = event.model.as_deref().unwrap_or("unknown");

        if event.success {
            tracing::info!(
                target: ATTEMPT_TARGET,
                request_id = %event.request_id,
                gen_ai.operation.name = event.operation.as_str(),
                gen_ai.provider.name = %event.provider_id,
                gen_ai.request.model = model,
                gen_ai.usage.total_tokens = event.tokens_used,
                attempt = event.attempt,
                latency_ms,
                "Provider call succeeded"
            );
        } else {
            tracing::warn!(
                target: ATTEMPT_TARGET,
                request_id = %event.request_id,
                gen_ai.operation.name = event.operation.as_str(),
                gen_ai.provider.name = %event.provider_id,
                gen_ai.request.model = model,
                error.category = event.error_category.map(|c| c.as_str()),
                attempt = event.attempt,
                latency_ms,
                "Provider call failed"
            );
        }
    }
}
