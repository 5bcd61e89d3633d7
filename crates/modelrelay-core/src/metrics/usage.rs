//! Per-provider usage aggregation.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use modelrelay_types::event::AttemptEvent;
use modelrelay_types::llm::ProviderId;

use super::MetricsRecorder;

/// Running totals for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub calls: u64,
    pub failures: u64,
    pub tokens: u64,
    pub total_latency: Duration,
}

impl ProviderUsage {
    /// Mean latency per call, or zero before the first call.
    pub fn mean_latency(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total_latency / calls,
            Err(_) => self.total_latency.div_f64(self.calls as f64),
        }
    }
}

/// Aggregates attempt events into per-provider totals.
#[derive(Debug, Default)]
pub struct UsageTracker {
    totals: DashMap<ProviderId, ProviderUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: &ProviderId) -> Option<ProviderUsage> {
        self.totals.get(provider).map(|entry| entry.value().clone())
    }

    /// Totals for every provider seen so far, sorted by id.
    pub fn snapshot(&self) -> Vec<(ProviderId, ProviderUsage)> {
        let mut all: Vec<_> = self
            .totals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn reset(&self) {
        self.totals.clear();
    }
}

impl MetricsRecorder for UsageTracker {
    fn record(&self, event: &AttemptEvent) {
        let mut usage = self.totals.entry(event.provider_id.clone()).or_default();
        usage.calls += 1;
        if !event.success {
            usage.failures += 1;
        }
        usage.tokens += u64::from(event.tokens_used.unwrap_or(0));
        usage.total_latency += event.latency;
    }
}
