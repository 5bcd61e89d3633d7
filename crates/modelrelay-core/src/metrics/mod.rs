//! Metrics recording for routed calls.
//!
//! The router emits one [`AttemptEvent`] per completed adapter call to an
//! injected [`MetricsRecorder`]. Recording is fire-and-forget: a recorder
//! has no way to fail the request it observes.

pub mod bus;
pub mod usage;

use std::sync::Arc;

use modelrelay_types::event::AttemptEvent;

/// Sink for attempt events.
///
/// Implementations must be cheap and non-blocking; they run inline on the
/// request's task.
pub trait MetricsRecorder: Send + Sync {
    fn record(&self, event: &AttemptEvent);
}

impl<T: MetricsRecorder + ?Sized> MetricsRecorder for Arc<T> {
    fn record(&self, event: &AttemptEvent) {
        (**self).record(event);
    }
}

/// Recorder that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn record(&self, _event: &AttemptEvent) {}
}

/// Forwards each event to several recorders in order.
#[derive(Default, Clone)]
pub struct CompositeRecorder {
    recorders: Vec<Arc<dyn MetricsRecorder>>,
}

impl CompositeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl MetricsRecorder for CompositeRecorder {
    fn record(&self, event: &AttemptEvent) {
        for recorder in &self.recorders {
            recorder.record(event);
        }
    }
}

impl std::fmt::Debug for CompositeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRecorder")
            .field("recorders", &self.recorders.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use modelrelay_types::event::Operation;
    use modelrelay_types::llm::ProviderId;
    use uuid::Uuid;

    use super::test_support::CapturingRecorder;
    use super::*;

    fn event() -> AttemptEvent {
        AttemptEvent {
            request_id: Uuid::now_v7(),
            provider_id: ProviderId::from("a"),
            model: None,
            operation: Operation::Complete,
            attempt: 1,
            latency: Duration::from_millis(3),
            success: true,
            error_category: None,
            tokens_used: Some(12),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_composite_forwards_to_all() {
        let first = Arc::new(CapturingRecorder::default());
        let second = Arc::new(CapturingRecorder::default());
        let composite = CompositeRecorder::new()
            .with(first.clone())
            .with(second.clone());

        composite.record(&event());
        composite.record(&event());

        assert_eq!(composite.len(), 2);
        assert_eq!(first.events().len(), 2);
        assert_eq!(second.events().len(), 2);
    }

    #[test]
    fn test_noop_accepts_events() {
        NoopRecorder.record(&event());
    }
}
