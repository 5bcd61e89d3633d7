//! Broadcast bus for distributing attempt events to subscribers.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active
//! subscribers is a no-op, and a slow subscriber only loses its own
//! backlog; the publishing request never waits.

use modelrelay_types::event::AttemptEvent;
use tokio::sync::broadcast;

use super::MetricsRecorder;

/// Multi-consumer bus of [`AttemptEvent`]s.
///
/// Cloning the bus clones the sender.
pub struct MetricsBus {
    sender: broadcast::Sender<AttemptEvent>,
}

impl MetricsBus {
    /// Create a bus with the given per-subscriber backlog.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers, dropping the event if there are none.
    pub fn publish(&self, event: AttemptEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl MetricsRecorder for MetricsBus {
    fn record(&self, event: &AttemptEvent) {
        self.publish(event.clone());
    }
}

impl Clone for MetricsBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for MetricsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
