//! Broadcast bus for run events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

use super::types::ResolutionEvent;

/// Channel capacity for broadcast. Slow subscribers lag rather than block.
const CHANNEL_CAPACITY: usize = 256;

pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<ResolutionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: ResolutionEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                trace!(event_type, receivers = count, "Event published");
                count
            }
            Err(_) => {
                trace!(event_type, "Event dropped (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolutionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
