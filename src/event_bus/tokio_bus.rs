use tokio::sync::broadcast;

use super::traits::{EventBus, EventFilter, SchedulerEvent};

const DEFAULT_CAPACITY: usize = 1024;

/// [`EventBus`] implementation backed by a `tokio::sync::broadcast` channel.
///
/// Publishing never blocks; a subscriber that falls more than the channel
/// capacity behind observes a `Lagged` error on its next `recv`.
pub struct TokioBroadcastBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl TokioBroadcastBus {
    /// Create with the default channel capacity (1024).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TokioBroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for TokioBroadcastBus {
    fn publish(&self, event: SchedulerEvent) -> Result<(), String> {
        // `send` only errors when there are zero receivers, which is not a
        // failure for a fire-and-forget notification surface.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    fn subscribe_filtered(&self, _filter: EventFilter) -> broadcast::Receiver<SchedulerEvent> {
        // The underlying broadcast channel delivers all events; consumers
        // apply EventFilter::matches() to discard unwanted messages.
        self.sender.subscribe()
    }
}
