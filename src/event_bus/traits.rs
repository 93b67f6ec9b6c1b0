use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::scheduler::traits::{JobId, JobKind};

/// All events the scheduler publishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A job was registered and is awaiting its first fire.
    JobAdded { id: JobId, kind: JobKind },
    /// A job was handed to a worker.
    JobFired { id: JobId },
    /// A one-shot job returned and was retired from the registry.
    JobCompleted { id: JobId },
    /// A job was cancelled by the caller.
    JobCancelled { id: JobId },
    /// A job's task panicked.  The worker survives; the panic payload is
    /// carried here for observers.
    JobPanicked { id: JobId, message: String },
    /// The scheduler was shut down.  In-flight tasks keep running.
    SchedulerStopped,
}

/// Selects which event variants a subscriber is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobAdded,
    JobFired,
    JobCompleted,
    JobCancelled,
    JobPanicked,
    SchedulerStopped,
    /// Matches every variant.
    All,
}

impl EventKind {
    /// Returns true if this filter matches `event`.
    pub fn matches(&self, event: &SchedulerEvent) -> bool {
        match self {
            Self::All => true,
            Self::JobAdded => matches!(event, SchedulerEvent::JobAdded { .. }),
            Self::JobFired => matches!(event, SchedulerEvent::JobFired { .. }),
            Self::JobCompleted => matches!(event, SchedulerEvent::JobCompleted { .. }),
            Self::JobCancelled => matches!(event, SchedulerEvent::JobCancelled { .. }),
            Self::JobPanicked => matches!(event, SchedulerEvent::JobPanicked { .. }),
            Self::SchedulerStopped => matches!(event, SchedulerEvent::SchedulerStopped),
        }
    }
}

/// A set of event kinds used for filtering subscriptions.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    pub fn new(kinds: Vec<EventKind>) -> Self {
        Self { kinds }
    }

    pub fn matches(&self, event: &SchedulerEvent) -> bool {
        self.kinds.iter().any(|k| k.matches(event))
    }
}

/// Central pub/sub bus for scheduler events.
///
/// All returned `Receiver`s carry every published event; callers that
/// subscribed via [`EventBus::subscribe_filtered`] apply
/// [`EventFilter::matches`] to discard unwanted messages.
pub trait EventBus: Send + Sync {
    /// Publish an event to all active subscribers.
    fn publish(&self, event: SchedulerEvent) -> Result<(), String>;

    /// Subscribe to all events.
    fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent>;

    /// Subscribe to events, pre-scoped to the given filter.
    fn subscribe_filtered(&self, filter: EventFilter) -> broadcast::Receiver<SchedulerEvent>;
}
