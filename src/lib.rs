//! In-process job scheduling for long-lived services.
//!
//! The crate revolves around one abstraction, [`scheduler::Scheduler`], and
//! its tokio implementation [`scheduler::TokioScheduler`].  A job is a
//! caller-supplied closure paired with a [`scheduler::JobConfig`] that says
//! how it fires:
//!
//! - **Primitive**: fires exactly once, then is retired.
//! - **Periodic**: fires every period; overlapping runs are permitted.
//! - **Cyclical**: fires every period, but only after the previous run
//!   has returned; at most one run in flight.
//!
//! Lifecycle notifications (fires, completions, cancellations, task
//! panics) are published on the [`event_bus`] so embedders can observe the
//! scheduler without polling it.

pub mod event_bus;
pub mod scheduler;

/// Convenience re-exports for the most commonly used traits and types.
///
/// ```rust
/// use jobwheel::prelude::*;
/// ```
pub mod prelude {
    // Event bus
    pub use crate::event_bus::{EventBus, SchedulerEvent, TokioBroadcastBus};

    // Scheduler
    pub use crate::scheduler::{
        Job, JobConfig, JobId, JobKind, JobState, ScheduleError, Scheduler, SchedulerConfig,
        TaskFn, TokioScheduler,
    };
}
