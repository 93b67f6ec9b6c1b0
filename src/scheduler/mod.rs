//! Job scheduler: one-shot, periodic, and cyclical jobs with cancellation.
//!
//! # Architecture
//! ```text
//! Scheduler (trait)
//!   └── TokioScheduler            ← tokio-driven in-memory scheduler
//!         ├── registry             ← live jobs keyed by id
//!         ├── state table          ← per-job lifecycle state, monotone-growing
//!         ├── time schedule        ← fire-time → job-id buckets (BTreeMap)
//!         ├── dispatcher           ← consumes the ready-queue, spawns workers
//!         └── timer loop           ← sleeps until the earliest fire time
//! ```
//!
//! # Key behaviours
//! - Primitive jobs fire once and are retired; Periodic jobs may overlap;
//!   Cyclical jobs never overlap (next fire is slotted when the previous
//!   run returns)
//! - Cancellation is cooperative: it flips state immediately and evicts
//!   schedule slots lazily on the next timer pass
//! - Jobs sharing a fire instant land in the same bucket and all fire
//! - Task panics are caught at the worker boundary and published as
//!   [`SchedulerEvent::JobPanicked`](crate::event_bus::SchedulerEvent)

pub mod error;
pub mod tokio_scheduler;
pub mod traits;

pub use error::ScheduleError;
pub use tokio_scheduler::TokioScheduler;
pub use traits::{
    Job, JobConfig, JobExecution, JobId, JobKind, JobState, JobStatus, Scheduler, SchedulerConfig,
    SchedulerStats, TaskFn,
};
