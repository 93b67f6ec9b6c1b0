//! Pub/sub surface for scheduler lifecycle events.
//!
//! The scheduler publishes a [`SchedulerEvent`] for every externally
//! observable transition (job added, fired, completed, cancelled, task
//! panic, shutdown).  Embedders subscribe through the [`EventBus`] trait;
//! [`TokioBroadcastBus`] is the in-process implementation backed by a
//! `tokio::sync::broadcast` channel.

pub mod tokio_bus;
pub mod traits;

pub use tokio_bus::TokioBroadcastBus;
pub use traits::{EventBus, EventFilter, EventKind, SchedulerEvent};
