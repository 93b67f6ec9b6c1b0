//! Core types and the `Scheduler` trait for the scheduler subsystem.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ScheduleError;

// ─── JobId ───────────────────────────────────────────────────────────────────

/// Process-unique job identifier, assigned monotonically from 1.
pub type JobId = u32;

// ─── TaskFn ──────────────────────────────────────────────────────────────────

/// The caller-supplied action a job invokes on each fire.
///
/// The scheduler neither inspects nor owns what the action does; it owns
/// only the act of invoking it, on a dedicated worker, outside all
/// scheduler locks.
pub type TaskFn = Arc<dyn Fn() + Send + Sync + 'static>;

// ─── JobKind ─────────────────────────────────────────────────────────────────

/// How a job fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Fires exactly once, then is retired from the registry.
    Primitive,
    /// Fires every period, even if the previous run hasn't returned.
    Periodic,
    /// Fires every period, but only after the previous run returns.
    Cyclical,
}

// ─── JobState ────────────────────────────────────────────────────────────────

/// Per-job lifecycle state.
///
/// `Completed` and `Cancelled` are terminal; a cancelled job is never
/// re-enqueued.  State table entries outlive registry removal so one-shot
/// outcomes stay observable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Running,
    Completed,
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ─── JobConfig ───────────────────────────────────────────────────────────────

/// Immutable firing configuration, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConfig {
    kind: JobKind,
    period: Option<Duration>,
}

impl JobConfig {
    /// A one-shot job.
    pub fn primitive() -> Self {
        Self {
            kind: JobKind::Primitive,
            period: None,
        }
    }

    /// A job firing every `period`, overlapping runs permitted.
    pub fn periodic(period: Duration) -> Self {
        Self {
            kind: JobKind::Periodic,
            period: Some(period),
        }
    }

    /// A job firing every `period`, next fire slotted only after the
    /// previous run returns.
    pub fn cyclical(period: Duration) -> Self {
        Self {
            kind: JobKind::Cyclical,
            period: Some(period),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// The firing period; `None` for one-shot jobs.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

// ─── Job ─────────────────────────────────────────────────────────────────────

/// A registered job: id, configuration, and the task to invoke.
///
/// Handles are cheap to clone; the task closure is shared.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    config: JobConfig,
    task: TaskFn,
    created_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(id: JobId, config: JobConfig, task: TaskFn) -> Self {
        Self {
            id,
            config,
            task,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> JobConfig {
        self.config
    }

    /// Registration timestamp, for debugging and display only.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A shared handle to the task closure.
    pub(crate) fn task(&self) -> TaskFn {
        Arc::clone(&self.task)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

// ─── JobStatus ───────────────────────────────────────────────────────────────

/// Outcome of a single job run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Panicked,
}

// ─── JobExecution ────────────────────────────────────────────────────────────

/// Record of one job run, kept in a bounded per-job history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
}

// ─── SchedulerConfig ─────────────────────────────────────────────────────────

/// Tuning knobs for [`TokioScheduler`](super::TokioScheduler).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity of the ready-queue between the timer loop and the
    /// dispatcher.
    pub queue_capacity: usize,
    /// Maximum execution records kept per job.
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            history_limit: 100,
        }
    }
}

// ─── SchedulerStats ──────────────────────────────────────────────────────────

/// Point-in-time snapshot of scheduler occupancy.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    /// Jobs currently in the registry.
    pub registered_jobs: usize,
    /// Fire slots currently tracked in the time schedule.
    pub scheduled_fires: usize,
    /// Jobs whose state table entry is `Completed`.
    pub completed_jobs: usize,
    /// Jobs whose state table entry is `Cancelled`.
    pub cancelled_jobs: usize,
    /// Whether the scheduler has been shut down.
    pub closed: bool,
}

// ─── Scheduler trait ─────────────────────────────────────────────────────────

/// Abstraction over the job scheduler.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a job.  One-shot jobs are enqueued for immediate dispatch;
    /// periodic and cyclical jobs are slotted into the time schedule at
    /// `now + period`.
    ///
    /// Fails with [`ScheduleError::InvalidPeriod`] if a non-one-shot config
    /// carries a zero period, and with [`ScheduleError::SchedulerClosed`]
    /// after [`Scheduler::shutdown`].
    async fn add_job(&self, config: JobConfig, task: TaskFn) -> Result<Job, ScheduleError>;

    /// Cancel a job.  Idempotent; unknown ids and already-terminal jobs are
    /// a no-op.  A running task is not interrupted, but no further fires
    /// will occur.
    async fn cancel_job(&self, id: JobId);

    /// Current lifecycle state of a job, or `None` for an unknown id.
    /// State entries persist after one-shot completion and cancellation.
    async fn job_state(&self, id: JobId) -> Option<JobState>;

    /// Snapshot of the registry, ordered by id.
    async fn list_jobs(&self) -> Vec<Job>;

    /// Execution history for a job, most recent first.
    async fn job_history(&self, id: JobId) -> Vec<JobExecution>;

    /// Stop the dispatcher and timer loop and refuse new jobs.  In-flight
    /// tasks are not cancelled.
    async fn shutdown(&self);
}
