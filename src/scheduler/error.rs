use super::traits::JobId;

/// Error type for scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A periodic or cyclical job was configured with a zero period.
    #[error("job period must be greater than zero")]
    InvalidPeriod,

    /// The id is not present in the registry.
    #[error("job {0} is not registered")]
    JobNotFound(JobId),

    /// Id allocation collided with a live job.  Cannot occur while ids are
    /// allocated monotonically; kept as a defensive surface.
    #[error("job {0} is already scheduled")]
    DuplicateJob(JobId),

    /// The scheduler has been shut down and accepts no new jobs.
    #[error("scheduler is shut down")]
    SchedulerClosed,

    /// The 32-bit id space is exhausted.  Ids are never reused, so this
    /// refuses further registrations instead of wrapping.
    #[error("job id space exhausted")]
    IdSpaceExhausted,
}
