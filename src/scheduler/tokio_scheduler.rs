//! Tokio-backed scheduler implementation.
//!
//! `TokioScheduler` owns four shared tables (the job registry, the state
//! table, the time schedule, and the id allocator) behind a single mutex,
//! plus two long-lived tasks:
//!
//! - the **dispatcher** consumes the ready-queue, re-checks cancellation,
//!   and spawns one worker per fire;
//! - the **timer loop** sleeps until the earliest tracked fire time and
//!   drains every due bucket into the ready-queue.  A coalescing watch
//!   channel re-arms it whenever an insert becomes the new earliest slot.
//!
//! The mutex is held only for O(1)/O(log n) table operations, never across
//! an `.await` and never around user code.
//!
//! ## Cancellation
//! `cancel_job` flips state and drops the registry entry; time-schedule
//! slots are evicted lazily when the timer loop next reaches them.  The
//! dispatcher re-checks state at dequeue, so a cancelled job never reaches
//! a worker.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::event_bus::{EventBus, SchedulerEvent};

use super::error::ScheduleError;
use super::traits::{
    Job, JobConfig, JobExecution, JobId, JobKind, JobState, JobStatus, Scheduler, SchedulerConfig,
    SchedulerStats, TaskFn,
};

// ─── Constants ────────────────────────────────────────────────────────────────

/// How long the timer loop parks when the time schedule is empty.  Purely a
/// fallback; any insert that becomes the earliest slot re-arms it at once.
const IDLE_WAIT: Duration = Duration::from_secs(60);

// ─── Time helpers ────────────────────────────────────────────────────────────

/// Wall-clock now as integer nanoseconds since the Unix epoch.  Saturates
/// past the year 2262, far outside any schedulable horizon.
fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

fn period_nanos(period: Duration) -> i64 {
    i64::try_from(period.as_nanos()).unwrap_or(i64::MAX)
}

// ─── Shared tables ───────────────────────────────────────────────────────────

/// Registry, state table, time schedule, and id allocator.  One instance
/// lives behind the scheduler's mutex; every mutation goes through it.
struct Tables {
    next_id: JobId,
    /// Live jobs keyed by id.
    registry: HashMap<JobId, Job>,
    /// Per-job lifecycle state.  Monotone-growing: completed and cancelled
    /// entries persist after registry removal.
    states: HashMap<JobId, JobState>,
    /// Fire-time (nanos since epoch) → ids due at that instant.  Buckets,
    /// not single slots, so colliding fire times all fire.
    schedule: BTreeMap<i64, Vec<JobId>>,
    /// Bounded per-job execution records, most recent first.
    history: HashMap<JobId, Vec<JobExecution>>,
    closed: bool,
}

impl Tables {
    fn new() -> Self {
        Self {
            next_id: 1,
            registry: HashMap::new(),
            states: HashMap::new(),
            schedule: BTreeMap::new(),
            history: HashMap::new(),
            closed: false,
        }
    }

    /// Hand out the next id.  Ids are never reused; exhausting the u32
    /// space refuses further registrations instead of wrapping.
    fn allocate_id(&mut self) -> Result<JobId, ScheduleError> {
        if self.next_id == JobId::MAX {
            return Err(ScheduleError::IdSpaceExhausted);
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    /// The earliest tracked fire time, if any.
    fn next_fire_at(&self) -> Option<i64> {
        self.schedule.keys().next().copied()
    }

    /// Insert a fire slot; returns true when it becomes the new earliest,
    /// i.e. the timer loop must be re-armed.
    fn insert_slot(&mut self, at: i64, id: JobId) -> bool {
        let is_new_earliest = self.next_fire_at().is_none_or(|earliest| at < earliest);
        self.schedule.entry(at).or_default().push(id);
        is_new_earliest
    }

    /// Drain every bucket due at `now` and return the jobs to enqueue.
    ///
    /// Cancelled and vanished ids are evicted here (the lazy half of
    /// cancellation).  Periodic jobs are re-slotted one period after their
    /// *fire time*, not after `now`, so cadence survives dispatch delay.
    fn take_due(&mut self, now: i64) -> Vec<Job> {
        let mut due = Vec::new();
        while let Some((&at, _)) = self.schedule.first_key_value() {
            if at > now {
                break;
            }
            let Some(ids) = self.schedule.remove(&at) else {
                break;
            };
            for id in ids {
                if self.states.get(&id) == Some(&JobState::Cancelled) {
                    continue;
                }
                let Some(job) = self.registry.get(&id) else {
                    continue;
                };
                let job = job.clone();
                if job.config().kind() == JobKind::Periodic {
                    if let Some(period) = job.config().period() {
                        let next = at.saturating_add(period_nanos(period));
                        self.schedule.entry(next).or_default().push(id);
                    }
                }
                due.push(job);
            }
        }
        due
    }

    fn record_history(&mut self, exec: JobExecution, limit: usize) {
        let entries = self.history.entry(exec.job_id).or_default();
        entries.insert(0, exec);
        entries.truncate(limit);
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            registered_jobs: self.registry.len(),
            scheduled_fires: self.schedule.values().map(Vec::len).sum(),
            completed_jobs: self
                .states
                .values()
                .filter(|s| **s == JobState::Completed)
                .count(),
            cancelled_jobs: self
                .states
                .values()
                .filter(|s| **s == JobState::Cancelled)
                .count(),
            closed: self.closed,
        }
    }
}

// ─── Inner ───────────────────────────────────────────────────────────────────

struct Inner {
    tables: Mutex<Tables>,
    bus: Arc<dyn EventBus>,
    /// Ready-queue into the dispatcher.
    queue_tx: mpsc::Sender<Job>,
    /// Coalescing "the earliest fire time changed" signal to the timer loop.
    reset_tx: watch::Sender<()>,
    /// Send `true` to stop both long-lived loops.
    stop_tx: watch::Sender<bool>,
    config: SchedulerConfig,
}

impl Inner {
    fn lock_tables(&self) -> MutexGuard<'_, Tables> {
        // Poisoning can only originate inside these short table operations;
        // the data stays coherent, so recover the guard.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SchedulerEvent) {
        let _ = self.bus.publish(event);
    }

    /// Non-blocking; coalesces with any signal not yet consumed.
    fn signal_schedule_change(&self) {
        self.reset_tx.send_replace(());
    }
}

// ─── TokioScheduler ──────────────────────────────────────────────────────────

/// In-memory, tokio-driven scheduler.
///
/// Construction spawns the dispatcher and timer loop, so it must happen
/// inside a tokio runtime.  Jobs are held in memory only; nothing survives
/// the process.
pub struct TokioScheduler {
    inner: Arc<Inner>,
    /// Handles for the dispatcher and timer loop, joined on shutdown.
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Create and start a scheduler with default tuning.
    pub fn new(bus: Arc<dyn EventBus>) -> Arc<Self> {
        Self::with_config(bus, SchedulerConfig::default())
    }

    /// Create and start a scheduler with explicit tuning.
    pub fn with_config(bus: Arc<dyn EventBus>, config: SchedulerConfig) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (reset_tx, reset_rx) = watch::channel(());
        let (stop_tx, stop_rx) = watch::channel(false);

        let inner = Arc::new(Inner {
            tables: Mutex::new(Tables::new()),
            bus,
            queue_tx,
            reset_tx,
            stop_tx,
            config,
        });

        let dispatcher = tokio::spawn(dispatch_loop(
            Arc::clone(&inner),
            queue_rx,
            stop_rx.clone(),
        ));
        let timer = tokio::spawn(timer_loop(Arc::clone(&inner), reset_rx, stop_rx));

        Arc::new(Self {
            inner,
            loops: Mutex::new(vec![dispatcher, timer]),
        })
    }

    /// Point-in-time occupancy snapshot.
    pub fn stats(&self) -> SchedulerStats {
        self.inner.lock_tables().stats()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn add_job(&self, config: JobConfig, task: TaskFn) -> Result<Job, ScheduleError> {
        if config.period().is_some_and(|p| p.is_zero()) {
            return Err(ScheduleError::InvalidPeriod);
        }

        let (job, rearm) = {
            let mut tables = self.inner.lock_tables();
            if tables.closed {
                return Err(ScheduleError::SchedulerClosed);
            }

            let id = tables.allocate_id()?;
            let job = Job::new(id, config, task);
            if tables.registry.insert(id, job.clone()).is_some() {
                return Err(ScheduleError::DuplicateJob(id));
            }
            tables.states.insert(id, JobState::Scheduled);

            let mut rearm = false;
            if let Some(period) = config.period() {
                let next = now_nanos().saturating_add(period_nanos(period));
                rearm = tables.insert_slot(next, id);
            }
            (job, rearm)
        };

        if config.kind() == JobKind::Primitive {
            // One-shot jobs skip the time schedule entirely and go straight
            // to the dispatcher.
            if self.inner.queue_tx.send(job.clone()).await.is_err() {
                let mut tables = self.inner.lock_tables();
                tables.registry.remove(&job.id());
                tables.states.insert(job.id(), JobState::Cancelled);
                return Err(ScheduleError::SchedulerClosed);
            }
        }
        if rearm {
            self.inner.signal_schedule_change();
        }

        log::debug!("registered {:?} job {}", config.kind(), job.id());
        self.inner.publish(SchedulerEvent::JobAdded {
            id: job.id(),
            kind: config.kind(),
        });
        Ok(job)
    }

    async fn cancel_job(&self, id: JobId) {
        let cancelled = {
            let mut tables = self.inner.lock_tables();
            match tables.states.get(&id) {
                None => false,
                Some(state) if state.is_terminal() => false,
                Some(_) => {
                    tables.states.insert(id, JobState::Cancelled);
                    tables.registry.remove(&id);
                    true
                }
            }
        };

        if cancelled {
            log::debug!("job {id} cancelled");
            self.inner.publish(SchedulerEvent::JobCancelled { id });
        }
    }

    async fn job_state(&self, id: JobId) -> Option<JobState> {
        self.inner.lock_tables().states.get(&id).copied()
    }

    async fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.lock_tables().registry.values().cloned().collect();
        jobs.sort_by_key(Job::id);
        jobs
    }

    async fn job_history(&self, id: JobId) -> Vec<JobExecution> {
        self.inner
            .lock_tables()
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    async fn shutdown(&self) {
        let newly_closed = {
            let mut tables = self.inner.lock_tables();
            if tables.closed {
                false
            } else {
                tables.closed = true;
                true
            }
        };
        if !newly_closed {
            return;
        }

        let _ = self.inner.stop_tx.send(true);

        let handles = {
            let mut loops = self
                .loops
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *loops)
        };
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.publish(SchedulerEvent::SchedulerStopped);
        log::info!("scheduler shut down");
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Consume the ready-queue, re-check cancellation, and hand each accepted
/// job to its own worker.  Never waits on a task body.
async fn dispatch_loop(
    inner: Arc<Inner>,
    mut queue_rx: mpsc::Receiver<Job>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            received = queue_rx.recv() => match received {
                Some(job) => job,
                None => break,
            },
            _ = stop_rx.changed() => {
                if *stop_rx.borrow_and_update() {
                    break;
                }
                continue;
            }
        };

        let accepted = {
            let mut tables = inner.lock_tables();
            match tables.states.get(&job.id()) {
                // Cancelled (or unknown) between enqueue and dequeue.
                None | Some(JobState::Cancelled) => false,
                Some(_) => {
                    tables.states.insert(job.id(), JobState::Running);
                    if job.config().kind() == JobKind::Periodic {
                        // Periodic jobs count as scheduled again the moment
                        // they dispatch; overlapping fires are permitted.
                        tables.states.insert(job.id(), JobState::Scheduled);
                    }
                    true
                }
            }
        };

        if !accepted {
            log::debug!("job {} dropped before dispatch", job.id());
            continue;
        }

        inner.publish(SchedulerEvent::JobFired { id: job.id() });
        tokio::spawn(run_worker(Arc::clone(&inner), job));
    }

    log::debug!("dispatcher loop exited");
}

/// Invoke one job's task and apply its post-return transition.
///
/// The task runs on the blocking pool and its panics stop here: they are
/// recorded, published, and swallowed so the dispatcher stays healthy.
async fn run_worker(inner: Arc<Inner>, job: Job) {
    let started_at = Utc::now();
    let task = job.task();
    let joined = tokio::task::spawn_blocking(move || task()).await;

    let status = match joined {
        Ok(()) => JobStatus::Success,
        Err(err) if err.is_panic() => {
            let message = panic_message(err.into_panic());
            log::error!("job {} panicked: {message}", job.id());
            inner.publish(SchedulerEvent::JobPanicked {
                id: job.id(),
                message,
            });
            JobStatus::Panicked
        }
        Err(_) => {
            // Worker aborted; only happens when the runtime is torn down.
            log::warn!("worker for job {} aborted", job.id());
            return;
        }
    };

    let mut completed = false;
    let mut rearm = false;
    {
        let mut tables = inner.lock_tables();
        tables.record_history(
            JobExecution {
                job_id: job.id(),
                started_at,
                finished_at: Utc::now(),
                status,
            },
            inner.config.history_limit,
        );

        match job.config().kind() {
            JobKind::Primitive => {
                tables.registry.remove(&job.id());
                if tables.states.get(&job.id()) != Some(&JobState::Cancelled) {
                    tables.states.insert(job.id(), JobState::Completed);
                    completed = true;
                }
            }
            // Re-slotted by the timer loop at fire time; nothing to do here.
            JobKind::Periodic => {}
            JobKind::Cyclical => {
                // The next fire is slotted only now that the run returned,
                // which is what keeps cyclical runs from overlapping.
                if tables.states.get(&job.id()) != Some(&JobState::Cancelled) {
                    if let Some(period) = job.config().period() {
                        tables.states.insert(job.id(), JobState::Scheduled);
                        let next = now_nanos().saturating_add(period_nanos(period));
                        rearm = tables.insert_slot(next, job.id());
                    }
                }
            }
        }
    }

    if completed {
        inner.publish(SchedulerEvent::JobCompleted { id: job.id() });
    }
    if rearm {
        inner.signal_schedule_change();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

// ─── Timer loop ──────────────────────────────────────────────────────────────

/// Sleep until the earliest tracked fire time, then drain due buckets into
/// the ready-queue.  `reset_rx` wakes it early whenever an insert became
/// the new earliest slot.
async fn timer_loop(
    inner: Arc<Inner>,
    mut reset_rx: watch::Receiver<()>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let next_at = inner.lock_tables().next_fire_at();
        let wait = match next_at {
            Some(at) => {
                let delta = at.saturating_sub(now_nanos());
                if delta > 0 {
                    Duration::from_nanos(delta as u64)
                } else {
                    Duration::ZERO
                }
            }
            None => IDLE_WAIT,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if next_at.is_some() {
                    fire_due(&inner, &mut stop_rx).await;
                }
            }
            changed = reset_rx.changed() => {
                // Schedule changed under us; loop around and re-arm.
                if changed.is_err() {
                    break;
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow_and_update() {
                    break;
                }
            }
        }
    }

    log::debug!("timer loop exited");
}

/// Move every due job into the ready-queue.  The table lock is released
/// before the (potentially backpressured) queue sends.
async fn fire_due(inner: &Arc<Inner>, stop_rx: &mut watch::Receiver<bool>) {
    let due = inner.lock_tables().take_due(now_nanos());

    for job in due {
        tokio::select! {
            sent = inner.queue_tx.send(job) => {
                if sent.is_err() {
                    return;
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow_and_update() {
                    return;
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::timeout;

    use super::*;
    use crate::event_bus::TokioBroadcastBus;

    fn make_scheduler() -> Arc<TokioScheduler> {
        let bus: Arc<dyn EventBus> = Arc::new(TokioBroadcastBus::new());
        TokioScheduler::new(bus)
    }

    fn noop_task() -> TaskFn {
        Arc::new(|| {})
    }

    fn counting_task(counter: &Arc<AtomicU32>) -> TaskFn {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    // Synchronous state read for wait_until closures.
    fn state_of(scheduler: &Arc<TokioScheduler>, id: JobId) -> Option<JobState> {
        scheduler.inner.lock_tables().states.get(&id).copied()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn ids_are_sequential_from_one() {
        let scheduler = make_scheduler();
        let a = scheduler
            .add_job(JobConfig::periodic(Duration::from_secs(60)), noop_task())
            .await
            .unwrap();
        let b = scheduler
            .add_job(JobConfig::periodic(Duration::from_secs(60)), noop_task())
            .await
            .unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let scheduler = make_scheduler();
        for config in [
            JobConfig::periodic(Duration::ZERO),
            JobConfig::cyclical(Duration::ZERO),
        ] {
            let err = scheduler.add_job(config, noop_task()).await.unwrap_err();
            assert_eq!(err, ScheduleError::InvalidPeriod);
        }
    }

    #[tokio::test]
    async fn one_shot_runs_once_and_retires() {
        let scheduler = make_scheduler();
        let counter = Arc::new(AtomicU32::new(0));

        let job = scheduler
            .add_job(JobConfig::primitive(), counting_task(&counter))
            .await
            .unwrap();

        let done = {
            let scheduler = Arc::clone(&scheduler);
            let id = job.id();
            wait_until(
                move || state_of(&scheduler, id) == Some(JobState::Completed),
                Duration::from_secs(1),
            )
            .await
        };
        assert!(done, "one-shot job should reach Completed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.list_jobs().await.is_empty(), "registry keeps no retired jobs");

        let history = scheduler.job_history(job.id()).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Success);
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_noop() {
        let scheduler = make_scheduler();
        scheduler.cancel_job(999).await;
        assert_eq!(scheduler.job_state(999).await, None);
    }

    #[tokio::test]
    async fn cancel_prevents_future_fires() {
        let scheduler = make_scheduler();
        let counter = Arc::new(AtomicU32::new(0));

        let job = scheduler
            .add_job(
                JobConfig::periodic(Duration::from_millis(30)),
                counting_task(&counter),
            )
            .await
            .unwrap();
        scheduler.cancel_job(job.id()).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0, "cancelled job must not fire");
        assert_eq!(scheduler.job_state(job.id()).await, Some(JobState::Cancelled));
        assert!(scheduler.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_completed() {
        let scheduler = make_scheduler();
        let job = scheduler
            .add_job(JobConfig::primitive(), noop_task())
            .await
            .unwrap();

        let scheduler2 = Arc::clone(&scheduler);
        let id = job.id();
        assert!(
            wait_until(
                move || state_of(&scheduler2, id) == Some(JobState::Completed),
                Duration::from_secs(1)
            )
            .await
        );

        scheduler.cancel_job(job.id()).await;
        assert_eq!(scheduler.job_state(job.id()).await, Some(JobState::Completed));
    }

    #[tokio::test]
    async fn panicking_task_does_not_poison_the_dispatcher() {
        let scheduler = make_scheduler();
        let mut events = scheduler.inner.bus.subscribe();

        let bad = scheduler
            .add_job(
                JobConfig::primitive(),
                Arc::new(|| panic!("deliberate test panic")),
            )
            .await
            .unwrap();

        // The panic is surfaced as an event...
        let panicked = timeout(Duration::from_secs(1), async {
            loop {
                match events.recv().await {
                    Ok(SchedulerEvent::JobPanicked { id, message }) => break (id, message),
                    Ok(_) => continue,
                    Err(err) => panic!("event stream ended: {err}"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(panicked.0, bad.id());
        assert!(panicked.1.contains("deliberate test panic"));

        let history = scheduler.job_history(bad.id()).await;
        assert_eq!(history[0].status, JobStatus::Panicked);

        // ...and the dispatcher keeps dispatching.
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .add_job(JobConfig::primitive(), counting_task(&counter))
            .await
            .unwrap();
        assert!(
            wait_until(
                {
                    let counter = Arc::clone(&counter);
                    move || counter.load(Ordering::SeqCst) == 1
                },
                Duration::from_secs(1)
            )
            .await,
            "jobs added after a panic must still run"
        );
    }

    #[tokio::test]
    async fn shutdown_refuses_new_jobs() {
        let scheduler = make_scheduler();
        scheduler.shutdown().await;

        let err = scheduler
            .add_job(JobConfig::primitive(), noop_task())
            .await
            .unwrap_err();
        assert_eq!(err, ScheduleError::SchedulerClosed);
        assert!(scheduler.stats().closed);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let scheduler = make_scheduler();
        scheduler.shutdown().await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn stats_reflect_occupancy() {
        let scheduler = make_scheduler();
        scheduler
            .add_job(JobConfig::periodic(Duration::from_secs(60)), noop_task())
            .await
            .unwrap();
        scheduler
            .add_job(JobConfig::cyclical(Duration::from_secs(60)), noop_task())
            .await
            .unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.registered_jobs, 2);
        assert_eq!(stats.scheduled_fires, 2);
        assert!(!stats.closed);
    }

    // ── Table-level behaviour ────────────────────────────────────────────────

    fn table_job(tables: &mut Tables, config: JobConfig) -> Job {
        let id = tables.allocate_id().unwrap();
        let job = Job::new(id, config, Arc::new(|| {}));
        tables.registry.insert(id, job.clone());
        tables.states.insert(id, JobState::Scheduled);
        job
    }

    #[test]
    fn colliding_fire_times_share_a_bucket_and_both_fire() {
        let mut tables = Tables::new();
        let a = table_job(&mut tables, JobConfig::periodic(Duration::from_secs(1)));
        let b = table_job(&mut tables, JobConfig::periodic(Duration::from_secs(2)));

        tables.insert_slot(1_000, a.id());
        tables.insert_slot(1_000, b.id());

        let due = tables.take_due(1_000);
        let mut ids: Vec<JobId> = due.iter().map(Job::id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a.id(), b.id()], "both colliding jobs must fire");
    }

    #[test]
    fn take_due_evicts_cancelled_slots() {
        let mut tables = Tables::new();
        let job = table_job(&mut tables, JobConfig::periodic(Duration::from_secs(1)));
        tables.insert_slot(1_000, job.id());
        tables.states.insert(job.id(), JobState::Cancelled);

        assert!(tables.take_due(2_000).is_empty());
        assert_eq!(tables.next_fire_at(), None, "cancelled slot must be evicted");
    }

    #[test]
    fn take_due_reslots_periodic_after_fire_time() {
        let mut tables = Tables::new();
        let job = table_job(&mut tables, JobConfig::periodic(Duration::from_secs(1)));
        tables.insert_slot(1_000, job.id());

        let due = tables.take_due(1_500);
        assert_eq!(due.len(), 1);
        assert_eq!(
            tables.next_fire_at(),
            Some(1_000 + period_nanos(Duration::from_secs(1))),
            "periodic re-slot anchors on the fire time, not on now"
        );
    }

    #[test]
    fn take_due_leaves_future_slots_alone() {
        let mut tables = Tables::new();
        let job = table_job(&mut tables, JobConfig::cyclical(Duration::from_secs(1)));
        tables.insert_slot(5_000, job.id());

        assert!(tables.take_due(1_000).is_empty());
        assert_eq!(tables.next_fire_at(), Some(5_000));
    }

    #[test]
    fn insert_slot_reports_new_earliest() {
        let mut tables = Tables::new();
        let job = table_job(&mut tables, JobConfig::periodic(Duration::from_secs(1)));

        assert!(tables.insert_slot(2_000, job.id()), "first slot is the earliest");
        assert!(tables.insert_slot(1_000, job.id()), "smaller time becomes earliest");
        assert!(!tables.insert_slot(3_000, job.id()), "later time is not earliest");
    }

    #[test]
    fn exhausted_id_space_is_refused() {
        let mut tables = Tables::new();
        tables.next_id = JobId::MAX;
        assert_eq!(tables.allocate_id(), Err(ScheduleError::IdSpaceExhausted));
    }

    #[test]
    fn history_is_bounded() {
        let mut tables = Tables::new();
        for _ in 0..10 {
            tables.record_history(
                JobExecution {
                    job_id: 1,
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                    status: JobStatus::Success,
                },
                3,
            );
        }
        assert_eq!(tables.history.get(&1).map(Vec::len), Some(3));
    }
}
