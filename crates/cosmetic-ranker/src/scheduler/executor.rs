use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Notify};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::stats::{ConcurrencyStats, MetricsRing, TaskMetric};
use super::task::{TaskId, TaskPriority, TaskRecord, TaskState};
use super::SchedulerConfig;

type TaskOutput = Result<Box<dyn Any + Send>, String>;
type BoxedJob = Pin<Box<dyn Future<Output = TaskOutput> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("task scheduler is not running")]
    Unavailable,
    #[error("unknown task {0}")]
    NotFound(TaskId),
    #[error("timed out after {after:?} waiting for {id}")]
    Timeout { id: TaskId, after: Duration },
    #[error("{0} was cancelled")]
    Cancelled(TaskId),
    #[error("{id} failed: {message}")]
    Failed { id: TaskId, message: String },
    #[error("result of {0} was already taken")]
    ResultTaken(TaskId),
    #[error("result of {0} has an unexpected type")]
    TypeMismatch(TaskId),
}

struct QueuedTask {
    id: TaskId,
    job: BoxedJob,
}

struct TaskSlot {
    record: TaskRecord,
    enqueued: Instant,
    started: Option<Instant>,
    state: watch::Sender<TaskState>,
    abort: Option<AbortHandle>,
    result: Option<Box<dyn Any + Send>>,
}

impl TaskSlot {
    fn transition(&mut self, state: TaskState) {
        if state.is_terminal() {
            self.record.completed_at = Some(Utc::now());
        }
        self.record.state = state.clone();
        self.state.send_replace(state);
    }
}

#[derive(Default)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

struct Tier {
    queue: Mutex<VecDeque<QueuedTask>>,
    ready: Notify,
}

struct SchedulerShared {
    config: SchedulerConfig,
    tiers: [Tier; 4],
    tasks: Mutex<HashMap<TaskId, TaskSlot>>,
    finished: Mutex<VecDeque<TaskId>>,
    metrics: Mutex<MetricsRing>,
    counters: Mutex<Counters>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    next_id: AtomicU64,
    running: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SchedulerShared {
    fn tier(&self, priority: TaskPriority) -> &Tier {
        &self.tiers[priority.index()]
    }

    fn capacity(&self) -> usize {
        self.config.max_concurrent_tasks.max(1)
    }

    fn try_reserve(&self) -> bool {
        let reserved = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.capacity()).then_some(current + 1)
            });
        match reserved {
            Ok(previous) => {
                self.peak.fetch_max(previous + 1, Ordering::AcqRel);
                true
            }
            Err(_) => false,
        }
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Moves a queued task to running. False when it was cancelled while waiting.
    fn mark_running(&self, id: TaskId) -> bool {
        let mut tasks = lock(&self.tasks);
        let Some(slot) = tasks.get_mut(&id) else {
            return false;
        };
        if slot.record.state != TaskState::Queued {
            return false;
        }
        slot.started = Some(Instant::now());
        slot.record.started_at = Some(Utc::now());
        slot.transition(TaskState::Running);
        true
    }

    fn attach_abort(&self, id: TaskId, handle: AbortHandle) {
        let mut tasks = lock(&self.tasks);
        if let Some(slot) = tasks.get_mut(&id) {
            if slot.record.state == TaskState::Cancelled {
                handle.abort();
            }
            slot.abort = Some(handle);
        }
    }

    fn finish(&self, id: TaskId, outcome: Result<TaskOutput, JoinError>) {
        let awaiting_collection = {
            let mut tasks = lock(&self.tasks);
            let Some(slot) = tasks.get_mut(&id) else {
                return;
            };
            slot.abort = None;
            if slot.record.state == TaskState::Running {
                let state = match outcome {
                    Ok(Ok(value)) => {
                        slot.result = Some(value);
                        TaskState::Succeeded
                    }
                    Ok(Err(message)) => {
                        debug!(task = %id, error = %message, "task failed");
                        TaskState::Failed(message)
                    }
                    Err(err) if err.is_cancelled() => TaskState::Cancelled,
                    Err(err) => {
                        warn!(task = %id, error = %err, "task panicked");
                        TaskState::Failed(format!("task panicked: {err}"))
                    }
                };
                let mut counters = lock(&self.counters);
                match state {
                    TaskState::Succeeded => counters.completed += 1,
                    TaskState::Cancelled => counters.cancelled += 1,
                    _ => counters.failed += 1,
                }
                drop(counters);

                let now = Instant::now();
                let started = slot.started.unwrap_or(now);
                lock(&self.metrics).record(TaskMetric {
                    id,
                    priority: slot.record.priority,
                    queue_ms: millis(started.saturating_duration_since(slot.enqueued)),
                    execution_ms: millis(now.saturating_duration_since(started)),
                    success: state == TaskState::Succeeded,
                });
                slot.transition(state);
            }
            slot.result.is_some()
        };
        if !awaiting_collection {
            self.retain(id);
        }
    }

    /// Drops an uncollected result so its record can age out.
    fn discard_result(&self, id: TaskId) {
        let discarded = lock(&self.tasks)
            .get_mut(&id)
            .and_then(|slot| slot.result.take())
            .is_some();
        if discarded {
            self.retain(id);
        }
    }

    /// Keeps at most `metrics_capacity` finished records. Succeeded tasks only enter the
    /// bounded set once their result has been taken.
    fn retain(&self, id: TaskId) {
        let evicted = {
            let mut finished = lock(&self.finished);
            finished.push_back(id);
            let mut evicted = Vec::new();
            while finished.len() > self.config.metrics_capacity.max(1) {
                if let Some(oldest) = finished.pop_front() {
                    evicted.push(oldest);
                }
            }
            evicted
        };
        if !evicted.is_empty() {
            let mut tasks = lock(&self.tasks);
            for old in evicted {
                tasks.remove(&old);
            }
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Priority-tiered executor with a global in-flight cap.
///
/// Each tier owns a fixed set of workers pulling from that tier's FIFO queue. A worker that
/// dequeues while the global cap is reached puts the task back at the head of its queue and
/// backs off briefly. A succeeded task keeps its result until it is awaited; every other
/// finished record ages out of the bounded finished set.
pub struct TaskScheduler {
    shared: Arc<SchedulerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let metrics = MetricsRing::new(config.metrics_capacity);
        let tier = || Tier {
            queue: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
        };
        Self {
            shared: Arc::new(SchedulerShared {
                config,
                tiers: [tier(), tier(), tier(), tier()],
                tasks: Mutex::new(HashMap::new()),
                finished: Mutex::new(VecDeque::new()),
                metrics: Mutex::new(metrics),
                counters: Mutex::new(Counters::default()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                running: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Spawns the worker pools. Must run inside a tokio runtime; a second call is a no-op.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut workers = lock(&self.workers);
        for priority in TaskPriority::ALL {
            for _ in 0..self.shared.config.workers_for(priority) {
                let shared = Arc::clone(&self.shared);
                workers.push(tokio::spawn(worker_loop(shared, priority)));
            }
        }
        info!(
            workers = workers.len(),
            max_concurrent = self.shared.capacity(),
            "task scheduler started"
        );
    }

    /// Stops the workers and cancels every task that has not finished.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for worker in lock(&self.workers).drain(..) {
            worker.abort();
        }
        for priority in TaskPriority::ALL {
            lock(&self.shared.tier(priority).queue).clear();
        }
        let mut cancelled = 0;
        {
            let mut tasks = lock(&self.shared.tasks);
            for slot in tasks.values_mut() {
                if slot.record.state.is_terminal() {
                    continue;
                }
                if let Some(abort) = slot.abort.take() {
                    abort.abort();
                }
                slot.transition(TaskState::Cancelled);
                cancelled += 1;
            }
        }
        lock(&self.shared.counters).cancelled += cancelled;
        info!(cancelled, "task scheduler stopped");
    }

    /// Queues `job` on the tier for `priority`. The job's error is kept as its display text.
    pub fn submit<F, T, E>(
        &self,
        name: impl Into<String>,
        priority: TaskPriority,
        job: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        if !self.is_running() {
            return Err(SchedulerError::Unavailable);
        }
        let id = TaskId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (state, _) = watch::channel(TaskState::Queued);
        lock(&self.shared.tasks).insert(
            id,
            TaskSlot {
                record: TaskRecord::queued(id, name.into(), priority),
                enqueued: Instant::now(),
                started: None,
                state,
                abort: None,
                result: None,
            },
        );
        lock(&self.shared.counters).submitted += 1;

        let job: BoxedJob = Box::pin(async move {
            job.await
                .map(|value| Box::new(value) as Box<dyn Any + Send>)
                .map_err(|err| err.to_string())
        });
        let tier = self.shared.tier(priority);
        lock(&tier.queue).push_back(QueuedTask { id, job });
        tier.ready.notify_one();
        Ok(id)
    }

    /// Waits for `id` to finish and takes its result. A timeout leaves the task running.
    pub async fn await_task<T: 'static>(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<T, SchedulerError> {
        let mut state = lock(&self.shared.tasks)
            .get(&id)
            .map(|slot| slot.state.subscribe())
            .ok_or(SchedulerError::NotFound(id))?;

        let finished = async {
            state
                .wait_for(TaskState::is_terminal)
                .await
                .map(|_| ())
                .map_err(|_| SchedulerError::NotFound(id))
        };
        match timeout {
            Some(after) => tokio::time::timeout(after, finished)
                .await
                .map_err(|_| SchedulerError::Timeout { id, after })??,
            None => finished.await?,
        }

        let value = {
            let mut tasks = lock(&self.shared.tasks);
            let slot = tasks.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
            match &slot.record.state {
                TaskState::Succeeded => {
                    slot.result.take().ok_or(SchedulerError::ResultTaken(id))?
                }
                TaskState::Failed(message) => {
                    return Err(SchedulerError::Failed {
                        id,
                        message: message.clone(),
                    })
                }
                TaskState::Cancelled => return Err(SchedulerError::Cancelled(id)),
                TaskState::Queued | TaskState::Running => {
                    return Err(SchedulerError::NotFound(id))
                }
            }
        };
        self.shared.retain(id);
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| SchedulerError::TypeMismatch(id))
    }

    /// Cancels a queued or running task. Finished tasks are left alone and return false.
    pub fn cancel(&self, id: TaskId) -> bool {
        let was_queued = {
            let mut tasks = lock(&self.shared.tasks);
            let Some(slot) = tasks.get_mut(&id) else {
                return false;
            };
            let was_queued = match slot.record.state {
                TaskState::Queued => true,
                TaskState::Running => {
                    if let Some(abort) = &slot.abort {
                        abort.abort();
                    }
                    false
                }
                _ => return false,
            };
            slot.transition(TaskState::Cancelled);
            was_queued
        };
        lock(&self.shared.counters).cancelled += 1;
        if was_queued {
            self.shared.retain(id);
        }
        debug!(task = %id, "task cancelled");
        true
    }

    pub fn record(&self, id: TaskId) -> Option<TaskRecord> {
        lock(&self.shared.tasks)
            .get(&id)
            .map(|slot| slot.record.clone())
    }

    pub fn stats(&self) -> ConcurrencyStats {
        let mut queued: BTreeMap<TaskPriority, usize> =
            TaskPriority::ALL.iter().map(|priority| (*priority, 0)).collect();
        for slot in lock(&self.shared.tasks).values() {
            if slot.record.state == TaskState::Queued {
                *queued.entry(slot.record.priority).or_default() += 1;
            }
        }
        let workers = TaskPriority::ALL
            .iter()
            .map(|priority| (*priority, self.shared.config.workers_for(*priority)))
            .collect();
        let (average_execution_ms, average_queue_ms, metrics_samples) = {
            let metrics = lock(&self.shared.metrics);
            (
                metrics.average_execution_ms(),
                metrics.average_queue_ms(),
                metrics.len(),
            )
        };
        let counters = lock(&self.shared.counters);
        ConcurrencyStats {
            running: self.is_running(),
            max_concurrent_tasks: self.shared.capacity(),
            workers,
            total_submitted: counters.submitted,
            active: self.shared.in_flight.load(Ordering::Acquire),
            queued,
            completed: counters.completed,
            failed: counters.failed,
            cancelled: counters.cancelled,
            average_execution_ms,
            average_queue_ms,
            peak_concurrency: self.shared.peak.load(Ordering::Acquire),
            metrics_samples,
        }
    }

    /// Runs `job` once per item and collects results in input order.
    ///
    /// Fails only when nothing could be submitted. Items still unfinished at `deadline` are
    /// cancelled and reported as [`SchedulerError::Timeout`]; finished ones are kept.
    pub async fn process_batch<I, F, Fut, T, E>(
        &self,
        name: &str,
        items: I,
        priority: TaskPriority,
        deadline: Option<Instant>,
        job: F,
    ) -> Result<Vec<Result<T, SchedulerError>>, SchedulerError>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        let mut ids = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match self.submit(format!("{name}#{index}"), priority, job(item)) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    for id in &ids {
                        self.cancel(*id);
                    }
                    return Err(err);
                }
            }
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let timeout = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            let result = self.await_task::<T>(id, timeout).await;
            if let Err(SchedulerError::Timeout { .. }) = &result {
                if !self.cancel(id) {
                    self.shared.discard_result(id);
                }
            }
            results.push(result);
        }
        Ok(results)
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        for worker in lock(&self.workers).drain(..) {
            worker.abort();
        }
    }
}

async fn worker_loop(shared: Arc<SchedulerShared>, priority: TaskPriority) {
    let tier = shared.tier(priority);
    loop {
        let next = lock(&tier.queue).pop_front();
        let Some(task) = next else {
            tier.ready.notified().await;
            continue;
        };

        if lock(&shared.tasks)
            .get(&task.id)
            .map_or(true, |slot| slot.record.state != TaskState::Queued)
        {
            continue;
        }

        if !shared.try_reserve() {
            lock(&tier.queue).push_front(task);
            tokio::time::sleep(shared.config.requeue_backoff).await;
            continue;
        }

        let QueuedTask { id, job } = task;
        if !shared.mark_running(id) {
            shared.release();
            continue;
        }
        let handle = tokio::spawn(job);
        shared.attach_abort(id, handle.abort_handle());
        let outcome = handle.await;
        shared.release();
        shared.finish(id, outcome);
    }
}
