//! In-memory job queue.
//!
//! - FIFO admission, at most `max_concurrent` jobs in `Processing`
//! - a job that waits longer than `wait_timeout` is timed out without running
//! - a running job is abandoned (not aborted) at `job_timeout`; its late
//!   result is discarded
//! - every transition is published as a `JobEvent`
//!
//! Lock discipline: the state lock is never held across an await on the
//! delegate. Events are built under the lock and sent after it is released.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, broadcast};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, Span, debug, info, info_span, warn};

use super::{QueueConfig, QueueStats};
use crate::background::{BackgroundTask, shutdown_requested};
use crate::domain::{
    JobEvent, JobEventKind, JobId, JobRecord, JobState, ModelTemplate, NewJob, TaskId,
    TimeoutPhase,
};
use crate::error::{ExecutionError, QueueError};
use crate::ports::{Clock, ExecutionDelegate, IdGenerator, SystemClock, UlidGenerator};

struct QueueState {
    /// All known jobs, live and terminal, until cleanup drops them.
    jobs: HashMap<JobId, JobRecord>,

    /// Pending job ids in admission order.
    pending: VecDeque<JobId>,

    /// Task id -> its live (pending or processing) job.
    live_tasks: HashMap<TaskId, JobId>,

    /// Jobs currently in `Processing`.
    processing: usize,

    /// Cleared on shutdown: no enqueue, no admission.
    accepting: bool,
}

/// A job taken out of `Pending`, ready to hand to the delegate.
struct Admission {
    id: JobId,
    payload: serde_json::Value,
    template: Arc<ModelTemplate>,
    deadline: Instant,
}

enum Outcome {
    Completed(serde_json::Value),
    Failed(String),
    TimedOut,
}

pub struct JobQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Arc<Notify>,
    events: broadcast::Sender<JobEvent>,
    delegate: Arc<dyn ExecutionDelegate>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    maintenance: OnceLock<BackgroundTask>,
    span: Span,
}

impl JobQueue {
    pub fn new(config: QueueConfig, delegate: Arc<dyn ExecutionDelegate>) -> Self {
        Self::with_parts(
            config,
            delegate,
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
            info_span!("job_queue"),
        )
    }

    pub fn with_parts(
        config: QueueConfig,
        delegate: Arc<dyn ExecutionDelegate>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        span: Span,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            state: Mutex::new(QueueState {
                jobs: HashMap::new(),
                pending: VecDeque::new(),
                live_tasks: HashMap::new(),
                processing: 0,
                accepting: true,
            }),
            notify: Arc::new(Notify::new()),
            events,
            delegate,
            ids,
            clock,
            maintenance: OnceLock::new(),
            span,
        }
    }

    /// `new` + `start_maintenance`.
    pub fn start(config: QueueConfig, delegate: Arc<dyn ExecutionDelegate>) -> Arc<Self> {
        let queue = Arc::new(Self::new(config, delegate));
        queue.start_maintenance();
        queue
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Spawn the loop that expires waiting jobs on time and periodically
    /// drops old terminal jobs. Calling it twice is a no-op.
    ///
    /// Without it, wait timeouts are still enforced, but only when something
    /// else (an enqueue or a finishing job) triggers admission.
    pub fn start_maintenance(self: &Arc<Self>) {
        self.maintenance.get_or_init(|| {
            let weak = Arc::downgrade(self);
            let notify = Arc::clone(&self.notify);
            let every = self.config.cleanup_interval;
            let retention = self.config.retention;
            BackgroundTask::spawn("job_queue_maintenance", self.span.clone(), move |rx| {
                maintenance_loop(weak, notify, every, retention, rx)
            })
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Add a job at the back of the queue.
    ///
    /// Fails if the queue is shutting down or the task already has a live job.
    pub async fn enqueue(self: &Arc<Self>, job: NewJob) -> Result<JobId, QueueError> {
        let mut events = Vec::new();
        let (id, admitted) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if !state.accepting {
                return Err(QueueError::ShuttingDown);
            }
            if state.live_tasks.contains_key(&job.task_id) {
                return Err(QueueError::DuplicateTask(job.task_id));
            }

            let id = self.ids.generate_job_id();
            let record = JobRecord::new(id, job, Instant::now());
            info!(
                parent: &self.span,
                job_id = %id,
                task_id = %record.task_id,
                attempt = record.attempts,
                "job enqueued"
            );
            events.push(self.event(&record, JobEventKind::Enqueued));
            state.live_tasks.insert(record.task_id.clone(), id);
            state.pending.push_back(id);
            state.jobs.insert(id, record);

            let admitted = self.admit(state, &mut events);
            (id, admitted)
        };
        self.dispatch(events, admitted);
        self.notify.notify_one();
        Ok(id)
    }

    /// Cancel a pending job. Running and finished jobs cannot be cancelled.
    pub async fn cancel(&self, id: JobId) -> Result<(), QueueError> {
        let event = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let record = state.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            if record.state != JobState::Pending {
                return Err(QueueError::NotCancellable {
                    job_id: id,
                    state: record.state,
                });
            }
            record.cancel(Instant::now());
            state.pending.retain(|pending| *pending != id);
            state.live_tasks.remove(&record.task_id);
            info!(parent: &self.span, job_id = %id, "job cancelled");
            self.event(record, JobEventKind::Cancelled)
        };
        self.publish(event);
        self.notify.notify_one();
        Ok(())
    }

    pub async fn get_queue_stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        let mut stats = QueueStats {
            total: state.jobs.len(),
            ..QueueStats::default()
        };
        for record in state.jobs.values() {
            match record.state {
                JobState::Pending => stats.pending += 1,
                JobState::Processing => stats.processing += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
                JobState::TimedOut => {
                    stats.failed += 1;
                    stats.timed_out += 1;
                }
                JobState::Cancelled => {
                    stats.failed += 1;
                    stats.cancelled += 1;
                }
            }
        }
        stats
    }

    /// Snapshot of one job.
    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.state.lock().await.jobs.get(&id).cloned()
    }

    /// Whether `task_id` currently has a pending or processing job.
    pub async fn is_live(&self, task_id: &TaskId) -> bool {
        self.state.lock().await.live_tasks.contains_key(task_id)
    }

    /// Drop terminal jobs that finished more than `older_than` ago.
    /// Live jobs are never removed. Returns how many were dropped.
    pub async fn clear_old_jobs(&self, older_than: Duration) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let before = state.jobs.len();
        state.jobs.retain(|_, record| {
            !record
                .finished_at
                .is_some_and(|at| now.saturating_duration_since(at) > older_than)
        });
        before - state.jobs.len()
    }

    /// Stop admitting and accepting jobs, then stop the maintenance loop.
    ///
    /// Running jobs finish (or time out) on their own. Pending jobs stay
    /// pending. Safe to call more than once.
    pub async fn shutdown(&self) {
        let (was_accepting, pending, processing) = {
            let mut state = self.state.lock().await;
            let was = std::mem::replace(&mut state.accepting, false);
            (was, state.pending.len(), state.processing)
        };
        if was_accepting {
            info!(parent: &self.span, pending, processing, "job queue shutting down");
        }
        if let Some(maintenance) = self.maintenance.get() {
            maintenance.shutdown().await;
        }
    }

    /// Expire overdue waits and admit what fits.
    async fn pump(self: &Arc<Self>) {
        let mut events = Vec::new();
        let admitted = {
            let mut guard = self.state.lock().await;
            self.admit(&mut guard, &mut events)
        };
        self.dispatch(events, admitted);
    }

    /// Earliest instant at which a pending job's wait expires.
    async fn next_wait_deadline(&self) -> Option<Instant> {
        let state = self.state.lock().await;
        state
            .pending
            .front()
            .and_then(|id| state.jobs.get(id))
            .map(|record| record.enqueued_at + self.config.wait_timeout)
    }

    fn admit(&self, state: &mut QueueState, events: &mut Vec<JobEvent>) -> Vec<Admission> {
        let now = Instant::now();
        let wait_timeout = self.config.wait_timeout;

        let QueueState {
            jobs,
            pending,
            live_tasks,
            ..
        } = &mut *state;
        pending.retain(|id| {
            let Some(record) = jobs.get_mut(id) else {
                return false;
            };
            if record.waited(now) < wait_timeout {
                return true;
            }
            record.time_out(now, TimeoutPhase::Wait);
            live_tasks.remove(&record.task_id);
            warn!(
                parent: &self.span,
                job_id = %id,
                task_id = %record.task_id,
                waited_ms = record.waited(now).as_millis() as u64,
                "job timed out waiting for a slot"
            );
            events.push(self.event(record, JobEventKind::TimedOut {
                phase: TimeoutPhase::Wait,
            }));
            false
        });

        let mut admitted = Vec::new();
        while state.accepting && state.processing < self.config.max_concurrent {
            let Some(id) = state.pending.pop_front() else {
                break;
            };
            let Some(record) = state.jobs.get_mut(&id) else {
                continue;
            };
            if record.state != JobState::Pending {
                continue;
            }
            record.start(now);
            state.processing += 1;
            debug!(
                parent: &self.span,
                job_id = %id,
                processing = state.processing,
                "job started"
            );
            events.push(self.event(record, JobEventKind::Started));
            admitted.push(Admission {
                id,
                payload: record.payload.clone(),
                template: Arc::clone(&record.template),
                deadline: now + self.config.job_timeout,
            });
        }
        admitted
    }

    fn dispatch(self: &Arc<Self>, events: Vec<JobEvent>, admitted: Vec<Admission>) {
        for event in events {
            self.publish(event);
        }
        for admission in admitted {
            let queue = Arc::clone(self);
            let span = info_span!(parent: &self.span, "job", job_id = %admission.id);
            tokio::spawn(
                async move {
                    let id = admission.id;
                    let outcome = queue.execute(admission).await;
                    queue.finish(id, outcome).await;
                }
                .instrument(span),
            );
        }
    }

    async fn execute(&self, admission: Admission) -> Outcome {
        let delegate = Arc::clone(&self.delegate);
        let Admission {
            payload,
            template,
            deadline,
            ..
        } = admission;
        // own task so a hung delegate can be left behind at the deadline
        let mut handle =
            tokio::spawn(async move { delegate.execute(&payload, &template).await });

        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Ok(result))) => Outcome::Completed(result),
            Ok(Ok(Err(e))) => Outcome::Failed(e.to_string()),
            Ok(Err(join_error)) => {
                Outcome::Failed(ExecutionError::Aborted(join_error.to_string()).to_string())
            }
            Err(_elapsed) => Outcome::TimedOut,
        }
    }

    async fn finish(self: &Arc<Self>, id: JobId, outcome: Outcome) {
        let mut events = Vec::new();
        let admitted = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let now = Instant::now();
            let Some(record) = state.jobs.get_mut(&id) else {
                return;
            };
            if record.state != JobState::Processing {
                return;
            }

            let elapsed_ms = record
                .started_at
                .map_or(0, |at| now.saturating_duration_since(at).as_millis() as u64);
            let kind = match outcome {
                Outcome::Completed(result) => {
                    info!(parent: &self.span, job_id = %id, elapsed_ms, "job completed");
                    record.complete(now, result.clone());
                    JobEventKind::Completed { result }
                }
                Outcome::Failed(error) => {
                    warn!(parent: &self.span, job_id = %id, elapsed_ms, %error, "job failed");
                    record.fail(now, error.clone());
                    JobEventKind::Failed { error }
                }
                Outcome::TimedOut => {
                    warn!(
                        parent: &self.span,
                        job_id = %id,
                        timeout_ms = self.config.job_timeout.as_millis() as u64,
                        "job exceeded its execution timeout; late result will be discarded"
                    );
                    record.time_out(now, TimeoutPhase::Execution);
                    JobEventKind::TimedOut {
                        phase: TimeoutPhase::Execution,
                    }
                }
            };
            events.push(self.event(record, kind));
            state.live_tasks.remove(&record.task_id);
            state.processing = state.processing.saturating_sub(1);

            self.admit(state, &mut events)
        };
        self.dispatch(events, admitted);
        self.notify.notify_one();
    }

    fn event(&self, record: &JobRecord, kind: JobEventKind) -> JobEvent {
        JobEvent::from_record(record, kind, self.clock.now())
    }

    fn publish(&self, event: JobEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if let Some(maintenance) = self.maintenance.get() {
            maintenance.request_shutdown();
        }
    }
}

async fn maintenance_loop(
    queue: Weak<JobQueue>,
    notify: Arc<Notify>,
    cleanup_every: Duration,
    retention: Duration,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let mut cleanup = tokio::time::interval_at(Instant::now() + cleanup_every, cleanup_every);
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // hold the queue only while looking at it, never across the select
        let deadline = match queue.upgrade() {
            Some(queue) => queue.next_wait_deadline().await,
            None => break,
        };
        let wait_expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            _ = notify.notified() => {}
            _ = wait_expiry => {
                let Some(queue) = queue.upgrade() else { break };
                queue.pump().await;
            }
            _ = cleanup.tick() => {
                let Some(queue) = queue.upgrade() else { break };
                let removed = queue.clear_old_jobs(retention).await;
                if removed > 0 {
                    debug!(removed, "cleared old jobs");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedDelegate, new_job, task_id};
    use serde_json::json;
    use tokio::time::sleep;

    fn config(max_concurrent: usize) -> QueueConfig {
        QueueConfig {
            max_concurrent,
            ..QueueConfig::default()
        }
    }

    fn queue(config: QueueConfig, delegate: &Arc<ScriptedDelegate>) -> Arc<JobQueue> {
        JobQueue::start(config, Arc::clone(delegate) as Arc<dyn ExecutionDelegate>)
    }

    async fn assert_consistent(queue: &JobQueue) -> QueueStats {
        let stats = queue.get_queue_stats().await;
        assert!(stats.is_consistent(), "inconsistent stats: {stats:?}");
        stats
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_job_starts_when_first_finishes() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(3), &delegate);

        let mut ids = Vec::new();
        for (n, sleep_ms) in [(1, 10), (2, 1_000), (3, 1_000), (4, 1_000), (5, 1_000)] {
            let id = queue
                .enqueue(new_job(task_id(n), json!({ "sleep_ms": sleep_ms })))
                .await
                .unwrap();
            ids.push(id);
        }

        let stats = assert_consistent(&queue).await;
        assert_eq!(stats.processing, 3);
        assert_eq!(stats.pending, 2);

        sleep(Duration::from_millis(20)).await;

        let state = |i: usize| {
            let queue = Arc::clone(&queue);
            let id = ids[i];
            async move { queue.get(id).await.unwrap().state }
        };
        assert_eq!(state(0).await, JobState::Completed);
        assert_eq!(state(1).await, JobState::Processing);
        assert_eq!(state(3).await, JobState::Processing);
        assert_eq!(state(4).await, JobState::Pending);

        let stats = assert_consistent(&queue).await;
        assert_eq!(stats.processing, 3);
        assert_eq!(stats.completed, 1);
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_never_exceeds_concurrency_limit() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(3), &delegate);

        for n in 0..20 {
            queue
                .enqueue(new_job(task_id(n), json!({ "sleep_ms": 50 })))
                .await
                .unwrap();
            assert!(queue.get_queue_stats().await.processing <= 3);
        }

        sleep(Duration::from_secs(2)).await;

        let stats = assert_consistent(&queue).await;
        assert_eq!(stats.completed, 20);
        assert_eq!(delegate.peak(), 3);
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_too_long_times_out_without_running() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(
            QueueConfig {
                max_concurrent: 1,
                wait_timeout: Duration::from_millis(100),
                ..QueueConfig::default()
            },
            &delegate,
        );
        let mut events = queue.subscribe();

        queue
            .enqueue(new_job(task_id(1), json!({ "sleep_ms": 500 })))
            .await
            .unwrap();
        let starved = queue
            .enqueue(new_job(task_id(2), json!({ "sleep_ms": 10 })))
            .await
            .unwrap();

        sleep(Duration::from_millis(150)).await;
        let record = queue.get(starved).await.unwrap();
        assert_eq!(record.state, JobState::TimedOut);
        assert_eq!(record.timeout, Some(TimeoutPhase::Wait));
        assert!(!queue.is_live(&task_id(2)).await);

        sleep(Duration::from_millis(500)).await;
        let record = queue.get(starved).await.unwrap();
        assert!(record.started_at.is_none());
        assert_eq!(delegate.calls(), 1);

        let mut starved_events = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.job_id == starved {
                starved_events.push(event.kind);
            }
        }
        assert_eq!(
            starved_events,
            vec![
                JobEventKind::Enqueued,
                JobEventKind::TimedOut {
                    phase: TimeoutPhase::Wait
                }
            ]
        );
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_after_execution_timeout_is_discarded() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(
            QueueConfig {
                max_concurrent: 1,
                job_timeout: Duration::from_millis(100),
                ..QueueConfig::default()
            },
            &delegate,
        );

        let slow = queue
            .enqueue(new_job(task_id(1), json!({ "sleep_ms": 500 })))
            .await
            .unwrap();
        let next = queue
            .enqueue(new_job(task_id(2), json!({ "sleep_ms": 10 })))
            .await
            .unwrap();

        sleep(Duration::from_millis(150)).await;
        let record = queue.get(slow).await.unwrap();
        assert_eq!(record.state, JobState::TimedOut);
        assert_eq!(record.timeout, Some(TimeoutPhase::Execution));
        // the slot was released even though the delegate is still running
        assert_eq!(queue.get(next).await.unwrap().state, JobState::Completed);

        sleep(Duration::from_millis(500)).await;
        let record = queue.get(slow).await.unwrap();
        assert_eq!(record.state, JobState::TimedOut);
        assert!(record.result.is_none());
        assert_consistent(&queue).await;
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delegate_error_marks_job_failed() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(3), &delegate);

        let id = queue
            .enqueue(new_job(task_id(1), json!({ "fail": "out of memory" })))
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;

        let record = queue.get(id).await.unwrap();
        assert_eq!(record.state, JobState::Failed);
        assert!(record.error.unwrap().contains("out of memory"));

        let stats = assert_consistent(&queue).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.timed_out, 0);
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn only_pending_jobs_can_be_cancelled() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(1), &delegate);

        let running = queue
            .enqueue(new_job(task_id(1), json!({ "sleep_ms": 100 })))
            .await
            .unwrap();
        let waiting = queue
            .enqueue(new_job(task_id(2), json!({})))
            .await
            .unwrap();

        queue.cancel(waiting).await.unwrap();
        assert_eq!(queue.get(waiting).await.unwrap().state, JobState::Cancelled);
        assert!(matches!(
            queue.cancel(running).await,
            Err(QueueError::NotCancellable {
                state: JobState::Processing,
                ..
            })
        ));
        let unknown = JobId::from_ulid(ulid::Ulid::new());
        assert_eq!(queue.cancel(unknown).await, Err(QueueError::NotFound(unknown)));

        // the task is free again
        queue
            .enqueue(new_job(task_id(2), json!({})))
            .await
            .unwrap();

        let stats = assert_consistent(&queue).await;
        assert_eq!(stats.cancelled, 1);
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_live_task_is_rejected() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(1), &delegate);

        queue
            .enqueue(new_job(task_id(9), json!({ "sleep_ms": 10 })))
            .await
            .unwrap();
        assert_eq!(
            queue.enqueue(new_job(task_id(9), json!({}))).await,
            Err(QueueError::DuplicateTask(task_id(9)))
        );

        sleep(Duration::from_millis(20)).await;
        assert!(queue.enqueue(new_job(task_id(9), json!({}))).await.is_ok());
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn clear_old_jobs_keeps_live_and_recent_jobs() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(1), &delegate);

        let done = queue
            .enqueue(new_job(task_id(1), json!({})))
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;
        let running = queue
            .enqueue(new_job(task_id(2), json!({ "sleep_ms": 10_000 })))
            .await
            .unwrap();
        let waiting = queue
            .enqueue(new_job(task_id(3), json!({})))
            .await
            .unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.clear_old_jobs(Duration::from_secs(1)).await, 0);
        assert_eq!(queue.clear_old_jobs(Duration::from_millis(100)).await, 1);

        assert!(queue.get(done).await.is_none());
        assert!(queue.get(running).await.is_some());
        assert!(queue.get(waiting).await.is_some());
        assert_consistent(&queue).await;
        queue.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent_and_rejects_new_jobs() {
        let delegate = Arc::new(ScriptedDelegate::default());
        let queue = queue(config(1), &delegate);

        let running = queue
            .enqueue(new_job(task_id(1), json!({ "sleep_ms": 50 })))
            .await
            .unwrap();
        let waiting = queue
            .enqueue(new_job(task_id(2), json!({})))
            .await
            .unwrap();

        queue.shutdown().await;
        queue.shutdown().await;

        assert_eq!(
            queue.enqueue(new_job(task_id(3), json!({}))).await,
            Err(QueueError::ShuttingDown)
        );

        // in-flight work still finishes, nothing new is admitted
        sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.get(running).await.unwrap().state, JobState::Completed);
        assert_eq!(queue.get(waiting).await.unwrap().state, JobState::Pending);
    }
}
