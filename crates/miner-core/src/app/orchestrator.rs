//! Orchestrator - turns discovered chain tasks into queued jobs.
//!
//! For each discovered task: rate limit, model lookup, input hydration, then
//! enqueue. Job events drive the rest: completed results go to the
//! submitter, failures and timeouts are retried with backoff until the
//! attempt budget runs out.
//!
//! Settled tasks (submitted, unsupported, abandoned) are remembered for
//! `retention` so that rediscovering them is a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::background::{BackgroundTask, shutdown_requested};
use crate::domain::{JobEvent, JobEventKind, JobId, NewJob, Solution, SubmittedTask, TaskId};
use crate::ports::ResultSubmitter;
use crate::queue::{DEFAULT_JOB_TIMEOUT, JobQueue, RetryPolicy};
use crate::rate_limit::RateLimiter;
use crate::registry::ModelRegistry;

/// How often `shutdown` checks whether running jobs have finished.
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    pub min_fee: u128,

    /// How long a settled task id is remembered.
    pub retention: Duration,

    /// Longest `shutdown` waits for running jobs to report.
    pub drain_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            min_fee: 0,
            retention: Duration::from_secs(3600),
            drain_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

/// What happened to a discovered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Enqueued(JobId),
    /// Rate limited, or the queue refused it for now; retried on `tick`.
    Deferred,
    /// Already tracked, or settled recently.
    Duplicate,
    /// Unknown model or input the template rejects.
    Unsupported,
    BelowMinFee,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    /// Tasks waiting for the rate limiter or a retry backoff.
    pub deferred: usize,
    /// Tasks with a live job or awaiting retry.
    pub tracked: usize,
    /// Remembered unsupported tasks.
    pub unsupported: usize,
    /// Solutions handed to the submitter since start.
    pub submitted: usize,
    /// Remembered abandoned tasks.
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Between the rate limiter and the queue.
    Admitting,
    Deferred { not_before: Instant },
    Queued(JobId),
}

struct Tracked {
    task: SubmittedTask,
    /// Attempts started so far.
    attempts: u32,
    stage: Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Submitted,
    Unsupported,
    Abandoned,
}

#[derive(Default)]
struct Tracking {
    tracked: HashMap<TaskId, Tracked>,
    deferred: VecDeque<TaskId>,
    settled: HashMap<TaskId, (Settled, Instant)>,
    submitted: usize,
}

impl Tracking {
    fn settle(&mut self, task_id: &TaskId, how: Settled) {
        self.tracked.remove(task_id);
        self.settled.insert(task_id.clone(), (how, Instant::now()));
    }

    fn count_settled(&self, how: Settled) -> usize {
        self.settled.values().filter(|(s, _)| *s == how).count()
    }
}

pub struct Orchestrator {
    queue: Arc<JobQueue>,
    registry: Arc<ModelRegistry>,
    limiter: Arc<RateLimiter>,
    submitter: Arc<dyn ResultSubmitter>,
    config: OrchestratorConfig,
    tracking: Mutex<Tracking>,
    submissions: Mutex<JoinSet<()>>,
    event_loop: OnceLock<BackgroundTask>,
    span: Span,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<ModelRegistry>,
        limiter: Arc<RateLimiter>,
        submitter: Arc<dyn ResultSubmitter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            limiter,
            submitter,
            config,
            tracking: Mutex::new(Tracking::default()),
            submissions: Mutex::new(JoinSet::new()),
            event_loop: OnceLock::new(),
            span: info_span!("orchestrator"),
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Handle one task seen on chain.
    pub async fn on_task_discovered(&self, task: SubmittedTask) -> Discovery {
        let task_id = task.task_id.clone();
        {
            let mut tracking = self.lock();
            if tracking.tracked.contains_key(&task_id) || tracking.settled.contains_key(&task_id)
            {
                debug!(parent: &self.span, %task_id, "task already known");
                return Discovery::Duplicate;
            }
            if task.fee < self.config.min_fee {
                debug!(
                    parent: &self.span,
                    %task_id,
                    fee = %task.fee,
                    min_fee = %self.config.min_fee,
                    "task fee below minimum"
                );
                return Discovery::BelowMinFee;
            }
            info!(
                parent: &self.span,
                %task_id,
                model_id = %task.model_id,
                owner = %task.owner,
                "task discovered"
            );
            tracking.tracked.insert(
                task_id.clone(),
                Tracked {
                    task,
                    attempts: 0,
                    stage: Stage::Admitting,
                },
            );
        }

        let outcome = self.admit(&task_id).await;
        if outcome == Discovery::Deferred {
            self.lock().deferred.push_back(task_id);
        }
        outcome
    }

    /// Re-attempt deferred tasks whose backoff has passed, oldest first.
    /// Stops at the first task the rate limiter turns away. Returns how many
    /// were enqueued.
    ///
    /// Also forgets settled tasks older than `retention`.
    pub async fn tick(&self) -> usize {
        let due = {
            let mut guard = self.lock();
            let tracking = &mut *guard;
            let now = Instant::now();

            let before = tracking.settled.len();
            let retention = self.config.retention;
            tracking
                .settled
                .retain(|_, (_, at)| now.saturating_duration_since(*at) < retention);
            let forgotten = before - tracking.settled.len();
            if forgotten > 0 {
                debug!(parent: &self.span, forgotten, "forgot settled tasks");
            }

            let mut due = Vec::new();
            let mut waiting = VecDeque::with_capacity(tracking.deferred.len());
            while let Some(task_id) = tracking.deferred.pop_front() {
                match tracking.tracked.get(&task_id).map(|t| t.stage) {
                    Some(Stage::Deferred { not_before }) if not_before <= now => {
                        due.push(task_id)
                    }
                    Some(Stage::Deferred { .. }) => waiting.push_back(task_id),
                    // finished or forgotten in the meantime
                    _ => {}
                }
            }
            tracking.deferred = waiting;
            due
        };

        let mut enqueued = 0;
        for (i, task_id) in due.iter().enumerate() {
            match self.admit(task_id).await {
                Discovery::Enqueued(_) => enqueued += 1,
                Discovery::Deferred => {
                    let mut tracking = self.lock();
                    for rest in due[i..].iter().rev() {
                        tracking.deferred.push_front(rest.clone());
                    }
                    break;
                }
                _ => {}
            }
        }
        enqueued
    }

    /// Rate limit, resolve the model, hydrate the input, enqueue.
    ///
    /// On `Deferred` the caller decides where the task goes in the deferred
    /// list.
    async fn admit(&self, task_id: &TaskId) -> Discovery {
        let job = {
            let mut guard = self.lock();
            let tracking = &mut *guard;
            let Some(entry) = tracking.tracked.get_mut(task_id) else {
                return Discovery::Duplicate;
            };

            if !self.limiter.try_acquire() {
                debug!(parent: &self.span, %task_id, "rate limited, deferring task");
                entry.stage = Stage::Deferred {
                    not_before: Instant::now(),
                };
                return Discovery::Deferred;
            }

            let model_id = entry.task.model_id.clone();
            let Some(template) = self.registry.lookup(&model_id) else {
                info!(parent: &self.span, %task_id, %model_id, "model not supported, skipping task");
                tracking.settle(task_id, Settled::Unsupported);
                return Discovery::Unsupported;
            };

            let payload = match template.hydrate_input(&entry.task.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(parent: &self.span, %task_id, %model_id, error = %e, "invalid task input, skipping task");
                    tracking.settle(task_id, Settled::Unsupported);
                    return Discovery::Unsupported;
                }
            };

            entry.attempts += 1;
            entry.stage = Stage::Admitting;
            NewJob {
                task_id: task_id.clone(),
                model_id,
                payload,
                template,
                attempt: entry.attempts,
            }
        };
        let attempt = job.attempt;

        match self.queue.enqueue(job).await {
            Ok(job_id) => {
                let mut tracking = self.lock();
                // the job may already have finished and been handled
                if let Some(entry) = tracking.tracked.get_mut(task_id)
                    && entry.attempts == attempt
                    && entry.stage == Stage::Admitting
                {
                    entry.stage = Stage::Queued(job_id);
                }
                Discovery::Enqueued(job_id)
            }
            Err(e) => {
                warn!(parent: &self.span, %task_id, error = %e, "queue refused task, deferring");
                let mut tracking = self.lock();
                if let Some(entry) = tracking.tracked.get_mut(task_id) {
                    entry.attempts -= 1;
                    entry.stage = Stage::Deferred {
                        not_before: Instant::now() + self.config.retry.base_delay,
                    };
                }
                Discovery::Deferred
            }
        }
    }

    /// React to one job lifecycle event.
    ///
    /// Events for a job other than the task's current one are ignored, so
    /// handling the same terminal event twice is harmless.
    pub fn handle_event(&self, event: &JobEvent) {
        let task_id = &event.task_id;
        match &event.kind {
            JobEventKind::Enqueued | JobEventKind::Started => {}

            JobEventKind::Completed { result } => {
                {
                    let mut tracking = self.lock();
                    if !Self::is_current(&tracking, event) {
                        return;
                    }
                    tracking.settle(task_id, Settled::Submitted);
                    tracking.submitted += 1;
                }
                self.forward(Solution {
                    task_id: task_id.clone(),
                    job_id: event.job_id,
                    model_id: event.model_id.clone(),
                    attempt: event.attempt,
                    result: result.clone(),
                });
            }

            JobEventKind::Failed { .. } | JobEventKind::TimedOut { .. } => {
                let reason = match &event.kind {
                    JobEventKind::Failed { error } => error.clone(),
                    JobEventKind::TimedOut { phase } => format!("timed out ({phase:?})"),
                    _ => String::new(),
                };
                let mut guard = self.lock();
                if Self::is_current(&guard, event) {
                    self.retry_or_abandon(&mut guard, task_id, event.job_id, &reason);
                }
            }

            JobEventKind::Cancelled => {
                let mut tracking = self.lock();
                if Self::is_current(&tracking, event) {
                    debug!(parent: &self.span, %task_id, "job cancelled, forgetting task");
                    tracking.tracked.remove(task_id);
                }
            }
        }
    }

    fn is_current(tracking: &Tracking, event: &JobEvent) -> bool {
        tracking
            .tracked
            .get(&event.task_id)
            .is_some_and(|entry| match entry.stage {
                Stage::Queued(job_id) => job_id == event.job_id,
                // enqueue has not reported back yet
                Stage::Admitting => entry.attempts == event.attempt,
                // already handled; waiting for the next attempt
                Stage::Deferred { .. } => false,
            })
    }

    /// Schedule the next attempt after backoff, or give up on the task.
    fn retry_or_abandon(
        &self,
        tracking: &mut Tracking,
        task_id: &TaskId,
        job_id: JobId,
        reason: &str,
    ) {
        let Some(entry) = tracking.tracked.get_mut(task_id) else {
            return;
        };
        if self.config.retry.should_retry(entry.attempts) {
            let delay = self.config.retry.next_delay(entry.attempts);
            warn!(
                parent: &self.span,
                %task_id,
                %job_id,
                attempt = entry.attempts,
                retry_in_ms = delay.as_millis() as u64,
                %reason,
                "job did not complete, will retry"
            );
            entry.stage = Stage::Deferred {
                not_before: Instant::now() + delay,
            };
            tracking.deferred.push_back(task_id.clone());
        } else {
            error!(
                parent: &self.span,
                %task_id,
                %job_id,
                attempts = entry.attempts,
                %reason,
                "task abandoned after exhausting its attempts"
            );
            tracking.settle(task_id, Settled::Abandoned);
        }
    }

    /// Settle queued tasks whose job ended without the event reaching us.
    ///
    /// A job the queue no longer knows (cleaned up before we looked) counts
    /// as a failed attempt. Returns how many tasks were settled.
    pub async fn reconcile(&self) -> usize {
        let queued: Vec<(TaskId, JobId)> = self
            .lock()
            .tracked
            .iter()
            .filter_map(|(task_id, entry)| match entry.stage {
                Stage::Queued(job_id) => Some((task_id.clone(), job_id)),
                _ => None,
            })
            .collect();

        let mut settled = 0;
        for (task_id, job_id) in queued {
            match self.queue.get(job_id).await {
                Some(record) => {
                    if let Some(event) = JobEvent::terminal(&record, Utc::now()) {
                        self.handle_event(&event);
                        settled += 1;
                    }
                }
                None => {
                    let mut guard = self.lock();
                    let still_queued = guard
                        .tracked
                        .get(&task_id)
                        .is_some_and(|entry| entry.stage == Stage::Queued(job_id));
                    if still_queued {
                        self.retry_or_abandon(&mut guard, &task_id, job_id, "job record lost");
                        settled += 1;
                    }
                }
            }
        }
        if settled > 0 {
            info!(parent: &self.span, settled, "reconciled tasks with the queue");
        }
        settled
    }

    /// Submit in the background; failures are logged, not retried here.
    fn forward(&self, solution: Solution) {
        let submitter = Arc::clone(&self.submitter);
        let span = self.span.clone();
        let mut submissions = self
            .submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while submissions.try_join_next().is_some() {}
        submissions.spawn(
            async move {
                let task_id = solution.task_id.clone();
                let job_id = solution.job_id;
                match submitter.submit(solution).await {
                    Ok(()) => info!(%task_id, %job_id, "solution submitted"),
                    Err(e) => error!(%task_id, %job_id, error = %e, "solution submission failed"),
                }
            }
            .instrument(span),
        );
    }

    /// Consume job events until shutdown or until the queue goes away.
    pub async fn run_events(
        &self,
        mut events: broadcast::Receiver<JobEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown_rx) => break,
                received = events.recv() => match received {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(parent: &self.span, skipped, "job event listener lagged; reconciling with the queue");
                        self.reconcile().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Start the event loop. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        self.event_loop.get_or_init(|| {
            // subscribe before spawning so no event slips through
            let events = self.queue.subscribe();
            let this = Arc::clone(self);
            BackgroundTask::spawn("orchestrator_events", self.span.clone(), move |rx| async move {
                this.run_events(events, rx).await;
            })
        });
    }

    /// Let running jobs report (up to `drain_timeout`), stop the event loop,
    /// settle whatever it missed, then wait for in-flight submissions.
    ///
    /// Call it once the queue has stopped admitting. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if let Some(event_loop) = self.event_loop.get() {
            self.drain().await;
            event_loop.shutdown().await;
            self.reconcile().await;
        }
        let mut submissions = std::mem::take(
            &mut *self
                .submissions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while submissions.join_next().await.is_some() {}
    }

    /// Wait until the queue has no job in `Processing`.
    async fn drain(&self) {
        let deadline = Instant::now() + self.config.drain_timeout;
        loop {
            let processing = self.queue.get_queue_stats().await.processing;
            if processing == 0 {
                return;
            }
            if Instant::now() >= deadline {
                warn!(parent: &self.span, processing, "stopping with jobs still running; their results are dropped");
                return;
            }
            debug!(parent: &self.span, processing, "waiting for running jobs");
            tokio::time::sleep_until((Instant::now() + DRAIN_POLL).min(deadline)).await;
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        let tracking = self.lock();
        OrchestratorStats {
            deferred: tracking.deferred.len(),
            tracked: tracking.tracked.len(),
            unsupported: tracking.count_settled(Settled::Unsupported),
            submitted: tracking.submitted,
            abandoned: tracking.count_settled(Settled::Abandoned),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
