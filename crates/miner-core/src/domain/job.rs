//! Job record and state machine.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::ids::{JobId, ModelId, TaskId};
use super::model::ModelTemplate;

/// Job state.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed (delegate error)
/// - Pending -> Processing -> TimedOut (execution deadline)
/// - Pending -> TimedOut (wait deadline, never executed)
/// - Pending -> Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }

    /// Pending or processing: the job still holds its task id.
    pub fn is_live(self) -> bool {
        matches!(self, JobState::Pending | JobState::Processing)
    }
}

/// Which clock fired for a timed-out job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPhase {
    /// Waited in `Pending` longer than the wait timeout.
    Wait,
    /// Ran in `Processing` longer than the job timeout.
    Execution,
}

/// What the orchestrator hands to the queue.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub task_id: TaskId,
    pub model_id: ModelId,

    /// Hydrated execution input.
    pub payload: serde_json::Value,

    pub template: Arc<ModelTemplate>,

    /// 1-based attempt number for this task.
    pub attempt: u32,
}

/// Queue-side record of a job.
///
/// All transitions go through the methods below so that `finished_at` is set
/// exactly when the job reaches a terminal state.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub payload: serde_json::Value,
    pub template: Arc<ModelTemplate>,
    pub state: JobState,
    pub attempts: u32,

    pub enqueued_at: Instant,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,

    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timeout: Option<TimeoutPhase>,
}

impl JobRecord {
    pub fn new(id: JobId, job: NewJob, now: Instant) -> Self {
        Self {
            id,
            task_id: job.task_id,
            model_id: job.model_id,
            payload: job.payload,
            template: job.template,
            state: JobState::Pending,
            attempts: job.attempt,
            enqueued_at: now,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            timeout: None,
        }
    }

    /// Time spent waiting since enqueue.
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }

    pub fn start(&mut self, now: Instant) {
        self.state = JobState::Processing;
        self.started_at = Some(now);
    }

    pub fn complete(&mut self, now: Instant, result: serde_json::Value) {
        self.result = Some(result);
        self.finish(JobState::Completed, now);
    }

    pub fn fail(&mut self, now: Instant, error: String) {
        self.error = Some(error);
        self.finish(JobState::Failed, now);
    }

    pub fn time_out(&mut self, now: Instant, phase: TimeoutPhase) {
        self.timeout = Some(phase);
        self.finish(JobState::TimedOut, now);
    }

    pub fn cancel(&mut self, now: Instant) {
        self.finish(JobState::Cancelled, now);
    }

    fn finish(&mut self, state: JobState, now: Instant) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.finished_at = Some(now);
    }
}
