//! Job lifecycle events.
//!
//! The queue publishes one event per state transition on a broadcast channel.
//! Events carry enough identity (job, task, model, attempt) that a listener
//! never has to query the queue to act on them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{JobId, ModelId, TaskId};
use super::job::{JobRecord, JobState, TimeoutPhase};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEventKind {
    Enqueued,
    Started,
    Completed { result: serde_json::Value },
    Failed { error: String },
    TimedOut { phase: TimeoutPhase },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub attempt: u32,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

impl JobEvent {
    pub fn from_record(record: &JobRecord, kind: JobEventKind, at: DateTime<Utc>) -> Self {
        Self {
            job_id: record.id,
            task_id: record.task_id.clone(),
            model_id: record.model_id.clone(),
            attempt: record.attempts,
            at,
            kind,
        }
    }

    /// The event a finished record would have published; `None` while the
    /// job is still live.
    pub fn terminal(record: &JobRecord, at: DateTime<Utc>) -> Option<Self> {
        let kind = match record.state {
            JobState::Pending | JobState::Processing => return None,
            JobState::Completed => JobEventKind::Completed {
                result: record.result.clone().unwrap_or_default(),
            },
            JobState::Failed => JobEventKind::Failed {
                error: record.error.clone().unwrap_or_default(),
            },
            JobState::TimedOut => JobEventKind::TimedOut {
                phase: record.timeout.unwrap_or(TimeoutPhase::Execution),
            },
            JobState::Cancelled => JobEventKind::Cancelled,
        };
        Some(Self::from_record(record, kind, at))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, JobEventKind::Enqueued | JobEventKind::Started)
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            JobEventKind::Enqueued => "enqueued",
            JobEventKind::Started => "started",
            JobEventKind::Completed { .. } => "completed",
            JobEventKind::Failed { .. } => "failed",
            JobEventKind::TimedOut { .. } => "timed_out",
            JobEventKind::Cancelled => "cancelled",
        }
    }
}
