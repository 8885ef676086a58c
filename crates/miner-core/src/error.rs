use thiserror::Error;

use crate::domain::{JobId, JobState, TaskId};

/// Errors returned by `JobQueue` operations.
///
/// Per-job failures never show up here; they are job states and events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    #[error("job queue is shutting down")]
    ShuttingDown,

    #[error("task {0} already has a pending or processing job")]
    DuplicateTask(TaskId),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {job_id} is {state:?} and cannot be cancelled")]
    NotCancellable { job_id: JobId, state: JobState },
}

/// Raised by an `ExecutionDelegate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("execution failed: {0}")]
    Failed(String),

    #[error("execution task aborted: {0}")]
    Aborted(String),
}

/// Raised by a `ChainReader`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("chain rpc error: {0}")]
    Rpc(String),

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

/// Raised by a `ResultSubmitter`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("solution for task {0} was rejected: {1}")]
    Rejected(TaskId, String),

    #[error("submission transport error: {0}")]
    Transport(String),
}
