//! ChainReader port - decoded view of task submissions on chain.

use async_trait::async_trait;

use crate::domain::{ChainTaskRecord, SubmittedTask, TaskId};
use crate::error::ChainError;

/// Source of task submissions.
///
/// `poll_submitted` may return a task more than once (re-orgs, overlapping
/// polling windows); callers deduplicate.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Task submissions observed since the previous poll.
    async fn poll_submitted(&self) -> Result<Vec<SubmittedTask>, ChainError>;

    /// Look up one task by id, including the transaction that submitted it.
    async fn find_by_task_id(&self, task_id: &TaskId)
    -> Result<Option<ChainTaskRecord>, ChainError>;
}
