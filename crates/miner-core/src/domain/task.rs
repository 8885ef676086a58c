//! Task records decoded from chain activity, and the solution handed back.

use serde::{Deserialize, Serialize};

use super::ids::{JobId, ModelId, TaskId};

/// A task submission as decoded by a `ChainReader`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedTask {
    pub task_id: TaskId,
    pub model_id: ModelId,

    /// Fee offered by the task owner, in wei.
    pub fee: u128,

    /// Address of the task owner.
    pub owner: String,

    /// Raw model input as submitted (before template hydration).
    pub payload: serde_json::Value,
}

/// A task record looked up by id; carries the transaction it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTaskRecord {
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub fee: u128,
    pub owner: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub tx_hash: String,
}

impl ChainTaskRecord {
    pub fn new(task: SubmittedTask, tx_hash: impl Into<String>) -> Self {
        Self {
            task_id: task.task_id,
            model_id: task.model_id,
            fee: task.fee,
            owner: task.owner,
            payload: task.payload,
            tx_hash: tx_hash.into(),
        }
    }

    pub fn to_submitted(&self) -> SubmittedTask {
        SubmittedTask {
            task_id: self.task_id.clone(),
            model_id: self.model_id.clone(),
            fee: self.fee,
            owner: self.owner.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// The output of a completed job, ready for on-chain submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub task_id: TaskId,
    pub job_id: JobId,
    pub model_id: ModelId,
    pub attempt: u32,
    pub result: serde_json::Value,
}
