//! InMemoryChain - a `ChainReader` backed by a local list of submissions.
//!
//! `submit` plays the role of a task submission transaction: the record
//! becomes findable by id, and the next `poll_submitted` returns it once.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{ChainTaskRecord, SubmittedTask, TaskId};
use crate::error::ChainError;
use crate::ports::ChainReader;

#[derive(Default)]
struct ChainState {
    records: HashMap<TaskId, ChainTaskRecord>,
    unseen: VecDeque<SubmittedTask>,
}

#[derive(Default)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `[ { task_id, model_id, fee, owner, payload, tx_hash? }, ... ]`.
    pub fn from_json_str(json: &str) -> Result<Self, ChainError> {
        let records: Vec<ChainTaskRecord> =
            serde_json::from_str(json).map_err(|e| ChainError::Decode {
                what: "task seed",
                reason: e.to_string(),
            })?;
        let chain = Self::new();
        for record in records {
            let tx_hash = record.tx_hash.clone();
            chain.submit(record.to_submitted(), tx_hash);
        }
        Ok(chain)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Rpc(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn submit(&self, task: SubmittedTask, tx_hash: impl Into<String>) {
        let mut state = self.lock();
        state
            .records
            .insert(task.task_id.clone(), ChainTaskRecord::new(task.clone(), tx_hash));
        state.unseen.push_back(task);
    }

    /// Make a known task show up in the next poll again, as after a re-org.
    pub fn replay(&self, task_id: &TaskId) -> bool {
        let mut state = self.lock();
        let Some(task) = state.records.get(task_id).map(ChainTaskRecord::to_submitted) else {
            return false;
        };
        state.unseen.push_back(task);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn poll_submitted(&self) -> Result<Vec<SubmittedTask>, ChainError> {
        Ok(self.lock().unseen.drain(..).collect())
    }

    async fn find_by_task_id(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<ChainTaskRecord>, ChainError> {
        Ok(self.lock().records.get(task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{model_id, task_id};
    use serde_json::json;

    fn task(n: u8) -> SubmittedTask {
        SubmittedTask {
            task_id: task_id(n),
            model_id: model_id(1),
            fee: 10,
            owner: "0x00000000000000000000000000000000000000cc".into(),
            payload: json!({ "prompt": "hello" }),
        }
    }

    #[tokio::test]
    async fn poll_returns_each_submission_once() {
        let chain = InMemoryChain::new();
        chain.submit(task(1), "0x01");
        chain.submit(task(2), "0x02");

        let polled = chain.poll_submitted().await.unwrap();
        assert_eq!(polled, vec![task(1), task(2)]);
        assert!(chain.poll_submitted().await.unwrap().is_empty());

        assert!(chain.replay(&task_id(1)));
        assert!(!chain.replay(&task_id(9)));
        assert_eq!(chain.poll_submitted().await.unwrap(), vec![task(1)]);
    }

    #[tokio::test]
    async fn find_by_task_id_returns_tx_hash() {
        let chain = InMemoryChain::new();
        chain.submit(task(1), "0xfeed");

        let record = chain.find_by_task_id(&task_id(1)).await.unwrap().unwrap();
        assert_eq!(record.tx_hash, "0xfeed");
        assert_eq!(record.to_submitted(), task(1));
        assert!(chain.find_by_task_id(&task_id(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seeds_from_json() {
        let json = json!([
            {
                "task_id": task_id(1).to_string(),
                "model_id": model_id(1).to_string(),
                "fee": 10,
                "owner": "0x00000000000000000000000000000000000000cc",
                "payload": { "prompt": "hello" },
                "tx_hash": "0xabc"
            },
            {
                "task_id": task_id(2).to_string(),
                "model_id": model_id(1).to_string(),
                "fee": 10,
                "owner": "0x00000000000000000000000000000000000000cc",
                "payload": { "prompt": "hello" }
            }
        ])
        .to_string();

        let chain = InMemoryChain::from_json_str(&json).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.poll_submitted().await.unwrap().len(), 2);
    }

    #[test]
    fn bad_seed_is_a_decode_error() {
        let err = InMemoryChain::from_json_str("[{\"task_id\": \"0x12\"}]").err().unwrap();
        assert!(matches!(err, ChainError::Decode { what: "task seed", .. }));
    }
}
