//! ExecutionDelegate port - the model runtime.

use async_trait::async_trait;

use crate::domain::ModelTemplate;
use crate::error::ExecutionError;

/// Runs one hydrated input against a model.
///
/// Executions may take minutes and are not assumed to be interruptible: the
/// queue stops waiting at its deadline but never aborts a running call.
#[async_trait]
pub trait ExecutionDelegate: Send + Sync {
    async fn execute(
        &self,
        payload: &serde_json::Value,
        template: &ModelTemplate,
    ) -> Result<serde_json::Value, ExecutionError>;
}
