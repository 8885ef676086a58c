//! LoggingSubmitter - accepts every solution and logs it.

use async_trait::async_trait;
use tracing::info;

use crate::domain::Solution;
use crate::error::SubmitError;
use crate::ports::ResultSubmitter;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSubmitter;

#[async_trait]
impl ResultSubmitter for LoggingSubmitter {
    async fn submit(&self, solution: Solution) -> Result<(), SubmitError> {
        info!(
            task_id = %solution.task_id,
            job_id = %solution.job_id,
            model_id = %solution.model_id,
            attempt = solution.attempt,
            result = %solution.result,
            "solution ready"
        );
        Ok(())
    }
}
