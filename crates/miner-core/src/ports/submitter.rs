//! ResultSubmitter port - hands solutions to the chain.

use async_trait::async_trait;

use crate::domain::Solution;
use crate::error::SubmitError;

/// Accepts completed solutions. Signing, broadcasting and retrying the
/// transaction are the submitter's own business.
#[async_trait]
pub trait ResultSubmitter: Send + Sync {
    async fn submit(&self, solution: Solution) -> Result<(), SubmitError>;
}
