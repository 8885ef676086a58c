//! EchoDelegate - stand-in model runtime.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::ModelTemplate;
use crate::error::ExecutionError;
use crate::ports::ExecutionDelegate;

/// Returns the hydrated input together with the files the template
/// promises, after an optional simulated inference delay.
#[derive(Debug, Clone, Default)]
pub struct EchoDelegate {
    delay: Duration,
}

impl EchoDelegate {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ExecutionDelegate for EchoDelegate {
    async fn execute(
        &self,
        payload: &Value,
        template: &ModelTemplate,
    ) -> Result<Value, ExecutionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outputs: Vec<&str> = template
            .output
            .iter()
            .map(|output| output.filename.as_str())
            .collect();
        Ok(json!({
            "model": template.meta.title,
            "input": payload,
            "outputs": outputs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_template;

    #[tokio::test(start_paused = true)]
    async fn echoes_input_and_outputs() {
        let delegate = EchoDelegate::new(Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        let result = delegate
            .execute(&json!({ "prompt": "a cat" }), &sample_template())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(
            result,
            json!({
                "model": "Sample Diffusion",
                "input": { "prompt": "a cat" },
                "outputs": ["out-1.png"],
            })
        );
    }
}
