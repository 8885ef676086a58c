//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{
    InputField, InputKind, ModelId, ModelTemplate, NewJob, OutputField, OutputKind, Solution,
    TaskId, TemplateMeta,
};
use crate::error::{ExecutionError, SubmitError};
use crate::ports::{ExecutionDelegate, ResultSubmitter};

pub fn task_id(n: u8) -> TaskId {
    format!("0x{n:064x}").parse().unwrap()
}

pub fn model_id(n: u8) -> ModelId {
    format!("0x{n:064x}").parse().unwrap()
}

fn field(variable: &str, kind: InputKind) -> InputField {
    InputField {
        variable: variable.into(),
        kind,
        required: false,
        default: None,
        min: None,
        max: None,
        choices: Vec::new(),
        description: String::new(),
    }
}

/// prompt (required), steps 1..=100 (20), scale 0..=20 (7.5), sampler ddim|plms (ddim)
pub fn sample_template() -> ModelTemplate {
    ModelTemplate {
        meta: TemplateMeta {
            title: "Sample Diffusion".into(),
            description: "text to image".into(),
            git: None,
            docker: None,
            version: 1,
        },
        input: vec![
            InputField {
                required: true,
                ..field("prompt", InputKind::String)
            },
            InputField {
                default: Some(json!(20)),
                min: Some(1.0),
                max: Some(100.0),
                ..field("steps", InputKind::Int)
            },
            InputField {
                default: Some(json!(7.5)),
                min: Some(0.0),
                max: Some(20.0),
                ..field("scale", InputKind::Decimal)
            },
            InputField {
                default: Some(json!("ddim")),
                choices: vec!["ddim".into(), "plms".into()],
                ..field("sampler", InputKind::Enum)
            },
        ],
        output: vec![OutputField {
            filename: "out-1.png".into(),
            kind: OutputKind::Image,
        }],
    }
}

pub fn new_job(task_id: TaskId, payload: Value) -> NewJob {
    NewJob {
        task_id,
        model_id: model_id(1),
        payload,
        template: Arc::new(sample_template()),
        attempt: 1,
    }
}

/// Delegate driven by the payload:
/// - `sleep_ms`: how long the execution takes
/// - `fail`: fail with this message after sleeping
#[derive(Default)]
pub struct ScriptedDelegate {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedDelegate {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionDelegate for ScriptedDelegate {
    async fn execute(
        &self,
        payload: &Value,
        _template: &ModelTemplate,
    ) -> Result<Value, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(ms) = payload.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        match payload.get("fail").and_then(Value::as_str) {
            Some(reason) => Err(ExecutionError::Failed(reason.to_string())),
            None => Ok(json!({ "echo": payload })),
        }
    }
}

#[derive(Default)]
pub struct RecordingSubmitter {
    solutions: Mutex<Vec<Solution>>,
}

impl RecordingSubmitter {
    pub fn solutions(&self) -> Vec<Solution> {
        self.solutions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSubmitter for RecordingSubmitter {
    async fn submit(&self, solution: Solution) -> Result<(), SubmitError> {
        self.solutions.lock().unwrap().push(solution);
        Ok(())
    }
}

/// Template that passes `ScriptedDelegate` controls through hydration.
pub fn scripted_template() -> ModelTemplate {
    ModelTemplate {
        meta: TemplateMeta {
            title: "Scripted".into(),
            description: String::new(),
            git: None,
            docker: None,
            version: 1,
        },
        input: vec![
            field("sleep_ms", InputKind::Int),
            field("fail", InputKind::String),
        ],
        output: Vec::new(),
    }
}
