//! Model templates: how a model id is executed, and what input it accepts.
//!
//! Templates are loaded once and shared read-only (`Arc<ModelTemplate>`).
//! `hydrate_input` turns a task's raw payload into the exact input the
//! execution engine receives: defaults filled in, unknown keys dropped,
//! every value checked against the field's kind and bounds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTemplate {
    pub meta: TemplateMeta,

    /// Ordered input fields.
    #[serde(default)]
    pub input: Vec<InputField>,

    /// Ordered output files.
    #[serde(default)]
    pub output: Vec<OutputField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<String>,

    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    String,
    Int,
    Decimal,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub variable: String,

    #[serde(rename = "type")]
    pub kind: InputKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Inclusive lower bound (int / decimal only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound (int / decimal only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Allowed values (enum only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Image,
    Video,
    Text,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub filename: String,

    #[serde(rename = "type")]
    pub kind: OutputKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("task input must be a JSON object")]
    NotAnObject,

    #[error("missing required input `{0}`")]
    MissingRequired(String),

    #[error("input `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("input `{field}`={value} is outside [{min:?}, {max:?}]")]
    OutOfBounds {
        field: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("input `{field}`={value:?} is not one of {choices:?}")]
    InvalidChoice {
        field: String,
        value: String,
        choices: Vec<String>,
    },
}

impl ModelTemplate {
    /// Build the execution input for this template from a raw task payload.
    pub fn hydrate_input(&self, payload: &Value) -> Result<Value, InputError> {
        let provided = payload.as_object().ok_or(InputError::NotAnObject)?;
        let mut hydrated = Map::new();

        for field in &self.input {
            let value = match provided.get(&field.variable).filter(|v| !v.is_null()) {
                Some(value) => value.clone(),
                None if field.required => {
                    return Err(InputError::MissingRequired(field.variable.clone()));
                }
                None => match &field.default {
                    Some(default) => default.clone(),
                    None => continue,
                },
            };
            field.check(&value)?;
            hydrated.insert(field.variable.clone(), value);
        }

        Ok(Value::Object(hydrated))
    }
}

impl InputField {
    fn check(&self, value: &Value) -> Result<(), InputError> {
        match self.kind {
            InputKind::String => {
                if !value.is_string() {
                    return Err(self.wrong_type("a string"));
                }
            }
            InputKind::Int => {
                let number = value
                    .as_i64()
                    .map(|n| n as f64)
                    .or_else(|| value.as_u64().map(|n| n as f64))
                    .ok_or_else(|| self.wrong_type("an integer"))?;
                self.check_bounds(number)?;
            }
            InputKind::Decimal => {
                let number = value.as_f64().ok_or_else(|| self.wrong_type("a number"))?;
                self.check_bounds(number)?;
            }
            InputKind::Enum => {
                let choice = value.as_str().ok_or_else(|| self.wrong_type("a string"))?;
                if !self.choices.iter().any(|c| c == choice) {
                    return Err(InputError::InvalidChoice {
                        field: self.variable.clone(),
                        value: choice.to_string(),
                        choices: self.choices.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_bounds(&self, value: f64) -> Result<(), InputError> {
        let below = self.min.is_some_and(|min| value < min);
        let above = self.max.is_some_and(|max| value > max);
        if below || above {
            return Err(InputError::OutOfBounds {
                field: self.variable.clone(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    fn wrong_type(&self, expected: &'static str) -> InputError {
        InputError::WrongType {
            field: self.variable.clone(),
            expected,
        }
    }
}
