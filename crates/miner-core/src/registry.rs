//! ModelRegistry - model id to execution template.
//!
//! Built once at startup (mutable), then shared behind an `Arc` and only
//! read. Lookups never mutate anything.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{ModelId, ModelTemplate, ParseIdError};

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    templates: HashMap<ModelId, Arc<ModelTemplate>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("model {0} is already registered")]
    AlreadyRegistered(ModelId),

    #[error("the all-zero model id cannot be registered")]
    ZeroModelId,

    #[error(transparent)]
    InvalidModelId(#[from] ParseIdError),

    #[error("failed to parse model templates: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        model_id: ModelId,
        template: ModelTemplate,
    ) -> Result<(), RegistryError> {
        if model_id.is_zero() {
            return Err(RegistryError::ZeroModelId);
        }
        if self.templates.contains_key(&model_id) {
            return Err(RegistryError::AlreadyRegistered(model_id));
        }
        self.templates.insert(model_id, Arc::new(template));
        Ok(())
    }

    /// `None` means "not a model we serve"; callers skip the task.
    pub fn lookup(&self, model_id: &ModelId) -> Option<Arc<ModelTemplate>> {
        self.templates.get(model_id).cloned()
    }

    pub fn contains(&self, model_id: &ModelId) -> bool {
        self.templates.contains_key(model_id)
    }

    /// Registered ids, sorted.
    pub fn model_ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self.templates.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load `{ "<model id>": <template>, ... }`.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, ModelTemplate> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (id, template) in raw {
            registry.register(id.parse()?, template)?;
        }
        Ok(registry)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{model_id, sample_template};

    #[test]
    fn register_and_lookup() {
        let mut registry = ModelRegistry::new();
        registry.register(model_id(1), sample_template()).unwrap();

        let template = registry.lookup(&model_id(1)).unwrap();
        assert_eq!(template.meta.title, "Sample Diffusion");
        assert!(registry.lookup(&model_id(2)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn zero_model_id_is_never_found() {
        let mut registry = ModelRegistry::new();
        registry.register(model_id(1), sample_template()).unwrap();

        assert!(registry.lookup(&ModelId::zero()).is_none());
        assert!(matches!(
            registry.register(ModelId::zero(), sample_template()),
            Err(RegistryError::ZeroModelId)
        ));
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(model_id(1), sample_template()).unwrap();
        let result = registry.register(model_id(1), sample_template());
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(id)) if id == model_id(1)));
    }

    #[test]
    fn loads_from_json_map() {
        let template = serde_json::to_value(sample_template()).unwrap();
        let mut map = serde_json::Map::new();
        map.insert(model_id(2).to_string(), template.clone());
        map.insert(model_id(1).to_string(), template);
        let json = serde_json::Value::Object(map).to_string();

        let registry = ModelRegistry::from_json_str(&json).unwrap();
        assert_eq!(registry.model_ids(), vec![model_id(1), model_id(2)]);
    }

    #[test]
    fn bad_model_id_in_json_is_reported() {
        let template = serde_json::to_value(sample_template()).unwrap();
        let json = serde_json::json!({ "0x1234": template }).to_string();
        assert!(matches!(
            ModelRegistry::from_json_str(&json),
            Err(RegistryError::InvalidModelId(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ModelRegistry::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
