//! Load model declarations from in-memory structs or a JSON file and resolve them into a registry.

use std::collections::HashSet;
use std::path::Path;

use crate::config::resolved::{ModelOptions, Registry};
use crate::config::{validate, FieldType, FullConfig};
use crate::error::ConfigError;

/// Build the registry from declarations (two phases: register every model, then resolve references).
pub fn resolve(config: &FullConfig) -> Result<Registry, ConfigError> {
    validate(config)?;

    let mut registry = Registry::default();
    for model in &config.models {
        registry.insert(ModelOptions::build(model)?)?;
    }

    for model in &config.models {
        if let Some(parent) = &model.parent {
            if !registry.contains(parent) {
                return Err(ConfigError::MissingReference {
                    kind: "parent model",
                    id: parent.clone(),
                });
            }
        }
        for field in model.fields.iter().filter(|f| f.type_ == FieldType::Model) {
            let target = field.target.as_deref().unwrap_or_default();
            if !registry.contains(target) {
                return Err(ConfigError::MissingReference {
                    kind: "model field target",
                    id: format!("{}.{} -> {}", model.name, field.name, target),
                });
            }
        }
        check_parent_chain(config, &model.name)?;
    }

    tracing::debug!(models = config.models.len(), "registry resolved");
    Ok(registry)
}

fn check_parent_chain(config: &FullConfig, start: &str) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(name) = current {
        if !seen.insert(name) {
            return Err(ConfigError::Validation(format!(
                "model {} has a cyclic parent chain",
                start
            )));
        }
        current = config
            .models
            .iter()
            .find(|m| m.name == name)
            .and_then(|m| m.parent.as_deref());
    }
    Ok(())
}

/// Read extra model declarations from a JSON file (`{"models": [...]}`).
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config: FullConfig = serde_json::from_str(&text)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), models = config.models.len(), "loaded model declarations");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, Method, ModelConfig};

    fn instance() -> ModelConfig {
        ModelConfig::new("Instance")
            .field(FieldConfig::string("name").primary_key())
            .endpoint("detail", &[Method::Get], "/v1/instances/{name}/")
    }

    #[test]
    fn resolves_forward_references() {
        let config = FullConfig {
            models: vec![
                ModelConfig::new("Class")
                    .parent("Instance")
                    .field(FieldConfig::string("name").primary_key())
                    .field(FieldConfig::model("instance", "Instance")),
                instance(),
            ],
        };
        let registry = resolve(&config).unwrap();
        assert!(registry.contains("Class"));
        assert_eq!(registry.get("Class").unwrap().parent.as_deref(), Some("Instance"));
    }

    #[test]
    fn unresolved_target_fails_loudly() {
        let config = FullConfig {
            models: vec![ModelConfig::new("Class")
                .field(FieldConfig::string("name").primary_key())
                .field(FieldConfig::model("instance", "Instance"))],
        };
        assert!(matches!(
            resolve(&config),
            Err(ConfigError::MissingReference { .. })
        ));
    }

    #[test]
    fn unresolved_parent_fails_loudly() {
        let config = FullConfig {
            models: vec![ModelConfig::new("Class")
                .parent("Nope")
                .field(FieldConfig::string("name").primary_key())],
        };
        assert!(matches!(
            resolve(&config),
            Err(ConfigError::MissingReference { kind: "parent model", .. })
        ));
    }

    #[test]
    fn cyclic_parents_rejected() {
        let config = FullConfig {
            models: vec![
                ModelConfig::new("A").parent("B").field(FieldConfig::integer("id").primary_key()),
                ModelConfig::new("B").parent("A").field(FieldConfig::integer("id").primary_key()),
            ],
        };
        assert!(resolve(&config).is_err());
    }

    #[test]
    fn match_path_finds_model() {
        let registry = resolve(&FullConfig { models: vec![instance()] }).unwrap();
        let (options, endpoint, props) = registry.match_path("/v1/instances/demo/").unwrap();
        assert_eq!(options.name, "Instance");
        assert_eq!(endpoint, "detail");
        assert_eq!(props["name"], "demo");
    }

    #[tokio::test]
    async fn load_from_missing_path_is_load_error() {
        let err = load_from_path("/nonexistent/models.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
