//! Config validation: structural checks on model declarations before they are resolved.

use crate::config::{FullConfig, ModelConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for model in &config.models {
        if model.name.is_empty() {
            return Err(ConfigError::Validation("model name must not be empty".into()));
        }
        if !names.insert(model.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "model {} declared twice",
                model.name
            )));
        }
        validate_model(model)?;
    }
    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    let mut fields = HashSet::new();
    for field in &model.fields {
        if !fields.insert(field.name.as_str()) {
            return Err(ConfigError::DuplicateField {
                model: model.name.clone(),
                field: field.name.clone(),
            });
        }
    }
    for (name, endpoint) in &model.endpoints {
        if endpoint.methods.is_empty() {
            return Err(ConfigError::Validation(format!(
                "model {}: endpoint {} allows no methods",
                model.name, name
            )));
        }
        if !endpoint.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "model {}: endpoint {} path must start with '/'",
                model.name, name
            )));
        }
    }
    Ok(())
}
