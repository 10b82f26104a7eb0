//! Raw model declarations: fields, endpoints, and the full configuration set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// HTTP verb allowed on an endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ConfigError::Validation(format!("unknown HTTP method: {}", s))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Slug,
    Email,
    Choice,
    Date,
    Datetime,
    Json,
    Schema,
    Model,
}

/// Generic models filter through endpoint properties; object models accept server-side lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Generic,
    Object,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_true")]
    pub blank: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default = "default_true")]
    pub has_data: bool,
    #[serde(default)]
    pub has_endpoint_data: bool,
    #[serde(default = "default_true")]
    pub query_allowed: bool,
    #[serde(default)]
    pub order_index: bool,
    #[serde(default)]
    pub choices: Vec<Value>,
    /// Referenced model name for `model` fields.
    #[serde(default)]
    pub target: Option<String>,
    /// Serialize a `model` field as the target's primary key instead of its payload.
    #[serde(default)]
    pub just_pk: bool,
}

fn default_true() -> bool {
    true
}

impl FieldConfig {
    pub fn new(name: &str, type_: FieldType) -> Self {
        FieldConfig {
            name: name.to_string(),
            type_,
            label: None,
            default: None,
            required: false,
            read_only: false,
            primary_key: false,
            blank: true,
            max_length: None,
            min_length: None,
            has_data: true,
            has_endpoint_data: false,
            query_allowed: true,
            order_index: false,
            choices: Vec::new(),
            target: None,
            just_pk: false,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn slug(name: &str) -> Self {
        Self::new(name, FieldType::Slug)
    }

    pub fn email(name: &str) -> Self {
        Self::new(name, FieldType::Email)
    }

    pub fn choice(name: &str, choices: &[&str]) -> Self {
        let mut f = Self::new(name, FieldType::Choice);
        f.choices = choices.iter().map(|c| Value::String((*c).to_string())).collect();
        f
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, FieldType::Datetime)
    }

    pub fn json(name: &str) -> Self {
        Self::new(name, FieldType::Json)
    }

    pub fn schema(name: &str) -> Self {
        Self::new(name, FieldType::Schema)
    }

    pub fn model(name: &str, target: &str) -> Self {
        let mut f = Self::new(name, FieldType::Model);
        f.target = Some(target.to_string());
        f
    }

    /// Read-only `links` field; its presence marks a record as persisted.
    pub fn links() -> Self {
        Self::json("links").read_only().no_data()
    }

    /// URL parameter carried by the record but never sent in the body.
    pub fn endpoint_param(name: &str) -> Self {
        let mut f = Self::string(name).no_data();
        f.has_endpoint_data = true;
        f.query_allowed = false;
        f
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.has_endpoint_data = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.blank = false;
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn default(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn no_data(mut self) -> Self {
        self.has_data = false;
        self
    }

    pub fn ordered(mut self) -> Self {
        self.order_index = true;
        self
    }

    pub fn just_pk(mut self) -> Self {
        self.just_pk = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub methods: Vec<Method>,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ModelKind,
    #[serde(default)]
    pub parent: Option<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl ModelConfig {
    pub fn new(name: &str) -> Self {
        ModelConfig {
            name: name.to_string(),
            kind: ModelKind::Generic,
            parent: None,
            fields: Vec::new(),
            endpoints: BTreeMap::new(),
        }
    }

    pub fn kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    pub fn endpoint(mut self, name: &str, methods: &[Method], path: &str) -> Self {
        self.endpoints.insert(
            name.to_string(),
            EndpointConfig {
                methods: methods.to_vec(),
                path: path.to_string(),
            },
        );
        self
    }
}

/// All model declarations in one struct for in-memory loading.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl FullConfig {
    /// Append models from `other`; a model with the same name replaces the existing declaration.
    pub fn merge(mut self, other: FullConfig) -> Self {
        for model in other.models {
            if let Some(existing) = self.models.iter_mut().find(|m| m.name == model.name) {
                *existing = model;
            } else {
                self.models.push(model);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_config_defaults_from_json() {
        let f: FieldConfig = serde_json::from_value(json!({"name": "title", "type": "string"})).unwrap();
        assert!(f.blank);
        assert!(f.has_data);
        assert!(!f.has_endpoint_data);
        assert!(!f.primary_key);
        assert_eq!(f.type_, FieldType::String);
    }

    #[test]
    fn model_config_from_json() {
        let m: ModelConfig = serde_json::from_value(json!({
            "name": "Book",
            "fields": [{"name": "id", "type": "integer", "primary_key": true, "read_only": true}],
            "endpoints": {"list": {"methods": ["GET", "POST"], "path": "/v1/books/"}}
        }))
        .unwrap();
        assert_eq!(m.kind, ModelKind::Generic);
        assert_eq!(m.endpoints["list"].methods, vec![Method::Get, Method::Post]);
    }

    #[test]
    fn merge_replaces_by_name() {
        let a = FullConfig {
            models: vec![ModelConfig::new("A"), ModelConfig::new("B")],
        };
        let b = FullConfig {
            models: vec![ModelConfig::new("B").parent("A"), ModelConfig::new("C")],
        };
        let merged = a.merge(b);
        assert_eq!(merged.models.len(), 3);
        assert_eq!(merged.models[1].parent.as_deref(), Some("A"));
    }

    #[test]
    fn method_parse() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
    }
}
