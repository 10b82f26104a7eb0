//! Field metadata and typed values. A `Field` never holds per-record data; values live in the model.

mod convert;
mod validation;

pub use convert::{format_datetime, parse_date, parse_datetime, SCHEMA_TYPES};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::config::{FieldConfig, FieldType};
use crate::error::{ConfigError, ValidationError};
use crate::model::Model;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Slug,
    Email,
    Choice,
    Date,
    DateTime,
    Json,
    Schema,
    Model { target: String, just_pk: bool },
}

impl FieldKind {
    /// Kinds that accept the string lookups (`contains`, `startswith`, ...).
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Text | FieldKind::Slug | FieldKind::Email | FieldKind::Choice
        )
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub default: Option<Value>,
    pub required: bool,
    pub read_only: bool,
    pub primary_key: bool,
    pub blank: bool,
    pub max_length: Option<usize>,
    pub min_length: Option<usize>,
    pub has_data: bool,
    pub has_endpoint_data: bool,
    pub query_allowed: bool,
    pub order_index: bool,
    pub choices: Vec<Value>,
}

impl Field {
    pub fn from_config(config: &FieldConfig) -> Result<Self, ConfigError> {
        let kind = match config.type_ {
            FieldType::String => FieldKind::String,
            FieldType::Text => FieldKind::Text,
            FieldType::Integer => FieldKind::Integer,
            FieldType::Float => FieldKind::Float,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::Slug => FieldKind::Slug,
            FieldType::Email => FieldKind::Email,
            FieldType::Choice => {
                if config.choices.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "choice field {} declares no choices",
                        config.name
                    )));
                }
                FieldKind::Choice
            }
            FieldType::Date => FieldKind::Date,
            FieldType::Datetime => FieldKind::DateTime,
            FieldType::Json => FieldKind::Json,
            FieldType::Schema => FieldKind::Schema,
            FieldType::Model => FieldKind::Model {
                target: config.target.clone().ok_or_else(|| ConfigError::MissingReference {
                    kind: "model field target",
                    id: config.name.clone(),
                })?,
                just_pk: config.just_pk,
            },
        };
        Ok(Field {
            name: config.name.clone(),
            label: config.label.clone().unwrap_or_default(),
            kind,
            default: config.default.clone(),
            required: config.required,
            read_only: config.read_only,
            primary_key: config.primary_key,
            blank: config.blank,
            max_length: config.max_length,
            min_length: config.min_length,
            has_data: config.has_data,
            has_endpoint_data: config.has_endpoint_data || config.primary_key,
            query_allowed: config.query_allowed,
            order_index: config.order_index,
            choices: config.choices.clone(),
        })
    }

    /// Human-readable fallback label: `class_name` -> `Class name`.
    pub fn default_label(name: &str) -> String {
        let spaced = name.replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn validate(&self, value: &FieldValue) -> Result<(), ValidationError> {
        validation::validate(self, value)
    }

    pub fn to_python(&self, raw: &Value) -> Result<FieldValue, ValidationError> {
        convert::to_python(self, raw)
    }

    pub fn to_native(&self, value: &FieldValue) -> Value {
        convert::to_native(self, value)
    }

    /// Normalize an assigned value to this field's type (`"2024-01-01"` on a date field becomes a `Date`).
    pub fn coerce(&self, value: FieldValue) -> Result<FieldValue, ValidationError> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Model(m) => Ok(FieldValue::Model(m)),
            other => self.to_python(&other.to_json()),
        }
    }
}

/// A typed field value held by a model instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(Value),
    Model(Box<Model>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Json(Value::Null))
    }

    /// Empty for the purpose of `required`: null, empty string, empty list or map.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Json(Value::Null) => true,
            FieldValue::Json(Value::String(s)) => s.is_empty(),
            FieldValue::Json(Value::Array(a)) => a.is_empty(),
            FieldValue::Json(Value::Object(o)) => o.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            FieldValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(n) => Some(*n),
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            FieldValue::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Untyped JSON rendition used for coercion; references render as their primary key.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(n) => Value::Number((*n).into()),
            FieldValue::Float(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(d) => Value::String(format_datetime(d)),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Model(m) => m.pk().map(FieldValue::to_json).unwrap_or(Value::Null),
        }
    }

    /// URL-parameter rendition; `None` for null and structured values.
    pub fn as_property(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Float(n) => Some(n.to_string()),
            FieldValue::Date(_) | FieldValue::DateTime(_) => self.to_json().as_str().map(str::to_string),
            FieldValue::Json(Value::String(s)) => Some(s.clone()),
            FieldValue::Json(Value::Number(n)) => Some(n.to_string()),
            FieldValue::Model(m) => m.pk().and_then(FieldValue::as_property),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::DateTime(d)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            other => FieldValue::Json(other),
        }
    }
}

impl From<Model> for FieldValue {
    fn from(m: Model) -> Self {
        FieldValue::Model(Box::new(m))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_label_humanizes_name() {
        assert_eq!(Field::default_label("class_name"), "Class name");
        assert_eq!(Field::default_label("id"), "Id");
        assert_eq!(Field::default_label(""), "");
    }

    #[test]
    fn primary_key_implies_endpoint_data() {
        let f = Field::from_config(&FieldConfig::string("name").primary_key()).unwrap();
        assert!(f.has_endpoint_data);
    }

    #[test]
    fn model_field_requires_target() {
        let mut config = FieldConfig::model("coupon", "Coupon");
        config.target = None;
        assert!(matches!(
            Field::from_config(&config),
            Err(ConfigError::MissingReference { .. })
        ));
    }

    #[test]
    fn empty_values() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::from("").is_empty());
        assert!(FieldValue::Json(serde_json::json!([])).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Integer(0).is_empty());
    }

    #[test]
    fn property_rendition() {
        assert_eq!(FieldValue::from(12).as_property().as_deref(), Some("12"));
        assert_eq!(FieldValue::from("abc").as_property().as_deref(), Some("abc"));
        assert_eq!(FieldValue::Null.as_property(), None);
    }
}
