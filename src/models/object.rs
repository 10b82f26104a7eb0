//! Server-defined class schemas turned into extra object fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FieldConfig;
use crate::error::ConfigError;

/// One column of a class schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub order_index: bool,
    #[serde(default)]
    pub filter_index: bool,
    #[serde(default)]
    pub target: Option<String>,
}

pub fn parse_schema(schema: &Value) -> Result<Vec<SchemaColumn>, ConfigError> {
    let schema = match schema {
        Value::Null => return Ok(Vec::new()),
        // Some endpoints return the schema as JSON text.
        Value::String(s) => serde_json::from_str(s).map_err(|e| ConfigError::Validation(format!("class schema: {}", e)))?,
        other => other.clone(),
    };
    serde_json::from_value(schema).map_err(|e| ConfigError::Validation(format!("class schema: {}", e)))
}

/// Field declarations for schema columns.
pub fn schema_fields(columns: &[SchemaColumn]) -> Vec<FieldConfig> {
    columns
        .iter()
        .map(|column| {
            let mut field = match column.type_.as_str() {
                "string" => FieldConfig::string(&column.name).max_length(128),
                "text" => FieldConfig::text(&column.name),
                "integer" => FieldConfig::integer(&column.name),
                "float" => FieldConfig::float(&column.name),
                "boolean" => FieldConfig::boolean(&column.name),
                "datetime" => FieldConfig::datetime(&column.name),
                _ => FieldConfig::json(&column.name),
            };
            field.order_index = column.order_index;
            field.query_allowed = column.filter_index;
            field
        })
        .collect()
}
