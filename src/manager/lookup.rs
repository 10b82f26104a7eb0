//! `field__op` lookups translated into the server-side object query.

use serde_json::Value;

use crate::config::ModelOptions;
use crate::error::ConfigError;
use crate::fields::FieldValue;

/// Operators accepted on any filterable field.
pub const LOOKUPS: &[&str] = &["gt", "gte", "lt", "lte", "eq", "neq", "exists", "in", "nin"];

/// Operators accepted only on text-like fields.
pub const STRING_LOOKUPS: &[&str] = &[
    "contains",
    "icontains",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
    "ieq",
];

/// One parsed lookup: `(field name, "_op", wire value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lookup {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

/// Parse `key` (`field` or `field__op`) against `options`. A bare field name means `eq`.
pub fn parse(options: &ModelOptions, key: &str, value: FieldValue) -> Result<Lookup, ConfigError> {
    let (name, op) = match key.rsplit_once("__") {
        Some((name, op)) if !options.has_field(key) => (name, op),
        _ => (key, "eq"),
    };
    let field = options.field(name).ok_or_else(|| ConfigError::UnknownField {
        model: options.name.clone(),
        field: name.to_string(),
    })?;
    let string_op = STRING_LOOKUPS.contains(&op);
    if !string_op && !LOOKUPS.contains(&op) {
        return Err(ConfigError::UnknownLookup {
            field: field.name.clone(),
            lookup: op.to_string(),
        });
    }
    if !field.query_allowed {
        return Err(ConfigError::Validation(format!(
            "field {} cannot be used in a query",
            field.name
        )));
    }
    let invalid = |reason: &str| ConfigError::InvalidLookupValue {
        field: field.name.clone(),
        lookup: op.to_string(),
        reason: reason.to_string(),
    };

    let wire = if string_op {
        if !field.kind.is_textual() {
            return Err(invalid("only valid on text fields"));
        }
        match value.as_str() {
            Some(s) => Value::String(s.to_string()),
            None => return Err(invalid("expected a string")),
        }
    } else {
        match op {
            "exists" => match value.as_bool() {
                Some(b) => Value::Bool(b),
                None => return Err(invalid("expected a boolean")),
            },
            "in" | "nin" => {
                let Some(items) = value.as_json().and_then(Value::as_array) else {
                    return Err(invalid("expected a list"));
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let converted = field.to_python(item).map_err(|e| invalid(&e.to_string()))?;
                    out.push(field.to_native(&converted));
                }
                Value::Array(out)
            }
            _ if value.is_null() => Value::Null,
            _ => {
                let converted = field.coerce(value).map_err(|e| invalid(&e.to_string()))?;
                field.to_native(&converted)
            }
        }
    };

    Ok(Lookup {
        field: field.name.clone(),
        operator: format!("_{}", op),
        value: wire,
    })
}
