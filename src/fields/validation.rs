//! Value validation from field rules.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{Field, FieldKind, FieldValue};
use crate::error::ValidationError;

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"))
}

pub(super) fn validate(field: &Field, value: &FieldValue) -> Result<(), ValidationError> {
    let col = field.name.as_str();
    if field.required && value.is_empty() {
        return Err(ValidationError::Required {
            field: col.to_string(),
        });
    }
    if value.is_null() {
        return Ok(());
    }
    if let Some(s) = value.as_str() {
        let len = s.chars().count();
        if let Some(max) = field.max_length {
            if len > max {
                return Err(ValidationError::TooLong {
                    field: col.to_string(),
                    max,
                });
            }
        }
        if let Some(min) = field.min_length {
            if len < min {
                return Err(ValidationError::TooShort {
                    field: col.to_string(),
                    min,
                });
            }
        }
    }
    match (&field.kind, value) {
        (FieldKind::Slug, FieldValue::String(s)) if !slug_re().is_match(s) => Err(
            ValidationError::invalid(col, "may only contain letters, numbers, underscores or hyphens"),
        ),
        (FieldKind::Email, FieldValue::String(s)) if !email_re().is_match(s) => {
            Err(ValidationError::invalid(col, "must be a valid email"))
        }
        (FieldKind::Choice, v) => {
            let native = v.to_json();
            if field.choices.iter().any(|c| value_eq(&native, c)) {
                Ok(())
            } else {
                Err(ValidationError::InvalidChoice {
                    field: col.to_string(),
                    allowed: field
                        .choices
                        .iter()
                        .take(5)
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
        (FieldKind::Integer, FieldValue::Integer(_))
        | (FieldKind::Float, FieldValue::Float(_) | FieldValue::Integer(_))
        | (FieldKind::Boolean, FieldValue::Bool(_))
        | (FieldKind::Date, FieldValue::Date(_))
        | (FieldKind::DateTime, FieldValue::DateTime(_)) => Ok(()),
        (FieldKind::Integer | FieldKind::Float | FieldKind::Boolean | FieldKind::Date | FieldKind::DateTime, _) => {
            // Accept anything the field can convert; reject the rest.
            field.to_python(&value.to_json()).map(|_| ())
        }
        (FieldKind::Model { target, .. }, FieldValue::Model(m)) => {
            if m.name() == target {
                Ok(())
            } else {
                Err(ValidationError::invalid(
                    col,
                    format!("expected a {} instance, got {}", target, m.name()),
                ))
            }
        }
        (FieldKind::Model { target, .. }, FieldValue::Json(v)) if !v.is_object() => Err(
            ValidationError::invalid(col, format!("expected a {} instance or mapping", target)),
        ),
        (FieldKind::Model { target, .. }, FieldValue::Bool(_) | FieldValue::Float(_) | FieldValue::Date(_) | FieldValue::DateTime(_)) => {
            Err(ValidationError::invalid(col, format!("expected a {} instance or mapping", target)))
        }
        _ => Ok(()),
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use serde_json::json;

    fn field(config: FieldConfig) -> Field {
        Field::from_config(&config).unwrap()
    }

    #[test]
    fn required_rejects_empty() {
        let f = field(FieldConfig::string("name").required());
        assert_eq!(
            f.validate(&FieldValue::Null),
            Err(ValidationError::Required { field: "name".into() })
        );
        assert!(f.validate(&FieldValue::from("")).is_err());
        assert!(f.validate(&FieldValue::from("x")).is_ok());
    }

    #[test]
    fn length_bounds_only_for_strings() {
        let f = field(FieldConfig::string("name").max_length(3).min_length(2));
        assert!(f.validate(&FieldValue::from("abcd")).is_err());
        assert!(f.validate(&FieldValue::from("a")).is_err());
        assert!(f.validate(&FieldValue::from("abc")).is_ok());
        let j = field(FieldConfig::json("meta").max_length(1));
        assert!(j.validate(&FieldValue::Json(json!({"long": "value"}))).is_ok());
    }

    #[test]
    fn slug_and_email() {
        let s = field(FieldConfig::slug("name"));
        assert!(s.validate(&FieldValue::from("ok-slug_1")).is_ok());
        assert!(s.validate(&FieldValue::from("not a slug")).is_err());
        let e = field(FieldConfig::email("email"));
        assert!(e.validate(&FieldValue::from("me@example.com")).is_ok());
        assert!(e.validate(&FieldValue::from("me@")).is_err());
    }

    #[test]
    fn choice_membership() {
        let f = field(FieldConfig::choice("role", &["full", "read"]));
        assert!(f.validate(&FieldValue::from("read")).is_ok());
        let err = f.validate(&FieldValue::from("write")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidChoice { .. }));
    }

    #[test]
    fn typed_fields_reject_unconvertible_values() {
        let f = field(FieldConfig::integer("count"));
        assert!(f.validate(&FieldValue::from("12")).is_ok());
        assert!(f.validate(&FieldValue::from("twelve")).is_err());
    }

    #[test]
    fn model_field_accepts_mapping_or_pk() {
        let f = field(FieldConfig::model("instance", "Instance"));
        assert!(f.validate(&FieldValue::Json(json!({"name": "i"}))).is_ok());
        assert!(f.validate(&FieldValue::from("i")).is_ok());
        assert!(f.validate(&FieldValue::Json(json!([1]))).is_err());
        assert!(f.validate(&FieldValue::Bool(true)).is_err());
    }
}
