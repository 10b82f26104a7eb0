//! Wire <-> typed value conversion per field kind.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::{Field, FieldKind, FieldValue};
use crate::error::ValidationError;

/// Column types a class schema may declare.
pub const SCHEMA_TYPES: &[&str] = &[
    "string", "text", "integer", "float", "boolean", "datetime", "file", "reference", "array",
    "object", "geopoint", "relation",
];

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_datetime(d: &DateTime<Utc>) -> String {
    d.format(DATETIME_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// ISO-8601 with optional fraction and `Z`/offset; bare dates normalize to midnight UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(d.and_utc());
        }
    }
    parse_date(s)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn plain(raw: &Value) -> FieldValue {
    match raw {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => FieldValue::String(s.clone()),
        other => FieldValue::Json(other.clone()),
    }
}

/// Object datetime columns arrive wrapped as `{"type": "datetime", "value": "..."}`.
fn unwrap_typed(raw: &Value) -> &Value {
    match raw {
        Value::Object(o) if o.contains_key("type") && o.contains_key("value") => &o["value"],
        other => other,
    }
}

pub(super) fn to_python(field: &Field, raw: &Value) -> Result<FieldValue, ValidationError> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }
    let name = field.name.as_str();
    match &field.kind {
        FieldKind::String | FieldKind::Text | FieldKind::Slug | FieldKind::Email => match raw {
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Number(n) => Ok(FieldValue::String(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::String(b.to_string())),
            _ => Err(ValidationError::invalid(name, "expected a string")),
        },
        FieldKind::Choice => Ok(plain(raw)),
        FieldKind::Integer => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(FieldValue::Integer)
                .ok_or_else(|| ValidationError::invalid(name, "expected an integer")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| ValidationError::invalid(name, format!("invalid integer: {}", s))),
            _ => Err(ValidationError::invalid(name, "expected an integer")),
        },
        FieldKind::Float => match raw {
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Float)
                .ok_or_else(|| ValidationError::invalid(name, "expected a number")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| ValidationError::invalid(name, format!("invalid number: {}", s))),
            _ => Err(ValidationError::invalid(name, "expected a number")),
        },
        FieldKind::Boolean => match raw {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(FieldValue::Bool(true)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(FieldValue::Bool(false)),
            Value::String(s) => match s.as_str() {
                "t" | "1" | "True" | "true" => Ok(FieldValue::Bool(true)),
                "f" | "0" | "False" | "false" => Ok(FieldValue::Bool(false)),
                _ => Err(ValidationError::invalid(name, format!("invalid boolean: {}", s))),
            },
            _ => Err(ValidationError::invalid(name, "expected a boolean")),
        },
        FieldKind::Date => {
            let s = unwrap_typed(raw)
                .as_str()
                .ok_or_else(|| ValidationError::invalid(name, "expected a YYYY-MM-DD date"))?;
            parse_date(s)
                .or_else(|| parse_datetime(s).map(|d| d.date_naive()))
                .map(FieldValue::Date)
                .ok_or_else(|| ValidationError::invalid(name, format!("invalid date: {}", s)))
        }
        FieldKind::DateTime => {
            let s = unwrap_typed(raw)
                .as_str()
                .ok_or_else(|| ValidationError::invalid(name, "expected an ISO-8601 datetime"))?;
            parse_datetime(s)
                .map(FieldValue::DateTime)
                .ok_or_else(|| ValidationError::invalid(name, format!("invalid datetime: {}", s)))
        }
        FieldKind::Json => match raw {
            Value::String(s) => Ok(serde_json::from_str::<Value>(s)
                .map(FieldValue::Json)
                .unwrap_or_else(|_| FieldValue::Json(raw.clone()))),
            other => Ok(FieldValue::Json(other.clone())),
        },
        FieldKind::Schema => {
            let parsed = match raw {
                Value::String(s) => serde_json::from_str::<Value>(s)
                    .map_err(|e| ValidationError::invalid(name, format!("invalid schema: {}", e)))?,
                other => other.clone(),
            };
            check_schema(name, &parsed)?;
            Ok(FieldValue::Json(parsed))
        }
        FieldKind::Model { .. } => Ok(match raw {
            Value::Object(_) => FieldValue::Json(raw.clone()),
            other => plain(other),
        }),
    }
}

fn check_schema(name: &str, schema: &Value) -> Result<(), ValidationError> {
    let columns = schema
        .as_array()
        .ok_or_else(|| ValidationError::invalid(name, "schema must be a list"))?;
    for column in columns {
        let column_name = column
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::invalid(name, "schema column without a name"))?;
        let column_type = column.get("type").and_then(Value::as_str).unwrap_or("");
        if !SCHEMA_TYPES.contains(&column_type) {
            return Err(ValidationError::invalid(
                name,
                format!("column {} has unsupported type '{}'", column_name, column_type),
            ));
        }
    }
    Ok(())
}

pub(super) fn to_native(field: &Field, value: &FieldValue) -> Value {
    match (&field.kind, value) {
        (_, FieldValue::Null) => Value::Null,
        (FieldKind::Model { just_pk, .. }, FieldValue::Model(m)) => {
            if *just_pk {
                m.pk().map(FieldValue::to_json).unwrap_or(Value::Null)
            } else {
                Value::Object(m.to_native())
            }
        }
        (FieldKind::Model { just_pk: true, .. }, FieldValue::Json(Value::Object(o))) => o
            .get("id")
            .or_else(|| o.get("name"))
            .cloned()
            .unwrap_or(Value::Null),
        (FieldKind::Schema, FieldValue::Json(v)) => v.clone(),
        _ => value.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn field(config: FieldConfig) -> Field {
        Field::from_config(&config).unwrap()
    }

    #[rstest]
    #[case(json!(true), true)]
    #[case(json!(false), false)]
    #[case(json!("t"), true)]
    #[case(json!("f"), false)]
    #[case(json!("1"), true)]
    #[case(json!("0"), false)]
    #[case(json!("True"), true)]
    #[case(json!("False"), false)]
    fn boolean_accepts(#[case] raw: Value, #[case] expected: bool) {
        let f = field(FieldConfig::boolean("flag"));
        assert_eq!(f.to_python(&raw).unwrap(), FieldValue::Bool(expected));
    }

    #[rstest]
    #[case(json!("yes"))]
    #[case(json!("TRUE"))]
    #[case(json!(2))]
    #[case(json!([true]))]
    fn boolean_rejects(#[case] raw: Value) {
        let f = field(FieldConfig::boolean("flag"));
        let err = f.to_python(&raw).unwrap_err();
        assert_eq!(err.field(), "flag");
    }

    #[test]
    fn datetime_serializes_with_z() {
        let f = field(FieldConfig::datetime("created_at"));
        let d = Utc.with_ymd_and_hms(2015, 4, 1, 12, 30, 5).unwrap();
        assert_eq!(
            f.to_native(&FieldValue::DateTime(d)),
            json!("2015-04-01T12:30:05.000000Z")
        );
    }

    #[test]
    fn datetime_accepts_offsets_and_bare_dates() {
        let f = field(FieldConfig::datetime("created_at"));
        let with_offset = f.to_python(&json!("2015-04-01T12:30:05.123456+00:00")).unwrap();
        let with_z = f.to_python(&json!("2015-04-01T12:30:05.123456Z")).unwrap();
        assert_eq!(with_offset, with_z);
        let midnight = f.to_python(&json!("2015-04-01")).unwrap();
        assert_eq!(
            midnight,
            FieldValue::DateTime(Utc.with_ymd_and_hms(2015, 4, 1, 0, 0, 0).unwrap())
        );
        let wrapped = f
            .to_python(&json!({"type": "datetime", "value": "2015-04-01T00:00:00.000000Z"}))
            .unwrap();
        assert_eq!(wrapped, midnight);
        assert!(f.to_python(&json!("not a date")).is_err());
    }

    #[test]
    fn date_parses_iso_day() {
        let f = field(FieldConfig::date("redeem_by"));
        let v = f.to_python(&json!("2016-02-29")).unwrap();
        assert_eq!(v, FieldValue::Date(NaiveDate::from_ymd_opt(2016, 2, 29).unwrap()));
        assert_eq!(f.to_native(&v), json!("2016-02-29"));
        assert!(f.to_python(&json!("2015-02-29")).is_err());
    }

    #[rstest]
    #[case(FieldConfig::string("s"), json!("hello"))]
    #[case(FieldConfig::text("t"), json!("long text"))]
    #[case(FieldConfig::integer("i"), json!(-42))]
    #[case(FieldConfig::float("f"), json!(2.5))]
    #[case(FieldConfig::boolean("b"), json!(false))]
    #[case(FieldConfig::slug("sl"), json!("my-slug_1"))]
    #[case(FieldConfig::email("e"), json!("a@b.io"))]
    #[case(FieldConfig::choice("c", &["a", "b"]), json!("b"))]
    #[case(FieldConfig::date("d"), json!("2015-01-31"))]
    #[case(FieldConfig::datetime("dt"), json!("2015-01-31T10:11:12.123456Z"))]
    #[case(FieldConfig::json("j"), json!({"k": [1, 2]}))]
    #[case(FieldConfig::schema("sc"), json!([{"name": "title", "type": "string"}]))]
    fn native_python_round_trip(#[case] config: FieldConfig, #[case] wire: Value) {
        let f = field(config);
        let value = f.to_python(&wire).unwrap();
        assert_eq!(f.to_native(&value), wire);
        assert_eq!(f.to_python(&f.to_native(&value)).unwrap(), value);
    }

    #[test]
    fn integer_accepts_numeric_strings() {
        let f = field(FieldConfig::integer("count"));
        assert_eq!(f.to_python(&json!("17")).unwrap(), FieldValue::Integer(17));
        assert_eq!(f.to_python(&json!(3.0)).unwrap(), FieldValue::Integer(3));
        assert!(f.to_python(&json!(3.5)).is_err());
    }

    #[rstest]
    #[case(json!(1e20))]
    #[case(json!(-1e20))]
    #[case(json!(9.3e18))]
    fn integer_rejects_out_of_range_floats(#[case] raw: Value) {
        let f = field(FieldConfig::integer("count"));
        let err = f.to_python(&raw).unwrap_err();
        assert_eq!(err.field(), "count");
    }

    #[test]
    fn schema_rejects_unknown_column_type() {
        let f = field(FieldConfig::schema("schema"));
        let err = f
            .to_python(&json!([{"name": "x", "type": "blob"}]))
            .unwrap_err();
        assert!(err.to_string().contains("blob"));
        let parsed = f.to_python(&json!("[{\"name\": \"x\", \"type\": \"integer\"}]")).unwrap();
        assert_eq!(parsed, FieldValue::Json(json!([{"name": "x", "type": "integer"}])));
    }

    #[test]
    fn just_pk_model_field_serializes_mapping_key() {
        let f = field(FieldConfig::model("coupon", "Coupon").just_pk());
        let v = f.to_python(&json!({"name": "SPRING", "percent_off": 10})).unwrap();
        assert_eq!(f.to_native(&v), json!("SPRING"));
        let scalar = f.to_python(&json!("SPRING")).unwrap();
        assert_eq!(f.to_native(&scalar), json!("SPRING"));
    }
}
