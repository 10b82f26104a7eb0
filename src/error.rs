//! Typed errors: configuration, validation, request, and the combined SDK error.

use serde_json::Value;
use thiserror::Error;

/// Mistakes in model declarations or in how a manager is driven. Always raised before any request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("model {model}: duplicate primary key ({first} and {second})")]
    DuplicatePrimaryKey {
        model: String,
        first: String,
        second: String,
    },
    #[error("model {0}: no primary key field")]
    MissingPrimaryKey(String),
    #[error("model {model}: duplicate field {field}")]
    DuplicateField { model: String, field: String },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("model {model}: unknown endpoint {endpoint}")]
    UnknownEndpoint { model: String, endpoint: String },
    #[error("model {model}: endpoint {endpoint} requires property '{property}'")]
    MissingProperty {
        model: String,
        endpoint: String,
        property: String,
    },
    #[error("model {model}: {method} not allowed on endpoint {endpoint}")]
    MethodNotAllowed {
        model: String,
        endpoint: String,
        method: String,
    },
    #[error("model {model}: unknown field {field}")]
    UnknownField { model: String, field: String },
    #[error("field {field}: unsupported lookup '{lookup}'")]
    UnknownLookup { field: String, lookup: String },
    #[error("field {field}: invalid value for lookup '{lookup}': {reason}")]
    InvalidLookupValue {
        field: String,
        lookup: String,
        reason: String,
    },
    #[error("invalid ordering: {0}")]
    InvalidOrdering(String),
    #[error("unsupported batch: {0}")]
    MixedBatch(String),
    #[error("batch of {size} requests exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Invalid field value; always names the offending field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },
    #[error("{field} is read only")]
    ReadOnly { field: String },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },
    #[error("{field} must be one of: {allowed}")]
    InvalidChoice { field: String, allowed: String },
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
    #[error("{model} must be saved before {action}")]
    NotPersisted { model: String, action: &'static str },
}

impl ValidationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Name of the field the error refers to (model name for `NotPersisted`).
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::ReadOnly { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::TooShort { field, .. }
            | ValidationError::InvalidChoice { field, .. }
            | ValidationError::Invalid { field, .. } => field,
            ValidationError::NotPersisted { model, .. } => model,
        }
    }
}

/// Failure reported by a [`Connection`](crate::connection::Connection).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("{status} {reason}")]
    Status {
        status: u16,
        reason: String,
        detail: Value,
    },
    #[error("request timed out")]
    Timeout,
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn status(status: u16, detail: Value) -> Self {
        let reason = detail
            .get("detail")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_reason(status).to_string());
        RequestError::Status {
            status,
            reason,
            detail,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Request Failed",
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{model} matching query does not exist")]
    DoesNotExist { model: String },
    #[error("user not found")]
    UserNotFound,
    #[error("group not found")]
    GroupNotFound,
}

impl Error {
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Error::DoesNotExist { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Request(e) => e.status_code(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_error_prefers_server_detail() {
        let e = RequestError::status(403, json!({"detail": "No access"}));
        assert_eq!(e.to_string(), "403 No access");
        let e = RequestError::status(404, json!({}));
        assert_eq!(e.to_string(), "404 Not Found");
        assert!(e.is_not_found());
    }

    #[test]
    fn validation_error_names_field() {
        let e = ValidationError::TooLong {
            field: "name".into(),
            max: 64,
        };
        assert_eq!(e.field(), "name");
        assert_eq!(e.to_string(), "name must be at most 64 characters");
    }
}
