//! The transport boundary: one async `request` call per logical operation.

mod http;
mod settings;

pub use http::HttpConnection;
pub use settings::ConnectionConfig;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Method;
use crate::error::RequestError;

/// One outbound call. `path` is relative to the API host unless it is already absolute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub data: Option<Value>,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Performs HTTP calls, authenticating before the first one.
/// Non-2xx responses must surface as [`RequestError::Status`].
#[async_trait]
pub trait Connection: Send + Sync {
    async fn request(&self, request: Request) -> Result<Value, RequestError>;
}
