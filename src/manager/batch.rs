//! Pending requests for batch submission, and lazy managers that produce them.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::Manager;
use crate::config::{Method, ModelOptions, Properties};
use crate::error::Result;
use crate::fields::FieldValue;
use crate::model::Model;
use crate::response::BatchEntry;
use crate::state::Session;

/// Upper bound on requests in one batch call.
pub const MAX_BATCH_SIZE: usize = 50;

/// The part of a pending request that is sent to the batch endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchBody {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl BatchBody {
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("method".into(), Value::String(self.method.to_string()));
        out.insert("path".into(), Value::String(self.path.clone()));
        if let Some(body) = &self.body {
            out.insert("body".into(), body.clone());
        }
        Value::Object(out)
    }
}

/// What is needed to turn a batch result back into a record.
#[derive(Clone, Debug)]
pub struct BatchMeta {
    pub model: Arc<ModelOptions>,
    pub properties: Properties,
}

/// A write (or fetch) captured instead of executed.
#[derive(Clone, Debug)]
pub struct BatchRequest {
    pub body: BatchBody,
    pub meta: BatchMeta,
}

impl BatchRequest {
    pub fn model_name(&self) -> &str {
        &self.meta.model.name
    }
}

/// One demultiplexed batch outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchResult {
    Model(Model),
    Error { code: u16, content: Value },
}

impl BatchResult {
    pub(crate) fn from_entry(session: &Arc<Session>, request: BatchRequest, entry: BatchEntry) -> Result<Self> {
        if !entry.is_success() {
            return Ok(BatchResult::Error {
                code: entry.code,
                content: entry.content,
            });
        }
        let content = match entry.content {
            Value::Object(_) => entry.content,
            _ => Value::Object(Map::new()),
        };
        let model = Model::from_response(
            session.clone(),
            request.meta.model,
            request.meta.properties,
            &content,
        )?;
        Ok(BatchResult::Model(model))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, BatchResult::Model(_))
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            BatchResult::Model(m) => Some(m),
            BatchResult::Error { .. } => None,
        }
    }

    pub fn into_model(self) -> Option<Model> {
        match self {
            BatchResult::Model(m) => Some(m),
            BatchResult::Error { .. } => None,
        }
    }
}

/// Manager in lazy mode: write verbs return [`BatchRequest`]s instead of executing.
#[derive(Clone)]
pub struct LazyManager {
    inner: Manager,
}

impl LazyManager {
    pub(super) fn new(inner: Manager) -> Self {
        LazyManager { inner }
    }

    pub fn get<V: Into<FieldValue>>(&self, args: impl IntoIterator<Item = V>) -> Result<BatchRequest> {
        Ok(self.inner.prepare_get(args)?.1)
    }

    pub fn create<K: Into<String>, V: Into<FieldValue>>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<BatchRequest> {
        self.inner.new_model(kwargs)?.save_request()
    }

    pub fn update<A, K, V>(
        &self,
        args: impl IntoIterator<Item = A>,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<BatchRequest>
    where
        A: Into<FieldValue>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        Ok(self.inner.prepare_update(args, kwargs)?.1)
    }

    pub fn delete<V: Into<FieldValue>>(&self, args: impl IntoIterator<Item = V>) -> Result<BatchRequest> {
        Ok(self.inner.prepare_delete(args)?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_omits_missing_payload() {
        let body = BatchBody {
            method: Method::Delete,
            path: "/v1/instances/i/classes/c/objects/1/".into(),
            body: None,
        };
        assert_eq!(
            body.to_json(),
            json!({"method": "DELETE", "path": "/v1/instances/i/classes/c/objects/1/"})
        );
    }
}
