//! Dynamic record: a per-instance value map plus a pointer to its model options.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{Method, ModelOptions, Properties};
use crate::connection::Request;
use crate::error::{ConfigError, Result, ValidationError};
use crate::fields::{FieldKind, FieldValue};
use crate::manager::{BatchBody, BatchMeta, BatchRequest};
use crate::state::{not_found_as, Session};

#[derive(Clone)]
pub struct Model {
    session: Arc<Session>,
    options: Arc<ModelOptions>,
    values: BTreeMap<String, FieldValue>,
    /// URL parameters that are not declared fields.
    properties: Properties,
}

impl Model {
    /// Unsaved record with field defaults applied.
    pub fn new(session: Arc<Session>, options: Arc<ModelOptions>) -> Self {
        let mut values = BTreeMap::new();
        for field in options.fields() {
            if let Some(default) = &field.default {
                if let Ok(value) = field.to_python(default) {
                    values.insert(field.name.clone(), value);
                }
            }
        }
        Model {
            session,
            options,
            values,
            properties: Properties::new(),
        }
    }

    /// Record populated from a server payload; `properties` fill URL parameters the payload lacks.
    pub fn from_response(
        session: Arc<Session>,
        options: Arc<ModelOptions>,
        properties: Properties,
        data: &Value,
    ) -> Result<Self, ValidationError> {
        let mut model = Model::new(session, options);
        model.bind_properties(&properties);
        model.to_python(data)?;
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &Arc<ModelOptions> {
        &self.options
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let field = self.options.field(name)?;
        self.values.get(&field.name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Assign a field value. Read-only fields are write-once: a second, different value is rejected.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<&mut Self> {
        let field = self
            .options
            .field(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownField {
                model: self.options.name.clone(),
                field: name.to_string(),
            })?;
        let value = self.coerce_reference(&field.kind, field.coerce(value.into())?)?;
        if field.read_only {
            if let Some(existing) = self.values.get(&field.name).filter(|v| !v.is_null()) {
                if *existing != value {
                    return Err(ValidationError::ReadOnly {
                        field: field.name.clone(),
                    }
                    .into());
                }
            }
        }
        self.values.insert(field.name.clone(), value);
        Ok(self)
    }

    /// Bind URL parameters; those naming fields also set the field value.
    pub fn bind_properties(&mut self, properties: &Properties) {
        for (key, value) in properties {
            match self.options.field(key) {
                Some(field) if !self.values.get(&field.name).is_some_and(|v| !v.is_null()) => {
                    if let Ok(v) = field.to_python(&Value::String(value.clone())) {
                        self.values.insert(field.name.clone(), v);
                    }
                }
                Some(_) => {}
                None => {
                    self.properties.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn pk(&self) -> Option<&FieldValue> {
        self.values
            .get(&self.options.pk_field().name)
            .filter(|v| !v.is_null())
    }

    /// True until the server has acknowledged the record (`links` when declared, else the primary key).
    pub fn is_new(&self) -> bool {
        if self.options.has_field("links") {
            self.get("links").is_none()
        } else {
            self.pk().is_none()
        }
    }

    /// Validate every writable field; fails on the first invalid one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for field in self.options.fields().iter().filter(|f| !f.read_only) {
            let value = self.values.get(&field.name).unwrap_or(&FieldValue::Null);
            field.validate(value)?;
        }
        Ok(())
    }

    /// Populate from a server payload. Unknown keys are ignored; read-only checks do not apply.
    pub fn to_python(&mut self, data: &Value) -> Result<(), ValidationError> {
        let Some(map) = data.as_object() else {
            return Ok(());
        };
        let options = self.options.clone();
        for field in options.fields() {
            let Some(raw) = map.get(&field.name) else {
                continue;
            };
            let value = match (&field.kind, raw) {
                (FieldKind::Model { target, .. }, Value::Object(_)) => {
                    match self.session.options_for(target) {
                        Ok(options) => FieldValue::Model(Box::new(Model::from_response(
                            self.session.clone(),
                            options,
                            self.inherited_properties(),
                            raw,
                        )?)),
                        Err(_) => field.to_python(raw)?,
                    }
                }
                _ => field.to_python(raw)?,
            };
            self.values.insert(field.name.clone(), value);
        }
        Ok(())
    }

    /// Payload of writable data fields; unset optional fields are omitted.
    pub fn to_native(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for field in self.options.fields() {
            if field.read_only || !field.has_data {
                continue;
            }
            match self.values.get(&field.name) {
                Some(value) if !value.is_null() => {
                    out.insert(field.name.clone(), field.to_native(value));
                }
                _ if field.blank => {}
                _ => {
                    out.insert(field.name.clone(), Value::Null);
                }
            }
        }
        out
    }

    /// Values feeding URL templates.
    pub fn get_endpoint_data(&self) -> Properties {
        let mut data = self.properties.clone();
        for field in self.options.fields().iter().filter(|f| f.has_endpoint_data) {
            if let Some(value) = self.values.get(&field.name).and_then(FieldValue::as_property) {
                data.insert(field.name.clone(), value);
            }
        }
        data
    }

    fn inherited_properties(&self) -> Properties {
        self.get_endpoint_data()
            .into_iter()
            .filter(|(k, _)| k == "instance_name")
            .collect()
    }

    fn coerce_reference(&self, kind: &FieldKind, value: FieldValue) -> Result<FieldValue> {
        match (kind, &value) {
            (FieldKind::Model { target, .. }, FieldValue::Json(raw @ Value::Object(_))) => {
                let options = self.session.options_for(target)?;
                Ok(FieldValue::Model(Box::new(Model::from_response(
                    self.session.clone(),
                    options,
                    self.inherited_properties(),
                    raw,
                )?)))
            }
            _ => Ok(value),
        }
    }

    fn request_for(&self, endpoint: &str, method: Method, body: Option<Value>) -> Result<BatchRequest> {
        self.options.check_method(endpoint, method)?;
        let properties = self.get_endpoint_data();
        let path = self.options.resolve_endpoint(endpoint, &properties)?;
        Ok(BatchRequest {
            body: BatchBody { method, path, body },
            meta: BatchMeta {
                model: self.options.clone(),
                properties,
            },
        })
    }

    fn require_persisted(&self, action: &'static str) -> Result<(), ValidationError> {
        if self.is_new() {
            return Err(ValidationError::NotPersisted {
                model: self.options.name.clone(),
                action,
            });
        }
        Ok(())
    }

    /// Pending save: POST `list` when new, otherwise PUT `detail` (PATCH when PUT is not allowed).
    pub fn save_request(&self) -> Result<BatchRequest> {
        self.validate()?;
        let data = Value::Object(self.to_native());
        if self.is_new() {
            self.request_for("list", Method::Post, Some(data))
        } else {
            let method = self
                .options
                .allowed_method("detail", &[Method::Put, Method::Patch])?;
            self.request_for("detail", method, Some(data))
        }
    }

    pub fn delete_request(&self) -> Result<BatchRequest> {
        self.require_persisted("delete")?;
        self.request_for("detail", Method::Delete, None)
    }

    async fn send(&self, pending: &BatchRequest) -> Result<Value> {
        let mut request = Request::new(pending.body.method, pending.body.path.clone());
        if let Some(body) = &pending.body.body {
            request = request.data(body.clone());
        }
        let value = self.session.request(request).await.map_err(|e| {
            if pending.body.method != Method::Post {
                not_found_as(e, &self.options.name)
            } else {
                e.into()
            }
        })?;
        self.session
            .note_properties(&self.options, &pending.meta.properties);
        Ok(value)
    }

    pub async fn save(&mut self) -> Result<&mut Self> {
        let pending = self.save_request()?;
        let value = self.send(&pending).await?;
        self.to_python(&value)?;
        Ok(self)
    }

    /// Delete server-side, then clear local values.
    pub async fn delete(&mut self) -> Result<()> {
        let pending = self.delete_request()?;
        self.send(&pending).await?;
        self.values.clear();
        Ok(())
    }

    pub async fn reload(&mut self) -> Result<&mut Self> {
        self.require_persisted("reload")?;
        let pending = self.request_for("detail", Method::Get, None)?;
        let value = self.send(&pending).await?;
        self.to_python(&value)?;
        Ok(self)
    }

    /// Call a named endpoint of this record and return the raw response.
    pub async fn call_endpoint(&self, endpoint: &str, method: Method, body: Option<Value>) -> Result<Value> {
        let pending = self.request_for(endpoint, method, body)?;
        self.send(&pending).await
    }

    /// Fetch the resource behind one of this record's `links` entries.
    pub async fn follow(&self, link: &str) -> Result<Model> {
        let path = self
            .get("links")
            .and_then(FieldValue::as_json)
            .and_then(|links| links.get(link))
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::UnknownEndpoint {
                model: self.options.name.clone(),
                endpoint: link.to_string(),
            })?
            .to_string();
        self.session.follow(&path).await
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.options.name == other.options.name && self.pk() == other.pk()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&self.options.name)
            .field("values", &self.values)
            .field("properties", &self.properties)
            .finish()
    }
}
