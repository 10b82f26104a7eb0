//! Shared client context: connection, model registry, and the last addressed instance.

use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

use crate::config::{resolve, FullConfig, Method, ModelKind, ModelOptions, Properties, Registry};
use crate::connection::{Connection, Request};
use crate::error::{ConfigError, Error, RequestError, Result};
use crate::manager::{BatchRequest, BatchResult, Manager, MAX_BATCH_SIZE};
use crate::model::Model;
use crate::models::{builtin_config, object};
use crate::response::{parse, BatchEntry};

/// Passed to every manager and model. Replaces process-wide globals.
pub struct Session {
    connection: Arc<dyn Connection>,
    registry: Registry,
    default_instance: Option<String>,
    /// Most recently addressed instance; scopes batch requests.
    last_used_instance: RwLock<Option<String>>,
}

impl Session {
    pub fn new(connection: Arc<dyn Connection>, registry: Registry) -> Self {
        Session {
            connection,
            registry,
            default_instance: None,
            last_used_instance: RwLock::new(None),
        }
    }

    /// Session over the built-in models.
    pub fn with_builtins(connection: Arc<dyn Connection>) -> Result<Self, ConfigError> {
        Self::with_config(connection, FullConfig::default())
    }

    /// Built-in models merged with `extra` (same-named declarations replace built-ins).
    pub fn with_config(connection: Arc<dyn Connection>, extra: FullConfig) -> Result<Self, ConfigError> {
        let registry = resolve(&builtin_config().merge(extra))?;
        Ok(Self::new(connection, registry))
    }

    /// Instance bound on every new manager whose endpoints take `instance_name`.
    pub fn with_instance(mut self, instance_name: &str) -> Self {
        self.default_instance = Some(instance_name.to_string());
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn default_instance(&self) -> Option<&str> {
        self.default_instance.as_deref()
    }

    pub fn last_used_instance(&self) -> Option<String> {
        self.last_used_instance
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::warn!("last used instance lock poisoned, recovering");
                poisoned.into_inner()
            })
            .clone()
    }

    pub fn set_used_instance(&self, instance_name: &str) {
        let mut guard = self.last_used_instance.write().unwrap_or_else(|poisoned| {
            tracing::warn!("last used instance lock poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = Some(instance_name.to_string());
    }

    /// Remember the instance addressed by a request on `options` with `properties`.
    pub(crate) fn note_properties(&self, options: &ModelOptions, properties: &Properties) {
        if let Some(name) = Self::instance_of(options, properties) {
            self.set_used_instance(name);
        }
    }

    pub fn options_for(&self, model: &str) -> Result<Arc<ModelOptions>, ConfigError> {
        self.registry.get(model)
    }

    /// Manager for a registered model.
    pub fn please(self: &Arc<Self>, model: &str) -> Result<Manager, ConfigError> {
        Ok(Manager::new(self.clone(), self.registry.get(model)?))
    }

    /// Unsaved record of a registered model.
    pub fn model(self: &Arc<Self>, model: &str) -> Result<Model, ConfigError> {
        Ok(Model::new(self.clone(), self.registry.get(model)?))
    }

    /// Object manager for one class; the class schema is fetched once and cached.
    pub async fn objects(self: &Arc<Self>, instance_name: &str, class_name: &str) -> Result<Manager> {
        let options = match self.registry.cached_schema(instance_name, class_name) {
            Some(options) => options,
            None => {
                tracing::debug!(instance = instance_name, class = class_name, "schema cache miss");
                let class = self
                    .please("Class")?
                    .property("instance_name", instance_name)
                    .get([class_name])
                    .await?;
                self.object_options(instance_name, &class)?
            }
        };
        Ok(Manager::new(self.clone(), options)
            .property("instance_name", instance_name)
            .property("class_name", class_name))
    }

    /// Object manager built from an already fetched `Class` record.
    pub fn objects_for(self: &Arc<Self>, class: &Model) -> Result<Manager> {
        let instance_name = class
            .get_endpoint_data()
            .get("instance_name")
            .cloned()
            .or_else(|| self.default_instance.clone())
            .ok_or_else(|| ConfigError::MissingProperty {
                model: "Class".into(),
                endpoint: "detail".into(),
                property: "instance_name".into(),
            })?;
        let class_name = class
            .get_str("name")
            .ok_or_else(|| ConfigError::MissingProperty {
                model: "Class".into(),
                endpoint: "detail".into(),
                property: "name".into(),
            })?
            .to_string();
        let options = self.object_options(&instance_name, class)?;
        Ok(Manager::new(self.clone(), options)
            .property("instance_name", instance_name.as_str())
            .property("class_name", class_name.as_str()))
    }

    fn object_options(&self, instance_name: &str, class: &Model) -> Result<Arc<ModelOptions>> {
        let class_name = class.get_str("name").unwrap_or_default();
        let schema = class.get("schema").map(|v| v.to_json()).unwrap_or(Value::Array(Vec::new()));
        let identity = schema.to_string();
        if let Some(options) = self.registry.cached_schema_with(instance_name, class_name, &identity) {
            return Ok(options);
        }
        let base = self.registry.get("Object")?;
        if base.kind != ModelKind::Object {
            return Err(ConfigError::Validation("Object model must be an object kind".into()).into());
        }
        let columns = object::parse_schema(&schema)?;
        let options = Arc::new(base.extend(&object::schema_fields(&columns))?);
        self.registry
            .cache_schema(instance_name, class_name, identity, options.clone());
        Ok(options)
    }

    /// Issue one request through the connection.
    pub async fn request(&self, request: Request) -> Result<Value, RequestError> {
        tracing::debug!(method = %request.method, path = %request.path, "api request");
        self.connection.request(request).await
    }

    /// Fetch a single resource by path (e.g. a `links` entry) and wrap it in its registered model.
    pub async fn follow(self: &Arc<Self>, path: &str) -> Result<Model> {
        let (options, _endpoint, properties) = self
            .registry
            .match_path(path)
            .ok_or_else(|| ConfigError::Validation(format!("no model matches path {}", path)))?;
        let value = self
            .request(Request::new(Method::Get, path))
            .await
            .map_err(|e| not_found_as(e, &options.name))?;
        self.note_properties(&options, &properties);
        Ok(Model::from_response(self.clone(), options, properties, &value)?)
    }

    /// Instance addressed by a request on `options` with `properties`.
    fn instance_of<'a>(options: &ModelOptions, properties: &'a Properties) -> Option<&'a String> {
        match properties.get("instance_name") {
            Some(name) => Some(name),
            None if options.name == "Instance" => properties.get("name"),
            None => None,
        }
    }

    /// Batch endpoint of the instance the requests address; falls back to the
    /// last used instance, then the default, when no request names one.
    fn batch_path(&self, requests: &[BatchRequest]) -> Result<(String, String), ConfigError> {
        let mut addressed: Option<&String> = None;
        for request in requests {
            let Some(name) = Self::instance_of(&request.meta.model, &request.meta.properties) else {
                continue;
            };
            match addressed {
                Some(existing) if existing != name => {
                    return Err(ConfigError::MixedBatch(format!(
                        "requests address instances {} and {}",
                        existing, name
                    )));
                }
                _ => addressed = Some(name),
            }
        }
        let instance = addressed
            .cloned()
            .or_else(|| self.last_used_instance())
            .or_else(|| self.default_instance.clone())
            .ok_or_else(|| ConfigError::MissingProperty {
                model: "Instance".into(),
                endpoint: "batch".into(),
                property: "name".into(),
            })?;
        let options = self.registry.get("Instance")?;
        options.check_method("batch", Method::Post)?;
        let mut properties = Properties::new();
        properties.insert("name".into(), instance.clone());
        let path = options.resolve_endpoint("batch", &properties)?;
        Ok((instance, path))
    }

    /// Submit pending requests as one call; results keep submission order.
    pub async fn batch(self: &Arc<Self>, requests: Vec<BatchRequest>) -> Result<Vec<BatchResult>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchTooLarge {
                size: requests.len(),
                max: MAX_BATCH_SIZE,
            }
            .into());
        }
        let (instance, path) = self.batch_path(&requests)?;
        self.set_used_instance(&instance);
        let bodies: Vec<Value> = requests.iter().map(|r| r.body.to_json()).collect();
        let response = self
            .request(Request::new(Method::Post, path).data(json!({ "requests": bodies })))
            .await?;
        let entries: Vec<BatchEntry> = parse(response)?;
        if entries.len() != requests.len() {
            return Err(RequestError::Decode(format!(
                "batch returned {} results for {} requests",
                entries.len(),
                requests.len()
            ))
            .into());
        }
        requests
            .into_iter()
            .zip(entries)
            .map(|(request, entry)| BatchResult::from_entry(self, request, entry))
            .collect()
    }
}

/// Map a 404 to the model-scoped "does not exist" error.
pub(crate) fn not_found_as(err: RequestError, model: &str) -> Error {
    if err.is_not_found() {
        Error::DoesNotExist {
            model: model.to_string(),
        }
    } else {
        Error::Request(err)
    }
}
