//! Resolved model options: declarations validated and flattened for runtime use.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use crate::config::{EndpointConfig, FieldConfig, Method, ModelConfig, ModelKind};
use crate::error::ConfigError;
use crate::fields::Field;

/// URL-template parameter values bound on a manager or a record.
pub type Properties = BTreeMap<String, String>;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern"))
}

/// A named, parameterized path plus its allowed verbs.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub name: String,
    pub methods: Vec<Method>,
    pub path: String,
    /// `{placeholder}` names in template order.
    pub properties: Vec<String>,
    pattern: Regex,
}

impl Endpoint {
    pub fn new(name: &str, config: &EndpointConfig) -> Result<Self, ConfigError> {
        let mut properties = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0;
        for caps in placeholder_re().captures_iter(&config.path) {
            let (Some(whole), Some(prop)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            pattern.push_str(&regex::escape(&config.path[last..whole.start()]));
            pattern.push_str(&format!("(?P<{}>[^/]+)", prop.as_str()));
            last = whole.end();
            if properties.iter().any(|p| p == prop.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "endpoint {} repeats placeholder {}",
                    name,
                    prop.as_str()
                )));
            }
            properties.push(prop.as_str().to_string());
        }
        pattern.push_str(&regex::escape(&config.path[last..]));
        pattern.push('$');
        let pattern = Regex::new(&pattern)
            .map_err(|e| ConfigError::Validation(format!("endpoint {}: {}", name, e)))?;
        Ok(Endpoint {
            name: name.to_string(),
            methods: config.methods.clone(),
            path: config.path.clone(),
            properties,
            pattern,
        })
    }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Substitute every placeholder; returns the first missing property name on failure.
    pub fn resolve(&self, properties: &Properties) -> Result<String, String> {
        let mut path = self.path.clone();
        for prop in &self.properties {
            let value = properties.get(prop).ok_or_else(|| prop.clone())?;
            path = path.replace(&format!("{{{}}}", prop), value);
        }
        Ok(path)
    }

    /// Extract properties from a concrete path (host and query string are ignored).
    pub fn matches(&self, path: &str) -> Option<Properties> {
        let caps = self.pattern.captures(strip_path(path))?;
        Some(
            self.properties
                .iter()
                .filter_map(|p| caps.name(p).map(|m| (p.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

fn strip_path(path: &str) -> &str {
    let path = match path.find("://") {
        Some(i) => {
            let rest = &path[i + 3..];
            rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
        }
        None => path,
    };
    path.split('?').next().unwrap_or(path)
}

/// Per-model configuration: ordered fields, name index, endpoint table, parent linkage.
#[derive(Clone, Debug)]
pub struct ModelOptions {
    pub name: String,
    pub kind: ModelKind,
    pub parent: Option<String>,
    fields: Vec<Arc<Field>>,
    field_index: HashMap<String, usize>,
    pk: Option<usize>,
    endpoints: BTreeMap<String, Endpoint>,
}

impl ModelOptions {
    pub fn build(config: &ModelConfig) -> Result<Self, ConfigError> {
        let mut options = ModelOptions {
            name: config.name.clone(),
            kind: config.kind,
            parent: config.parent.clone(),
            fields: Vec::with_capacity(config.fields.len()),
            field_index: HashMap::new(),
            pk: None,
            endpoints: BTreeMap::new(),
        };
        for field in &config.fields {
            options.contribute(field)?;
        }
        if options.pk.is_none() {
            return Err(ConfigError::MissingPrimaryKey(config.name.clone()));
        }
        for (name, endpoint) in &config.endpoints {
            options
                .endpoints
                .insert(name.clone(), Endpoint::new(name, endpoint)?);
        }
        tracing::debug!(model = %options.name, fields = options.fields.len(), endpoints = options.endpoints.len(), "model options built");
        Ok(options)
    }

    /// Bind a field: register it, assign a fallback label, enforce the single primary key.
    fn contribute(&mut self, config: &FieldConfig) -> Result<(), ConfigError> {
        if config.name == "pk" || self.field_index.contains_key(&config.name) {
            return Err(ConfigError::DuplicateField {
                model: self.name.clone(),
                field: config.name.clone(),
            });
        }
        let mut field = Field::from_config(config)?;
        if field.label.is_empty() {
            field.label = Field::default_label(&field.name);
        }
        let index = self.fields.len();
        if field.primary_key {
            if let Some(existing) = self.pk {
                return Err(ConfigError::DuplicatePrimaryKey {
                    model: self.name.clone(),
                    first: self.fields[existing].name.clone(),
                    second: field.name.clone(),
                });
            }
            self.pk = Some(index);
        }
        self.field_index.insert(field.name.clone(), index);
        self.fields.push(Arc::new(field));
        Ok(())
    }

    /// Copy of these options extended with extra (server-defined) fields.
    pub fn extend(&self, extra: &[FieldConfig]) -> Result<Self, ConfigError> {
        let mut options = self.clone();
        for field in extra {
            options.contribute(field)?;
        }
        Ok(options)
    }

    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Field by name; `pk` aliases the primary-key field.
    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        if name == "pk" {
            return self.pk.map(|i| &self.fields[i]);
        }
        self.field_index.get(name).map(|i| &self.fields[*i])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn pk_field(&self) -> &Field {
        // build() guarantees a primary key
        let i = self.pk.unwrap_or(0);
        &self.fields[i]
    }

    pub fn endpoint(&self, name: &str) -> Result<&Endpoint, ConfigError> {
        self.endpoints
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEndpoint {
                model: self.name.clone(),
                endpoint: name.to_string(),
            })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    pub fn get_endpoint_methods(&self, name: &str) -> Result<&[Method], ConfigError> {
        Ok(&self.endpoint(name)?.methods)
    }

    pub fn get_endpoint_properties(&self, name: &str) -> Result<&[String], ConfigError> {
        Ok(&self.endpoint(name)?.properties)
    }

    /// Reject a verb the endpoint does not advertise.
    pub fn check_method(&self, name: &str, method: Method) -> Result<(), ConfigError> {
        if self.endpoint(name)?.allows(method) {
            Ok(())
        } else {
            Err(ConfigError::MethodNotAllowed {
                model: self.name.clone(),
                endpoint: name.to_string(),
                method: method.to_string(),
            })
        }
    }

    /// First of `preferred` the endpoint allows.
    pub fn allowed_method(&self, name: &str, preferred: &[Method]) -> Result<Method, ConfigError> {
        let endpoint = self.endpoint(name)?;
        preferred
            .iter()
            .copied()
            .find(|m| endpoint.allows(*m))
            .ok_or_else(|| ConfigError::MethodNotAllowed {
                model: self.name.clone(),
                endpoint: name.to_string(),
                method: preferred
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join("|"),
            })
    }

    pub fn resolve_endpoint(&self, name: &str, properties: &Properties) -> Result<String, ConfigError> {
        self.endpoint(name)?
            .resolve(properties)
            .map_err(|property| ConfigError::MissingProperty {
                model: self.name.clone(),
                endpoint: name.to_string(),
                property,
            })
    }
}

/// Cached options of a server-defined class schema.
#[derive(Clone, Debug)]
struct CachedSchema {
    identity: String,
    options: Arc<ModelOptions>,
}

/// Model name -> options, path pattern -> model, and the dynamic schema cache.
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, Arc<ModelOptions>>,
    order: Vec<String>,
    schemas: RwLock<HashMap<(String, String), CachedSchema>>,
}

impl Registry {
    pub(crate) fn insert(&mut self, options: ModelOptions) -> Result<(), ConfigError> {
        if self.models.contains_key(&options.name) {
            return Err(ConfigError::Validation(format!(
                "model {} registered twice",
                options.name
            )));
        }
        self.order.push(options.name.clone());
        self.models.insert(options.name.clone(), Arc::new(options));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<ModelOptions>, ConfigError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered model names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Find the model and endpoint whose path template matches `path`.
    pub fn match_path(&self, path: &str) -> Option<(Arc<ModelOptions>, String, Properties)> {
        for name in &self.order {
            let options = &self.models[name];
            for endpoint in options.endpoints() {
                if let Some(props) = endpoint.matches(path) {
                    return Some((options.clone(), endpoint.name.clone(), props));
                }
            }
        }
        None
    }

    pub fn cached_schema(&self, instance: &str, class: &str) -> Option<Arc<ModelOptions>> {
        self.read_schemas()
            .get(&(instance.to_string(), class.to_string()))
            .map(|c| c.options.clone())
    }

    /// Cached options if the stored schema identity matches.
    pub fn cached_schema_with(&self, instance: &str, class: &str, identity: &str) -> Option<Arc<ModelOptions>> {
        self.read_schemas()
            .get(&(instance.to_string(), class.to_string()))
            .filter(|c| c.identity == identity)
            .map(|c| c.options.clone())
    }

    pub fn cache_schema(&self, instance: &str, class: &str, identity: String, options: Arc<ModelOptions>) {
        let mut schemas = self.schemas.write().unwrap_or_else(|poisoned| {
            tracing::warn!("schema cache lock poisoned, recovering");
            poisoned.into_inner()
        });
        schemas.insert(
            (instance.to_string(), class.to_string()),
            CachedSchema { identity, options },
        );
    }

    fn read_schemas(&self) -> RwLockReadGuard<'_, HashMap<(String, String), CachedSchema>> {
        self.schemas.read().unwrap_or_else(|poisoned| {
            tracing::warn!("schema cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
