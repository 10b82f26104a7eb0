//! Per-model query builder ("please"). Every chain method returns a fresh copy.

mod batch;
pub mod lookup;
mod results;

pub use batch::{BatchBody, BatchMeta, BatchRequest, BatchResult, LazyManager, MAX_BATCH_SIZE};
pub use results::{RawResults, Results};

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{Method, ModelKind, ModelOptions, Properties};
use crate::connection::Request;
use crate::error::{ConfigError, Result};
use crate::fields::FieldValue;
use crate::model::Model;
use crate::response::{parse, CountResponse};
use crate::state::{not_found_as, Session};

/// Empty positional argument list.
pub const NO_ARGS: [FieldValue; 0] = [];

/// Empty keyword argument list.
pub const NO_KWARGS: [(&str, FieldValue); 0] = [];

fn collect_kwargs<K: Into<String>, V: Into<FieldValue>>(
    kwargs: impl IntoIterator<Item = (K, V)>,
) -> Vec<(String, FieldValue)> {
    kwargs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[derive(Clone)]
pub struct Manager {
    session: Arc<Session>,
    options: Arc<ModelOptions>,
    properties: Properties,
    query: BTreeMap<String, String>,
    lookups: Map<String, Value>,
    data: Map<String, Value>,
    limit: Option<usize>,
    endpoint: String,
    method: Method,
}

impl Manager {
    pub fn new(session: Arc<Session>, options: Arc<ModelOptions>) -> Self {
        let mut properties = Properties::new();
        if let Some(instance) = session.default_instance() {
            let scoped = options
                .endpoints()
                .any(|e| e.properties.iter().any(|p| p == "instance_name"));
            if scoped {
                properties.insert("instance_name".into(), instance.to_string());
            }
        }
        Manager {
            session,
            options,
            properties,
            query: BTreeMap::new(),
            lookups: Map::new(),
            data: Map::new(),
            limit: None,
            endpoint: "list".into(),
            method: Method::Get,
        }
    }

    pub fn options(&self) -> &Arc<ModelOptions> {
        &self.options
    }

    pub fn properties_bound(&self) -> &Properties {
        &self.properties
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn data_bound(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Query-string parameters, with object lookups serialized under `query`.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        let mut params = self.query.clone();
        if !self.lookups.is_empty() {
            params.insert("query".into(), Value::Object(self.lookups.clone()).to_string());
        }
        params
    }

    fn is_object(&self) -> bool {
        self.options.kind == ModelKind::Object
    }

    // Chain methods

    /// Bind one URL parameter; a null value unbinds it.
    pub fn property(&self, key: &str, value: impl Into<FieldValue>) -> Self {
        let mut m = self.clone();
        match value.into().as_property() {
            Some(v) => {
                m.properties.insert(key.to_string(), v);
            }
            None => {
                m.properties.remove(key);
            }
        }
        m
    }

    pub fn properties<K: Into<String>, V: Into<FieldValue>>(&self, kwargs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut m = self.clone();
        m.bind_kwargs(collect_kwargs(kwargs));
        m
    }

    fn bind_kwargs(&mut self, kwargs: Vec<(String, FieldValue)>) {
        for (k, v) in kwargs {
            if let Some(v) = v.as_property() {
                self.properties.insert(k, v);
            }
        }
    }

    pub fn limit(&self, limit: usize) -> Self {
        let mut m = self.clone();
        m.limit = Some(limit);
        m
    }

    pub fn page_size(&self, size: usize) -> Self {
        let mut m = self.clone();
        m.query.insert("page_size".into(), size.to_string());
        m
    }

    /// Explicit payload for `update`; its keys win over keyword arguments.
    pub fn data(&self, data: Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = data else {
            return Err(ConfigError::Validation("update data must be a JSON object".into()));
        };
        let mut m = self.clone();
        m.data.extend(map);
        Ok(m)
    }

    pub fn list(&self) -> Self {
        let mut m = self.clone();
        m.endpoint = "list".into();
        m.method = Method::Get;
        m
    }

    /// `list()` without a result limit.
    pub fn all(&self) -> Self {
        let mut m = self.list();
        m.limit = None;
        m
    }

    /// Object managers: server-side lookups. Other managers: bind URL parameters.
    pub fn filter<K: Into<String>, V: Into<FieldValue>>(
        &self,
        lookups: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ConfigError> {
        let mut m = self.list();
        let kwargs = collect_kwargs(lookups);
        if !m.is_object() {
            m.bind_kwargs(kwargs);
            return Ok(m);
        }
        for (key, value) in kwargs {
            let parsed = lookup::parse(&m.options, &key, value)?;
            let entry = m
                .lookups
                .entry(parsed.field)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(parsed.operator, parsed.value);
            }
        }
        Ok(m)
    }

    /// Object managers only; a leading `-` sorts descending.
    pub fn order_by(&self, field: &str) -> Result<Self, ConfigError> {
        if !self.is_object() {
            return Err(ConfigError::InvalidOrdering(format!(
                "order_by is only available on object managers, {} uses ordering()",
                self.options.name
            )));
        }
        let name = field.strip_prefix('-').unwrap_or(field);
        let f = self.options.field(name).ok_or_else(|| ConfigError::UnknownField {
            model: self.options.name.clone(),
            field: name.to_string(),
        })?;
        if !f.order_index {
            return Err(ConfigError::InvalidOrdering(format!(
                "{} is not an order field",
                f.name
            )));
        }
        let mut m = self.clone();
        let value = if field.starts_with('-') {
            format!("-{}", f.name)
        } else {
            f.name.clone()
        };
        m.query.insert("order_by".into(), value);
        Ok(m)
    }

    /// `asc` or `desc`; not available on object managers.
    pub fn ordering(&self, direction: &str) -> Result<Self, ConfigError> {
        if self.is_object() {
            return Err(ConfigError::InvalidOrdering(
                "ordering is not available on object managers, use order_by".into(),
            ));
        }
        let direction = direction.to_lowercase();
        if direction != "asc" && direction != "desc" {
            return Err(ConfigError::InvalidOrdering(format!(
                "expected asc or desc, got {}",
                direction
            )));
        }
        let mut m = self.clone();
        m.query.insert("ordering".into(), direction);
        Ok(m)
    }

    /// Terminal verbs return raw JSON instead of records.
    pub fn raw(&self) -> RawManager {
        RawManager { inner: self.clone() }
    }

    /// Write verbs return pending requests instead of executing.
    pub fn as_batch(&self) -> LazyManager {
        LazyManager::new(self.clone())
    }

    // Request preparation

    /// Map positional arguments onto the endpoint's unbound properties in order.
    /// With fewer arguments than properties and an id-like property among them,
    /// the last argument binds to the id.
    fn bind_args(&mut self, endpoint: &str, args: Vec<FieldValue>) -> Result<(), ConfigError> {
        if args.is_empty() {
            return Ok(());
        }
        let mut unbound: Vec<String> = self
            .options
            .get_endpoint_properties(endpoint)?
            .iter()
            .filter(|p| !self.properties.contains_key(*p))
            .cloned()
            .collect();
        if args.len() > unbound.len() {
            return Err(ConfigError::Validation(format!(
                "{}.{} takes {} positional argument(s), got {}",
                self.options.name,
                endpoint,
                unbound.len(),
                args.len()
            )));
        }
        let mut targets = Vec::with_capacity(args.len());
        if args.len() < unbound.len() {
            let pk = self.options.pk_field().name.clone();
            if let Some(pos) = unbound.iter().position(|p| *p == "id" || *p == pk) {
                let id = unbound.remove(pos);
                targets.extend(unbound.into_iter().take(args.len() - 1));
                targets.push(id);
            } else {
                targets.extend(unbound.into_iter().take(args.len()));
            }
        } else {
            targets = unbound;
        }
        for (prop, arg) in targets.into_iter().zip(args) {
            let value = arg.as_property().ok_or_else(|| ConfigError::InvalidLookupValue {
                field: prop.clone(),
                lookup: "positional".into(),
                reason: "expected a scalar value".into(),
            })?;
            self.properties.insert(prop, value);
        }
        Ok(())
    }

    fn pending(&self, body: Option<Value>) -> Result<BatchRequest, ConfigError> {
        self.options.check_method(&self.endpoint, self.method)?;
        let path = self.options.resolve_endpoint(&self.endpoint, &self.properties)?;
        Ok(BatchRequest {
            body: BatchBody {
                method: self.method,
                path,
                body,
            },
            meta: BatchMeta {
                model: self.options.clone(),
                properties: self.properties.clone(),
            },
        })
    }

    pub(crate) fn prepare_get<V: Into<FieldValue>>(
        &self,
        args: impl IntoIterator<Item = V>,
    ) -> Result<(Manager, BatchRequest), ConfigError> {
        let mut m = self.clone();
        m.endpoint = "detail".into();
        m.method = Method::Get;
        m.bind_args("detail", args.into_iter().map(Into::into).collect())?;
        let pending = m.pending(None)?;
        Ok((m, pending))
    }

    pub(crate) fn prepare_update<A, K, V>(
        &self,
        args: impl IntoIterator<Item = A>,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(Manager, BatchRequest)>
    where
        A: Into<FieldValue>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut m = self.clone();
        m.endpoint = "detail".into();
        let kwargs = collect_kwargs(kwargs);
        let detail_props = m.options.get_endpoint_properties("detail")?.to_vec();
        for (k, v) in &kwargs {
            if detail_props.contains(k) {
                if let Some(p) = v.as_property() {
                    m.properties.insert(k.clone(), p);
                }
            }
        }
        m.bind_args("detail", args.into_iter().map(Into::into).collect())?;
        m.method = m
            .options
            .allowed_method("detail", &[Method::Patch, Method::Put, Method::Post])?;

        let mut body = Map::new();
        for (k, v) in kwargs {
            match m.options.field(&k) {
                Some(field) if !field.has_data => {}
                Some(field) => {
                    let value = field.coerce(v)?;
                    body.insert(field.name.clone(), field.to_native(&value));
                }
                None if detail_props.contains(&k) => {}
                None => {
                    body.insert(k, v.to_json());
                }
            }
        }
        for (k, v) in &m.data {
            match m.options.field(k) {
                Some(field) => {
                    let value = field.to_python(v)?;
                    body.insert(field.name.clone(), field.to_native(&value));
                }
                None => {
                    body.insert(k.clone(), v.clone());
                }
            }
        }
        let pending = m.pending(Some(Value::Object(body)))?;
        Ok((m, pending))
    }

    pub(crate) fn prepare_delete<V: Into<FieldValue>>(
        &self,
        args: impl IntoIterator<Item = V>,
    ) -> Result<(Manager, BatchRequest), ConfigError> {
        let mut m = self.clone();
        m.endpoint = "detail".into();
        m.method = Method::Delete;
        m.bind_args("detail", args.into_iter().map(Into::into).collect())?;
        let pending = m.pending(None)?;
        Ok((m, pending))
    }

    /// Unsaved record carrying this manager's properties plus `kwargs`.
    pub(crate) fn new_model<K: Into<String>, V: Into<FieldValue>>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Model> {
        let mut model = Model::new(self.session.clone(), self.options.clone());
        let mut extra = Properties::new();
        for (k, v) in collect_kwargs(kwargs) {
            if self.options.has_field(&k) {
                model.set(&k, v)?;
            } else if let Some(p) = v.as_property() {
                extra.insert(k, p);
            }
        }
        model.bind_properties(&self.properties);
        model.bind_properties(&extra);
        Ok(model)
    }

    async fn send(&self, pending: &BatchRequest, params: BTreeMap<String, String>) -> Result<Value> {
        tracing::debug!(
            model = %self.options.name,
            endpoint = %self.endpoint,
            method = %pending.body.method,
            "manager request"
        );
        let mut request = Request::new(pending.body.method, pending.body.path.clone()).params(params);
        if let Some(body) = &pending.body.body {
            request = request.data(body.clone());
        }
        let value = self.session.request(request).await.map_err(|e| {
            if self.endpoint == "detail" {
                not_found_as(e, &self.options.name)
            } else {
                e.into()
            }
        })?;
        self.session
            .note_properties(&self.options, &pending.meta.properties);
        Ok(value)
    }

    fn to_model(&self, value: &Value) -> Result<Model> {
        Ok(Model::from_response(
            self.session.clone(),
            self.options.clone(),
            self.properties.clone(),
            value,
        )?)
    }

    fn raw_results(&self) -> Result<RawResults, ConfigError> {
        let m = self.list();
        m.options.check_method("list", Method::Get)?;
        let path = m.options.resolve_endpoint("list", &m.properties)?;
        let first = Request::new(Method::Get, path).params(m.query_params());
        Ok(RawResults::new(
            m.session.clone(),
            m.options.clone(),
            m.properties.clone(),
            first,
            m.limit,
        ))
    }

    // Terminal verbs

    /// GET `detail`. A 404 becomes [`Error::DoesNotExist`](crate::Error::DoesNotExist).
    pub async fn get<V: Into<FieldValue>>(&self, args: impl IntoIterator<Item = V>) -> Result<Model> {
        let (m, pending) = self.prepare_get(args)?;
        let value = m.send(&pending, m.query.clone()).await?;
        m.to_model(&value)
    }

    /// First record of the list, or `None` when it is empty. Kwargs bind like [`Manager::properties`].
    pub async fn first<K: Into<String>, V: Into<FieldValue>>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Option<Model>> {
        self.properties(kwargs).list().page_size(1).limit(1).iterator()?.next().await
    }

    pub fn iterator(&self) -> Result<Results, ConfigError> {
        Ok(Results::new(self.raw_results()?))
    }

    /// Collect every record the iterator yields.
    pub async fn fetch(&self) -> Result<Vec<Model>> {
        self.iterator()?.into_vec().await
    }

    /// Count-only request: zero page size, server-reported `objects_count`.
    pub async fn count(&self) -> Result<u64> {
        let m = self.list();
        m.options.check_method("list", Method::Get)?;
        let path = m.options.resolve_endpoint("list", &m.properties)?;
        let mut params = m.query_params();
        params.insert("page_size".into(), "0".into());
        params.insert("include_count".into(), "true".into());
        let response = m.session.request(Request::new(Method::Get, path).params(params)).await?;
        m.session.note_properties(&m.options, &m.properties);
        let count: CountResponse = parse(response)?;
        Ok(count.objects_count)
    }

    pub async fn create<K: Into<String>, V: Into<FieldValue>>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Model> {
        let mut model = self.new_model(kwargs)?;
        model.save().await?;
        Ok(model)
    }

    /// Partial update of `detail` (PATCH, else PUT, else POST). Keys set with [`Manager::data`] win.
    pub async fn update<A, K, V>(
        &self,
        args: impl IntoIterator<Item = A>,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Model>
    where
        A: Into<FieldValue>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let (m, pending) = self.prepare_update(args, kwargs)?;
        let value = m.send(&pending, BTreeMap::new()).await?;
        m.to_model(&value)
    }

    pub async fn delete<V: Into<FieldValue>>(&self, args: impl IntoIterator<Item = V>) -> Result<()> {
        let (m, pending) = self.prepare_delete(args)?;
        m.send(&pending, BTreeMap::new()).await?;
        Ok(())
    }

    /// `get` by `kwargs`; when missing, create from `defaults` overlaid with `kwargs`.
    pub async fn get_or_create<K, V, DK, DV>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
        defaults: impl IntoIterator<Item = (DK, DV)>,
    ) -> Result<(Model, bool)>
    where
        K: Into<String>,
        V: Into<FieldValue>,
        DK: Into<String>,
        DV: Into<FieldValue>,
    {
        let kwargs = collect_kwargs(kwargs);
        match self.properties(kwargs.clone()).get(NO_ARGS).await {
            Ok(model) => Ok((model, false)),
            Err(e) if e.is_does_not_exist() => {
                let mut attrs = collect_kwargs(defaults);
                attrs.retain(|(k, _)| !kwargs.iter().any(|(kk, _)| kk == k));
                attrs.extend(kwargs);
                Ok((self.create(attrs).await?, true))
            }
            Err(e) => Err(e),
        }
    }

    /// `update` of `kwargs` with `defaults` as data; when missing, create from both (`kwargs` win).
    pub async fn update_or_create<K, V, DK, DV>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
        defaults: impl IntoIterator<Item = (DK, DV)>,
    ) -> Result<(Model, bool)>
    where
        K: Into<String>,
        V: Into<FieldValue>,
        DK: Into<String>,
        DV: Into<FieldValue>,
    {
        let kwargs = collect_kwargs(kwargs);
        let defaults = collect_kwargs(defaults);
        let data: Map<String, Value> = defaults.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        match self.data(Value::Object(data))?.update(NO_ARGS, kwargs.clone()).await {
            Ok(model) => Ok((model, false)),
            Err(e) if e.is_does_not_exist() => {
                let mut attrs = defaults;
                attrs.retain(|(k, _)| !kwargs.iter().any(|(kk, _)| kk == k));
                attrs.extend(kwargs);
                Ok((self.create(attrs).await?, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Submit pending requests in one call to the batch endpoint of the instance they address.
    pub async fn batch(&self, requests: Vec<BatchRequest>) -> Result<Vec<BatchResult>> {
        self.session.batch(requests).await
    }

    /// Save unsaved records of this model in one batch.
    pub async fn bulk_create(&self, objects: Vec<Model>) -> Result<Vec<BatchResult>> {
        if objects.len() > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchTooLarge {
                size: objects.len(),
                max: MAX_BATCH_SIZE,
            }
            .into());
        }
        let mut scope: Option<(Option<String>, Option<String>)> = None;
        for object in &objects {
            if object.name() != self.options.name {
                return Err(ConfigError::MixedBatch(format!(
                    "expected {} objects, got {}",
                    self.options.name,
                    object.name()
                ))
                .into());
            }
            if !object.is_new() {
                return Err(ConfigError::MixedBatch("bulk_create accepts unsaved objects only".into()).into());
            }
            if self.is_object() {
                let data = object.get_endpoint_data();
                let key = (data.get("instance_name").cloned(), data.get("class_name").cloned());
                match &scope {
                    None => scope = Some(key),
                    Some(existing) if *existing != key => {
                        return Err(ConfigError::MixedBatch(
                            "objects must share one instance and one class".into(),
                        )
                        .into());
                    }
                    Some(_) => {}
                }
            }
        }
        let requests = objects
            .iter()
            .map(Model::save_request)
            .collect::<Result<Vec<_>>>()?;
        self.batch(requests).await
    }

    /// Fetch many records by primary key in one batch; failures keep their raw payload.
    pub async fn in_bulk<V: Into<FieldValue>>(
        &self,
        ids: impl IntoIterator<Item = V>,
    ) -> Result<BTreeMap<String, BatchResult>> {
        let lazy = self.as_batch();
        let mut keys = Vec::new();
        let mut requests = Vec::new();
        for id in ids {
            let id: FieldValue = id.into();
            let key = id.as_property().ok_or_else(|| ConfigError::InvalidLookupValue {
                field: self.options.pk_field().name.clone(),
                lookup: "in_bulk".into(),
                reason: "expected a scalar id".into(),
            })?;
            requests.push(lazy.get([id])?);
            keys.push(key);
        }
        let results = self.batch(requests).await?;
        Ok(keys.into_iter().zip(results).collect())
    }
}

/// Manager whose terminal verbs return raw JSON.
#[derive(Clone)]
pub struct RawManager {
    inner: Manager,
}

impl RawManager {
    pub async fn get<V: Into<FieldValue>>(&self, args: impl IntoIterator<Item = V>) -> Result<Value> {
        let (m, pending) = self.inner.prepare_get(args)?;
        m.send(&pending, m.query.clone()).await
    }

    pub fn iterator(&self) -> Result<RawResults, ConfigError> {
        self.inner.raw_results()
    }

    pub async fn fetch(&self) -> Result<Vec<Value>> {
        self.iterator()?.into_vec().await
    }

    pub async fn create<K: Into<String>, V: Into<FieldValue>>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Value> {
        let model = self.inner.new_model(kwargs)?;
        let pending = model.save_request()?;
        self.inner.send(&pending, BTreeMap::new()).await
    }

    pub async fn update<A, K, V>(
        &self,
        args: impl IntoIterator<Item = A>,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Value>
    where
        A: Into<FieldValue>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let (m, pending) = self.inner.prepare_update(args, kwargs)?;
        m.send(&pending, BTreeMap::new()).await
    }
}
