//! Pagination driver: follows `next` links until the server or the limit stops it.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::{Method, ModelOptions, Properties};
use crate::connection::Request;
use crate::error::Result;
use crate::model::Model;
use crate::response::{parse, Page};
use crate::state::Session;

/// Raw page items, one at a time. Not restartable; build a new one to re-read.
pub struct RawResults {
    session: Arc<Session>,
    options: Arc<ModelOptions>,
    properties: Properties,
    next: Option<Request>,
    buffer: VecDeque<Value>,
    limit: Option<usize>,
    yielded: usize,
}

impl RawResults {
    pub(super) fn new(
        session: Arc<Session>,
        options: Arc<ModelOptions>,
        properties: Properties,
        first: Request,
        limit: Option<usize>,
    ) -> Self {
        RawResults {
            session,
            options,
            properties,
            next: Some(first),
            buffer: VecDeque::new(),
            limit,
            yielded: 0,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Value>> {
        loop {
            if self.limit.is_some_and(|limit| self.yielded >= limit) {
                self.next = None;
                self.buffer.clear();
                return Ok(None);
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }
            let Some(request) = self.next.take() else {
                return Ok(None);
            };
            let response = self.session.request(request).await?;
            self.session.note_properties(&self.options, &self.properties);
            let page: Page = parse(response)?;
            tracing::debug!(model = %self.options.name, items = page.objects.len(), more = page.next.is_some(), "page");
            self.buffer.extend(page.objects);
            self.next = page
                .next
                .filter(|next| !next.is_empty())
                .map(|next| Request::new(Method::Get, next));
        }
    }

    pub async fn into_vec(mut self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }
}

/// Page items converted into records.
pub struct Results {
    raw: RawResults,
}

impl Results {
    pub(super) fn new(raw: RawResults) -> Self {
        Results { raw }
    }

    pub async fn next(&mut self) -> Result<Option<Model>> {
        let Some(item) = self.raw.next().await? else {
            return Ok(None);
        };
        let model = Model::from_response(
            self.raw.session.clone(),
            self.raw.options.clone(),
            self.raw.properties.clone(),
            &item,
        )?;
        Ok(Some(model))
    }

    pub async fn into_vec(mut self) -> Result<Vec<Model>> {
        let mut out = Vec::new();
        while let Some(model) = self.next().await? {
            out.push(model);
        }
        Ok(out)
    }
}
