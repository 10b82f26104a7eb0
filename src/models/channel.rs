//! Channel publishing and the long-poll subscriber.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{Method, ModelOptions, Properties};
use crate::connection::Request;
use crate::error::{ConfigError, Error, RequestError, Result};
use crate::model::Model;
use crate::state::Session;

/// Client-side wait for one long poll; the server answers sooner with a message or no content.
pub const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

fn message_properties(channel: &Model) -> Result<Properties, ConfigError> {
    let data = channel.get_endpoint_data();
    let name = data.get("name").cloned().ok_or_else(|| ConfigError::MissingProperty {
        model: channel.name().to_string(),
        endpoint: "poll".into(),
        property: "name".into(),
    })?;
    let mut props = Properties::new();
    if let Some(instance) = data.get("instance_name") {
        props.insert("instance_name".into(), instance.clone());
    }
    props.insert("channel_name".into(), name);
    Ok(props)
}

impl Model {
    /// Publish `payload` on this channel, optionally to one room.
    pub async fn publish(&self, payload: Value, room: Option<&str>) -> Result<Model> {
        let mut body = json!({ "payload": payload.to_string() });
        if let Some(room) = room {
            body["room"] = Value::String(room.to_string());
        }
        let value = self.call_endpoint("publish", Method::Post, Some(body)).await?;
        let options = self.session().options_for("Message")?;
        Ok(Model::from_response(
            self.session().clone(),
            options,
            message_properties(self)?,
            &value,
        )?)
    }

    pub fn poller(&self) -> Result<Poller> {
        Poller::new(self)
    }
}

/// Long-poll loop over a channel's `poll` endpoint.
pub struct Poller {
    session: Arc<Session>,
    message: Arc<ModelOptions>,
    properties: Properties,
    path: String,
    room: Option<String>,
    last_id: Option<i64>,
    timeout: Duration,
}

impl Poller {
    /// Resolves the poll path up front so configuration errors surface before any task starts.
    pub fn new(channel: &Model) -> Result<Self> {
        channel.options().check_method("poll", Method::Get)?;
        let path = channel
            .options()
            .resolve_endpoint("poll", &channel.get_endpoint_data())?;
        Ok(Poller {
            session: channel.session().clone(),
            message: channel.session().options_for("Message")?,
            properties: message_properties(channel)?,
            path,
            room: None,
            last_id: None,
            timeout: LONG_POLL_TIMEOUT,
        })
    }

    pub fn room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }

    pub fn last_id(mut self, last_id: i64) -> Self {
        self.last_id = Some(last_id);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, last_id: Option<i64>) -> Request {
        let mut request = Request::new(Method::Get, self.path.clone()).timeout(self.timeout);
        if let Some(id) = last_id {
            request = request.param("last_id", id);
        }
        if let Some(room) = &self.room {
            request = request.param("room", room);
        }
        request
    }

    /// Spawn the loop. `callback` gets each message, or `None` when a poll times out;
    /// returning `false` stops polling. Any other failure goes to `error_callback` and ends the loop.
    pub fn start<F, E>(self, mut callback: F, mut error_callback: E) -> PollHandle
    where
        F: FnMut(Option<Model>) -> bool + Send + 'static,
        E: FnMut(Error) + Send + 'static,
    {
        let abort = Arc::new(AtomicBool::new(false));
        let stop = abort.clone();
        let task = tokio::spawn(async move {
            let mut last_id = self.last_id;
            while !stop.load(Ordering::SeqCst) {
                let outcome = self.session.request(self.request(last_id)).await;
                let keep_going = match outcome {
                    Ok(Value::Null) => callback(None),
                    Ok(value) => match Model::from_response(
                        self.session.clone(),
                        self.message.clone(),
                        self.properties.clone(),
                        &value,
                    ) {
                        Ok(message) => {
                            if let Some(id) = message.get_i64("id") {
                                last_id = Some(id);
                            }
                            callback(Some(message))
                        }
                        Err(e) => {
                            tracing::warn!(path = %self.path, error = %e, "poll message rejected");
                            error_callback(e.into());
                            false
                        }
                    },
                    Err(RequestError::Timeout) => {
                        tracing::debug!(path = %self.path, "poll timed out");
                        callback(None)
                    }
                    Err(e) => {
                        tracing::warn!(path = %self.path, error = %e, "poll failed");
                        error_callback(e.into());
                        false
                    }
                };
                if !keep_going {
                    break;
                }
            }
        });
        PollHandle { abort, task }
    }
}

/// Handle to a running poller. Stopping is cooperative: an in-flight poll completes first.
pub struct PollHandle {
    abort: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "poller task ended abnormally");
        }
    }
}
