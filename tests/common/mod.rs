#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use syncano_sdk::{Connection, Request, RequestError, Session};

/// Records every request and answers from a queue of canned responses.
#[derive(Default)]
pub struct ScriptedConnection {
    responses: Mutex<VecDeque<Result<Value, RequestError>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_err(&self, err: RequestError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn request(&self, request: Request) -> Result<Value, RequestError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RequestError::Transport("no scripted response".into())))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Session over the built-in models with `demo` as the default instance.
pub fn session(conn: &Arc<ScriptedConnection>) -> Arc<Session> {
    init_tracing();
    Session::with_builtins(conn.clone())
        .unwrap()
        .with_instance("demo")
        .into_shared()
}

pub fn not_found() -> RequestError {
    RequestError::status(404, serde_json::json!({"detail": "Not found."}))
}
