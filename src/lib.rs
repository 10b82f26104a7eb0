//! Syncano SDK: declarative models, managers, and batch requests over the Syncano v1 REST API.

pub mod config;
pub mod connection;
pub mod error;
pub mod fields;
pub mod manager;
pub mod model;
pub mod models;
pub mod response;
pub mod state;

pub use config::{load_from_path, resolve, FullConfig, Method, ModelConfig, ModelOptions, Properties, Registry};
pub use connection::{Connection, ConnectionConfig, HttpConnection, Request};
pub use error::{ConfigError, Error, RequestError, Result, ValidationError};
pub use fields::{Field, FieldKind, FieldValue};
pub use manager::{BatchRequest, BatchResult, LazyManager, Manager, RawManager, NO_ARGS, NO_KWARGS};
pub use model::Model;
pub use models::{builtin_config, PollHandle, Poller};
pub use state::Session;
