//! `Connection` over HTTPS with `reqwest`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::{Connection, ConnectionConfig, Request};
use crate::config::Method;
use crate::error::RequestError;

const AUTH_PATH: &str = "/v1/account/auth/";
const USER_AGENT: &str = concat!("syncano-sdk/", env!("CARGO_PKG_VERSION"));

/// Authenticates lazily: an API key is used as is, otherwise email/password are
/// exchanged for an account key on the first request and reused afterwards.
pub struct HttpConnection {
    client: Client,
    config: ConnectionConfig,
    api_key: OnceCell<String>,
}

impl HttpConnection {
    pub fn new(config: ConnectionConfig) -> Result<Self, RequestError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        let api_key = match &config.api_key {
            Some(key) => OnceCell::new_with(Some(key.clone())),
            None => OnceCell::new(),
        };
        Ok(HttpConnection {
            client,
            config,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self, RequestError> {
        Self::new(ConnectionConfig::from_env())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.initialized()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.host, path)
        }
    }

    async fn authenticate(&self) -> Result<&str, RequestError> {
        let key = self
            .api_key
            .get_or_try_init(|| async {
                let (Some(email), Some(password)) = (&self.config.email, &self.config.password) else {
                    return Err(RequestError::Transport(
                        "no api key and no email/password configured".into(),
                    ));
                };
                tracing::debug!(email = %email, "authenticating");
                let body = json!({"email": email, "password": password});
                let response = self
                    .send(Request::new(Method::Post, AUTH_PATH).data(body), None)
                    .await?;
                response
                    .get("account_key")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| RequestError::Decode("auth response has no account_key".into()))
            })
            .await?;
        Ok(key.as_str())
    }

    async fn send(&self, request: Request, api_key: Option<&str>) -> Result<Value, RequestError> {
        let url = self.url(&request.path);
        tracing::debug!(method = %request.method, url = %url, "request");
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &url)
            .timeout(request.timeout.unwrap_or(self.config.timeout))
            .header("Accept", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("X-API-KEY", key);
        }
        for (k, v) in &request.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) if status.is_success() => return Err(RequestError::Decode(e.to_string())),
                Err(_) => Value::String(text),
            }
        };
        if status.is_success() {
            Ok(body)
        } else {
            tracing::debug!(status = status.as_u16(), url = %url, "request failed");
            Err(RequestError::status(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn request(&self, request: Request) -> Result<Value, RequestError> {
        let key = self.authenticate().await?.to_string();
        self.send(request, Some(&key)).await
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_transport(e: reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout
    } else {
        RequestError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_pass_through() {
        let conn = HttpConnection::new(ConnectionConfig::default().with_api_key("k")).unwrap();
        assert_eq!(
            conn.url("https://api.syncano.io/v1/instances/?page=2"),
            "https://api.syncano.io/v1/instances/?page=2"
        );
        assert_eq!(conn.url("/v1/instances/"), "https://api.syncano.io/v1/instances/");
    }

    #[test]
    fn api_key_counts_as_authenticated() {
        let conn = HttpConnection::new(ConnectionConfig::default().with_api_key("k")).unwrap();
        assert!(conn.is_authenticated());
        let anon = HttpConnection::new(ConnectionConfig::default()).unwrap();
        assert!(!anon.is_authenticated());
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_network() {
        let conn = HttpConnection::new(ConnectionConfig::default()).unwrap();
        let err = conn
            .request(Request::new(Method::Get, "/v1/instances/"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)));
    }
}
