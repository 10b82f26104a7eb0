//! Connection settings read from the environment.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://api.syncano.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub instance_name: Option<String>,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: DEFAULT_HOST.to_string(),
            api_key: None,
            email: None,
            password: None,
            instance_name: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ConnectionConfig {
    /// SYNCANO_HOST, SYNCANO_API_KEY, SYNCANO_EMAIL, SYNCANO_PASSWORD, SYNCANO_INSTANCE, SYNCANO_TIMEOUT.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        ConnectionConfig {
            host: get("SYNCANO_HOST")
                .map(|h| h.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            api_key: get("SYNCANO_API_KEY"),
            email: get("SYNCANO_EMAIL"),
            password: get("SYNCANO_PASSWORD"),
            instance_name: get("SYNCANO_INSTANCE"),
            timeout: get("SYNCANO_TIMEOUT")
                .and_then(|t| t.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_credentials(mut self, email: &str, password: &str) -> Self {
        self.email = Some(email.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_instance(mut self, instance_name: &str) -> Self {
        self.instance_name = Some(instance_name.to_string());
        self
    }
}
