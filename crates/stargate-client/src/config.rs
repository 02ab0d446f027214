use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Content types the gateway can be spoken to in, with their media types.
pub const CONTENT_TYPES: &[(&str, &str)] = &[("json", "application/json")];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Basic auth user, sent only together with `password`.
    pub user: String,
    pub password: String,
    /// Use https instead of http.
    pub secure: bool,
    pub content_type: String,
    /// Return rows as `family -> { qualifier -> value }` unless a call says
    /// otherwise.
    pub perfect_dict: bool,
    /// Per-attempt timeout. No timeout when unset.
    pub timeout_ms: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            user: String::new(),
            password: String::new(),
            secure: false,
            content_type: "json".into(),
            perfect_dict: true,
            timeout_ms: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Status codes that trigger a backoff and another attempt.
    pub retriable: Vec<u16>,
    /// Hand terminal responses back instead of failing with an error.
    pub fail_silently: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            retriable: vec![502, 503, 504],
            fail_silently: true,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `STARGATE_*` environment variables. Values that
    /// fail to parse are ignored.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = var("STARGATE_HOST") {
            config.host = host;
        }
        if let Some(port) = var("STARGATE_PORT").and_then(|s| s.parse().ok()) {
            config.port = port;
        }
        if let Some(user) = var("STARGATE_USER") {
            config.user = user;
        }
        if let Some(password) = var("STARGATE_PASSWORD") {
            config.password = password;
        }
        if let Some(secure) = var("STARGATE_SECURE").and_then(|s| s.parse().ok()) {
            config.secure = secure;
        }
        if let Some(perfect) = var("STARGATE_PERFECT_DICT").and_then(|s| s.parse().ok()) {
            config.perfect_dict = perfect;
        }
        if let Some(retries) = var("STARGATE_MAX_RETRIES").and_then(|s| s.parse().ok()) {
            config.retry.max_retries = retries;
        }
        if let Some(timeout) = var("STARGATE_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            config.timeout_ms = Some(timeout);
        }
        config
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        self.media_type()?;
        if self.host.is_empty() {
            return Err(ClientError::Configuration("empty host".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Configuration("invalid port 0".into()));
        }
        Ok(())
    }

    pub fn media_type(&self) -> Result<&'static str, ClientError> {
        CONTENT_TYPES
            .iter()
            .find(|(name, _)| *name == self.content_type)
            .map(|(_, media)| *media)
            .ok_or_else(|| {
                ClientError::Configuration(format!(
                    "unsupported content type `{}`",
                    self.content_type
                ))
            })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}/", self.host, self.port)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.user.as_str(), self.password.as_str()))
        }
    }
}
