use std::collections::BTreeSet;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::RetryConfig;
use crate::error::ClientError;
use crate::http::{HttpCall, Payload};

// ── Sleeping ────────────────────────────────────────────────

/// Blocks the calling thread between attempts.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ── Policy ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retriable: BTreeSet<u16>,
    pub fail_silently: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            retriable: config.retriable.iter().copied().collect(),
            fail_silently: config.fail_silently,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`: `base_delay * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn is_retriable(&self, status: StatusCode) -> bool {
        self.retriable.contains(&status.as_u16())
    }
}

// ── Response ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The body parsed as JSON. `None` for empty or non-JSON bodies.
    pub body: Option<Value>,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

// ── Transport ───────────────────────────────────────────────

/// Sends requests to the gateway, retrying retriable outcomes with
/// exponential backoff.
///
/// A call makes up to `max_retries + 1` attempts. An attempt ends the call
/// unless it got a retriable status or no response at all. When attempts run
/// out the call yields `Ok(None)`, or [`ClientError::Exhausted`] when
/// `fail_silently` is off.
pub struct RetryingTransport<C> {
    call: C,
    sleeper: Box<dyn Sleep>,
    policy: RetryPolicy,
    base_url: String,
    media_type: &'static str,
    authorization: Option<String>,
}

impl<C: HttpCall> RetryingTransport<C> {
    pub fn new(call: C, base_url: impl Into<String>, media_type: &'static str) -> Self {
        Self {
            call,
            sleeper: Box::new(ThreadSleep),
            policy: RetryPolicy::default(),
            base_url: base_url.into(),
            media_type,
            authorization: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleep + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{user}:{password}"));
        self.authorization = Some(format!("Basic {token}"));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn send(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
    ) -> Result<Option<GatewayResponse>, ClientError> {
        let url = self.url(path);
        let request = self.build_request(method, &url, payload)?;

        let mut attempt = 0;
        loop {
            match self.call.call(&request) {
                Ok(response) if !self.policy.is_retriable(response.status()) => {
                    debug!(method = %request.method(), %url, status = %response.status(), attempt, "gateway responded");
                    return self.finish(response, url);
                }
                Ok(response) => {
                    warn!(method = %request.method(), %url, status = %response.status(), attempt, "retriable status");
                }
                Err(ClientError::Transport(e)) => {
                    warn!(method = %request.method(), %url, error = %e, attempt, "no response");
                }
                Err(e) => return Err(e),
            }

            if attempt >= self.policy.max_retries {
                let attempts = attempt + 1;
                error!(method = %request.method(), %url, attempts, "giving up");
                if self.policy.fail_silently {
                    return Ok(None);
                }
                return Err(ClientError::Exhausted { attempts, url });
            }

            let delay = self.policy.delay(attempt);
            debug!(?delay, attempt, "backing off");
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        payload: &Payload,
    ) -> Result<Request<Vec<u8>>, ClientError> {
        let body = if method == Method::DELETE {
            Vec::new()
        } else {
            payload.to_bytes()?
        };

        let mut builder = Request::builder()
            .method(method)
            .uri(url)
            .header(ACCEPT, self.media_type)
            .header(CONTENT_TYPE, payload.content_type(self.media_type));
        if let Some(authorization) = &self.authorization {
            builder = builder.header(AUTHORIZATION, authorization.as_str());
        }
        Ok(builder.body(body)?)
    }

    fn finish(
        &self,
        response: Response<Vec<u8>>,
        url: String,
    ) -> Result<Option<GatewayResponse>, ClientError> {
        let (parts, body) = response.into_parts();
        if !self.policy.fail_silently && !parts.status.is_success() {
            return Err(ClientError::Status {
                status: parts.status,
                url,
            });
        }

        let body = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        };
        Ok(Some(GatewayResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        }))
    }
}
