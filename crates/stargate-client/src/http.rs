//! The HTTP seam between the client and the gateway.
//!
//! Everything above this module talks in `http::Request<Vec<u8>>` and
//! `http::Response<Vec<u8>>`; [`UreqCall`] is the blocking implementation
//! used in production, tests script their own [`HttpCall`].

use std::sync::Arc;
use std::time::Duration;

use http::{Method, Request, Response};
use serde_json::Value;
use stargate_codec::RowSet;

use crate::error::ClientError;

pub const MEDIA_TYPE_XML: &str = "text/xml";

pub trait HttpCall: Send + Sync {
    /// Perform one attempt. Any status code is a response, not an error;
    /// `Err` means no response was obtained.
    fn call(&self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ClientError>;
}

impl<T: HttpCall + ?Sized> HttpCall for Arc<T> {
    fn call(&self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ClientError> {
        (**self).call(request)
    }
}

// ── Payload ─────────────────────────────────────────────────

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    /// Sent verbatim with an XML content type.
    Xml(String),
}

impl Payload {
    /// Text starting with `<` is taken as a pre-formed XML document; anything
    /// else is sent as a JSON string.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with('<') {
            Self::Xml(text)
        } else {
            Self::Json(Value::String(text))
        }
    }

    /// The `Content-Type` for this payload on a connection speaking
    /// `media_type`.
    pub fn content_type(&self, media_type: &str) -> String {
        match self {
            Self::Xml(_) => MEDIA_TYPE_XML.to_string(),
            Self::Empty | Self::Json(_) => format!("{media_type}; charset=UTF-8"),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClientError> {
        match self {
            Self::Empty => Ok(Vec::new()),
            Self::Json(value) => Ok(serde_json::to_vec(value)?),
            Self::Xml(text) => Ok(text.clone().into_bytes()),
        }
    }
}

impl From<RowSet> for Payload {
    fn from(rows: RowSet) -> Self {
        Self::Json(rows.to_value())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

// ── ureq ────────────────────────────────────────────────────

/// Blocking HTTP over a shared `ureq` agent.
pub struct UreqCall {
    agent: ureq::Agent,
}

impl UreqCall {
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqCall {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpCall for UreqCall {
    fn call(&self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ClientError> {
        let uri = request.uri().to_string();
        let body = request.body().as_slice();

        let response = match request.method() {
            &Method::GET => with_headers(self.agent.get(&uri), request).call()?,
            &Method::DELETE => with_headers(self.agent.delete(&uri), request).call()?,
            &Method::PUT => with_headers(self.agent.put(&uri), request).send(body)?,
            &Method::POST => with_headers(self.agent.post(&uri), request).send(body)?,
            other => {
                return Err(ClientError::InvalidArguments(format!(
                    "unsupported method {other}"
                )));
            }
        };

        let (parts, mut body) = response.into_parts();
        let bytes = body.read_to_vec()?;
        Ok(Response::from_parts(parts, bytes))
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &Request<Vec<u8>>,
) -> ureq::RequestBuilder<B> {
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    builder
}
