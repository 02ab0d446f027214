use std::fmt;

use http::{Method, StatusCode};
use stargate_codec::CodecError;

#[derive(Debug)]
pub enum ClientError {
    /// Invalid connection settings.
    Configuration(String),
    /// Caller input that cannot form a request.
    InvalidArguments(String),
    Codec(CodecError),
    /// The request never produced a response.
    Transport(String),
    /// Strict mode only: a terminal response outside 2xx.
    Status { status: StatusCode, url: String },
    /// Strict mode only: every attempt hit a retriable outcome.
    Exhausted { attempts: u32, url: String },
    /// A batch was asked to queue with a verb other than its own.
    MixedBatch { batch: Method, requested: Method },
    MalformedResponse(String),
    Serialization(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "improperly configured: {msg}"),
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            Self::Codec(e) => write!(f, "codec error: {e}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status { status, url } => write!(f, "request to {url} failed with {status}"),
            Self::Exhausted { attempts, url } => {
                write!(f, "request to {url} gave up after {attempts} attempts")
            }
            Self::MixedBatch { batch, requested } => {
                write!(f, "cannot queue {requested} into a {batch} batch")
            }
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<http::Error> for ClientError {
    fn from(e: http::Error) -> Self {
        Self::InvalidArguments(e.to_string())
    }
}
