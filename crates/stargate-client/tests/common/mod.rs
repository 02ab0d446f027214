#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderMap, Method, Request, Response};
use serde_json::{Value, json};
use stargate_client::{ClientError, Connection, ConnectionConfig, HttpCall, Sleep};

pub const TABLE: &str = "users";

pub type Reply = Result<Response<Vec<u8>>, ClientError>;

pub fn reply(status: u16, body: Option<Value>) -> Reply {
    let body = body
        .map(|body| serde_json::to_vec(&body).unwrap())
        .unwrap_or_default();
    Ok(Response::builder().status(status).body(body).unwrap())
}

pub fn located(status: u16, location: &str) -> Reply {
    Ok(Response::builder()
        .status(status)
        .header("Location", location)
        .body(Vec::new())
        .unwrap())
}

pub fn refused() -> Reply {
    Err(ClientError::Transport("connection refused".into()))
}

/// `{"table": [{"name": "users"}]}`
pub fn table_listing() -> Reply {
    reply(200, Some(json!({ "table": [{ "name": TABLE }] })))
}

pub fn b64(text: &str) -> String {
    STANDARD.encode(text)
}

/// A gateway response row, with every field base64 encoded.
pub fn wire_row(key: &str, cells: &[(&str, &str)]) -> Value {
    let cells: Vec<Value> = cells
        .iter()
        .map(|(column, value)| json!({ "column": b64(column), "$": b64(value), "timestamp": 1 }))
        .collect();
    json!({ "key": b64(key), "Cell": cells })
}

// ── Gateway ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path and query, without the leading slash.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Handler = Box<dyn Fn(&Method, &str) -> Reply + Send + Sync>;

/// An in-process gateway. Scripted replies are served first, in order; then
/// the handler answers by method and path.
pub struct MockGateway {
    handler: Handler,
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockGateway {
    pub fn new(handler: impl Fn(&Method, &str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn scripted(replies: Vec<Reply>) -> Arc<Self> {
        let gateway = Self::new(|_, _| reply(404, None));
        gateway.script.lock().unwrap().extend(replies);
        gateway
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests other than the table listing used for existence checks.
    pub fn calls(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| !(r.method == Method::GET && r.path.is_empty()))
            .collect()
    }
}

impl HttpCall for MockGateway {
    fn call(&self, request: &Request<Vec<u8>>) -> Reply {
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .trim_start_matches('/')
            .to_string();
        self.requests.lock().unwrap().push(Recorded {
            method: request.method().clone(),
            path: path.clone(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        });

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        (self.handler)(request.method(), &path)
    }
}

#[derive(Clone, Default)]
pub struct RecordingSleep(Arc<Mutex<Vec<Duration>>>);

impl RecordingSleep {
    pub fn delays(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

pub fn connect(gateway: &Arc<MockGateway>) -> Connection<Arc<MockGateway>> {
    connect_with(gateway, ConnectionConfig::default())
}

pub fn connect_with(
    gateway: &Arc<MockGateway>,
    config: ConnectionConfig,
) -> Connection<Arc<MockGateway>> {
    Connection::with_call(config, Arc::clone(gateway))
        .unwrap()
        .with_sleeper(RecordingSleep::default())
}
