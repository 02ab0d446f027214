use std::time::Duration;

use http::{Method, StatusCode};
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::http::{HttpCall, Payload, UreqCall};
use crate::table::Table;
use crate::transport::{GatewayResponse, RetryPolicy, RetryingTransport, Sleep};

/// A handle on one Stargate gateway.
///
/// Cheap to share by reference: tables, batches and scanners borrow it.
pub struct Connection<C = UreqCall> {
    config: ConnectionConfig,
    transport: RetryingTransport<C>,
}

impl Connection<UreqCall> {
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        let timeout = config.timeout_ms.map(Duration::from_millis);
        Self::with_call(config, UreqCall::new(timeout))
    }
}

impl<C: HttpCall> Connection<C> {
    /// Connect through a custom HTTP implementation.
    pub fn with_call(config: ConnectionConfig, call: C) -> Result<Self, ClientError> {
        config.validate()?;
        let media_type = config.media_type()?;

        let mut transport = RetryingTransport::new(call, config.base_url(), media_type)
            .with_policy(RetryPolicy::from(&config.retry));
        if let Some((user, password)) = config.credentials() {
            transport = transport.with_basic_auth(user, password);
        }

        Ok(Self { config, transport })
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleep + 'static) -> Self {
        self.transport = self.transport.with_sleeper(sleeper);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn perfect_dict(&self) -> bool {
        self.config.perfect_dict
    }

    pub fn transport(&self) -> &RetryingTransport<C> {
        &self.transport
    }

    pub(crate) fn send(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
    ) -> Result<Option<GatewayResponse>, ClientError> {
        self.transport.send(method, path, payload)
    }

    fn get_body(&self, path: &str) -> Result<Option<Value>, ClientError> {
        Ok(self
            .send(Method::GET, path, &Payload::Empty)?
            .and_then(|response| response.body))
    }

    // ── Cluster ─────────────────────────────────────────────

    /// Software versions of the gateway (server, JVM, OS, ...).
    pub fn version(&self) -> Result<Option<Value>, ClientError> {
        self.get_body("version")
    }

    /// Version of the storage cluster behind the gateway.
    pub fn cluster_version(&self) -> Result<Option<Value>, ClientError> {
        self.get_body("version/cluster")
    }

    /// Live and dead nodes, regions and load of the storage cluster.
    pub fn cluster_status(&self) -> Result<Option<Value>, ClientError> {
        self.get_body("status/cluster")
    }

    // ── Tables ──────────────────────────────────────────────

    /// Does not check that the table exists.
    pub fn table(&self, name: &str) -> Table<'_, C> {
        Table::new(self, name)
    }

    /// Names of every table. Any unexpected listing shape reads as no tables.
    pub fn tables(&self) -> Result<Vec<String>, ClientError> {
        let Some(body) = self.get_body("")? else {
            return Ok(Vec::new());
        };
        let names = body
            .get("table")
            .and_then(Value::as_array)
            .map(|tables| {
                tables
                    .iter()
                    .filter_map(|table| table.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool, ClientError> {
        Ok(self.tables()?.iter().any(|table| table == name))
    }

    /// Create a table with the given column families. `None` when it already
    /// exists.
    pub fn create_table(
        &self,
        name: &str,
        columns: &[&str],
    ) -> Result<Option<Table<'_, C>>, ClientError> {
        if columns.is_empty() {
            return Err(ClientError::InvalidArguments(format!(
                "table `{name}` needs at least one column family"
            )));
        }
        let table = self.table(name);
        match table.create(columns)? {
            Some(_) => Ok(Some(table)),
            None => Ok(None),
        }
    }

    pub fn drop_table(&self, name: &str) -> Result<Option<StatusCode>, ClientError> {
        self.table(name).drop()
    }
}
