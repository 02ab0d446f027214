use http::{Method, StatusCode};
use serde_json::{Map, Value};
use stargate_codec::{ExtractOptions, RowResult, Transcoder, extract_row};
use tracing::debug;

use crate::connection::Connection;
use crate::error::ClientError;
use crate::http::{HttpCall, Payload};

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub with_row_id: bool,
    /// Overrides the connection-wide `perfect_dict`.
    pub perfect_dict: Option<bool>,
    /// Filter definition, passed to the gateway as-is.
    pub filter: Option<String>,
    /// Rows per scanner page.
    pub batch: Option<u32>,
    /// A complete scanner definition sent verbatim (XML when it starts with
    /// `<`). Takes precedence over `filter` and `batch`.
    pub config: Option<String>,
}

impl ScanOptions {
    pub fn with_row_id(mut self) -> Self {
        self.with_row_id = true;
        self
    }

    pub fn perfect_dict(mut self, perfect_dict: bool) -> Self {
        self.perfect_dict = Some(perfect_dict);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn batch(mut self, batch: u32) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    fn payload(&self) -> Payload {
        if let Some(config) = &self.config {
            return Payload::from_text(config.clone());
        }
        let mut body = Map::new();
        if let Some(batch) = self.batch {
            body.insert("batch".into(), Value::from(batch));
        }
        if let Some(filter) = &self.filter {
            body.insert("filter".into(), Value::String(filter.clone()));
        }
        Payload::Json(Value::Object(body))
    }
}

/// A server-side cursor over a table.
///
/// Pages are fetched until the gateway stops answering 200 with rows.
/// Scanners hold server resources; call [`Scanner::delete`] when done.
pub struct Scanner<'a, C> {
    connection: &'a Connection<C>,
    table: String,
    id: String,
    exhausted: bool,
}

impl<'a, C: HttpCall> Scanner<'a, C> {
    pub(crate) fn open(
        connection: &'a Connection<C>,
        table: &str,
        options: &ScanOptions,
    ) -> Result<Self, ClientError> {
        let path = format!("{table}/scanner");
        let response = connection.send(Method::PUT, &path, &options.payload())?;
        let id = response
            .as_ref()
            .and_then(|response| response.location())
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::MalformedResponse(format!(
                    "no scanner location returned for table `{table}`"
                ))
            })?;

        debug!(table, scanner = %id, "opened scanner");
        Ok(Self {
            connection,
            table: table.to_string(),
            id,
            exhausted: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> String {
        format!("{}/scanner/{}", self.table, self.id)
    }

    /// The next page of base64-decoded wire rows. `None` once the scan is
    /// done.
    pub fn next_batch(&mut self) -> Result<Option<Vec<Value>>, ClientError> {
        if self.exhausted {
            return Ok(None);
        }

        let response = self
            .connection
            .send(Method::GET, &self.path(), &Payload::Empty)?;
        let body = match response {
            Some(response) if response.status == StatusCode::OK => response.body,
            _ => None,
        };
        let Some(body) = body else {
            self.exhausted = true;
            return Ok(None);
        };

        let decoded = Transcoder::decoder().transcode(&body)?;
        let rows = match decoded.get("Row") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(row @ Value::Object(_)) => vec![row.clone()],
            _ => Vec::new(),
        };
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(rows))
    }

    /// Drain the scanner, extracting every row.
    pub fn results(&mut self, options: ExtractOptions) -> Result<Vec<RowResult>, ClientError> {
        let mut results = Vec::new();
        while let Some(rows) = self.next_batch()? {
            for row in &rows {
                results.push(extract_row(row, options)?);
            }
        }
        Ok(results)
    }

    pub fn delete(self) -> Result<Option<StatusCode>, ClientError> {
        debug!(table = %self.table, scanner = %self.id, "deleting scanner");
        Ok(self
            .connection
            .send(Method::DELETE, &self.path(), &Payload::Empty)?
            .map(|response| response.status))
    }
}
