use http::{Method, StatusCode};
use stargate_codec::{BuildOptions, ColumnData, RowSet, WireRow, build_row};
use tracing::debug;

use crate::connection::Connection;
use crate::error::ClientError;
use crate::http::{HttpCall, Payload};
use crate::table::put_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMethod {
    /// PUT every queued row.
    Insert,
    /// POST every queued row.
    Update,
}

impl BatchMethod {
    pub fn http_method(self) -> Method {
        match self {
            Self::Insert => Method::PUT,
            Self::Update => Method::POST,
        }
    }
}

/// What a batch sent since it was created or last finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub url: Option<String>,
    pub method: Method,
    /// One entry per flush. `None` when the flush got no usable response.
    pub responses: Vec<Option<StatusCode>>,
}

/// Queues row writes for one table and sends them as a single multi-row
/// request.
///
/// The verb is fixed when the batch is created. The target URL is taken from
/// the first queued row and kept until [`Batch::finalize`]. With a `size`,
/// the queue flushes itself once it holds more than `size` rows.
pub struct Batch<'a, C> {
    connection: &'a Connection<C>,
    table: String,
    method: BatchMethod,
    size: Option<usize>,
    queue: Vec<WireRow>,
    url: Option<String>,
    responses: Vec<Option<StatusCode>>,
}

impl<'a, C: HttpCall> Batch<'a, C> {
    pub(crate) fn new(
        connection: &'a Connection<C>,
        table: &str,
        method: BatchMethod,
        size: Option<usize>,
    ) -> Self {
        Self {
            connection,
            table: table.to_string(),
            method,
            size,
            queue: Vec::new(),
            url: None,
            responses: Vec::new(),
        }
    }

    pub fn method(&self) -> BatchMethod {
        self.method
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn insert(
        &mut self,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<(), ClientError> {
        self.queue_row(BatchMethod::Insert, row, columns, timestamp)
    }

    pub fn update(
        &mut self,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<(), ClientError> {
        self.queue_row(BatchMethod::Update, row, columns, timestamp)
    }

    fn queue_row(
        &mut self,
        method: BatchMethod,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<(), ClientError> {
        if method != self.method {
            return Err(ClientError::MixedBatch {
                batch: self.method.http_method(),
                requested: method.http_method(),
            });
        }

        if self.url.is_none() {
            self.url = Some(put_path(&self.table, row, columns));
        }

        let options = BuildOptions {
            timestamp,
            encode: true,
        };
        self.queue.push(build_row(row, columns, options));

        if let Some(size) = self.size {
            if self.queue.len() > size {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Send the queued rows as `{"Row": [...]}` and clear the queue. Nothing
    /// is sent while the queue is empty.
    pub fn flush(&mut self) -> Result<(), ClientError> {
        let Some(url) = &self.url else {
            return Ok(());
        };
        if self.queue.is_empty() {
            return Ok(());
        }

        let payload = Payload::from(RowSet::from(self.queue.clone()));
        let method = self.method.http_method();
        debug!(table = %self.table, rows = self.queue.len(), %method, "flushing batch");

        let response = self.connection.send(method, url, &payload)?;
        self.responses.push(response.map(|response| response.status));
        self.queue.clear();
        Ok(())
    }

    /// Report what was sent and reset the URL and response history. Rows
    /// still queued stay queued.
    pub fn finalize(&mut self) -> BatchSummary {
        BatchSummary {
            url: self.url.take(),
            method: self.method.http_method(),
            responses: std::mem::take(&mut self.responses),
        }
    }

    pub fn flush_and_finalize(&mut self) -> Result<BatchSummary, ClientError> {
        self.flush()?;
        Ok(self.finalize())
    }
}
