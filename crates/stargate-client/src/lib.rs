mod batch;
mod config;
mod connection;
mod error;
pub mod http;
mod scanner;
mod table;
mod transport;

pub use batch::{Batch, BatchMethod, BatchSummary};
pub use config::{ConnectionConfig, RetryConfig};
pub use connection::Connection;
pub use error::ClientError;
pub use crate::http::{HttpCall, Payload, UreqCall};
pub use scanner::{ScanOptions, Scanner};
pub use table::{ColumnSelection, FetchOptions, Table};
pub use transport::{GatewayResponse, RetryPolicy, RetryingTransport, Sleep, ThreadSleep};

pub use stargate_codec::{ColumnData, Extracted, RowData, RowResult};
