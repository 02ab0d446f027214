mod cell;
mod error;
mod extract;
pub mod transcode;

pub use cell::{BuildOptions, ColumnData, RowSet, WireCell, WireRow, build_payload, build_row};
pub use error::CodecError;
pub use extract::{ExtractOptions, Extracted, RowData, RowResult, extract, extract_row, extract_rows};
pub use transcode::{Base64Decode, Base64Encode, ByteTransform, Transcoder};
