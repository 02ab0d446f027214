use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// A transcoded leaf was not a string, number, list or map.
    UnsupportedType { key: String, kind: &'static str },
    /// The byte transform rejected a value, or produced non UTF-8 output.
    Transform { key: String, reason: String },
    /// A cell column that does not split into `family:qualifier`.
    MalformedColumn(String),
    /// Missing `Row`, `key`, `Cell`, `column` or `$` entries.
    MalformedWireData(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType { key, kind } => {
                write!(f, "unsupported value type {kind} under key `{key}`")
            }
            Self::Transform { key, reason } => {
                write!(f, "failed to transcode value under key `{key}`: {reason}")
            }
            Self::MalformedColumn(column) => {
                write!(f, "malformed column `{column}`: expected family:qualifier")
            }
            Self::MalformedWireData(msg) => write!(f, "malformed wire data: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}
