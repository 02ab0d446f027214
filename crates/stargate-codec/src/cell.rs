use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Column data ─────────────────────────────────────────────

/// Client-side column data for one row.
///
/// Both shapes are sorted maps: cells are emitted ordered by family, then
/// qualifier (or by full column name when flat), not in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// `"family:qualifier" -> value`.
    Flat(BTreeMap<String, Value>),
    /// `family -> { qualifier -> value }`.
    Nested(BTreeMap<String, BTreeMap<String, Value>>),
}

impl ColumnData {
    /// Start an empty nested shape, filled with [`ColumnData::with`].
    pub fn nested() -> Self {
        Self::Nested(BTreeMap::new())
    }

    /// Start an empty flat shape, filled with [`ColumnData::with_column`].
    pub fn flat() -> Self {
        Self::Flat(BTreeMap::new())
    }

    /// Add `family:qualifier = value` to a nested shape. On a flat shape the
    /// joined column name is used instead.
    pub fn with(mut self, family: &str, qualifier: &str, value: impl Into<Value>) -> Self {
        match &mut self {
            Self::Nested(families) => {
                families
                    .entry(family.to_string())
                    .or_default()
                    .insert(qualifier.to_string(), value.into());
            }
            Self::Flat(columns) => {
                columns.insert(format!("{family}:{qualifier}"), value.into());
            }
        }
        self
    }

    /// Add a pre-joined `family:qualifier` column to a flat shape. On a nested
    /// shape the column is split on its first `:`.
    pub fn with_column(self, column: &str, value: impl Into<Value>) -> Self {
        match self {
            Self::Flat(mut columns) => {
                columns.insert(column.to_string(), value.into());
                Self::Flat(columns)
            }
            nested @ Self::Nested(_) => {
                let (family, qualifier) = column.split_once(':').unwrap_or((column, ""));
                nested.with(family, qualifier, value)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(columns) => columns.is_empty(),
            Self::Nested(families) => families.values().all(BTreeMap::is_empty),
        }
    }

    /// Number of top-level entries: columns for the flat shape, families for
    /// the nested one.
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(columns) => columns.len(),
            Self::Nested(families) => families.len(),
        }
    }

    /// The single top-level entry name, when there is exactly one.
    pub fn single_target(&self) -> Option<&str> {
        match self {
            Self::Flat(columns) if columns.len() == 1 => columns.keys().next().map(String::as_str),
            Self::Nested(families) if families.len() == 1 => {
                families.keys().next().map(String::as_str)
            }
            _ => None,
        }
    }

    /// `(column, value)` pairs in emission order.
    fn cells(&self) -> Vec<(String, &Value)> {
        match self {
            Self::Flat(columns) => columns.iter().map(|(c, v)| (c.clone(), v)).collect(),
            Self::Nested(families) => families
                .iter()
                .flat_map(|(family, qualifiers)| {
                    qualifiers
                        .iter()
                        .map(move |(qualifier, v)| (format!("{family}:{qualifier}"), v))
                })
                .collect(),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCell {
    pub column: String,
    #[serde(rename = "$")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRow {
    pub key: String,
    #[serde(rename = "Cell")]
    pub cells: Vec<WireCell>,
}

/// `{"Row": [...]}`, the envelope of every write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    #[serde(rename = "Row")]
    pub rows: Vec<WireRow>,
}

impl RowSet {
    pub fn to_value(&self) -> Value {
        // A RowSet holds only strings, numbers and JSON values.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Vec<WireRow>> for RowSet {
    fn from(rows: Vec<WireRow>) -> Self {
        Self { rows }
    }
}

// ── Build ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub timestamp: Option<u64>,
    /// Base64 the row key, every column name and every stringified value.
    pub encode: bool,
}

impl BuildOptions {
    pub fn encoded() -> Self {
        Self {
            timestamp: None,
            encode: true,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Build a bare wire row, ready to be embedded in a batch.
pub fn build_row(key: &str, columns: &ColumnData, options: BuildOptions) -> WireRow {
    let key = if options.encode {
        STANDARD.encode(key)
    } else {
        key.to_string()
    };

    let cells = columns
        .cells()
        .into_iter()
        .map(|(column, value)| {
            let (column, value) = if options.encode {
                (
                    STANDARD.encode(column),
                    Value::String(STANDARD.encode(stringify(value))),
                )
            } else {
                (column, value.clone())
            };
            WireCell {
                column,
                value,
                timestamp: options.timestamp,
            }
        })
        .collect();

    WireRow { key, cells }
}

/// Build a single-row write payload, `{"Row": [row]}`.
pub fn build_payload(key: &str, columns: &ColumnData, options: BuildOptions) -> RowSet {
    RowSet {
        rows: vec![build_row(key, columns, options)],
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
