use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::cell::ColumnData;
use crate::error::CodecError;

// ── Options ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Nested `family -> { qualifier -> value }` instead of flat columns.
    pub perfect_dict: bool,
    /// Keep the row key next to each row's data.
    pub with_row_id: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::perfect()
    }
}

impl ExtractOptions {
    pub fn perfect() -> Self {
        Self {
            perfect_dict: true,
            with_row_id: false,
        }
    }

    pub fn flat() -> Self {
        Self {
            perfect_dict: false,
            with_row_id: false,
        }
    }

    pub fn with_row_id(mut self) -> Self {
        self.with_row_id = true;
        self
    }
}

// ── Results ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RowData {
    Flat(BTreeMap<String, Value>),
    Nested(BTreeMap<String, BTreeMap<String, Value>>),
}

impl RowData {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Flat(columns) => Value::Object(
                columns
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Self::Nested(families) => Value::Object(
                families
                    .iter()
                    .map(|(family, qualifiers)| {
                        let inner: Map<String, Value> = qualifiers
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        (family.clone(), Value::Object(inner))
                    })
                    .collect(),
            ),
        }
    }

    /// Reuse extracted data as input for a write.
    pub fn into_column_data(self) -> ColumnData {
        match self {
            Self::Flat(columns) => ColumnData::Flat(columns),
            Self::Nested(families) => ColumnData::Nested(families),
        }
    }
}

/// One extracted row. `key` is only populated when the row id was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub key: Option<String>,
    pub data: RowData,
}

impl RowResult {
    /// The row as JSON: the data itself, or `{key: data}` when keyed.
    pub fn to_value(&self) -> Value {
        let data = self.data.to_value();
        match &self.key {
            Some(key) => {
                let mut map = Map::new();
                map.insert(key.clone(), data);
                Value::Object(map)
            }
            None => data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Single(RowResult),
    Many(Vec<RowResult>),
}

impl Extracted {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(row) => row.to_value(),
            Self::Many(rows) => Value::Array(rows.iter().map(RowResult::to_value).collect()),
        }
    }

    pub fn into_rows(self) -> Vec<RowResult> {
        match self {
            Self::Single(row) => vec![row],
            Self::Many(rows) => rows,
        }
    }
}

// ── Extraction ──────────────────────────────────────────────

/// Extract client data from a `{"Row": ...}` response.
///
/// A bare `Row` object gives [`Extracted::Single`], a list gives
/// [`Extracted::Many`]. A one-element list is unwrapped to `Single`, which is
/// what single-row fetches want; use [`extract_rows`] to always get a list.
pub fn extract(data: &Value, options: ExtractOptions) -> Result<Extracted, CodecError> {
    match rows_entry(data)? {
        Value::Array(rows) => {
            let mut extracted = rows
                .iter()
                .map(|row| extract_row(row, options))
                .collect::<Result<Vec<_>, _>>()?;
            if extracted.len() == 1 {
                Ok(Extracted::Single(extracted.remove(0)))
            } else {
                Ok(Extracted::Many(extracted))
            }
        }
        row => extract_row(row, options).map(Extracted::Single),
    }
}

/// Like [`extract`], but never unwraps: one result per wire row.
pub fn extract_rows(data: &Value, options: ExtractOptions) -> Result<Vec<RowResult>, CodecError> {
    match rows_entry(data)? {
        Value::Array(rows) => rows.iter().map(|row| extract_row(row, options)).collect(),
        row => Ok(vec![extract_row(row, options)?]),
    }
}

fn rows_entry(data: &Value) -> Result<&Value, CodecError> {
    let rows = data
        .get("Row")
        .ok_or_else(|| CodecError::MalformedWireData("missing `Row`".into()))?;
    match rows {
        Value::Array(_) | Value::Object(_) => Ok(rows),
        other => Err(CodecError::MalformedWireData(format!(
            "`Row` must be an object or a list, got {other}"
        ))),
    }
}

/// Extract a single `{"key": ..., "Cell": ...}` wire row.
pub fn extract_row(row: &Value, options: ExtractOptions) -> Result<RowResult, CodecError> {
    let key = match row.get("key") {
        Some(Value::String(key)) => key.clone(),
        Some(other) => {
            return Err(CodecError::MalformedWireData(format!(
                "row `key` must be a string, got {other}"
            )));
        }
        None => return Err(CodecError::MalformedWireData("row without `key`".into())),
    };

    let cells: &[Value] = match row.get("Cell") {
        Some(Value::Array(cells)) => cells,
        Some(cell @ Value::Object(_)) => std::slice::from_ref(cell),
        Some(other) => {
            return Err(CodecError::MalformedWireData(format!(
                "`Cell` of row `{key}` must be an object or a list, got {other}"
            )));
        }
        None => {
            return Err(CodecError::MalformedWireData(format!(
                "row `{key}` without `Cell`"
            )));
        }
    };

    let data = if options.perfect_dict {
        let mut families: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for cell in cells {
            let (column, value) = cell_parts(cell)?;
            let (family, qualifier) = split_column(column)?;
            families
                .entry(family.to_string())
                .or_default()
                .insert(qualifier.to_string(), value.clone());
        }
        RowData::Nested(families)
    } else {
        let mut columns = BTreeMap::new();
        for cell in cells {
            let (column, value) = cell_parts(cell)?;
            split_column(column)?;
            columns.insert(column.to_string(), value.clone());
        }
        RowData::Flat(columns)
    };

    Ok(RowResult {
        key: options.with_row_id.then_some(key),
        data,
    })
}

fn cell_parts(cell: &Value) -> Result<(&str, &Value), CodecError> {
    let column = match cell.get("column") {
        Some(Value::String(column)) => column.as_str(),
        Some(other) => {
            return Err(CodecError::MalformedWireData(format!(
                "cell `column` must be a string, got {other}"
            )));
        }
        None => return Err(CodecError::MalformedWireData("cell without `column`".into())),
    };
    let value = cell
        .get("$")
        .ok_or_else(|| CodecError::MalformedWireData(format!("cell `{column}` without `$`")))?;
    Ok((column, value))
}

fn split_column(column: &str) -> Result<(&str, &str), CodecError> {
    let mut parts = column.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(family), Some(qualifier), None) => Ok((family, qualifier)),
        _ => Err(CodecError::MalformedColumn(column.to_string())),
    }
}
