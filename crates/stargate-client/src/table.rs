use std::collections::{BTreeMap, BTreeSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{Method, StatusCode};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Value, json};
use stargate_codec::{
    BuildOptions, ColumnData, ExtractOptions, Extracted, RowResult, Transcoder, build_payload,
    extract,
};
use tracing::debug;

use crate::batch::{Batch, BatchMethod};
use crate::connection::Connection;
use crate::error::ClientError;
use crate::http::{HttpCall, Payload};
use crate::scanner::{ScanOptions, Scanner};

// ── Fetch options ───────────────────────────────────────────

/// Which columns of a row to read.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSelection {
    /// Whole column families.
    Families(Vec<String>),
    /// Specific qualifiers, per family.
    Qualifiers(BTreeMap<String, Vec<String>>),
}

impl ColumnSelection {
    pub fn families<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Families(families.into_iter().map(Into::into).collect())
    }

    /// Comma-joined selectors: `family` or `family:qualifier`.
    pub fn selectors(&self) -> String {
        self.join(|part| part.to_string())
    }

    fn join(&self, part: impl Fn(&str) -> String) -> String {
        let part = &part;
        match self {
            Self::Families(families) => families
                .iter()
                .map(|family| part(family))
                .collect::<Vec<_>>()
                .join(","),
            Self::Qualifiers(qualifiers) => qualifiers
                .iter()
                .flat_map(move |(family, qualifiers)| {
                    qualifiers
                        .iter()
                        .map(move |qualifier| format!("{}:{}", part(family), part(qualifier)))
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub columns: Option<ColumnSelection>,
    /// Ask for up to this many versions of each cell.
    pub versions: Option<u32>,
    /// Overrides the connection-wide `perfect_dict`.
    pub perfect_dict: Option<bool>,
}

impl FetchOptions {
    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn versions(mut self, versions: u32) -> Self {
        self.versions = Some(versions);
        self
    }

    pub fn perfect_dict(mut self, perfect_dict: bool) -> Self {
        self.perfect_dict = Some(perfect_dict);
        self
    }
}

// ── URLs ────────────────────────────────────────────────────

/// Escaped in row keys, families and qualifiers. `:` and `,` separate
/// selectors, so they are escaped too.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b',')
    .add(b':');

fn segment(part: &str) -> String {
    utf8_percent_encode(part, SEGMENT).to_string()
}

/// `table/{row}/[selectors][?v=n]`, with row and selectors percent-encoded.
pub(crate) fn fetch_path(table: &str, row: &str, options: &FetchOptions) -> String {
    let mut path = format!("{table}/{}/", segment(row));
    if let Some(columns) = &options.columns {
        path.push_str(&columns.join(segment));
    }
    if let Some(versions) = options.versions {
        path.push_str(&format!("?v={versions}"));
    }
    path
}

/// `table/{base64(row)}/{target}` when the data names a single family (or a
/// single flat column), `table/{base64(row)}` otherwise.
pub(crate) fn put_path(table: &str, row: &str, columns: &ColumnData) -> String {
    let row = STANDARD.encode(row);
    match columns.single_target() {
        Some(target) => format!("{table}/{row}/{target}"),
        None => format!("{table}/{row}"),
    }
}

/// `table/{row}[/{column}[:{qualifier}]]`, each part percent-encoded.
pub(crate) fn delete_path(
    table: &str,
    row: &str,
    column: Option<&str>,
    qualifier: Option<&str>,
) -> Result<String, ClientError> {
    let row = segment(row);
    let column = column.map(segment);
    let qualifier = qualifier.map(segment);
    match (column.as_deref(), qualifier.as_deref()) {
        (None, Some(_)) => Err(ClientError::InvalidArguments(
            "qualifier can't be given without column".into(),
        )),
        (Some(column), Some(qualifier)) => Ok(format!("{table}/{row}/{column}:{qualifier}")),
        (Some(column), None) => Ok(format!("{table}/{row}/{column}")),
        (None, None) => Ok(format!("{table}/{row}")),
    }
}

fn schema_body(table: &str, columns: &BTreeSet<String>) -> Value {
    let column_schema: Vec<Value> = columns.iter().map(|name| json!({ "name": name })).collect();
    json!({ "name": table, "ColumnSchema": column_schema })
}

// ── Table ───────────────────────────────────────────────────

/// Row and schema operations on one table.
///
/// Row reads and writes check that the table exists first and return
/// `Ok(None)` when it does not.
pub struct Table<'a, C> {
    connection: &'a Connection<C>,
    name: String,
}

impl<'a, C: HttpCall> Table<'a, C> {
    pub(crate) fn new(connection: &'a Connection<C>, name: &str) -> Self {
        Self {
            connection,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> Result<bool, ClientError> {
        self.connection.table_exists(&self.name)
    }

    fn status_of(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
    ) -> Result<Option<StatusCode>, ClientError> {
        Ok(self
            .connection
            .send(method, path, payload)?
            .map(|response| response.status))
    }

    // ── Reads ───────────────────────────────────────────────

    /// Fetch the base64-decoded response for a row, untouched.
    pub fn fetch_raw(&self, row: &str, options: &FetchOptions) -> Result<Option<Value>, ClientError> {
        if !self.exists()? {
            return Ok(None);
        }

        let path = fetch_path(&self.name, row, options);
        let Some(response) = self.connection.send(Method::GET, &path, &Payload::Empty)? else {
            return Ok(None);
        };
        if response.status != StatusCode::OK {
            return Ok(None);
        }
        match response.body {
            Some(body) => Ok(Some(Transcoder::decoder().transcode(&body)?)),
            None => Ok(None),
        }
    }

    /// Fetch a row, or the selected columns of it.
    ///
    /// The gateway answers with one row, so the result is
    /// [`Extracted::Single`]. With `versions`, repeated cells of a column are
    /// merged and the last one returned wins.
    pub fn fetch(&self, row: &str, options: &FetchOptions) -> Result<Option<Extracted>, ClientError> {
        let perfect_dict = options
            .perfect_dict
            .unwrap_or(self.connection.perfect_dict());
        let Some(decoded) = self.fetch_raw(row, options)? else {
            return Ok(None);
        };
        let extract_options = ExtractOptions {
            perfect_dict,
            with_row_id: false,
        };
        Ok(Some(extract(&decoded, extract_options)?))
    }

    /// Open a scanner over the table.
    pub fn scanner(&self, options: &ScanOptions) -> Result<Scanner<'a, C>, ClientError> {
        Scanner::open(self.connection, &self.name, options)
    }

    /// Every row of the table, read through a scanner that is deleted
    /// afterwards.
    pub fn fetch_all_rows(&self, options: &ScanOptions) -> Result<Option<Vec<RowResult>>, ClientError> {
        if !self.exists()? {
            return Ok(None);
        }

        let extract_options = ExtractOptions {
            perfect_dict: options
                .perfect_dict
                .unwrap_or(self.connection.perfect_dict()),
            with_row_id: options.with_row_id,
        };

        let mut scanner = self.scanner(options)?;
        let rows = scanner.results(extract_options);
        scanner.delete()?;
        rows.map(Some)
    }

    // ── Writes ──────────────────────────────────────────────

    fn write(
        &self,
        method: Method,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<Option<StatusCode>, ClientError> {
        if !self.exists()? {
            return Ok(None);
        }

        let path = put_path(&self.name, row, columns);
        let options = BuildOptions {
            timestamp,
            encode: true,
        };
        let payload = Payload::from(build_payload(row, columns, options));
        debug!(table = %self.name, row, %method, "writing row");
        self.status_of(method, &path, &payload)
    }

    /// Store a row (PUT).
    pub fn insert(
        &self,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<Option<StatusCode>, ClientError> {
        self.write(Method::PUT, row, columns, timestamp)
    }

    /// Update a row (POST).
    pub fn update(
        &self,
        row: &str,
        columns: &ColumnData,
        timestamp: Option<u64>,
    ) -> Result<Option<StatusCode>, ClientError> {
        self.write(Method::POST, row, columns, timestamp)
    }

    /// Delete a whole row, one column family of it, or a single qualifier.
    pub fn remove(
        &self,
        row: &str,
        column: Option<&str>,
        qualifier: Option<&str>,
    ) -> Result<Option<StatusCode>, ClientError> {
        let path = delete_path(&self.name, row, column, qualifier)?;
        self.status_of(Method::DELETE, &path, &Payload::Empty)
    }

    /// Queue writes for this table. `None` when the table does not exist.
    pub fn batch(
        &self,
        method: BatchMethod,
        size: Option<usize>,
    ) -> Result<Option<Batch<'a, C>>, ClientError> {
        if !self.exists()? {
            return Ok(None);
        }
        Ok(Some(Batch::new(self.connection, &self.name, method, size)))
    }

    // ── Schema ──────────────────────────────────────────────

    fn schema_path(&self) -> String {
        format!("{}/schema", self.name)
    }

    /// Create the table. `None` when it already exists; 201 on success.
    pub fn create(&self, columns: &[&str]) -> Result<Option<StatusCode>, ClientError> {
        if self.exists()? {
            return Ok(None);
        }
        let columns: BTreeSet<String> = columns.iter().map(|c| c.to_string()).collect();
        let payload = Payload::Json(schema_body(&self.name, &columns));
        self.status_of(Method::PUT, &self.schema_path(), &payload)
    }

    pub fn drop(&self) -> Result<Option<StatusCode>, ClientError> {
        self.status_of(Method::DELETE, &self.schema_path(), &Payload::Empty)
    }

    pub fn schema(&self) -> Result<Option<Value>, ClientError> {
        Ok(self
            .connection
            .send(Method::GET, &self.schema_path(), &Payload::Empty)?
            .and_then(|response| response.body))
    }

    /// Column family names.
    pub fn columns(&self) -> Result<Vec<String>, ClientError> {
        let names = self
            .schema()?
            .as_ref()
            .and_then(|schema| schema.get("ColumnSchema"))
            .and_then(Value::as_array)
            .map(|families| {
                families
                    .iter()
                    .filter_map(|family| family.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// Region metadata of the table.
    pub fn regions(&self) -> Result<Option<Value>, ClientError> {
        let path = format!("{}/regions", self.name);
        Ok(self
            .connection
            .send(Method::GET, &path, &Payload::Empty)?
            .and_then(|response| response.body))
    }

    fn update_schema(
        &self,
        columns: &BTreeSet<String>,
        method: Method,
    ) -> Result<Option<StatusCode>, ClientError> {
        if !self.exists()? {
            return Ok(None);
        }
        let payload = Payload::Json(schema_body(&self.name, columns));
        self.status_of(method, &self.schema_path(), &payload)
    }

    /// Add column families (POST schema).
    pub fn add_columns(&self, columns: &[&str]) -> Result<Option<StatusCode>, ClientError> {
        let columns: BTreeSet<String> = columns.iter().map(|c| c.to_string()).collect();
        self.update_schema(&columns, Method::POST)
    }

    /// Drop column families by replacing the schema with the remaining ones.
    pub fn drop_columns(&self, columns: &[&str]) -> Result<Option<StatusCode>, ClientError> {
        let remaining: BTreeSet<String> = self
            .columns()?
            .into_iter()
            .filter(|existing| !columns.contains(&existing.as_str()))
            .collect();
        self.update_schema(&remaining, Method::PUT)
    }
}
