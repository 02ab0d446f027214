use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use stargate_client::{
    ClientError, ColumnData, ColumnSelection, Connection, ConnectionConfig, Extracted,
    FetchOptions, RowResult, ScanOptions,
};

/// Talk to a Stargate REST gateway.
///
/// Connection settings come from `STARGATE_HOST`, `STARGATE_PORT`,
/// `STARGATE_USER`, `STARGATE_PASSWORD`, `STARGATE_SECURE`,
/// `STARGATE_PERFECT_DICT`, `STARGATE_MAX_RETRIES` and `STARGATE_TIMEOUT_MS`.
#[derive(Parser)]
#[command(name = "stargate-cli")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every table.
    Tables,
    /// Gateway and cluster versions.
    Version,
    /// Show a table's schema.
    Schema { table: String },
    /// Fetch one row.
    Fetch {
        table: String,
        row: String,
        /// Selectors: `family` or `family:qualifier` (comma separated).
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Key columns as `family:qualifier` instead of nesting by family.
        #[arg(long)]
        flat: bool,
    },
    /// Read every row of a table through a scanner.
    Scan {
        table: String,
        #[arg(long)]
        batch: Option<u32>,
        #[arg(long)]
        filter: Option<String>,
        /// Key each row by its row id.
        #[arg(long)]
        row_id: bool,
        #[arg(long)]
        flat: bool,
    },
    /// Write cells: `put <table> <row> <family:qualifier> <value> ...`.
    Put {
        table: String,
        row: String,
        #[arg(required = true, num_args = 2..)]
        cells: Vec<String>,
        /// POST instead of PUT.
        #[arg(long)]
        update: bool,
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Delete a row, a column family of it, or a single cell.
    Remove {
        table: String,
        row: String,
        family: Option<String>,
        qualifier: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = ConnectionConfig::from_env();
    let conn = Connection::new(config).unwrap_or_else(|e| {
        eprintln!("failed to configure connection: {e}");
        std::process::exit(1);
    });
    tracing::debug!(gateway = %conn.config().base_url(), "connection configured");

    match run(&conn, args.command) {
        Ok(output) => println!("{output:#}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn run(conn: &Connection, command: Command) -> Result<Value, ClientError> {
    match command {
        Command::Tables => Ok(Value::from(conn.tables()?)),
        Command::Version => Ok(json!({
            "gateway": conn.version()?,
            "cluster": conn.cluster_version()?,
        })),
        Command::Schema { table } => Ok(conn.table(&table).schema()?.unwrap_or(Value::Null)),
        Command::Fetch {
            table,
            row,
            columns,
            flat,
        } => {
            let mut options = FetchOptions::default();
            if !columns.is_empty() {
                options = options.columns(selection(&columns)?);
            }
            if flat {
                options = options.perfect_dict(false);
            }
            let fetched = conn.table(&table).fetch(&row, &options)?;
            Ok(fetched
                .as_ref()
                .map(Extracted::to_value)
                .unwrap_or(Value::Null))
        }
        Command::Scan {
            table,
            batch,
            filter,
            row_id,
            flat,
        } => {
            let mut options = ScanOptions::default();
            if let Some(batch) = batch {
                options = options.batch(batch);
            }
            if let Some(filter) = filter {
                options = options.filter(filter);
            }
            if row_id {
                options = options.with_row_id();
            }
            if flat {
                options = options.perfect_dict(false);
            }
            let rows = conn.table(&table).fetch_all_rows(&options)?;
            Ok(rows
                .map(|rows| Value::Array(rows.iter().map(RowResult::to_value).collect()))
                .unwrap_or(Value::Null))
        }
        Command::Put {
            table,
            row,
            cells,
            update,
            timestamp,
        } => {
            let columns = column_data(&cells)?;
            let table = conn.table(&table);
            let status = if update {
                table.update(&row, &columns, timestamp)?
            } else {
                table.insert(&row, &columns, timestamp)?
            };
            Ok(json!({ "status": status.map(|s| s.as_u16()) }))
        }
        Command::Remove {
            table,
            row,
            family,
            qualifier,
        } => {
            let status =
                conn.table(&table)
                    .remove(&row, family.as_deref(), qualifier.as_deref())?;
            Ok(json!({ "status": status.map(|s| s.as_u16()) }))
        }
    }
}

/// All plain families, or all `family:qualifier` pairs.
fn selection(selectors: &[String]) -> Result<ColumnSelection, ClientError> {
    if selectors.iter().all(|s| !s.contains(':')) {
        return Ok(ColumnSelection::families(selectors.iter().cloned()));
    }

    let mut qualifiers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for selector in selectors {
        let (family, qualifier) = selector.split_once(':').ok_or_else(|| {
            ClientError::InvalidArguments(format!(
                "`{selector}`: families and qualifiers can't be mixed"
            ))
        })?;
        qualifiers
            .entry(family.to_string())
            .or_default()
            .push(qualifier.to_string());
    }
    Ok(ColumnSelection::Qualifiers(qualifiers))
}

fn column_data(cells: &[String]) -> Result<ColumnData, ClientError> {
    if cells.len() % 2 != 0 {
        return Err(ClientError::InvalidArguments(
            "cells come in `family:qualifier value` pairs".into(),
        ));
    }

    let mut columns = ColumnData::nested();
    for pair in cells.chunks(2) {
        let (family, qualifier) = pair[0].split_once(':').ok_or_else(|| {
            ClientError::InvalidArguments(format!("`{}` is not family:qualifier", pair[0]))
        })?;
        columns = columns.with(family, qualifier, pair[1].as_str());
    }
    Ok(columns)
}
