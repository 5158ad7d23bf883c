use std::path::Path;

use log::{debug, info, warn};

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        schema::{Column, Table},
        types::{DataType, Row, Value},
    },
};

/// Outcome of one dataset load
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadStats {
    /// rows inserted into the table
    pub loaded: usize,
    /// malformed rows rejected (wrong cell count)
    pub skipped: usize,
}

/// Returns the fixed schema of the used-car sales table, in dataset column
/// order. Every column is nullable, the dataset is raw.
pub fn car_prices_table(name: &str) -> Table {
    let text = |n: &str| Column {
        name: n.to_string(),
        datatype: DataType::String,
        nullable: true,
        default: Some(Value::Null),
    };
    let float = |n: &str| Column {
        name: n.to_string(),
        datatype: DataType::Float,
        nullable: true,
        default: Some(Value::Null),
    };
    Table {
        name: name.to_string(),
        columns: vec![
            Column {
                name: "year".to_string(),
                datatype: DataType::Integer,
                nullable: true,
                default: Some(Value::Null),
            },
            text("make"),
            text("model"),
            text("trim"),
            text("body"),
            text("transmission"),
            text("vin"),
            text("state"),
            float("condition"),
            float("odometer"),
            text("color"),
            text("interior"),
            text("seller"),
            float("mmr"),
            float("sellingprice"),
            text("saledate"),
        ],
    }
}

/// Creates the table when it is missing and returns the stored schema.
pub fn ensure_table<T: Transaction>(txn: &mut T, table: Table) -> Result<Table> {
    match txn.get_table(table.name.clone())? {
        Some(existing) => Ok(existing),
        None => {
            txn.create_table(table.clone())?;
            debug!("created table {}", table.name);
            Ok(table)
        }
    }
}

/// Loads a delimited dataset into the table. The header must match the
/// schema column names (case-insensitive, order-sensitive) or the load
/// fails. Rows with the wrong cell count are skipped and counted; empty or
/// unparsable numeric cells load as NULL.
///
/// A table that already holds rows is a reopened catalog, so ingestion is
/// skipped entirely.
pub fn load_csv<T: Transaction>(
    txn: &mut T,
    path: impl AsRef<Path>,
    table: &Table,
) -> Result<LoadStats> {
    if !txn.scan_table(table.name.clone(), None)?.is_empty() {
        info!("table {} already holds rows, skipping load", table.name);
        return Ok(LoadStats::default());
    }

    // flexible mode: records with the wrong cell count come through as
    // records, not reader errors
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_ref())?;

    let headers = reader.headers()?;
    if headers.len() != table.columns.len() {
        return Err(Error::Load(format!(
            "header has {} columns, table {} has {}",
            headers.len(),
            table.name,
            table.columns.len()
        )));
    }
    for (header, col) in headers.iter().zip(table.columns.iter()) {
        if !header.trim().eq_ignore_ascii_case(&col.name) {
            return Err(Error::Load(format!(
                "header column {} does not match schema column {}",
                header, col.name
            )));
        }
    }

    let mut stats = LoadStats::default();
    for (i, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping record at line {}: {}", i + 2, err);
                stats.skipped += 1;
                continue;
            }
        };
        if record.len() != table.columns.len() {
            warn!(
                "skipping record at line {}: expected {} cells, got {}",
                i + 2,
                table.columns.len(),
                record.len()
            );
            stats.skipped += 1;
            continue;
        }
        let mut row = Row::with_capacity(table.columns.len());
        for (cell, col) in record.iter().zip(table.columns.iter()) {
            row.push(parse_cell(cell, col.datatype));
        }
        txn.create_row(table.name.clone(), row)?;
        stats.loaded += 1;
    }
    info!(
        "loaded {} rows into {} ({} skipped)",
        stats.loaded, table.name, stats.skipped
    );
    Ok(stats)
}

/// Converts one CSV cell. Empty cells and unparsable numerics come back as
/// NULL instead of failing the load.
fn parse_cell(cell: &str, datatype: DataType) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    match datatype {
        DataType::Integer => cell.parse::<i64>().map_or(Value::Null, Value::Integer),
        DataType::Float => cell.parse::<f64>().map_or(Value::Null, Value::Float),
        DataType::Boolean => match cell.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Value::Boolean(true),
            "false" | "f" | "0" => Value::Boolean(false),
            _ => Value::Null,
        },
        DataType::String => Value::String(cell.to_string()),
    }
}
