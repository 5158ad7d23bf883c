use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        schema::{Column, Index, Table, View},
        types::{DataType, Row, Value},
    },
};

use super::{Executor, ResultSet};

/// CREATE TABLE executor
pub struct CreateTable {
    schema: Table,
    if_not_exists: bool,
}

impl CreateTable {
    pub fn new(schema: Table, if_not_exists: bool) -> Box<Self> {
        Box::new(Self {
            schema,
            if_not_exists,
        })
    }
}

impl<T: Transaction> Executor<T> for CreateTable {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table_name = self.schema.name.clone();
        if let Some(kind) = check_existing(txn, &table_name)? {
            if self.if_not_exists {
                debug!("{} {} already exists, skipping", kind, table_name);
                return Ok(ResultSet::CreateTable {
                    table_name,
                    created: false,
                });
            }
            return Err(Error::Schema(format!(
                "{} {} already exists",
                kind, table_name
            )));
        }
        txn.create_table(self.schema)?;
        debug!("created table {}", table_name);
        Ok(ResultSet::CreateTable {
            table_name,
            created: true,
        })
    }
}

/// CREATE TABLE AS executor, materializes the source query once
pub struct CreateTableAs<T: Transaction> {
    name: String,
    if_not_exists: bool,
    source: Box<dyn Executor<T>>,
}

impl<T: Transaction> CreateTableAs<T> {
    pub fn new(name: String, if_not_exists: bool, source: Box<dyn Executor<T>>) -> Box<Self> {
        Box::new(Self {
            name,
            if_not_exists,
            source,
        })
    }
}

impl<T: Transaction> Executor<T> for CreateTableAs<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        // check before running the source query, a skip costs nothing
        if let Some(kind) = check_existing(txn, &self.name)? {
            if self.if_not_exists {
                debug!("{} {} already exists, skipping", kind, self.name);
                return Ok(ResultSet::CreateTable {
                    table_name: self.name,
                    created: false,
                });
            }
            return Err(Error::Schema(format!(
                "{} {} already exists",
                kind, self.name
            )));
        }

        let (columns, rows) = match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".to_string())),
        };

        let table = infer_table(self.name.clone(), &columns, &rows)?;
        txn.create_table(table)?;
        let count = rows.len();
        for row in rows {
            txn.create_row(self.name.clone(), row)?;
        }
        debug!("created table {} with {} rows", self.name, count);
        Ok(ResultSet::CreateTable {
            table_name: self.name,
            created: true,
        })
    }
}

/// CREATE VIEW executor, stores the rendered definition
pub struct CreateView {
    name: String,
    sql: String,
    if_not_exists: bool,
}

impl CreateView {
    pub fn new(name: String, sql: String, if_not_exists: bool) -> Box<Self> {
        Box::new(Self {
            name,
            sql,
            if_not_exists,
        })
    }
}

impl<T: Transaction> Executor<T> for CreateView {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        if let Some(kind) = check_existing(txn, &self.name)? {
            if self.if_not_exists {
                debug!("{} {} already exists, skipping", kind, self.name);
                return Ok(ResultSet::CreateView {
                    view_name: self.name,
                    created: false,
                });
            }
            return Err(Error::Schema(format!(
                "{} {} already exists",
                kind, self.name
            )));
        }
        txn.create_view(View {
            name: self.name.clone(),
            sql: self.sql,
        })?;
        debug!("created view {}", self.name);
        Ok(ResultSet::CreateView {
            view_name: self.name,
            created: true,
        })
    }
}

/// CREATE INDEX executor
pub struct CreateIndex {
    index: Index,
    if_not_exists: bool,
}

impl CreateIndex {
    pub fn new(index: Index, if_not_exists: bool) -> Box<Self> {
        Box::new(Self {
            index,
            if_not_exists,
        })
    }
}

impl<T: Transaction> Executor<T> for CreateIndex {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        // the table must exist, IF NOT EXISTS only covers the index itself
        txn.must_get_table(self.index.table.clone())?;

        let index_name = self.index.name.clone();
        if txn.get_index(index_name.clone())?.is_some() {
            if self.if_not_exists {
                debug!("index {} already exists, skipping", index_name);
                return Ok(ResultSet::CreateIndex {
                    index_name,
                    created: false,
                });
            }
            return Err(Error::Schema(format!(
                "index {} already exists",
                index_name
            )));
        }
        txn.create_index(self.index)?;
        debug!("created index {}", index_name);
        Ok(ResultSet::CreateIndex {
            index_name,
            created: true,
        })
    }
}

/// Looks for an existing table or view with this name. Tables and views
/// share one namespace.
fn check_existing<T: Transaction>(txn: &T, name: &str) -> Result<Option<&'static str>> {
    if txn.get_table(name.to_string())?.is_some() {
        return Ok(Some("table"));
    }
    if txn.get_view(name.to_string())?.is_some() {
        return Ok(Some("view"));
    }
    Ok(None)
}

/// Derives a table schema from query output. Column types come from the
/// first non-null value of each column; every column ends up nullable.
fn infer_table(name: String, columns: &[String], rows: &[Row]) -> Result<Table> {
    let mut table_columns = Vec::with_capacity(columns.len());
    for (i, label) in columns.iter().enumerate() {
        let base = label.rsplit('.').next().unwrap_or(label).to_string();
        let datatype = rows
            .iter()
            .find_map(|row| row[i].datatype())
            .unwrap_or(DataType::String);
        table_columns.push(Column {
            name: base,
            datatype,
            nullable: true,
            default: Some(Value::Null),
        });
    }
    let table = Table {
        name,
        columns: table_columns,
    };
    table.validate()?;
    Ok(table)
}
