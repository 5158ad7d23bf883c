use crate::{
    error::{Error, Result},
    sql::{parser::ast::Expression, types::Value},
};

use super::{
    executor::ResultSet,
    parser::Parser,
    plan::Plan,
    schema::{Index, Table, View},
    types::Row,
};

pub mod kv;

/// Hands out transactions and sessions over one shared store
pub trait Engine: Clone {
    type Transaction: Transaction;

    fn begin(&self) -> Result<Self::Transaction>;

    fn session(&self) -> Result<Session<Self>> {
        Ok(Session {
            engine: self.clone(),
        })
    }
}

/// SQL transaction trait (catalog and row operations)
///
/// Backed by KV storage; the executors only ever talk to this trait.
pub trait Transaction {
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;

    fn create_row(&mut self, table_name: String, row: Row) -> Result<()>;
    /// Scans a table with an optional filter over its schema columns
    fn scan_table(&self, table_name: String, filter: Option<Expression>) -> Result<Vec<Row>>;

    // catalog operations
    fn create_table(&mut self, table: Table) -> Result<()>;
    fn get_table(&self, table_name: String) -> Result<Option<Table>>;
    fn list_tables(&self) -> Result<Vec<Table>>;

    fn create_view(&mut self, view: View) -> Result<()>;
    fn get_view(&self, view_name: String) -> Result<Option<View>>;
    fn list_views(&self) -> Result<Vec<View>>;

    /// Creates an index and backfills entries for existing rows
    fn create_index(&mut self, index: Index) -> Result<()>;
    fn get_index(&self, index_name: String) -> Result<Option<Index>>;
    fn list_indexes(&self) -> Result<Vec<Index>>;
    /// Fetches the rows whose leading indexed column equals the value
    fn index_lookup(&self, index: &Index, value: &Value) -> Result<Vec<Row>>;

    /// Looks up a table that has to exist
    fn must_get_table(&self, table_name: String) -> Result<Table> {
        self.get_table(table_name.clone())?
            .ok_or(Error::Schema(format!(
                "table {} does not exist",
                table_name
            )))
    }
}

/// Runs the parse, plan, execute cycle with one transaction per statement
pub struct Session<E: Engine> {
    engine: E,
}

impl<E: Engine + 'static> Session<E> {
    /// Executes a SQL statement; commits on success, rolls back on error
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        let stmt = Parser::new(sql).parse()?;
        let mut txn = self.engine.begin()?;
        match Plan::build(stmt).and_then(|plan| plan.execute(&mut txn)) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }
}
