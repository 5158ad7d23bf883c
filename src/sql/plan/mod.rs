use planner::Planner;

use crate::error::Result;
use crate::sql::engine::Transaction;
use crate::sql::executor::{Executor, ResultSet};
use crate::sql::parser::ast::{Expression, OrderDirection, ShowObject, Statement};
use crate::sql::schema::{Index, Table};

mod planner;

/// Execution plan node
#[derive(Debug, PartialEq)]
pub enum Node {
    /// Creates a table with an explicit schema
    CreateTable { schema: Table, if_not_exists: bool },

    /// Materializes the source query once into a new table
    CreateTableAs {
        name: String,
        if_not_exists: bool,
        source: Box<Node>,
    },

    /// Stores a named query as rendered SQL; reads re-plan it every time
    CreateView {
        name: String,
        sql: String,
        if_not_exists: bool,
    },

    /// Creates an index and backfills it from the existing rows
    CreateIndex { index: Index, if_not_exists: bool },

    /// Inserts rows into a table; empty columns means all columns in order
    Insert {
        table_name: String,
        columns: Vec<String>,
        values: Vec<Vec<Expression>>,
    },

    /// Scans a table or view, optionally filtering rows
    Scan {
        table_name: String,
        alias: Option<String>,
        filter: Option<Expression>,
    },

    /// Runs a subquery in FROM and qualifies its columns with the alias
    Derived { source: Box<Node>, alias: String },

    /// Nested loop join; outer keeps left rows without a match, padding the
    /// right side with NULL
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        predicate: Option<Expression>,
        outer: bool,
    },

    /// Filters rows by a predicate
    Filter {
        source: Box<Node>,
        predicate: Expression,
    },

    /// Groups rows and computes aggregate functions
    Aggregate {
        source: Box<Node>,
        select: Vec<(Expression, Option<String>)>,
        group_by: Vec<Expression>,
    },

    /// Projects expressions out of the source rows
    Projection {
        source: Box<Node>,
        select: Vec<(Expression, Option<String>)>,
    },

    /// Drops duplicate rows, keeping first occurrences in order
    Distinct { source: Box<Node> },

    /// Sorts rows by named output columns
    Order {
        source: Box<Node>,
        order_by: Vec<(String, OrderDirection)>,
    },

    /// Skips the first rows of the source
    Offset { source: Box<Node>, offset: usize },

    /// Caps the number of rows returned
    Limit { source: Box<Node>, limit: usize },

    /// Lists catalog objects
    Show(ShowObject),
}

/// Execution plan, wrapping the root node of the plan tree
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    /// Builds an execution plan from a parsed statement
    pub fn build(stmt: Statement) -> Result<Self> {
        Planner::new().build(stmt)
    }

    /// Executes the plan within the given transaction
    pub fn execute<T: Transaction + 'static>(self, txn: &mut T) -> Result<ResultSet> {
        <dyn Executor<T>>::build(self.0).execute(txn)
    }
}
