use crate::{error::Result, sql::plan::Node, sql::types::Row};

use super::engine::Transaction;

mod agg;
mod join;
mod mutation;
mod query;
mod schema;
mod show;

use agg::Aggregate;
use join::NestedLoopJoin;
use mutation::Insert;
use query::{Derived, Distinct, Filter, Limit, Offset, Order, Projection, Scan};
use schema::{CreateIndex, CreateTable, CreateTableAs, CreateView};
use show::Show;

/// Executor definition
pub trait Executor<T: Transaction> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet>;
}

impl<T: Transaction + 'static> dyn Executor<T> {
    pub fn build(node: Node) -> Box<dyn Executor<T>> {
        match node {
            Node::CreateTable {
                schema,
                if_not_exists,
            } => CreateTable::new(schema, if_not_exists),
            Node::CreateTableAs {
                name,
                if_not_exists,
                source,
            } => CreateTableAs::new(name, if_not_exists, Self::build(*source)),
            Node::CreateView {
                name,
                sql,
                if_not_exists,
            } => CreateView::new(name, sql, if_not_exists),
            Node::CreateIndex {
                index,
                if_not_exists,
            } => CreateIndex::new(index, if_not_exists),
            Node::Insert {
                table_name,
                columns,
                values,
            } => Insert::new(table_name, columns, values),
            Node::Scan {
                table_name,
                alias,
                filter,
            } => Scan::new(table_name, alias, filter),
            Node::Derived { source, alias } => Derived::new(Self::build(*source), alias),
            Node::NestedLoopJoin {
                left,
                right,
                predicate,
                outer,
            } => NestedLoopJoin::new(Self::build(*left), Self::build(*right), predicate, outer),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::Aggregate {
                source,
                select,
                group_by,
            } => Aggregate::new(Self::build(*source), select, group_by),
            Node::Projection { source, select } => Projection::new(Self::build(*source), select),
            Node::Distinct { source } => Distinct::new(Self::build(*source)),
            Node::Order { source, order_by } => Order::new(Self::build(*source), order_by),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
            Node::Show(object) => Show::new(object),
        }
    }
}

/// Execution result set
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    CreateTable {
        table_name: String,
        /// false when IF NOT EXISTS found the table already there
        created: bool,
    },
    CreateView {
        view_name: String,
        created: bool,
    },
    CreateIndex {
        index_name: String,
        created: bool,
    },
    Insert {
        count: usize,
    },
    Scan {
        columns: Vec<String>,
        rows: Vec<Row>,
    },
}
