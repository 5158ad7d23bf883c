use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::{
            Parser,
            ast::{self, Expression, OrderDirection},
        },
        plan::Plan,
        schema::Table,
        types::{Row, Value},
    },
};

use super::{Executor, ResultSet};

/// Table or view scan executor
pub struct Scan {
    table_name: String,
    alias: Option<String>,
    filter: Option<Expression>,
}

impl Scan {
    pub fn new(table_name: String, alias: Option<String>, filter: Option<Expression>) -> Box<Self> {
        Box::new(Self {
            table_name,
            alias,
            filter,
        })
    }
}

impl<T: Transaction + 'static> Executor<T> for Scan {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let filter = self
            .filter
            .map(|f| resolve_subqueries(f, txn))
            .transpose()?;

        if let Some(table) = txn.get_table(self.table_name.clone())? {
            let columns = table
                .columns
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>();
            let rows = scan_rows(txn, &table, filter)?;
            return Ok(ResultSet::Scan {
                columns: relabel(columns, &self.alias),
                rows,
            });
        }

        if let Some(view) = txn.get_view(self.table_name.clone())? {
            // views are never stale: re-parse the stored definition and run
            // it against the current rows
            let stmt = Parser::new(&format!("{};", view.sql)).parse()?;
            let (columns, rows) = match Plan::build(stmt)?.execute(txn)? {
                ResultSet::Scan { columns, rows } => (columns, rows),
                _ => return Err(Error::Internal("Unexpected result set".to_string())),
            };
            let rows = match &filter {
                Some(predicate) => filter_rows(&columns, rows, predicate)?,
                None => rows,
            };
            return Ok(ResultSet::Scan {
                columns: relabel(columns, &self.alias),
                rows,
            });
        }

        Err(Error::Schema(format!(
            "table or view {} does not exist",
            self.table_name
        )))
    }
}

/// Derived table executor, runs the inner query and qualifies its output
/// columns with the alias
pub struct Derived<T: Transaction> {
    source: Box<dyn Executor<T>>,
    alias: String,
}

impl<T: Transaction> Derived<T> {
    pub fn new(source: Box<dyn Executor<T>>, alias: String) -> Box<Self> {
        Box::new(Self { source, alias })
    }
}

impl<T: Transaction> Executor<T> for Derived<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => Ok(ResultSet::Scan {
                columns: relabel(columns, &Some(self.alias)),
                rows,
            }),
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Filter executor
pub struct Filter<T: Transaction> {
    source: Box<dyn Executor<T>>,
    predicate: Expression,
}

impl<T: Transaction> Filter<T> {
    pub fn new(source: Box<dyn Executor<T>>, predicate: Expression) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl<T: Transaction + 'static> Executor<T> for Filter<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let predicate = resolve_subqueries(self.predicate, txn)?;
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let rows = filter_rows(&columns, rows, &predicate)?;
                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Projection executor
pub struct Projection<T: Transaction> {
    source: Box<dyn Executor<T>>,
    select: Vec<(Expression, Option<String>)>,
}

impl<T: Transaction> Projection<T> {
    pub fn new(
        source: Box<dyn Executor<T>>,
        select: Vec<(Expression, Option<String>)>,
    ) -> Box<Self> {
        Box::new(Self { source, select })
    }
}

impl<T: Transaction + 'static> Executor<T> for Projection<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let mut select = Vec::with_capacity(self.select.len());
        for (expr, alias) in self.select {
            select.push((resolve_subqueries(expr, txn)?, alias));
        }

        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let out_columns = select
                    .iter()
                    .map(|(expr, alias)| alias.clone().unwrap_or_else(|| ast::column_label(expr)))
                    .collect::<Vec<_>>();

                let empty_cols = Vec::new();
                let empty_row = Row::new();
                let mut out_rows = Vec::with_capacity(rows.len());
                for row in &rows {
                    let mut out = Row::with_capacity(select.len());
                    for (expr, _) in &select {
                        out.push(ast::evaluate_expr(
                            expr, &columns, row, &empty_cols, &empty_row,
                        )?);
                    }
                    out_rows.push(out);
                }
                Ok(ResultSet::Scan {
                    columns: out_columns,
                    rows: out_rows,
                })
            }
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Distinct executor, drops duplicate rows keeping first occurrences
pub struct Distinct<T: Transaction> {
    source: Box<dyn Executor<T>>,
}

impl<T: Transaction> Distinct<T> {
    pub fn new(source: Box<dyn Executor<T>>) -> Box<Self> {
        Box::new(Self { source })
    }
}

impl<T: Transaction> Executor<T> for Distinct<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for row in rows {
                    if seen.insert(bincode::serialize(&row)?) {
                        out.push(row);
                    }
                }
                Ok(ResultSet::Scan { columns, rows: out })
            }
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Order executor, sorts by named output columns
pub struct Order<T: Transaction> {
    source: Box<dyn Executor<T>>,
    order_by: Vec<(String, OrderDirection)>,
}

impl<T: Transaction> Order<T> {
    pub fn new(
        source: Box<dyn Executor<T>>,
        order_by: Vec<(String, OrderDirection)>,
    ) -> Box<Self> {
        Box::new(Self { source, order_by })
    }
}

impl<T: Transaction> Executor<T> for Order<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, mut rows } => {
                let mut keys = Vec::with_capacity(self.order_by.len());
                for (name, direction) in &self.order_by {
                    let index = ast::resolve_column(&columns, name)?.ok_or_else(|| {
                        Error::Schema(format!("order by column {} not found", name))
                    })?;
                    keys.push((index, direction.clone()));
                }
                rows.sort_by(|a, b| {
                    for (index, direction) in &keys {
                        // incomparable values keep their relative order
                        let ord = a[*index].partial_cmp(&b[*index]).unwrap_or(Ordering::Equal);
                        let ord = match direction {
                            OrderDirection::Asc => ord,
                            OrderDirection::Desc => ord.reverse(),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Offset executor, skips leading rows
pub struct Offset<T: Transaction> {
    source: Box<dyn Executor<T>>,
    offset: usize,
}

impl<T: Transaction> Offset<T> {
    pub fn new(source: Box<dyn Executor<T>>, offset: usize) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl<T: Transaction> Executor<T> for Offset<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => Ok(ResultSet::Scan {
                columns,
                rows: rows.into_iter().skip(self.offset).collect(),
            }),
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Limit executor, caps the row count
pub struct Limit<T: Transaction> {
    source: Box<dyn Executor<T>>,
    limit: usize,
}

impl<T: Transaction> Limit<T> {
    pub fn new(source: Box<dyn Executor<T>>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<T: Transaction> Executor<T> for Limit<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, mut rows } => {
                rows.truncate(self.limit);
                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".to_string())),
        }
    }
}

/// Replaces every scalar subquery in the expression with its constant
/// result. The subquery runs exactly once, before any row is examined.
pub(super) fn resolve_subqueries<T: Transaction + 'static>(
    expr: Expression,
    txn: &mut T,
) -> Result<Expression> {
    use ast::Operation::*;
    Ok(match expr {
        Expression::Subquery(stmt) => {
            let (columns, rows) = match Plan::build(*stmt)?.execute(txn)? {
                ResultSet::Scan { columns, rows } => (columns, rows),
                _ => return Err(Error::Internal("Unexpected result set".to_string())),
            };
            if columns.len() != 1 {
                return Err(Error::Schema(format!(
                    "scalar subquery must return one column, got {}",
                    columns.len()
                )));
            }
            if rows.len() > 1 {
                return Err(Error::Schema(format!(
                    "scalar subquery returned {} rows",
                    rows.len()
                )));
            }
            match rows.into_iter().next() {
                Some(mut row) => row.remove(0).into_expression(),
                // an empty result reads as NULL, like in SQL
                None => Value::Null.into_expression(),
            }
        }
        Expression::Operation(operation) => Expression::Operation(match operation {
            And(l, r) => And(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            Or(l, r) => Or(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            Equal(l, r) => Equal(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            NotEqual(l, r) => NotEqual(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            GreaterThan(l, r) => GreaterThan(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            GreaterThanOrEqual(l, r) => {
                GreaterThanOrEqual(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?)
            }
            LessThan(l, r) => LessThan(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?),
            LessThanOrEqual(l, r) => {
                LessThanOrEqual(resolve_boxed(l, txn)?, resolve_boxed(r, txn)?)
            }
        }),
        Expression::Round(inner, digits) => {
            Expression::Round(Box::new(resolve_subqueries(*inner, txn)?), digits)
        }
        expr => expr,
    })
}

fn resolve_boxed<T: Transaction + 'static>(
    expr: Box<Expression>,
    txn: &mut T,
) -> Result<Box<Expression>> {
    Ok(Box::new(resolve_subqueries(*expr, txn)?))
}

/// Reads the rows of a base table, going through an index when an equality
/// conjunct matches an index's leading column. The full predicate is still
/// applied to the candidate rows afterwards.
fn scan_rows<T: Transaction>(
    txn: &T,
    table: &Table,
    filter: Option<Expression>,
) -> Result<Vec<Row>> {
    if let Some(predicate) = &filter {
        let equalities = collect_equalities(predicate);
        for index in txn.list_indexes()? {
            if index.table != table.name {
                continue;
            }
            if let Some((_, value)) = equalities
                .iter()
                .find(|(field, _)| index.columns.first() == Some(field))
            {
                debug!("using index {} for table {}", index.name, table.name);
                let candidates = txn.index_lookup(&index, value)?;
                let columns = table
                    .columns
                    .iter()
                    .map(|c| c.name.clone())
                    .collect::<Vec<_>>();
                return filter_rows(&columns, candidates, predicate);
            }
        }
    }
    txn.scan_table(table.name.clone(), filter)
}

/// Collects top-level equality conjuncts of the shape column = constant,
/// in either operand order. NULL constants are skipped since NULL never
/// compares equal to anything.
fn collect_equalities(predicate: &Expression) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    collect_into(predicate, &mut out);
    out
}

fn collect_into(expr: &Expression, out: &mut Vec<(String, Value)>) {
    match expr {
        Expression::Operation(ast::Operation::And(left, right)) => {
            collect_into(left, out);
            collect_into(right, out);
        }
        Expression::Operation(ast::Operation::Equal(left, right)) => {
            match (left.as_ref(), right.as_ref()) {
                (Expression::Field(field), Expression::Consts(consts))
                | (Expression::Consts(consts), Expression::Field(field)) => {
                    let value = Value::from_expression(Expression::Consts(consts.clone()));
                    if !value.is_null() {
                        out.push((field.clone(), value));
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

/// Applies a predicate to rows. A NULL result filters the row out, same as
/// FALSE.
fn filter_rows(columns: &Vec<String>, rows: Vec<Row>, predicate: &Expression) -> Result<Vec<Row>> {
    let empty_cols = Vec::new();
    let empty_row = Row::new();
    let mut out = Vec::new();
    for row in rows {
        match ast::evaluate_expr(predicate, columns, &row, &empty_cols, &empty_row)? {
            Value::Boolean(true) => out.push(row),
            Value::Boolean(false) | Value::Null => {}
            v => {
                return Err(Error::Internal(format!("unexpected filter result {}", v)));
            }
        }
    }
    Ok(out)
}

/// Rewrites column labels under an alias: alias "cp" turns "make" or
/// "t.make" into "cp.make".
fn relabel(columns: Vec<String>, alias: &Option<String>) -> Vec<String> {
    let Some(alias) = alias else {
        return columns;
    };
    columns
        .into_iter()
        .map(|c| {
            let base = c.rsplit('.').next().unwrap_or(&c).to_string();
            format!("{}.{}", alias, base)
        })
        .collect()
}
