use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::{self, Expression},
        types::Value,
    },
};

use super::query::resolve_subqueries;
use super::{Executor, ResultSet};

/// Nested loop join executor. With outer set, left rows without a match
/// are kept and the right side is padded with NULL.
pub struct NestedLoopJoin<T: Transaction> {
    left: Box<dyn Executor<T>>,
    right: Box<dyn Executor<T>>,
    predicate: Option<Expression>,
    outer: bool,
}

impl<T: Transaction> NestedLoopJoin<T> {
    pub fn new(
        left: Box<dyn Executor<T>>,
        right: Box<dyn Executor<T>>,
        predicate: Option<Expression>,
        outer: bool,
    ) -> Box<Self> {
        Box::new(Self {
            left,
            right,
            predicate,
            outer,
        })
    }
}

impl<T: Transaction + 'static> Executor<T> for NestedLoopJoin<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let predicate = self
            .predicate
            .map(|p| resolve_subqueries(p, txn))
            .transpose()?;

        let (lcols, lrows) = match self.left.execute(txn)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".to_string())),
        };
        let (rcols, rrows) = match self.right.execute(txn)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".to_string())),
        };

        let mut columns = lcols.clone();
        columns.extend(rcols.clone());

        let mut rows = Vec::new();
        for lrow in &lrows {
            let mut matched = false;
            for rrow in &rrows {
                let keep = match &predicate {
                    Some(expr) => match ast::evaluate_expr(expr, &lcols, lrow, &rcols, rrow)? {
                        Value::Boolean(true) => true,
                        Value::Boolean(false) | Value::Null => false,
                        v => {
                            return Err(Error::Internal(format!(
                                "unexpected join predicate result {}",
                                v
                            )));
                        }
                    },
                    None => true,
                };
                if keep {
                    matched = true;
                    let mut row = lrow.clone();
                    row.extend(rrow.clone());
                    rows.push(row);
                }
            }
            // one NULL per right column, also when the right side is empty
            if self.outer && !matched {
                let mut row = lrow.clone();
                row.extend(vec![Value::Null; rcols.len()]);
                rows.push(row);
            }
        }
        Ok(ResultSet::Scan { columns, rows })
    }
}
