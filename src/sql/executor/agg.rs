use std::cmp::Ordering;
use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::{self, Expression},
        types::{Row, Value},
    },
};

use super::{Executor, ResultSet};

/// Aggregate executor, groups rows and computes aggregate functions per
/// group. Groups come out in first-seen order.
pub struct Aggregate<T: Transaction> {
    source: Box<dyn Executor<T>>,
    select: Vec<(Expression, Option<String>)>,
    group_by: Vec<Expression>,
}

impl<T: Transaction> Aggregate<T> {
    pub fn new(
        source: Box<dyn Executor<T>>,
        select: Vec<(Expression, Option<String>)>,
        group_by: Vec<Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            select,
            group_by,
        })
    }
}

impl<T: Transaction> Executor<T> for Aggregate<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let (columns, rows) = match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".to_string())),
        };

        let empty_cols = Vec::new();
        let empty_row = Row::new();
        let mut groups: HashMap<Vec<u8>, Vec<Row>> = HashMap::new();
        let mut order = Vec::new();
        for row in rows {
            let mut key_values = Vec::with_capacity(self.group_by.len());
            for expr in &self.group_by {
                key_values.push(ast::evaluate_expr(
                    expr, &columns, &row, &empty_cols, &empty_row,
                )?);
            }
            let key = bincode::serialize(&key_values)?;
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }
        // aggregates without GROUP BY yield one row even on an empty source
        if groups.is_empty() && self.group_by.is_empty() {
            order.push(Vec::new());
            groups.insert(Vec::new(), Vec::new());
        }

        let out_columns = self
            .select
            .iter()
            .map(|(expr, alias)| alias.clone().unwrap_or_else(|| ast::column_label(expr)))
            .collect::<Vec<_>>();

        let mut out_rows = Vec::with_capacity(order.len());
        for key in order {
            let group_rows = groups.remove(&key).unwrap_or_default();
            let mut out = Row::with_capacity(self.select.len());
            for (expr, _) in &self.select {
                out.push(compute(expr, &self.group_by, &columns, &group_rows)?);
            }
            out_rows.push(out);
        }
        Ok(ResultSet::Scan {
            columns: out_columns,
            rows: out_rows,
        })
    }
}

/// Computes one select expression over the rows of a group
fn compute(
    expr: &Expression,
    group_by: &[Expression],
    columns: &Vec<String>,
    rows: &Vec<Row>,
) -> Result<Value> {
    let empty_cols = Vec::new();
    let empty_row = Row::new();
    match expr {
        // grouping expressions are constant within a group, read them off
        // the first row
        _ if group_by.contains(expr) => match rows.first() {
            Some(row) => ast::evaluate_expr(expr, columns, row, &empty_cols, &empty_row),
            None => Ok(Value::Null),
        },
        Expression::Function(name, col_name) => {
            <dyn Calculator>::build(name)?.calc(col_name, columns, rows)
        }
        Expression::Round(inner, digits) => {
            let value = compute(inner, group_by, columns, rows)?;
            ast::round_value(value, *digits)
        }
        Expression::Consts(_) => {
            ast::evaluate_expr(expr, &empty_cols, &empty_row, &empty_cols, &empty_row)
        }
        expr => Err(Error::Schema(format!(
            "{} must appear in GROUP BY or an aggregate function",
            expr
        ))),
    }
}

/// Aggregate calculator definition
pub trait Calculator {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value>;
}

impl dyn Calculator {
    pub fn build(name: &str) -> Result<Box<dyn Calculator>> {
        Ok(match name.to_uppercase().as_str() {
            "COUNT" => Count::new(),
            "MIN" => Min::new(),
            "MAX" => Max::new(),
            "SUM" => Sum::new(),
            "AVG" => Avg::new(),
            _ => {
                return Err(Error::Schema(format!(
                    "unknown aggregate function {}",
                    name
                )));
            }
        })
    }
}

pub struct Count;

impl Count {
    fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Calculator for Count {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value> {
        // COUNT(*) counts rows, COUNT(col) counts non-null values
        if col_name == "*" {
            return Ok(Value::Integer(rows.len() as i64));
        }
        let index = resolve_agg_column(columns, col_name)?;
        let count = rows.iter().filter(|row| !row[index].is_null()).count();
        Ok(Value::Integer(count as i64))
    }
}

pub struct Min;

impl Min {
    fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Calculator for Min {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value> {
        let index = resolve_agg_column(columns, col_name)?;
        let mut min = Value::Null;
        for row in rows {
            let value = &row[index];
            if value.is_null() {
                continue;
            }
            if min.is_null() || matches!(value.partial_cmp(&min), Some(Ordering::Less)) {
                min = value.clone();
            }
        }
        Ok(min)
    }
}

pub struct Max;

impl Max {
    fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Calculator for Max {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value> {
        let index = resolve_agg_column(columns, col_name)?;
        let mut max = Value::Null;
        for row in rows {
            let value = &row[index];
            if value.is_null() {
                continue;
            }
            if max.is_null() || matches!(value.partial_cmp(&max), Some(Ordering::Greater)) {
                max = value.clone();
            }
        }
        Ok(max)
    }
}

pub struct Sum;

impl Sum {
    fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Calculator for Sum {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value> {
        let index = resolve_agg_column(columns, col_name)?;
        let mut sum = None;
        for row in rows {
            match &row[index] {
                Value::Null => {}
                Value::Integer(i) => sum = Some(sum.unwrap_or(0.0) + *i as f64),
                Value::Float(f) => sum = Some(sum.unwrap_or(0.0) + f),
                v => return Err(Error::Schema(format!("can not sum {}", v))),
            }
        }
        Ok(match sum {
            Some(s) => Value::Float(s),
            None => Value::Null,
        })
    }
}

pub struct Avg;

impl Avg {
    fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Calculator for Avg {
    fn calc(&self, col_name: &String, columns: &Vec<String>, rows: &Vec<Row>) -> Result<Value> {
        let index = resolve_agg_column(columns, col_name)?;
        let sum = Sum::new().calc(col_name, columns, rows)?;
        let count = rows.iter().filter(|row| !row[index].is_null()).count();
        Ok(match (sum, count) {
            (Value::Float(s), c) if c > 0 => Value::Float(s / c as f64),
            _ => Value::Null,
        })
    }
}

fn resolve_agg_column(columns: &[String], name: &str) -> Result<usize> {
    ast::resolve_column(columns, name)?
        .ok_or_else(|| Error::Schema(format!("column {} not found", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculator_null_handling() -> Result<()> {
        let columns = vec!["make".to_string(), "sellingprice".to_string()];
        let rows = vec![
            vec![Value::String("bmw".to_string()), Value::Integer(20000)],
            vec![Value::String("kia".to_string()), Value::Null],
            vec![Value::String("bmw".to_string()), Value::Integer(10000)],
        ];
        let col = "sellingprice".to_string();

        assert_eq!(
            <dyn Calculator>::build("count")?.calc(&"*".to_string(), &columns, &rows)?,
            Value::Integer(3)
        );
        assert_eq!(
            <dyn Calculator>::build("COUNT")?.calc(&col, &columns, &rows)?,
            Value::Integer(2)
        );
        assert_eq!(
            <dyn Calculator>::build("sum")?.calc(&col, &columns, &rows)?,
            Value::Float(30000.0)
        );
        assert_eq!(
            <dyn Calculator>::build("avg")?.calc(&col, &columns, &rows)?,
            Value::Float(15000.0)
        );
        assert_eq!(
            <dyn Calculator>::build("min")?.calc(&col, &columns, &rows)?,
            Value::Integer(10000)
        );
        assert_eq!(
            <dyn Calculator>::build("max")?.calc(&col, &columns, &rows)?,
            Value::Integer(20000)
        );

        let empty: Vec<Row> = Vec::new();
        assert_eq!(
            <dyn Calculator>::build("avg")?.calc(&col, &columns, &empty)?,
            Value::Null
        );
        assert_eq!(
            <dyn Calculator>::build("max")?.calc(&col, &columns, &empty)?,
            Value::Null
        );
        assert!(<dyn Calculator>::build("median").is_err());
        Ok(())
    }
}
