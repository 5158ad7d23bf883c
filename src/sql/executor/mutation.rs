use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::Expression,
        schema::Table,
        types::{Row, Value},
    },
};

use super::{Executor, ResultSet};

/// Insert executor
pub struct Insert {
    table_name: String,
    columns: Vec<String>,
    values: Vec<Vec<Expression>>,
}

impl Insert {
    pub fn new(
        table_name: String,
        columns: Vec<String>,
        values: Vec<Vec<Expression>>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            values,
        })
    }
}

impl<T: Transaction> Executor<T> for Insert {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(self.table_name.clone())?;

        let mut count = 0;
        for exprs in self.values {
            let mut row = Row::with_capacity(exprs.len());
            for expr in exprs {
                if !matches!(&expr, Expression::Consts(_)) {
                    return Err(Error::Schema(format!(
                        "insert value must be a constant, got {}",
                        expr
                    )));
                }
                row.push(Value::from_expression(expr));
            }
            let row = if self.columns.is_empty() {
                pad_row(&table, &row)?
            } else {
                make_row(&table, &self.columns, &row)?
            };
            txn.create_row(table.name.clone(), row)?;
            count += 1;
        }
        Ok(ResultSet::Insert { count })
    }
}

// insert into tbl values (1, 2, 3);
// a value list shorter than the table falls back to column defaults
fn pad_row(table: &Table, row: &Row) -> Result<Row> {
    if row.len() > table.columns.len() {
        return Err(Error::Schema(format!(
            "too many values for table {}",
            table.name
        )));
    }
    let mut results = row.clone();
    for column in table.columns.iter().skip(row.len()) {
        if let Some(default) = &column.default {
            results.push(default.clone());
        } else {
            return Err(Error::Schema(format!(
                "no default value for column {}",
                column.name
            )));
        }
    }
    Ok(results)
}

// insert into tbl (b, a) values (2, 1);
// named columns may come in any order, the rest fall back to defaults
fn make_row(table: &Table, columns: &Vec<String>, values: &Row) -> Result<Row> {
    if columns.len() != values.len() {
        return Err(Error::Schema(format!(
            "columns and values count mismatch for table {}",
            table.name
        )));
    }
    let mut inputs = HashMap::new();
    for (i, col_name) in columns.iter().enumerate() {
        table.get_col_index(col_name)?;
        inputs.insert(col_name.clone(), values[i].clone());
    }
    let mut results = Vec::with_capacity(table.columns.len());
    for col in &table.columns {
        if let Some(value) = inputs.get(&col.name) {
            results.push(value.clone());
        } else if let Some(default) = &col.default {
            results.push(default.clone());
        } else {
            return Err(Error::Schema(format!(
                "no value given for column {}",
                col.name
            )));
        }
    }
    Ok(results)
}
