use std::cmp::Ordering;
use std::fmt::Display;

use crate::error::{Error, Result};
use crate::sql::types::{DataType, Row, Value};

/// Abstract Syntax Tree (AST) node definitions for SQL statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement with explicit column definitions
    CreateTable {
        name: String,
        columns: Vec<Column>,
        if_not_exists: bool,
    },
    /// CREATE TABLE ... AS SELECT statement (materialized once)
    CreateTableAs {
        name: String,
        if_not_exists: bool,
        query: Box<Statement>,
    },
    /// CREATE VIEW statement; the defining query is re-run on every read
    CreateView {
        name: String,
        if_not_exists: bool,
        query: Box<Statement>,
    },
    /// CREATE INDEX statement
    CreateIndex {
        name: String,
        table_name: String,
        columns: Vec<String>,
        if_not_exists: bool,
    },
    /// INSERT with an optional explicit column list
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    },
    /// SELECT statement
    Select {
        /// Column expressions with optional aliases (e.g., count(*) AS cnt);
        /// empty means SELECT *
        select: Vec<(Expression, Option<String>)>,
        distinct: bool,
        from: FromItem,
        where_clause: Option<Expression>,
        group_by: Vec<Expression>,
        order_by: Vec<(String, OrderDirection)>,
        limit: Option<Expression>,
        offset: Option<Expression>,
    },
    /// SHOW TABLES / VIEWS / INDEXES
    Show(ShowObject),
}

/// Catalog object class listed by SHOW
#[derive(Debug, Clone, PartialEq)]
pub enum ShowObject {
    Tables,
    Views,
    Indexes { table: Option<String> },
}

/// FROM clause item - a table, a parenthesized subquery, or a join
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// Single table (or view) reference
    Table {
        name: String,
        alias: Option<String>,
    },

    /// Derived table: (SELECT ...) AS alias; the alias is mandatory
    Derived {
        query: Box<Statement>,
        alias: String,
    },

    /// Join expression (two sides joined together)
    Join {
        left: Box<FromItem>,
        right: Box<FromItem>,
        join_type: JoinType,
        /// ON predicate, absent for CROSS JOIN
        predicate: Option<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
    Right,
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column definition for CREATE TABLE statements
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: Option<bool>,
    pub default: Option<Expression>,
}

/// Expression types (column refs, constants, operations, functions)
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Column reference, possibly qualified (e.g. cp.make)
    Field(String),
    /// Constant value
    Consts(Consts),
    /// Binary operation (comparison or AND/OR)
    Operation(Operation),
    /// Aggregate function: Function(name, column), e.g. Function("avg", "sellingprice");
    /// the column is "*" only for count(*)
    Function(String, String),
    /// ROUND(expr, digits)
    Round(Box<Expression>, u32),
    /// Scalar subquery; evaluated once per statement and replaced by its
    /// value before any row is examined
    Subquery(Box<Statement>),
}

impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

/// Literal constants
#[derive(Debug, Clone, PartialEq)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operations
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),
}

/// Resolves a column reference against a list of column labels.
///
/// Exact match first; an unqualified name additionally matches a qualified
/// label by its part after the dot, but only when that match is unique
/// (e.g. "make" resolves against ["cp.make", "cp.year"], and is ambiguous
/// against ["cp.make", "m.make"]).
pub fn resolve_column(columns: &[String], name: &str) -> Result<Option<usize>> {
    if let Some(i) = columns.iter().position(|c| c == name) {
        return Ok(Some(i));
    }
    if name.contains('.') {
        return Ok(None);
    }
    let matches = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.rsplit('.').next() == Some(name))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => Err(Error::Schema(format!("ambiguous column {}", name))),
    }
}

/// Default output label for an unaliased select expression; qualified
/// column references lose their qualifier, the way SQL names result columns
pub fn column_label(expr: &Expression) -> String {
    match expr {
        Expression::Field(f) => f.rsplit('.').next().unwrap_or(f).to_string(),
        Expression::Function(name, _) => name.clone(),
        other => other.to_string(),
    }
}

/// Returns true if the expression contains an aggregate function call
pub fn contains_aggregate(expr: &Expression) -> bool {
    match expr {
        Expression::Function(_, _) => true,
        Expression::Round(inner, _) => contains_aggregate(inner),
        Expression::Operation(
            Operation::And(l, r)
            | Operation::Or(l, r)
            | Operation::Equal(l, r)
            | Operation::NotEqual(l, r)
            | Operation::GreaterThan(l, r)
            | Operation::GreaterThanOrEqual(l, r)
            | Operation::LessThan(l, r)
            | Operation::LessThanOrEqual(l, r),
        ) => contains_aggregate(l) || contains_aggregate(r),
        _ => false,
    }
}

/// Evaluates an expression against a row (or a pair of rows when joining).
///
/// Single-sided callers pass empty right-hand columns. Comparisons involving
/// NULL yield NULL, and AND/OR follow three-valued logic, so a NULL predicate
/// result filters the row out without being an error.
pub fn evaluate_expr(
    expr: &Expression,
    lcols: &Vec<String>,
    lrow: &Row,
    rcols: &Vec<String>,
    rrow: &Row,
) -> Result<Value> {
    match expr {
        Expression::Field(col_name) => {
            match (
                resolve_column(lcols, col_name)?,
                resolve_column(rcols, col_name)?,
            ) {
                (Some(i), None) => Ok(lrow[i].clone()),
                (None, Some(i)) => Ok(rrow[i].clone()),
                (Some(_), Some(_)) => {
                    Err(Error::Schema(format!("ambiguous column {}", col_name)))
                }
                (None, None) => Err(Error::Schema(format!("column {} not found", col_name))),
            }
        }
        Expression::Consts(_) => Ok(Value::from_expression(expr.clone())),
        Expression::Operation(operation) => match operation {
            Operation::And(l, r) => {
                let lv = evaluate_expr(l, lcols, lrow, rcols, rrow)?;
                let rv = evaluate_expr(r, lcols, lrow, rcols, rrow)?;
                Ok(match (to_boolean(lv)?, to_boolean(rv)?) {
                    (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            Operation::Or(l, r) => {
                let lv = evaluate_expr(l, lcols, lrow, rcols, rrow)?;
                let rv = evaluate_expr(r, lcols, lrow, rcols, rrow)?;
                Ok(match (to_boolean(lv)?, to_boolean(rv)?) {
                    (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            Operation::Equal(l, r) => compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| {
                o == Ordering::Equal
            }),
            Operation::NotEqual(l, r) => compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| {
                o != Ordering::Equal
            }),
            Operation::GreaterThan(l, r) => {
                compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| {
                    o == Ordering::Greater
                })
            }
            Operation::GreaterThanOrEqual(l, r) => {
                compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| o != Ordering::Less)
            }
            Operation::LessThan(l, r) => compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| {
                o == Ordering::Less
            }),
            Operation::LessThanOrEqual(l, r) => {
                compare_op(expr, l, r, lcols, lrow, rcols, rrow, |o| {
                    o != Ordering::Greater
                })
            }
        },
        Expression::Round(inner, digits) => {
            round_value(evaluate_expr(inner, lcols, lrow, rcols, rrow)?, *digits)
        }
        Expression::Function(name, _) => Err(Error::Schema(format!(
            "aggregate function {} is not allowed here",
            name
        ))),
        Expression::Subquery(_) => Err(Error::Internal("subquery was not resolved".into())),
    }
}

#[allow(clippy::too_many_arguments)]
fn compare_op<F: Fn(Ordering) -> bool>(
    expr: &Expression,
    l: &Expression,
    r: &Expression,
    lcols: &Vec<String>,
    lrow: &Row,
    rcols: &Vec<String>,
    rrow: &Row,
    check: F,
) -> Result<Value> {
    let lv = evaluate_expr(l, lcols, lrow, rcols, rrow)?;
    let rv = evaluate_expr(r, lcols, lrow, rcols, rrow)?;
    if lv.is_null() || rv.is_null() {
        return Ok(Value::Null);
    }
    match lv.partial_cmp(&rv) {
        Some(ordering) => Ok(Value::Boolean(check(ordering))),
        None => Err(Error::Internal(format!(
            "can not compare {} and {} in {}",
            lv, rv, expr
        ))),
    }
}

fn to_boolean(value: Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(b)),
        v => Err(Error::Internal(format!("expected a boolean, got {}", v))),
    }
}

/// Rounds a numeric value to the given number of decimal places.
/// The result is always a Float; NULL passes through.
pub fn round_value(value: Value, digits: u32) -> Result<Value> {
    Ok(match value {
        Value::Null => Value::Null,
        Value::Integer(i) => Value::Float(i as f64),
        Value::Float(f) => {
            let factor = 10f64.powi(digits as i32);
            Value::Float((f * factor).round() / factor)
        }
        v => return Err(Error::Internal(format!("can not round {}", v))),
    })
}

// Display implementations render a statement back to SQL text. View
// definitions are stored in this rendered form and re-parsed on every read.

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::CreateTable {
                name,
                columns,
                if_not_exists,
            } => {
                write!(f, "CREATE TABLE {}{} (", ine(*if_not_exists), name)?;
                for (i, col) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", col.name, col.datatype)?;
                    match col.nullable {
                        Some(true) => write!(f, " NULL")?,
                        Some(false) => write!(f, " NOT NULL")?,
                        None => {}
                    }
                    if let Some(default) = &col.default {
                        write!(f, " DEFAULT {}", default)?;
                    }
                }
                write!(f, ")")
            }
            Statement::CreateTableAs {
                name,
                if_not_exists,
                query,
            } => write!(f, "CREATE TABLE {}{} AS {}", ine(*if_not_exists), name, query),
            Statement::CreateView {
                name,
                if_not_exists,
                query,
            } => write!(f, "CREATE VIEW {}{} AS {}", ine(*if_not_exists), name, query),
            Statement::CreateIndex {
                name,
                table_name,
                columns,
                if_not_exists,
            } => write!(
                f,
                "CREATE INDEX {}{} ON {} ({})",
                ine(*if_not_exists),
                name,
                table_name,
                columns.join(", ")
            ),
            Statement::Insert {
                table_name,
                columns,
                values,
            } => {
                write!(f, "INSERT INTO {}", table_name)?;
                if let Some(columns) = columns {
                    write!(f, " ({})", columns.join(", "))?;
                }
                write!(f, " VALUES ")?;
                for (i, row) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    for (j, expr) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", expr)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Statement::Select {
                select,
                distinct,
                from,
                where_clause,
                group_by,
                order_by,
                limit,
                offset,
            } => {
                write!(f, "SELECT ")?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                if select.is_empty() {
                    write!(f, "*")?;
                }
                for (i, (expr, alias)) in select.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", expr)?;
                    if let Some(alias) = alias {
                        write!(f, " AS {}", alias)?;
                    }
                }
                write!(f, " FROM {}", from)?;
                if let Some(expr) = where_clause {
                    write!(f, " WHERE {}", expr)?;
                }
                if !group_by.is_empty() {
                    write!(f, " GROUP BY ")?;
                    for (i, expr) in group_by.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", expr)?;
                    }
                }
                if !order_by.is_empty() {
                    write!(f, " ORDER BY ")?;
                    for (i, (col, direction)) in order_by.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", col, direction)?;
                    }
                }
                if let Some(expr) = limit {
                    write!(f, " LIMIT {}", expr)?;
                }
                if let Some(expr) = offset {
                    write!(f, " OFFSET {}", expr)?;
                }
                Ok(())
            }
            Statement::Show(ShowObject::Tables) => write!(f, "SHOW TABLES"),
            Statement::Show(ShowObject::Views) => write!(f, "SHOW VIEWS"),
            Statement::Show(ShowObject::Indexes { table }) => {
                write!(f, "SHOW INDEXES")?;
                if let Some(table) = table {
                    write!(f, " FROM {}", table)?;
                }
                Ok(())
            }
        }
    }
}

fn ine(if_not_exists: bool) -> &'static str {
    if if_not_exists {
        "IF NOT EXISTS "
    } else {
        ""
    }
}

impl Display for FromItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FromItem::Table { name, alias } => {
                write!(f, "{}", name)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            FromItem::Derived { query, alias } => write!(f, "({}) AS {}", query, alias),
            FromItem::Join {
                left,
                right,
                join_type,
                predicate,
            } => {
                let joiner = match join_type {
                    JoinType::Cross => "CROSS JOIN",
                    JoinType::Inner => "JOIN",
                    JoinType::Left => "LEFT JOIN",
                    JoinType::Right => "RIGHT JOIN",
                };
                write!(f, "{} {} {}", left, joiner, right)?;
                if let Some(predicate) = predicate {
                    write!(f, " ON {}", predicate)?;
                }
                Ok(())
            }
        }
    }
}

impl Display for OrderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Field(name) => write!(f, "{}", name),
            Expression::Consts(consts) => write!(f, "{}", consts),
            Expression::Operation(operation) => write!(f, "{}", operation),
            Expression::Function(name, col) => write!(f, "{}({})", name, col),
            Expression::Round(expr, digits) => write!(f, "ROUND({}, {})", expr, digits),
            Expression::Subquery(stmt) => write!(f, "({})", stmt),
        }
    }
}

impl Display for Consts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Consts::Null => write!(f, "NULL"),
            Consts::Boolean(b) if *b => write!(f, "TRUE"),
            Consts::Boolean(_) => write!(f, "FALSE"),
            Consts::Integer(i) => write!(f, "{}", i),
            // keep a decimal point so the literal parses back as a float
            Consts::Float(v) if v.fract() == 0.0 => write!(f, "{:.1}", v),
            Consts::Float(v) => write!(f, "{}", v),
            Consts::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // AND/OR are parenthesized so the rendered text reparses with
            // the same shape
            Operation::And(l, r) => write!(f, "({} AND {})", l, r),
            Operation::Or(l, r) => write!(f, "({} OR {})", l, r),
            Operation::Equal(l, r) => write!(f, "{} = {}", l, r),
            Operation::NotEqual(l, r) => write!(f, "{} != {}", l, r),
            Operation::GreaterThan(l, r) => write!(f, "{} > {}", l, r),
            Operation::GreaterThanOrEqual(l, r) => write!(f, "{} >= {}", l, r),
            Operation::LessThan(l, r) => write!(f, "{} < {}", l, r),
            Operation::LessThanOrEqual(l, r) => write!(f, "{} <= {}", l, r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Expression, cols: &Vec<String>, row: &Row) -> Result<Value> {
        let empty_cols = Vec::new();
        let empty_row = Row::new();
        evaluate_expr(expr, cols, row, &empty_cols, &empty_row)
    }

    #[test]
    fn test_evaluate_comparison() -> Result<()> {
        let cols = vec!["make".to_string(), "sellingprice".to_string()];
        let row = vec![Value::String("kia".into()), Value::Float(21500.0)];

        let gt = Expression::Operation(Operation::GreaterThan(
            Box::new(Expression::Field("sellingprice".into())),
            Box::new(Consts::Integer(20000).into()),
        ));
        assert_eq!(eval(&gt, &cols, &row)?, Value::Boolean(true));

        let eq = Expression::Operation(Operation::Equal(
            Box::new(Expression::Field("make".into())),
            Box::new(Consts::String("bmw".into()).into()),
        ));
        assert_eq!(eval(&eq, &cols, &row)?, Value::Boolean(false));

        // comparing against NULL is NULL, not an error
        let null_row = vec![Value::String("kia".into()), Value::Null];
        assert_eq!(eval(&gt, &cols, &null_row)?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_evaluate_logic() -> Result<()> {
        let cols = vec!["a".to_string(), "b".to_string()];
        let row = vec![Value::Integer(1), Value::Null];

        let a_pos = Expression::Operation(Operation::GreaterThan(
            Box::new(Expression::Field("a".into())),
            Box::new(Consts::Integer(0).into()),
        ));
        let b_pos = Expression::Operation(Operation::GreaterThan(
            Box::new(Expression::Field("b".into())),
            Box::new(Consts::Integer(0).into()),
        ));

        let and = Expression::Operation(Operation::And(
            Box::new(a_pos.clone()),
            Box::new(b_pos.clone()),
        ));
        assert_eq!(eval(&and, &cols, &row)?, Value::Null);

        let or = Expression::Operation(Operation::Or(Box::new(a_pos), Box::new(b_pos)));
        assert_eq!(eval(&or, &cols, &row)?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn test_resolve_qualified_columns() -> Result<()> {
        let cols = vec!["cp.make".to_string(), "m.make".to_string(), "m.max_price".to_string()];
        assert_eq!(resolve_column(&cols, "cp.make")?, Some(0));
        assert_eq!(resolve_column(&cols, "max_price")?, Some(2));
        assert!(resolve_column(&cols, "make").is_err());
        assert_eq!(resolve_column(&cols, "x.make")?, None);
        Ok(())
    }

    #[test]
    fn test_round() -> Result<()> {
        assert_eq!(round_value(Value::Float(13611.434), 2)?, Value::Float(13611.43));
        assert_eq!(round_value(Value::Float(13611.436), 2)?, Value::Float(13611.44));
        assert_eq!(round_value(Value::Integer(20000), 2)?, Value::Float(20000.0));
        assert_eq!(round_value(Value::Null, 2)?, Value::Null);
        assert!(round_value(Value::String("x".into()), 2).is_err());
        Ok(())
    }

    #[test]
    fn test_column_label() {
        assert_eq!(column_label(&Expression::Field("cp.make".into())), "make");
        assert_eq!(
            column_label(&Expression::Function("avg".into(), "sellingprice".into())),
            "avg"
        );
    }
}
