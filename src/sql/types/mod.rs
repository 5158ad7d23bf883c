use std::{cmp::Ordering, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::sql::parser::ast::{Consts, Expression};

/// Supported SQL data types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::String => "TEXT",
        })
    }
}

/// Runtime value type for expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Creates a Value from a constant AST expression
    pub fn from_expression(expr: Expression) -> Self {
        match expr {
            Expression::Consts(Consts::Null) => Self::Null,
            Expression::Consts(Consts::Boolean(b)) => Self::Boolean(b),
            Expression::Consts(Consts::Integer(i)) => Self::Integer(i),
            Expression::Consts(Consts::Float(f)) => Self::Float(f),
            Expression::Consts(Consts::String(s)) => Self::String(s),
            _ => unreachable!(), // callers only pass constant expressions
        }
    }

    /// Converts the value back into a constant expression; used when a
    /// scalar subquery result is substituted into its enclosing expression
    pub fn into_expression(self) -> Expression {
        match self {
            Self::Null => Consts::Null.into(),
            Self::Boolean(b) => Consts::Boolean(b).into(),
            Self::Integer(i) => Consts::Integer(i).into(),
            Self::Float(f) => Consts::Float(f).into(),
            Self::String(s) => Consts::String(s).into(),
        }
    }

    /// Returns the data type of the value; NULL carries none
    pub fn datatype(&self) -> Option<DataType> {
        Some(match self {
            Self::Null => return None,
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::String(_) => DataType::String,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) if *b => write!(f, "TRUE"),
            Value::Boolean(_) => write!(f, "FALSE"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

/// Implements partial ordering for Value comparison (used by ORDER BY,
/// MIN/MAX and the comparison operators); NULL sorts before everything,
/// integers and floats compare numerically across types
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Null, _) => Some(Ordering::Less),
            (_, Null) => Some(Ordering::Greater),
            (Boolean(a), Boolean(b)) => a.partial_cmp(b),
            (Integer(a), Integer(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => a.partial_cmp(b),
            (_, _) => None,
        }
    }
}

/// A row is a vector of values
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn test_value_ordering() {
        assert!(Value::Null < Value::Integer(0));
        assert!(Value::Integer(2) < Value::Float(2.5));
        assert!(Value::Float(3.0) > Value::Integer(2));
        assert!(Value::String("bmw".into()) < Value::String("kia".into()));
        // mismatched types do not compare
        assert_eq!(
            Value::String("bmw".into()).partial_cmp(&Value::Integer(1)),
            None
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(2015).to_string(), "2015");
        assert_eq!(Value::Float(13611.43).to_string(), "13611.43");
        assert_eq!(Value::String("sedan".into()).to_string(), "sedan");
    }
}
