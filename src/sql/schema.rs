use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::types::DataType,
};

use super::types::Value;

/// Table schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Validates the table schema
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Schema(format!(
                "table {} has no columns",
                self.name
            )));
        }

        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(Error::Schema(format!(
                    "duplicate column {} in table {}",
                    col.name, self.name
                )));
            }
            if let Some(default) = &col.default {
                if let Some(dt) = default.datatype() {
                    if dt != col.datatype {
                        return Err(Error::Schema(format!(
                            "default value for column {} mismatches the column type",
                            col.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the position of a named column
    pub fn get_col_index(&self, col_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == col_name)
            .ok_or(Error::Schema(format!(
                "column {} not found in table {}",
                col_name, self.name
            )))
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub default: Option<Value>,
}

/// Secondary index definition; entries are maintained on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

/// A view stores the text of its defining query; every read re-plans it
/// against the current data, so view results are never stale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub sql: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() -> Result<()> {
        let table = Table {
            name: "sales".into(),
            columns: vec![
                Column {
                    name: "make".into(),
                    datatype: DataType::String,
                    nullable: true,
                    default: Some(Value::Null),
                },
                Column {
                    name: "sellingprice".into(),
                    datatype: DataType::Float,
                    nullable: true,
                    default: Some(Value::Null),
                },
            ],
        };
        table.validate()?;
        assert_eq!(table.get_col_index("sellingprice")?, 1);
        assert!(table.get_col_index("price").is_err());

        let dup = Table {
            name: "t".into(),
            columns: vec![
                Column {
                    name: "a".into(),
                    datatype: DataType::Integer,
                    nullable: true,
                    default: None,
                },
                Column {
                    name: "a".into(),
                    datatype: DataType::Integer,
                    nullable: true,
                    default: None,
                },
            ],
        };
        assert!(dup.validate().is_err());

        let empty = Table {
            name: "t".into(),
            columns: vec![],
        };
        assert!(empty.validate().is_err());
        Ok(())
    }
}
