use crate::{
    error::Result,
    sql::{engine::Transaction, parser::ast::ShowObject, types::Value},
};

use super::{Executor, ResultSet};

/// SHOW executor, lists catalog objects sorted by name
pub struct Show {
    object: ShowObject,
}

impl Show {
    pub fn new(object: ShowObject) -> Box<Self> {
        Box::new(Self { object })
    }
}

impl<T: Transaction> Executor<T> for Show {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.object {
            ShowObject::Tables => {
                let mut names = txn
                    .list_tables()?
                    .into_iter()
                    .map(|t| t.name)
                    .collect::<Vec<_>>();
                names.sort();
                Ok(ResultSet::Scan {
                    columns: vec!["table".to_string()],
                    rows: names.into_iter().map(|n| vec![Value::String(n)]).collect(),
                })
            }
            ShowObject::Views => {
                let mut views = txn.list_views()?;
                views.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(ResultSet::Scan {
                    columns: vec!["view".to_string(), "definition".to_string()],
                    rows: views
                        .into_iter()
                        .map(|v| vec![Value::String(v.name), Value::String(v.sql)])
                        .collect(),
                })
            }
            ShowObject::Indexes { table } => {
                let mut indexes = txn.list_indexes()?;
                if let Some(table) = table {
                    indexes.retain(|i| i.table == table);
                }
                indexes.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(ResultSet::Scan {
                    columns: vec![
                        "index".to_string(),
                        "table".to_string(),
                        "columns".to_string(),
                    ],
                    rows: indexes
                        .into_iter()
                        .map(|i| {
                            vec![
                                Value::String(i.name),
                                Value::String(i.table),
                                Value::String(i.columns.join(", ")),
                            ]
                        })
                        .collect(),
                })
            }
        }
    }
}
