use crate::error::{Error, Result};
use crate::sql::parser::ast::{self, Expression, JoinType};
use crate::sql::schema::{self, Index, Table};
use crate::sql::types::Value;

use super::{Node, Plan};

/// Planner - turns an AST statement into an execution plan tree
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&mut self, stmt: ast::Statement) -> Result<Plan> {
        Ok(Plan(self.build_statement(stmt)?))
    }

    fn build_statement(&self, stmt: ast::Statement) -> Result<Node> {
        Ok(match stmt {
            ast::Statement::CreateTable {
                name,
                columns,
                if_not_exists,
            } => Node::CreateTable {
                schema: Table {
                    name,
                    columns: columns
                        .into_iter()
                        .map(|c| {
                            let nullable = c.nullable.unwrap_or(true);
                            let default = match c.default {
                                Some(Expression::Consts(consts)) => {
                                    Some(Value::from_expression(Expression::Consts(consts)))
                                }
                                Some(expr) => {
                                    return Err(Error::Schema(format!(
                                        "default for column {} must be a constant, got {}",
                                        c.name, expr
                                    )));
                                }
                                None if nullable => Some(Value::Null),
                                None => None,
                            };
                            Ok(schema::Column {
                                name: c.name,
                                datatype: c.datatype,
                                nullable,
                                default,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                },
                if_not_exists,
            },
            ast::Statement::CreateTableAs {
                name,
                if_not_exists,
                query,
            } => Node::CreateTableAs {
                name,
                if_not_exists,
                source: Box::new(self.build_statement(*query)?),
            },
            ast::Statement::CreateView {
                name,
                if_not_exists,
                query,
            } => Node::CreateView {
                name,
                // the canonical rendering is stored; reads re-parse and
                // re-plan it, so they always see current table contents
                sql: query.to_string(),
                if_not_exists,
            },
            ast::Statement::CreateIndex {
                name,
                table_name,
                columns,
                if_not_exists,
            } => Node::CreateIndex {
                index: Index {
                    name,
                    table: table_name,
                    columns,
                },
                if_not_exists,
            },
            ast::Statement::Insert {
                table_name,
                columns,
                values,
            } => Node::Insert {
                table_name,
                columns: columns.unwrap_or_default(),
                values,
            },
            ast::Statement::Show(object) => Node::Show(object),
            ast::Statement::Select {
                select,
                distinct,
                from,
                where_clause,
                group_by,
                order_by,
                limit,
                offset,
            } => {
                // A filter over a plain table scan runs inside the storage
                // engine, which only knows bare schema column names. Aliased
                // tables, joins and derived tables carry qualified labels,
                // so their filter stays in its own node.
                let mut node = match from {
                    ast::FromItem::Table { name, alias: None } => Node::Scan {
                        table_name: name,
                        alias: None,
                        filter: where_clause,
                    },
                    from => {
                        let source = self.build_from_item(from)?;
                        match where_clause {
                            Some(predicate) => Node::Filter {
                                source: Box::new(source),
                                predicate,
                            },
                            None => source,
                        }
                    }
                };

                let has_aggregate = !group_by.is_empty()
                    || select.iter().any(|(expr, _)| ast::contains_aggregate(expr));
                if has_aggregate {
                    if select.is_empty() {
                        return Err(Error::Schema(
                            "SELECT * cannot be combined with GROUP BY".to_string(),
                        ));
                    }
                    node = Node::Aggregate {
                        source: Box::new(node),
                        select,
                        group_by,
                    };
                    if distinct {
                        node = Node::Distinct {
                            source: Box::new(node),
                        };
                    }
                    // ORDER BY runs on the aggregate output, so aliases like
                    // avg_price are visible to it
                    if !order_by.is_empty() {
                        node = Node::Order {
                            source: Box::new(node),
                            order_by,
                        };
                    }
                } else {
                    if !order_by.is_empty() {
                        node = Node::Order {
                            source: Box::new(node),
                            order_by,
                        };
                    }
                    if !select.is_empty() {
                        node = Node::Projection {
                            source: Box::new(node),
                            select,
                        };
                    }
                    if distinct {
                        node = Node::Distinct {
                            source: Box::new(node),
                        };
                    }
                }

                if let Some(expr) = offset {
                    node = Node::Offset {
                        source: Box::new(node),
                        offset: Self::build_bound(expr, "offset")?,
                    };
                }
                if let Some(expr) = limit {
                    node = Node::Limit {
                        source: Box::new(node),
                        limit: Self::build_bound(expr, "limit")?,
                    };
                }
                node
            }
        })
    }

    fn build_from_item(&self, item: ast::FromItem) -> Result<Node> {
        Ok(match item {
            ast::FromItem::Table { name, alias } => Node::Scan {
                table_name: name,
                alias,
                filter: None,
            },
            ast::FromItem::Derived { query, alias } => Node::Derived {
                source: Box::new(self.build_statement(*query)?),
                alias,
            },
            ast::FromItem::Join {
                left,
                right,
                join_type,
                predicate,
            } => {
                // RIGHT JOIN is planned as LEFT JOIN with the operands
                // swapped, so the preserved side is always the left input
                let (left, right) = match join_type {
                    JoinType::Right => (right, left),
                    _ => (left, right),
                };
                let outer = matches!(join_type, JoinType::Left | JoinType::Right);
                Node::NestedLoopJoin {
                    left: Box::new(self.build_from_item(*left)?),
                    right: Box::new(self.build_from_item(*right)?),
                    predicate,
                    outer,
                }
            }
        })
    }

    fn build_bound(expr: ast::Expression, clause: &str) -> Result<usize> {
        match expr {
            Expression::Consts(ast::Consts::Integer(i)) if i >= 0 => Ok(i as usize),
            expr => Err(Error::Internal(format!("invalid {} {}", clause, expr))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::Parser;
    use crate::sql::parser::ast::OrderDirection;

    fn plan(sql: &str) -> Result<Node> {
        Ok(Plan::build(Parser::new(sql).parse()?)?.0)
    }

    #[test]
    fn test_plan_filter_placement() -> Result<()> {
        // plain table scans carry the filter down into the storage engine
        let node = plan("select * from car_prices where year > 2014;")?;
        assert_eq!(
            node,
            Node::Scan {
                table_name: "car_prices".to_string(),
                alias: None,
                filter: Some(Expression::Operation(ast::Operation::GreaterThan(
                    Box::new(Expression::Field("year".to_string())),
                    Box::new(ast::Consts::Integer(2014).into()),
                ))),
            }
        );

        // aliased scans keep the filter in its own node so qualified labels
        // stay resolvable
        let node = plan("select * from car_prices cp where cp.year > 2014;")?;
        assert!(matches!(node, Node::Filter { .. }));
        Ok(())
    }

    #[test]
    fn test_plan_aggregate_pipeline() -> Result<()> {
        let node = plan(
            "select make, round(avg(sellingprice), 2) as avg_price \
             from car_prices group by make order by avg_price desc limit 5;",
        )?;
        assert_eq!(
            node,
            Node::Limit {
                limit: 5,
                source: Box::new(Node::Order {
                    order_by: vec![("avg_price".to_string(), OrderDirection::Desc)],
                    source: Box::new(Node::Aggregate {
                        source: Box::new(Node::Scan {
                            table_name: "car_prices".to_string(),
                            alias: None,
                            filter: None,
                        }),
                        select: vec![
                            (Expression::Field("make".to_string()), None),
                            (
                                Expression::Round(
                                    Box::new(Expression::Function(
                                        "avg".to_string(),
                                        "sellingprice".to_string(),
                                    )),
                                    2,
                                ),
                                Some("avg_price".to_string()),
                            ),
                        ],
                        group_by: vec![Expression::Field("make".to_string())],
                    }),
                }),
            }
        );
        Ok(())
    }

    #[test]
    fn test_plan_select_star_with_group_by() {
        assert!(plan("select * from car_prices group by make;").is_err());
    }

    #[test]
    fn test_plan_right_join_swaps_sides() -> Result<()> {
        let node = plan("select * from t1 right join t2 on t1.a = t2.a;")?;
        match node {
            Node::NestedLoopJoin {
                left, right, outer, ..
            } => {
                assert!(outer);
                assert!(
                    matches!(*left, Node::Scan { ref table_name, .. } if table_name == "t2")
                );
                assert!(
                    matches!(*right, Node::Scan { ref table_name, .. } if table_name == "t1")
                );
            }
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_plan_create_view_renders_sql() -> Result<()> {
        let node = plan("create view v as select make, year from car_prices where year >= 2014;")?;
        match node {
            Node::CreateView {
                name,
                sql,
                if_not_exists,
            } => {
                assert_eq!(name, "v");
                assert!(!if_not_exists);
                assert_eq!(sql, "SELECT make, year FROM car_prices WHERE year >= 2014");
            }
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_plan_distinct_projection() -> Result<()> {
        let node = plan("select distinct make, body, transmission from car_prices;")?;
        match node {
            Node::Distinct { source } => {
                assert!(matches!(*source, Node::Projection { .. }));
            }
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_plan_limit_offset() -> Result<()> {
        let node = plan("select * from t limit 5 offset 10;")?;
        assert_eq!(
            node,
            Node::Limit {
                limit: 5,
                source: Box::new(Node::Offset {
                    offset: 10,
                    source: Box::new(Node::Scan {
                        table_name: "t".to_string(),
                        alias: None,
                        filter: None,
                    }),
                }),
            }
        );

        assert!(plan("select * from t limit 'a';").is_err());
        Ok(())
    }
}
