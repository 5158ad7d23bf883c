use std::iter::Peekable;

use ast::Column;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{Expression, FromItem, JoinType, Operation, OrderDirection, ShowObject};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};

use super::types::DataType;

pub mod ast;
mod lexer;

/// Recursive descent parser producing one AST statement per input
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses one statement and requires the terminating semicolon
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_expect(Token::Semicolon)?;
        // anything after the semicolon is an error
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
        }
        Ok(stmt)
    }

    /// Dispatches on the leading keyword
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Create)) => self.parse_ddl(),
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Show)) => self.parse_show(),
            Some(t) => Err(Error::Parse(format!("[Parser] Unexpected token {}", t))),
            None => Err(Error::Parse("[Parser] Unexpected end of input".to_string())),
        }
    }

    /// Parses DDL statements (CREATE TABLE / VIEW / INDEX)
    fn parse_ddl(&mut self) -> Result<ast::Statement> {
        match self.next()? {
            Token::Keyword(Keyword::Create) => match self.next()? {
                Token::Keyword(Keyword::Table) => self.parse_ddl_create_table(),
                Token::Keyword(Keyword::View) => self.parse_ddl_create_view(),
                Token::Keyword(Keyword::Index) => self.parse_ddl_create_index(),
                token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            },
            token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
        }
    }

    /// Parses CREATE TABLE, either with column definitions or AS SELECT
    fn parse_ddl_create_table(&mut self) -> Result<ast::Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let table_name = self.next_ident()?;

        // CREATE TABLE name AS SELECT ... materializes the query result once
        if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            return Ok(ast::Statement::CreateTableAs {
                name: table_name,
                if_not_exists,
                query: Box::new(self.parse_select()?),
            });
        }

        let columns = self.parse_paren_list(Self::parse_ddl_column)?;
        Ok(ast::Statement::CreateTable {
            name: table_name,
            columns,
            if_not_exists,
        })
    }

    /// Parses column definition in CREATE TABLE
    fn parse_ddl_column(&mut self) -> Result<ast::Column> {
        let mut column = Column {
            name: self.next_ident()?,
            datatype: match self.next()? {
                Token::Keyword(Keyword::Int) | Token::Keyword(Keyword::Integer) => {
                    DataType::Integer
                }
                Token::Keyword(Keyword::Bool) | Token::Keyword(Keyword::Boolean) => {
                    DataType::Boolean
                }
                Token::Keyword(Keyword::Float) | Token::Keyword(Keyword::Double) => DataType::Float,
                Token::Keyword(Keyword::String)
                | Token::Keyword(Keyword::Text)
                | Token::Keyword(Keyword::Varchar) => DataType::String,
                token => return Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            },
            nullable: None,
            default: None,
        };

        // optional constraints: NULL, NOT NULL, DEFAULT <expr>
        while let Some(Token::Keyword(keyword)) = self.next_if_keyword() {
            match keyword {
                Keyword::Null => column.nullable = Some(true),
                Keyword::Not => {
                    self.next_expect(Token::Keyword(Keyword::Null))?;
                    column.nullable = Some(false);
                }
                Keyword::Default => column.default = Some(self.parse_expression()?),
                k => return Err(Error::Parse(format!("[Parser] Unexpected keyword {}", k))),
            }
        }

        Ok(column)
    }

    fn parse_ddl_create_view(&mut self) -> Result<ast::Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::As))?;
        Ok(ast::Statement::CreateView {
            name,
            if_not_exists,
            query: Box::new(self.parse_select()?),
        })
    }

    fn parse_ddl_create_index(&mut self) -> Result<ast::Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::On))?;
        let table_name = self.next_ident()?;
        let columns = self.parse_paren_list(Self::next_ident)?;
        Ok(ast::Statement::CreateIndex {
            name,
            table_name,
            columns,
            if_not_exists,
        })
    }

    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.next_if_token(Token::Keyword(Keyword::If)).is_none() {
            return Ok(false);
        }
        self.next_expect(Token::Keyword(Keyword::Not))?;
        self.next_expect(Token::Keyword(Keyword::Exists))?;
        Ok(true)
    }

    /// Parses SELECT statement
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;
        let distinct = self
            .next_if_token(Token::Keyword(Keyword::Distinct))
            .is_some();
        let select = self.parse_select_columns()?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let from = self.parse_from_item()?;
        let where_clause = self.parse_where_clause()?;
        let group_by = self.parse_group_by()?;
        let order_by = self.parse_order_by()?;

        let mut limit = None;
        let mut offset = None;
        if self.next_if_token(Token::Keyword(Keyword::Limit)).is_some() {
            limit = Some(self.parse_expression()?);
        }
        if self.next_if_token(Token::Keyword(Keyword::Offset)).is_some() {
            offset = Some(self.parse_expression()?);
        }

        Ok(ast::Statement::Select {
            select,
            distinct,
            from,
            where_clause,
            group_by,
            order_by,
            limit,
            offset,
        })
    }

    /// Parses the select list; SELECT * keeps the list empty
    fn parse_select_columns(&mut self) -> Result<Vec<(Expression, Option<String>)>> {
        if self.next_if_token(Token::Asterisk).is_some() {
            return Ok(Vec::new());
        }
        let mut select = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let alias = match self.next_if_token(Token::Keyword(Keyword::As)) {
                Some(_) => Some(self.next_ident()?),
                None => None,
            };
            select.push((expr, alias));
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(select)
    }

    /// Parses the FROM clause: a table followed by any number of joins
    fn parse_from_item(&mut self) -> Result<FromItem> {
        let mut item = self.parse_from_table()?;
        while let Some(join_type) = self.parse_join_type()? {
            let left = Box::new(item);
            let right = Box::new(self.parse_from_table()?);
            let predicate = match join_type {
                JoinType::Cross => None,
                _ => {
                    self.next_expect(Token::Keyword(Keyword::On))?;
                    Some(self.parse_expression()?)
                }
            };
            item = FromItem::Join {
                left,
                right,
                join_type,
                predicate,
            };
        }
        Ok(item)
    }

    /// Parses one side of a FROM clause: a named table (with optional alias)
    /// or a parenthesized subquery (alias required)
    fn parse_from_table(&mut self) -> Result<FromItem> {
        if self.next_if_token(Token::OpenParen).is_some() {
            let query = Box::new(self.parse_select()?);
            self.next_expect(Token::CloseParen)?;
            let _ = self.next_if_token(Token::Keyword(Keyword::As));
            let alias = match self.next_if_ident() {
                Some(alias) => alias,
                None => {
                    return Err(Error::Parse(
                        "[Parser] Derived table requires an alias".to_string(),
                    ))
                }
            };
            return Ok(FromItem::Derived { query, alias });
        }

        let name = self.next_ident()?;
        let alias = match self.next_if_token(Token::Keyword(Keyword::As)) {
            Some(_) => Some(self.next_ident()?),
            None => self.next_if_ident(),
        };
        Ok(FromItem::Table { name, alias })
    }

    fn parse_join_type(&mut self) -> Result<Option<JoinType>> {
        if self.next_if_token(Token::Keyword(Keyword::Cross)).is_some() {
            self.next_expect(Token::Keyword(Keyword::Join))?;
            return Ok(Some(JoinType::Cross));
        }
        if self.next_if_token(Token::Keyword(Keyword::Join)).is_some() {
            return Ok(Some(JoinType::Inner));
        }
        if self.next_if_token(Token::Keyword(Keyword::Inner)).is_some() {
            self.next_expect(Token::Keyword(Keyword::Join))?;
            return Ok(Some(JoinType::Inner));
        }
        if self.next_if_token(Token::Keyword(Keyword::Left)).is_some() {
            let _ = self.next_if_token(Token::Keyword(Keyword::Outer));
            self.next_expect(Token::Keyword(Keyword::Join))?;
            return Ok(Some(JoinType::Left));
        }
        if self.next_if_token(Token::Keyword(Keyword::Right)).is_some() {
            let _ = self.next_if_token(Token::Keyword(Keyword::Outer));
            self.next_expect(Token::Keyword(Keyword::Join))?;
            return Ok(Some(JoinType::Right));
        }
        Ok(None)
    }

    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    fn parse_group_by(&mut self) -> Result<Vec<Expression>> {
        let mut group_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Group)).is_none() {
            return Ok(group_by);
        }
        self.next_expect(Token::Keyword(Keyword::By))?;
        loop {
            group_by.push(self.parse_expression()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(group_by)
    }

    fn parse_order_by(&mut self) -> Result<Vec<(String, OrderDirection)>> {
        let mut order_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Order)).is_none() {
            return Ok(order_by);
        }
        self.next_expect(Token::Keyword(Keyword::By))?;
        loop {
            let col = self.next_ident()?;
            let direction = if self.next_if_token(Token::Keyword(Keyword::Asc)).is_some() {
                OrderDirection::Asc
            } else if self.next_if_token(Token::Keyword(Keyword::Desc)).is_some() {
                OrderDirection::Desc
            } else {
                OrderDirection::Asc
            };
            order_by.push((col, direction));
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(order_by)
    }

    /// Parses an INSERT statement with an optional column list and one or
    /// more value rows
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;
        let table_name = self.next_ident()?;

        let columns = match self.peek()? {
            Some(Token::OpenParen) => Some(self.parse_paren_list(Self::next_ident)?),
            _ => None,
        };

        self.next_expect(Token::Keyword(Keyword::Values))?;
        let mut values = vec![self.parse_paren_list(Self::parse_expression)?];
        while self.next_if_token(Token::Comma).is_some() {
            values.push(self.parse_paren_list(Self::parse_expression)?);
        }
        Ok(ast::Statement::Insert {
            table_name,
            columns,
            values,
        })
    }

    // Parses "( item, item, ... )" with at least one item
    fn parse_paren_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.next_expect(Token::OpenParen)?;
        let mut items = vec![item(self)?];
        loop {
            match self.next()? {
                Token::CloseParen => break,
                Token::Comma => items.push(item(self)?),
                token => {
                    return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                }
            }
        }
        Ok(items)
    }

    /// Parses SHOW TABLES / VIEWS / INDEXES [FROM table]
    fn parse_show(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Show))?;
        Ok(ast::Statement::Show(match self.next()? {
            Token::Keyword(Keyword::Tables) => ShowObject::Tables,
            Token::Keyword(Keyword::Views) => ShowObject::Views,
            Token::Keyword(Keyword::Indexes) => ShowObject::Indexes {
                table: match self.next_if_token(Token::Keyword(Keyword::From)) {
                    Some(_) => Some(self.next_ident()?),
                    None => None,
                },
            },
            token => return Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
        }))
    }

    /// Parses an expression; OR binds loosest, then AND, then comparisons
    fn parse_expression(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_and_operand()?;
        while self.next_if_token(Token::Keyword(Keyword::Or)).is_some() {
            let rhs = self.parse_and_operand()?;
            lhs = Expression::Operation(Operation::Or(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_and_operand(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_comparison()?;
        while self.next_if_token(Token::Keyword(Keyword::And)).is_some() {
            let rhs = self.parse_comparison()?;
            lhs = Expression::Operation(Operation::And(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let lhs = self.parse_operand()?;
        let operation: fn(Box<Expression>, Box<Expression>) -> Operation = match self.peek()? {
            Some(Token::Equal) => Operation::Equal,
            Some(Token::NotEqual) => Operation::NotEqual,
            Some(Token::GreaterThan) => Operation::GreaterThan,
            Some(Token::GreaterThanOrEqual) => Operation::GreaterThanOrEqual,
            Some(Token::LessThan) => Operation::LessThan,
            Some(Token::LessThanOrEqual) => Operation::LessThanOrEqual,
            _ => return Ok(lhs),
        };
        self.next()?;
        let rhs = self.parse_operand()?;
        Ok(Expression::Operation(operation(
            Box::new(lhs),
            Box::new(rhs),
        )))
    }

    /// Parses a primary expression: a constant, a column reference, a
    /// function call, a grouped expression, or a scalar subquery
    fn parse_operand(&mut self) -> Result<Expression> {
        Ok(match self.next()? {
            Token::Ident(ident) => {
                if self.next_if_token(Token::OpenParen).is_some() {
                    self.parse_function(ident)?
                } else {
                    Expression::Field(ident)
                }
            }
            Token::Number(n) => {
                // the lexer keeps 2015 and 2015.5 both as Number text,
                // only an all-digit literal is an integer
                if n.chars().all(|c| c.is_ascii_digit()) {
                    ast::Consts::Integer(n.parse()?).into()
                } else {
                    ast::Consts::Float(n.parse()?).into()
                }
            }
            Token::String(s) => ast::Consts::String(s).into(),
            Token::Keyword(Keyword::True) => ast::Consts::Boolean(true).into(),
            Token::Keyword(Keyword::False) => ast::Consts::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => ast::Consts::Null.into(),
            Token::OpenParen => {
                if let Some(Token::Keyword(Keyword::Select)) = self.peek()? {
                    let stmt = self.parse_select()?;
                    self.next_expect(Token::CloseParen)?;
                    Expression::Subquery(Box::new(stmt))
                } else {
                    let expr = self.parse_expression()?;
                    self.next_expect(Token::CloseParen)?;
                    expr
                }
            }
            t => {
                return Err(Error::Parse(format!(
                    "[Parser] Unexpected expression token {}",
                    t
                )))
            }
        })
    }

    fn parse_function(&mut self, name: String) -> Result<Expression> {
        // ROUND takes an expression and a digit count
        if name == "round" {
            let expr = self.parse_expression()?;
            self.next_expect(Token::Comma)?;
            let digits = match self.next()? {
                Token::Number(n) if n.chars().all(|c| c.is_ascii_digit()) => n.parse::<u32>()?,
                token => {
                    return Err(Error::Parse(format!(
                        "[Parser] Expected integer, got token {}",
                        token
                    )))
                }
            };
            self.next_expect(Token::CloseParen)?;
            return Ok(Expression::Round(Box::new(expr), digits));
        }

        // Aggregate functions take a single column, or * for count(*)
        let col = match self.next()? {
            Token::Ident(col) => col,
            Token::Asterisk => "*".to_string(),
            token => return Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
        };
        self.next_expect(Token::CloseParen)?;
        Ok(Expression::Function(name, col))
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("[Parser] Unexpected end of input".to_string())))
    }

    /// Consumes the next token and requires an identifier
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Parse(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Consumes the next token and requires it to match
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        match self.next()? {
            token if token == expect => Ok(()),
            token => Err(Error::Parse(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            ))),
        }
    }

    // lookahead helpers, consuming only on a match
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        match self.peek() {
            Ok(Some(token)) if predicate(&token) => self.next().ok(),
            _ => None,
        }
    }

    fn next_if_keyword(&mut self) -> Option<Token> {
        self.next_if(|t| matches!(t, Token::Keyword(_)))
    }

    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }

    fn next_if_ident(&mut self) -> Option<String> {
        match self.next_if(|t| matches!(t, Token::Ident(_))) {
            Some(Token::Ident(ident)) => Some(ident),
            _ => None,
        }
    }
}
