use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keyword, e.g. SELECT
    Keyword(Keyword),
    // Identifier, e.g. a table or column name, possibly qualified (s.make)
    Ident(String),
    // String literal
    String(String),
    // Numeric literal
    Number(String),
    // (
    OpenParen,
    // )
    CloseParen,
    // ,
    Comma,
    // ;
    Semicolon,
    // *
    Asterisk,
    // +
    Plus,
    // -
    Minus,
    // /
    Slash,
    // =
    Equal,
    // != or <>
    NotEqual,
    // >
    GreaterThan,
    // >=
    GreaterThanOrEqual,
    // <
    LessThan,
    // <=
    LessThanOrEqual,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(s) => s,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Asterisk => "*",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Slash => "/",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    And,
    As,
    Asc,
    Bool,
    Boolean,
    By,
    Create,
    Cross,
    Default,
    Desc,
    Distinct,
    Double,
    Exists,
    False,
    Float,
    From,
    Group,
    If,
    Index,
    Indexes,
    Inner,
    Insert,
    Int,
    Integer,
    Into,
    Join,
    Left,
    Limit,
    Not,
    Null,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Right,
    Select,
    Show,
    String,
    Table,
    Tables,
    Text,
    True,
    Values,
    Varchar,
    View,
    Views,
    Where,
}

impl Keyword {
    pub fn transfer(input: &str) -> Option<Self> {
        Some(match input.to_uppercase().as_ref() {
            "AND" => Keyword::And,
            "AS" => Keyword::As,
            "ASC" => Keyword::Asc,
            "BOOL" => Keyword::Bool,
            "BOOLEAN" => Keyword::Boolean,
            "BY" => Keyword::By,
            "CREATE" => Keyword::Create,
            "CROSS" => Keyword::Cross,
            "DEFAULT" => Keyword::Default,
            "DESC" => Keyword::Desc,
            "DISTINCT" => Keyword::Distinct,
            "DOUBLE" => Keyword::Double,
            "EXISTS" => Keyword::Exists,
            "FALSE" => Keyword::False,
            "FLOAT" => Keyword::Float,
            "FROM" => Keyword::From,
            "GROUP" => Keyword::Group,
            "IF" => Keyword::If,
            "INDEX" => Keyword::Index,
            "INDEXES" => Keyword::Indexes,
            "INNER" => Keyword::Inner,
            "INSERT" => Keyword::Insert,
            "INT" => Keyword::Int,
            "INTEGER" => Keyword::Integer,
            "INTO" => Keyword::Into,
            "JOIN" => Keyword::Join,
            "LEFT" => Keyword::Left,
            "LIMIT" => Keyword::Limit,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "OFFSET" => Keyword::Offset,
            "ON" => Keyword::On,
            "OR" => Keyword::Or,
            "ORDER" => Keyword::Order,
            "OUTER" => Keyword::Outer,
            "RIGHT" => Keyword::Right,
            "SELECT" => Keyword::Select,
            "SHOW" => Keyword::Show,
            "STRING" => Keyword::String,
            "TABLE" => Keyword::Table,
            "TABLES" => Keyword::Tables,
            "TEXT" => Keyword::Text,
            "TRUE" => Keyword::True,
            "VALUES" => Keyword::Values,
            "VARCHAR" => Keyword::Varchar,
            "VIEW" => Keyword::View,
            "VIEWS" => Keyword::Views,
            "WHERE" => Keyword::Where,
            _ => return None,
        })
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Keyword::And => "AND",
            Keyword::As => "AS",
            Keyword::Asc => "ASC",
            Keyword::Bool => "BOOL",
            Keyword::Boolean => "BOOLEAN",
            Keyword::By => "BY",
            Keyword::Create => "CREATE",
            Keyword::Cross => "CROSS",
            Keyword::Default => "DEFAULT",
            Keyword::Desc => "DESC",
            Keyword::Distinct => "DISTINCT",
            Keyword::Double => "DOUBLE",
            Keyword::Exists => "EXISTS",
            Keyword::False => "FALSE",
            Keyword::Float => "FLOAT",
            Keyword::From => "FROM",
            Keyword::Group => "GROUP",
            Keyword::If => "IF",
            Keyword::Index => "INDEX",
            Keyword::Indexes => "INDEXES",
            Keyword::Inner => "INNER",
            Keyword::Insert => "INSERT",
            Keyword::Int => "INT",
            Keyword::Integer => "INTEGER",
            Keyword::Into => "INTO",
            Keyword::Join => "JOIN",
            Keyword::Left => "LEFT",
            Keyword::Limit => "LIMIT",
            Keyword::Not => "NOT",
            Keyword::Null => "NULL",
            Keyword::Offset => "OFFSET",
            Keyword::On => "ON",
            Keyword::Or => "OR",
            Keyword::Order => "ORDER",
            Keyword::Outer => "OUTER",
            Keyword::Right => "RIGHT",
            Keyword::Select => "SELECT",
            Keyword::Show => "SHOW",
            Keyword::String => "STRING",
            Keyword::Table => "TABLE",
            Keyword::Tables => "TABLES",
            Keyword::Text => "TEXT",
            Keyword::True => "TRUE",
            Keyword::Values => "VALUES",
            Keyword::Varchar => "VARCHAR",
            Keyword::View => "VIEW",
            Keyword::Views => "VIEWS",
            Keyword::Where => "WHERE",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Parse(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    // Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&&c| predicate(c))?;
        self.iter.next()
    }

    // Consumes characters while the predicate holds, returning them as a
    // string (None if nothing was consumed)
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    // Skips whitespace and -- line comments before the next token
    fn erase_ignored(&mut self) {
        loop {
            self.next_while(|c| c.is_whitespace());
            if !self.comment_ahead() {
                break;
            }
            self.next_while(|c| c != '\n');
        }
    }

    fn comment_ahead(&self) -> bool {
        let mut iter = self.iter.clone();
        matches!((iter.next(), iter.next()), (Some('-'), Some('-')))
    }

    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_ignored();
        match self.iter.peek() {
            Some('\'') => self.scan_string(),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() => Ok(self.scan_ident()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    fn scan_string(&mut self) -> Result<Option<Token>> {
        if self.next_if(|c| c == '\'').is_none() {
            return Ok(None);
        }
        let mut value = String::new();
        loop {
            match self.iter.next() {
                Some('\'') => break,
                Some(c) => value.push(c),
                None => return Err(Error::Parse("[Lexer] Unterminated string".to_string())),
            }
        }
        Ok(Some(Token::String(value)))
    }

    fn scan_number(&mut self) -> Option<Token> {
        let mut num = self.next_while(|c| c.is_ascii_digit())?;
        if let Some(sep) = self.next_if(|c| c == '.') {
            num.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                num.push(c);
            }
        }
        Some(Token::Number(num))
    }

    // Identifiers may contain a dot for table-qualified column names
    fn scan_ident(&mut self) -> Option<Token> {
        let mut value = self.next_if(|c| c.is_alphabetic())?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            value.push(c);
        }
        Some(match Keyword::transfer(&value) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(value.to_lowercase()),
        })
    }

    fn scan_symbol(&mut self) -> Option<Token> {
        let token = match self.iter.peek()? {
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '*' => Token::Asterisk,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '=' => Token::Equal,
            _ => return self.scan_compare_symbol(),
        };
        self.iter.next();
        Some(token)
    }

    fn scan_compare_symbol(&mut self) -> Option<Token> {
        match self.iter.peek()? {
            '>' => {
                self.iter.next();
                match self.next_if(|c| c == '=') {
                    Some(_) => Some(Token::GreaterThanOrEqual),
                    None => Some(Token::GreaterThan),
                }
            }
            '<' => {
                self.iter.next();
                if self.next_if(|c| c == '=').is_some() {
                    Some(Token::LessThanOrEqual)
                } else if self.next_if(|c| c == '>').is_some() {
                    Some(Token::NotEqual)
                } else {
                    Some(Token::LessThan)
                }
            }
            '!' => {
                self.iter.next();
                self.next_if(|c| c == '=').map(|_| Token::NotEqual)
            }
            _ => None,
        }
    }
}
