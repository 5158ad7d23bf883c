use std::{fmt::Display, sync::PoisonError};

use bincode::ErrorKind;

/// Custom Result type for lotdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lotdb
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// SQL lexing/parsing error
    Parse(String),
    /// Statement references an unknown table/view/column, or re-creates an
    /// existing artifact without IF NOT EXISTS; aborts that statement only
    Schema(String),
    /// Dataset-level load failure (unreadable file, header mismatch);
    /// malformed rows are skipped and counted, never raised as this
    Load(String),
    /// Internal error (storage, serialization, etc.)
    Internal(String),
}

// numeric literal conversion feeds Parse
impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(value.to_string())
    }
}

// dataset reader failures feed Load
impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Load(value.to_string())
    }
}

// storage and serialization failures are Internal
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(value: std::array::TryFromSliceError) -> Self {
        Error::Internal(value.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "parse error: {}", err),
            Error::Schema(err) => write!(f, "schema error: {}", err),
            Error::Load(err) => write!(f, "load error: {}", err),
            Error::Internal(err) => write!(f, "internal error: {}", err),
        }
    }
}
