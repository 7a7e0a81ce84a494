//! Defines [`SpatialDbError`], representing all errors returned by this crate, and
//! [`ErrorSink`], the message accumulator used by metadata validation.

use std::fmt::Debug;
use std::io::ErrorKind;

use itertools::Itertools;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SpatialDbError {
    /// Malformed WKB or geometry blob: truncated stream, bad magic, illegal type code.
    #[error("Decode error: {0}")]
    Decode(String),

    /// WKT syntax violation. `offset` is the byte offset into the source text.
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Assignability violation or unknown geometry type name.
    #[error("Incorrect geometry type: {0}")]
    IncorrectGeometryType(String),

    /// Required metadata missing or inconsistent, or a feature unsupported by the active dialect.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A buffer could not grow.
    #[error("Allocation failure: {0}")]
    Allocation(String),

    /// Argument outside of its valid range.
    #[error("Domain error: {0}")]
    Domain(String),

    /// [rusqlite::Error]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// [std::io::Error]
    #[error(transparent)]
    IOError(std::io::Error),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, SpatialDbError>;

impl From<std::io::Error> for SpatialDbError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::UnexpectedEof => {
                SpatialDbError::Decode("unexpected end of geometry stream".to_string())
            }
            _ => SpatialDbError::IOError(err),
        }
    }
}

impl From<std::collections::TryReserveError> for SpatialDbError {
    fn from(err: std::collections::TryReserveError) -> Self {
        SpatialDbError::Allocation(err.to_string())
    }
}

impl From<SpatialDbError> for rusqlite::Error {
    /// SQL function callbacks must return `rusqlite::Error`; anything that is not already a
    /// SQLite error is reported through the function's error result.
    fn from(err: SpatialDbError) -> Self {
        match err {
            SpatialDbError::Sqlite(err) => err,
            _ => rusqlite::Error::UserFunctionError(Box::new(err)),
        }
    }
}

/// Accumulates human-readable messages produced while validating metadata.
///
/// Validation keeps going after the first finding so that a single call reports every missing
/// table or column. Callers poll [`ErrorSink::count`] to decide whether the check passed.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    messages: Vec<String>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Convert the accumulated messages into a single [`SpatialDbError::Schema`].
    pub fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(SpatialDbError::Schema(self.messages.iter().join("; ")))
        }
    }
}
