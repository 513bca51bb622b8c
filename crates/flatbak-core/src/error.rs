//! Core error types.

use thiserror::Error;

/// Errors raised while parsing or coercing flat backup content.
///
/// Every variant produced while reading a stream carries the 1-based line
/// number it was detected on.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The first line is not a `///DOTCLEAR|<version>|<mode>` signature.
    #[error("invalid backup signature: {0:?}")]
    InvalidSignature(String),

    /// A `[` line that is not a well-formed block header.
    #[error("malformed block header at line {line}")]
    MalformedHeader {
        /// Source line.
        line: usize,
    },

    /// A data line appeared before any block header.
    #[error("row outside of any block at line {line}")]
    RowWithoutHeader {
        /// Source line.
        line: usize,
    },

    /// A data line that does not follow the quoted field syntax.
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow {
        /// Source line.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A data line whose field count differs from its block header.
    #[error("invalid row count at line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        /// Source line.
        line: usize,
        /// Columns declared by the block header.
        expected: usize,
        /// Fields found on the line.
        found: usize,
    },

    /// A field value that cannot be coerced to its column type.
    #[error("invalid {expected} value {value:?} for field {field} at line {line}")]
    InvalidValue {
        /// Source line.
        line: usize,
        /// Field name.
        field: String,
        /// Raw value.
        value: String,
        /// Expected semantic type.
        expected: &'static str,
    },
}

impl FormatError {
    /// Source line the error was detected on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            FormatError::InvalidSignature(_) => Some(1),
            FormatError::MalformedHeader { line }
            | FormatError::RowWithoutHeader { line }
            | FormatError::MalformedRow { line, .. }
            | FormatError::FieldCount { line, .. }
            | FormatError::InvalidValue { line, .. } => Some(*line),
        }
    }
}

/// Errors bubbled up from the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed flat content.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Relational store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
