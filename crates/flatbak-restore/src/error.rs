//! Restore error types.

use flatbak_core::{FormatError, StoreError};
use thiserror::Error;

/// Errors raised while restoring a flat backup.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Malformed backup content.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// I/O error on the backup stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller lacks the capability the restore mode requires.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A dependent row references an id the restore has not mapped.
    #[error("{table} at line {line} references unknown {relation} id {id}")]
    Referential {
        /// Missing relation (`category`, `post`, `media`).
        relation: &'static str,
        /// Id as found in the backup.
        id: i64,
        /// Table of the referencing row.
        table: String,
        /// Source line.
        line: usize,
    },

    /// Error bubbled up from the store.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Fresh ids were requested from a session whose counters were never
    /// seeded from the destination.
    #[error("id counters were not seeded for this restore")]
    Unseeded,

    /// Invalid restore configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// An error raised while restoring the record at `line`.
    #[error("{source} (line {line})")]
    AtLine {
        /// Source line.
        line: usize,
        /// Underlying error.
        source: Box<RestoreError>,
    },
}

impl RestoreError {
    /// The error beneath any line annotation.
    pub fn root(&self) -> &RestoreError {
        match self {
            RestoreError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    /// Source line the error relates to, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            RestoreError::Format(e) => e.line(),
            RestoreError::Referential { line, .. } | RestoreError::AtLine { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }

    /// Attach a line number unless the error already carries one.
    pub fn at_line(self, line: usize) -> Self {
        if self.line().is_some() {
            return self;
        }
        RestoreError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}

impl From<flatbak_core::Error> for RestoreError {
    fn from(err: flatbak_core::Error) -> Self {
        match err {
            flatbak_core::Error::Io(e) => RestoreError::Io(e),
            flatbak_core::Error::Format(e) => RestoreError::Format(e),
            flatbak_core::Error::Store(e) => RestoreError::Storage(e),
        }
    }
}

/// Result type for restore operations.
pub type RestoreResult<T> = Result<T, RestoreError>;
