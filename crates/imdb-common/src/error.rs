//! Common error type used throughout the IMDb report pipeline.
//!
//! This module provides a unified error type covering I/O, database, schema,
//! configuration, and row-parsing failures. Conditions treated as
//! recoverable (referential misses, unknown enumerated tags, non-null
//! violations under the `\N` sentinel) are never represented here — they are
//! logged and counted, not raised.

use std::path::PathBuf;

/// Common error type for the IMDb report pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A TSV row could not be parsed or coerced; fatal at row scope.
    #[error("{path}:{row_number}: cannot process row: {message}")]
    RowParse {
        path: PathBuf,
        row_number: u64,
        message: String,
    },

    /// A value declared to carry JSON failed to parse as JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// DDL creation failed for a report or staging table.
    #[error("cannot create table \"{table}\": {message}")]
    Schema { table: String, message: String },

    /// The supplied `PipelineConfig` is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a new `Database` error from any displayable cause.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new `Config` error from any displayable cause.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new `Schema` error naming the offending table.
    pub fn schema<S: Into<String>>(table: S, message: S) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with the source file and row number, for fatal
    /// row-scope failures (malformed boolean/int/float, wrong field count,
    /// malformed JSON in a column declared to carry it).
    #[must_use]
    pub fn at_row(self, path: &std::path::Path, row_number: u64) -> Self {
        match self {
            Self::RowParse { .. } => self,
            other => Self::RowParse {
                path: path.to_path_buf(),
                row_number,
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias using the common `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::database("connection refused");
        assert_eq!(err.to_string(), "Database error: connection refused");

        let err = Error::config("missing dataset_folder");
        assert_eq!(err.to_string(), "invalid configuration: missing dataset_folder");
    }

    #[test]
    fn test_at_row_wraps_message() {
        let err = Error::database("boolean must be 0 or 1").at_row(
            std::path::Path::new("title.basics.tsv"),
            42,
        );
        assert_eq!(
            err.to_string(),
            "title.basics.tsv:42: cannot process row: Database error: boolean must be 0 or 1"
        );
    }

    #[test]
    fn test_at_row_is_idempotent_on_row_parse() {
        let err = Error::RowParse {
            path: PathBuf::from("a.tsv"),
            row_number: 1,
            message: "bad".to_string(),
        }
        .at_row(std::path::Path::new("b.tsv"), 2);
        match err {
            Error::RowParse { path, row_number, .. } => {
                assert_eq!(path, PathBuf::from("a.tsv"));
                assert_eq!(row_number, 1);
            }
            _ => panic!("expected RowParse"),
        }
    }
}
