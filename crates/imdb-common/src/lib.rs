//! Imdb-Common: Shared types, error handling, and configuration for the IMDb report pipeline.
//!
//! This crate provides common functionality used across the pipeline:
//!
//! - **Dataset catalog**: the six canonical IMDb TSV files (`dataset`) and the
//!   report tables built from them (`report`).
//! - **Error Handling**: a unified error type and result alias.
//! - **Configuration**: the `PipelineConfig` struct the core consumes.
//!
//! # Examples
//!
//! ```
//! use imdb_common::{Error, Result, ImdbDataset};
//!
//! fn example() -> Result<()> {
//!     let _ = ImdbDataset::TitleBasics.filename();
//!     Err(Error::config("dataset_folder does not exist"))
//! }
//! ```

pub mod dataset;
pub mod error;
pub mod report;

pub use dataset::{ImdbDataset, IMDB_ALIAS_TYPES};
pub use error::{Error, Result};
pub use report::{ReportTable, REPORT_BUILD_ORDER};

use std::path::PathBuf;

/// Default number of rows collected in memory before a bulk insert is flushed.
pub const DEFAULT_BULK_SIZE: usize = 1024;

/// Configuration recognized by the core pipeline.
///
/// Deliberately plain data: this crate never reads a config file or parses
/// CLI arguments itself (both are out of scope, left to an embedding
/// application); it only declares the shape of what it needs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    /// Connection string, or a bare filesystem path to a local SQLite file.
    pub engine_info: String,
    /// Cap on bulk-insert batch size.
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    /// When true, the schema is dropped then recreated on startup.
    #[serde(default)]
    pub has_to_drop_tables: bool,
    /// Directory containing the six canonical dataset files.
    pub dataset_folder: PathBuf,
}

fn default_bulk_size() -> usize {
    DEFAULT_BULK_SIZE
}

impl PipelineConfig {
    /// Resolve `engine_info` into a connection string usable by `rusqlite`/`sqlite3`.
    ///
    /// A bare filesystem path (no `://`) is treated as a local SQLite file and
    /// gets the `sqlite://` scheme prepended; anything containing `://` is
    /// passed through unchanged.
    #[must_use]
    pub fn resolved_engine_info(&self) -> String {
        if self.engine_info.contains("://") {
            self.engine_info.clone()
        } else {
            format!("sqlite://{}", self.engine_info)
        }
    }

    /// Filesystem path to the underlying SQLite database file, if `engine_info`
    /// resolves to a local file rather than a remote connection string.
    #[must_use]
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        let resolved = self.resolved_engine_info();
        resolved
            .strip_prefix("sqlite://")
            .map(PathBuf::from)
            .or_else(|| {
                if self.engine_info.contains("://") {
                    None
                } else {
                    Some(PathBuf::from(&self.engine_info))
                }
            })
    }
}
