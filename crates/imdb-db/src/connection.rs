//! Database connection handling.
//!
//! The pipeline runs single-threaded and serializes all work on one
//! connection, so this module hands back a bare [`rusqlite::Connection`]
//! rather than a pool.

use imdb_common::{Error, PipelineConfig, Result};
use rusqlite::Connection;

/// Open the database named by `config.engine_info`, creating the file if it
/// does not exist, with foreign key enforcement turned on.
pub fn open(config: &PipelineConfig) -> Result<Connection> {
    let conn = match config.sqlite_path() {
        Some(path) => Connection::open(path).map_err(|e| Error::database(e.to_string()))?,
        None => {
            return Err(Error::config(format!(
                "engine_info \"{}\" does not resolve to a local SQLite file",
                config.engine_info
            )))
        }
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn)
}

/// Open an in-memory database, for tests and scratch rebuilds.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(|e| Error::database(e.to_string()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn)
}
