//! Imdb-Tsv: streaming reader and value coercer for the IMDb dataset files.
//!
//! This crate turns a gzip-compressed TSV into a lazy sequence of raw
//! string rows, then coerces each raw row
//! into typed values per a column descriptor. It has no database dependency;
//! `imdb-db`'s staging loader wires this crate's output into bulk inserts.

pub mod coerce;
pub mod reader;

pub use coerce::{coerce_row, coerce_value, parse_json_string_array, ColumnSpec, ColumnType, Value, NULL_SENTINEL};
pub use reader::{GzippedTsvReader, ProgressSink, RawRow};
