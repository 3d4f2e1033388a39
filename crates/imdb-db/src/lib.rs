//! Imdb-Db: schema registry, bulk writer and staging loader.
//!
//! This crate owns everything that touches the SQLite connection directly
//! except the report builder's DAG, which lives in `imdb-report` and is
//! built on top of the primitives here.

pub mod bulk;
pub mod connection;
pub mod schema;
pub mod staging;

pub use bulk::{BulkSummary, BulkWriter};
pub use connection::{open, open_in_memory};
pub use schema::{create_all, drop_all, initialize, report_tables, ColumnDef, ForeignKey, IndexDef, TableDef, STAGING_TABLES};
pub use staging::{load_all_datasets, load_dataset_file};
