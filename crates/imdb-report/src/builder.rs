//! The two primitives every report-table build is assembled from: interning
//! a closed or discovered vocabulary into a key table, and reading back a
//! natural-key-to-surrogate-id map once a table has been populated.

use std::collections::{BTreeSet, HashMap};

use imdb_common::{Error, Result};
use imdb_db::BulkWriter;
use imdb_tsv::Value;
use rusqlite::Transaction;

/// How a raw staging column's text splits into individual key-table members.
#[derive(Debug, Clone, Copy)]
pub enum DelimiterMode {
    /// The whole value is one member (used when the source is already one
    /// distinct value per row, e.g. `titleType`).
    None,
    /// Split on a single-character delimiter (IMDb's comma-joined lists).
    Char(char),
    /// Decode as a JSON array of strings.
    Json,
}

fn explode(raw: &str, mode: DelimiterMode) -> Result<Vec<String>> {
    match mode {
        DelimiterMode::None => Ok(vec![raw.to_string()]),
        DelimiterMode::Char(sep) => Ok(raw.split(sep).filter(|s| !s.is_empty()).map(str::to_string).collect()),
        DelimiterMode::Json => imdb_tsv::parse_json_string_array(raw),
    }
}

/// One column of a query feeding a key table's vocabulary: a SQL statement
/// returning a single nullable text column, and how to split each row's
/// value into members.
pub struct KeySource<'a> {
    pub select_sql: &'a str,
    pub mode: DelimiterMode,
}

/// Truncate `table` and refill it with the union of every member discovered
/// across `sources`, inserted in ascending lexicographic order so that the
/// surrogate ids a run assigns are reproducible across runs over the same
/// input. Logs a warning if the result is empty.
pub fn build_key_table(tx: &Transaction<'_>, table: &'static str, sources: &[KeySource<'_>], bulk_size: usize) -> Result<usize> {
    let mut members: BTreeSet<String> = BTreeSet::new();
    for source in sources {
        let mut stmt = tx.prepare(source.select_sql).map_err(|e| Error::database(e.to_string()))?;
        let mut rows = stmt.query([]).map_err(|e| Error::database(e.to_string()))?;
        while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
            let raw: Option<String> = row.get(0).map_err(|e| Error::database(e.to_string()))?;
            if let Some(raw) = raw {
                for member in explode(&raw, source.mode)? {
                    if !member.is_empty() {
                        members.insert(member);
                    }
                }
            }
        }
    }
    build_key_table_from_values(tx, table, members, bulk_size)
}

/// Like [`build_key_table`], but the vocabulary is already known (a closed
/// enumerated list) rather than discovered from a query.
pub fn build_key_table_from_values(
    tx: &Transaction<'_>,
    table: &'static str,
    values: impl IntoIterator<Item = String>,
    bulk_size: usize,
) -> Result<usize> {
    let members: BTreeSet<String> = values.into_iter().filter(|v| !v.is_empty()).collect();

    tx.execute(&format!("DELETE FROM {table}"), [])
        .map_err(|e| Error::database(e.to_string()))?;

    let columns = ["name"];
    let mut writer = BulkWriter::new(tx, table, &columns, bulk_size);
    for name in &members {
        writer.add(vec![Value::Text(name.clone())])?;
    }
    let summary = writer.finish()?;

    if summary.rows_inserted == 0 {
        tracing::warn!(table, "key table build produced zero rows");
    }
    Ok(summary.rows_inserted as usize)
}

/// Read back `table`'s natural key column and surrogate id column into an
/// in-memory map, for resolving foreign keys during later build steps.
pub fn natural_key_map(tx: &Transaction<'_>, table: &str, key_column: &str, id_column: &str) -> Result<HashMap<String, i64>> {
    let sql = format!("SELECT {key_column}, {id_column} FROM {table}");
    let mut stmt = tx.prepare(&sql).map_err(|e| Error::database(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| Error::database(e.to_string()))?;

    let mut map = HashMap::new();
    while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
        let key: String = row.get(0).map_err(|e| Error::database(e.to_string()))?;
        let id: i64 = row.get(1).map_err(|e| Error::database(e.to_string()))?;
        map.insert(key, id);
    }
    Ok(map)
}

/// Verify that `table` holds at least one row, warning otherwise. Used after
/// a set-oriented build where [`build_key_table`]'s own empty-check doesn't run.
pub fn verify_non_empty(tx: &Transaction<'_>, table: &str) -> Result<i64> {
    let count: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;
    if count == 0 {
        tracing::warn!(table, "build produced zero rows");
    }
    Ok(count)
}

/// Compare row counts between a fact table and the staging table it should
/// track one-for-one, warning on mismatch without failing the build.
pub fn check_row_count_matches(tx: &Transaction<'_>, target_table: &str, source_table: &str) -> Result<()> {
    let target_count: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {target_table}"), [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;
    let source_count: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {source_table}"), [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;
    if target_count != source_count {
        tracing::warn!(target_table, source_table, target_count, source_count, "row count mismatch after build");
    }
    Ok(())
}
