//! Batched bulk insertion into a staging or report table.

use std::time::Instant;

use imdb_common::{Error, Result};
use imdb_tsv::Value;
use rusqlite::types::{ToSqlOutput, Value as SqlOutputValue};
use rusqlite::{ToSql, Transaction};

/// Throughput summary returned when a [`BulkWriter`] is closed normally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkSummary {
    pub rows_inserted: u64,
    pub elapsed: std::time::Duration,
}

impl BulkSummary {
    #[must_use]
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            self.rows_inserted as f64
        } else {
            self.rows_inserted as f64 / secs
        }
    }
}

struct SqlValue(Value);

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match &self.0 {
            Value::Null => SqlOutputValue::Null,
            Value::Bool(b) => SqlOutputValue::Integer(i64::from(*b)),
            Value::Int(i) => SqlOutputValue::Integer(*i),
            Value::Float(f) => SqlOutputValue::Real(*f),
            Value::Text(s) => SqlOutputValue::Text(s.clone()),
        }))
    }
}

/// A scoped resource that batches rows and flushes them as multi-row inserts.
///
/// Call [`BulkWriter::add`] per row and [`BulkWriter::finish`] once all rows
/// are added. Dropping the writer without calling `finish` (because an error
/// propagated out of the caller) discards the residual buffer without
/// flushing it — the surrounding transaction is expected to roll back.
pub struct BulkWriter<'conn, 'tx, 'cols> {
    tx: &'tx Transaction<'conn>,
    table: &'cols str,
    columns: &'cols [&'cols str],
    bulk_size: usize,
    buffer: Vec<Vec<Value>>,
    rows_inserted: u64,
    started_at: Instant,
}

impl<'conn, 'tx, 'cols> BulkWriter<'conn, 'tx, 'cols> {
    #[must_use]
    pub fn new(tx: &'tx Transaction<'conn>, table: &'cols str, columns: &'cols [&'cols str], bulk_size: usize) -> Self {
        Self {
            tx,
            table,
            columns,
            bulk_size: bulk_size.max(1),
            buffer: Vec::new(),
            rows_inserted: 0,
            started_at: Instant::now(),
        }
    }

    /// Append one row, flushing the buffer if it has reached `bulk_size`.
    pub fn add(&mut self, row: Vec<Value>) -> Result<()> {
        debug_assert_eq!(row.len(), self.columns.len());
        self.buffer.push(row);
        self.rows_inserted += 1;
        if self.buffer.len() >= self.bulk_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let placeholders = (0..self.columns.len()).map(|_| "?").collect::<Vec<_>>().join(", ");
        let row_placeholder = format!("({placeholders})");
        let all_placeholders = vec![row_placeholder; self.buffer.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            all_placeholders
        );

        let params: Vec<SqlValue> = self.buffer.drain(..).flatten().map(SqlValue).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        self.tx
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| Error::database(format!("bulk insert into {}: {e}", self.table)))?;
        Ok(())
    }

    /// Flush any residual buffered rows and return a throughput summary.
    pub fn finish(mut self) -> Result<BulkSummary> {
        self.flush()?;
        Ok(BulkSummary { rows_inserted: self.rows_inserted, elapsed: self.started_at.elapsed() })
    }
}

impl Drop for BulkWriter<'_, '_, '_> {
    fn drop(&mut self) {
        // Intentionally does not flush: an unfinished writer means the caller
        // bailed out with an error, and the enclosing transaction rolls back.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_in_memory;

    fn setup() -> rusqlite::Connection {
        let conn = open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a TEXT, b INTEGER);").unwrap();
        conn
    }

    #[test]
    fn test_flushes_in_batches() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        {
            let mut writer = BulkWriter::new(&tx, "t", &["a", "b"], 2);
            writer.add(vec![Value::Text("x".into()), Value::Int(1)]).unwrap();
            writer.add(vec![Value::Text("y".into()), Value::Int(2)]).unwrap();
            writer.add(vec![Value::Text("z".into()), Value::Int(3)]).unwrap();
            let summary = writer.finish().unwrap();
            assert_eq!(summary.rows_inserted, 3);
        }
        tx.commit().unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_drop_without_finish_does_not_flush() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        {
            let mut writer = BulkWriter::new(&tx, "t", &["a", "b"], 1024);
            writer.add(vec![Value::Text("x".into()), Value::Int(1)]).unwrap();
            // writer dropped here without calling finish()
        }
        tx.rollback().unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_null_and_typed_values_round_trip() {
        let mut conn = open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t2 (a TEXT, b INTEGER, c REAL, d TEXT);").unwrap();
        let tx = conn.transaction().unwrap();
        {
            let mut writer = BulkWriter::new(&tx, "t2", &["a", "b", "c", "d"], 1024);
            writer
                .add(vec![Value::Null, Value::Int(42), Value::Float(1.5), Value::Bool(true)])
                .unwrap();
            writer.finish().unwrap();
        }
        tx.commit().unwrap();

        let (a, b): (Option<String>, i64) =
            conn.query_row("SELECT a, b FROM t2", [], |r| Ok((r.get(0)?, r.get(1)?))).unwrap();
        assert_eq!(a, None);
        assert_eq!(b, 42);
    }
}
