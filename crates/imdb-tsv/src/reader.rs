//! Streams rows out of a gzip-compressed, tab-separated IMDb dataset file.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use imdb_common::{Error, Result};

/// One raw TSV row, keyed by header column name. Values are the exact bytes
/// the source file carried, including the `\N` null sentinel literal.
pub type RawRow = HashMap<String, String>;

/// Receives progress updates from a [`GzippedTsvReader`] at its configured
/// interval. Out-of-process progress UI is the caller's concern; this trait
/// is the minimal seam the reader pushes counts through.
pub trait ProgressSink {
    /// Called every `progress_interval` rows with the running row count and
    /// the running count of rows skipped by de-duplication.
    fn on_progress(&mut self, row_count: u64, duplicates_dropped: u64);
}

impl<F: FnMut(u64, u64)> ProgressSink for F {
    fn on_progress(&mut self, row_count: u64, duplicates_dropped: u64) {
        self(row_count, duplicates_dropped)
    }
}

/// A lazy, finite, non-restartable source of TSV rows.
///
/// Consumed exactly once via its [`Iterator`] implementation. The header
/// line defines the column set; every data row must carry exactly that many
/// tab-separated fields, or the pull fails with the offending row number
/// attached.
pub struct GzippedTsvReader {
    path: PathBuf,
    inner: csv::Reader<GzDecoder<File>>,
    headers: Vec<String>,
    key_column_indices: Vec<usize>,
    seen_keys: HashSet<Vec<String>>,
    row_number: u64,
    duplicates_dropped: u64,
    progress_interval: u64,
    progress_sink: Option<Box<dyn ProgressSink>>,
}

impl GzippedTsvReader {
    /// Open `path` and read its header line.
    ///
    /// `key_columns` names the columns whose joint value de-duplicates rows;
    /// pass an empty slice to disable de-duplication entirely. A row is
    /// dropped (and counted, not yielded) if its key tuple was already seen.
    pub fn open(path: impl AsRef<Path>, key_columns: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let decoder = GzDecoder::new(file);
        let mut inner = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_reader(decoder);

        let headers: Vec<String> = inner
            .headers()
            .map_err(|e| Error::database(format!("cannot read header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let key_column_indices = key_columns
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| Error::config(format!("unknown key column: {name}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path,
            inner,
            headers,
            key_column_indices,
            seen_keys: HashSet::new(),
            row_number: 0,
            duplicates_dropped: 0,
            progress_interval: 0,
            progress_sink: None,
        })
    }

    /// Invoke `sink` every `interval` rows pulled (0 disables progress reporting).
    #[must_use]
    pub fn with_progress(mut self, interval: u64, sink: Box<dyn ProgressSink>) -> Self {
        self.progress_interval = interval;
        self.progress_sink = Some(sink);
        self
    }

    /// Number of rows pulled so far, 1-based, not counting the header line.
    /// Includes rows later dropped as duplicates.
    #[must_use]
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Running count of rows skipped because their key tuple repeated.
    #[must_use]
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped
    }

    /// The header-declared column names, in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn key_of(&self, record: &csv::StringRecord) -> Vec<String> {
        self.key_column_indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect()
    }

    fn maybe_report_progress(&mut self) {
        if self.progress_interval == 0 {
            return;
        }
        if self.row_number % self.progress_interval == 0 {
            if let Some(sink) = self.progress_sink.as_mut() {
                sink.on_progress(self.row_number, self.duplicates_dropped);
            }
        }
    }
}

impl Iterator for GzippedTsvReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut record = csv::StringRecord::new();
            match self.inner.read_record(&mut record) {
                Ok(false) => return None,
                Err(e) => {
                    self.row_number += 1;
                    return Some(Err(Error::database(e.to_string()).at_row(&self.path, self.row_number)));
                }
                Ok(true) => {}
            }

            self.row_number += 1;

            if !self.key_column_indices.is_empty() {
                let key = self.key_of(&record);
                if !self.seen_keys.insert(key) {
                    self.duplicates_dropped += 1;
                    self.maybe_report_progress();
                    continue;
                }
            }

            self.maybe_report_progress();

            let row: RawRow = self
                .headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            return Some(Ok(row));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gzipped_tsv(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap();
        file
    }

    #[test]
    fn test_reads_rows_in_order() {
        let file = write_gzipped_tsv("tconst\tprimaryTitle\ntt0000001\tCarmencita\ntt0000002\tLe clown\n");
        let reader = GzippedTsvReader::open(file.path(), &[]).unwrap();
        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("tconst").unwrap(), "tt0000001");
        assert_eq!(rows[1].get("primaryTitle").unwrap(), "Le clown");
    }

    #[test]
    fn test_empty_value_distinct_from_null_sentinel() {
        let file = write_gzipped_tsv("tconst\tendYear\ntt0000001\t\\N\ntt0000002\t\n");
        let reader = GzippedTsvReader::open(file.path(), &[]).unwrap();
        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].get("endYear").unwrap(), "\\N");
        assert_eq!(rows[1].get("endYear").unwrap(), "");
    }

    #[test]
    fn test_dedup_by_key_columns() {
        let file = write_gzipped_tsv(
            "tconst\tprimaryTitle\ntt0000001\tFirst\ntt0000001\tDuplicate\ntt0000002\tSecond\n",
        );
        let mut reader = GzippedTsvReader::open(file.path(), &["tconst"]).unwrap();
        let rows: Vec<_> = (&mut reader).map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(reader.duplicates_dropped(), 1);
    }

    #[test]
    fn test_short_row_fails_with_row_number() {
        let file = write_gzipped_tsv("tconst\tprimaryTitle\ntt0000001\tOk\ntt0000002\n");
        let reader = GzippedTsvReader::open(file.path(), &[]).unwrap();
        let results: Vec<_> = reader.collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        match results[1].as_ref().unwrap_err() {
            imdb_common::Error::RowParse { row_number, .. } => assert_eq!(*row_number, 2),
            other => panic!("expected RowParse, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_callback_invoked_at_interval() {
        let file = write_gzipped_tsv("tconst\ntt1\ntt2\ntt3\ntt4\n");
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = move |count: u64, dups: u64| seen_clone.borrow_mut().push((count, dups));
        let reader = GzippedTsvReader::open(file.path(), &[]).unwrap().with_progress(2, Box::new(sink));
        let _: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(*seen.borrow(), vec![(2, 0), (4, 0)]);
    }
}
