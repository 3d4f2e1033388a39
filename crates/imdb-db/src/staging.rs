//! Drives each dataset file through reader → coercer → bulk writer inside a
//! single transaction.

use std::path::{Path, PathBuf};

use imdb_common::{Error, ImdbDataset, Result};
use imdb_tsv::{coerce_row, ColumnSpec, ColumnType, GzippedTsvReader};
use rusqlite::Connection;

use crate::bulk::{BulkSummary, BulkWriter};

/// The column descriptors for one staging table, in the order the TSV's
/// header (and the staging table's columns) declare them.
fn column_specs(dataset: ImdbDataset) -> Vec<ColumnSpec> {
    match dataset {
        ImdbDataset::TitleBasics => vec![
            ColumnSpec::new("tconst", ColumnType::String, false),
            ColumnSpec::new("titleType", ColumnType::String, false),
            ColumnSpec::new("primaryTitle", ColumnType::String, false),
            ColumnSpec::new("originalTitle", ColumnType::String, false),
            ColumnSpec::new("isAdult", ColumnType::Bool, false),
            ColumnSpec::new("startYear", ColumnType::Int, true),
            ColumnSpec::new("endYear", ColumnType::Int, true),
            ColumnSpec::new("runtimeMinutes", ColumnType::Int, true),
            ColumnSpec::new("genres", ColumnType::String, true),
        ],
        ImdbDataset::NameBasics => vec![
            ColumnSpec::new("nconst", ColumnType::String, false),
            ColumnSpec::new("primaryName", ColumnType::String, false),
            ColumnSpec::new("birthYear", ColumnType::Int, true),
            ColumnSpec::new("deathYear", ColumnType::Int, true),
            ColumnSpec::new("primaryProfession", ColumnType::String, true),
            ColumnSpec::new("knownForTitles", ColumnType::String, true),
        ],
        ImdbDataset::TitleAkas => vec![
            ColumnSpec::new("titleId", ColumnType::String, false),
            ColumnSpec::new("ordering", ColumnType::Int, false),
            ColumnSpec::new("title", ColumnType::String, false),
            ColumnSpec::new("region", ColumnType::String, true),
            ColumnSpec::new("language", ColumnType::String, true),
            ColumnSpec::new("types", ColumnType::String, true),
            ColumnSpec::new("attributes", ColumnType::String, true),
            ColumnSpec::new("isOriginalTitle", ColumnType::Bool, true),
        ],
        ImdbDataset::TitleCrew => vec![
            ColumnSpec::new("tconst", ColumnType::String, false),
            ColumnSpec::new("directors", ColumnType::String, true),
            ColumnSpec::new("writers", ColumnType::String, true),
        ],
        ImdbDataset::TitlePrincipals => vec![
            ColumnSpec::new("tconst", ColumnType::String, false),
            ColumnSpec::new("ordering", ColumnType::Int, false),
            ColumnSpec::new("nconst", ColumnType::String, false),
            ColumnSpec::new("category", ColumnType::String, false),
            ColumnSpec::new("job", ColumnType::String, true),
            // Capped rather than left unbounded; an overlong value is a
            // fatal coercion error.
            ColumnSpec::new("characters", ColumnType::String, true).with_max_len(1024),
        ],
        ImdbDataset::TitleRatings => vec![
            ColumnSpec::new("tconst", ColumnType::String, false),
            ColumnSpec::new("averageRating", ColumnType::Float, false),
            ColumnSpec::new("numVotes", ColumnType::Int, false),
        ],
    }
}

/// The staging table's natural-key columns, used both as the TSV reader's
/// de-duplication key and the table's own primary key.
fn key_columns(dataset: ImdbDataset) -> &'static [&'static str] {
    match dataset {
        ImdbDataset::TitleBasics | ImdbDataset::TitleCrew | ImdbDataset::TitleRatings => &["tconst"],
        ImdbDataset::NameBasics => &["nconst"],
        ImdbDataset::TitleAkas => &["titleId", "ordering"],
        ImdbDataset::TitlePrincipals => &["tconst", "ordering"],
    }
}

fn column_names(specs: &[ColumnSpec]) -> Vec<&'static str> {
    specs.iter().map(|s| s.name).collect()
}

/// Load one dataset file into its staging table, inside a single transaction:
/// truncate, stream rows through the coercer into a bulk writer, commit.
/// A coercion error anywhere in the file rolls back the whole transaction.
pub fn load_dataset_file(conn: &mut Connection, dataset: ImdbDataset, path: &Path, bulk_size: usize) -> Result<BulkSummary> {
    let specs = column_specs(dataset);
    let columns = column_names(&specs);
    let table = dataset.table_name();

    let tx = conn.transaction().map_err(|e| Error::database(e.to_string()))?;
    tx.execute(&format!("DELETE FROM {table}"), [])
        .map_err(|e| Error::database(e.to_string()))?;

    let reader = GzippedTsvReader::open(path, key_columns(dataset))?;
    let mut writer = BulkWriter::new(&tx, table, &columns, bulk_size);

    let mut row_number: u64 = 0;
    for row in reader {
        row_number += 1;
        let raw = row?;
        let coerced = coerce_row(&specs, &raw, path, row_number)?;
        let values = coerced.into_iter().map(|(_, value)| value).collect();
        writer.add(values)?;
    }

    let summary = writer.finish()?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(summary)
}

/// Load every dataset file found under `dataset_folder`, in the canonical
/// IMDb processing order, returning one summary per file.
pub fn load_all_datasets(conn: &mut Connection, dataset_folder: &Path, bulk_size: usize) -> Result<Vec<(ImdbDataset, BulkSummary)>> {
    let mut summaries = Vec::new();
    for dataset in imdb_common::dataset::IMDB_DATASETS {
        let path: PathBuf = dataset_folder.join(dataset.filename());
        tracing::info!(dataset = %dataset, path = %path.display(), "loading staging table");
        let summary = load_dataset_file(conn, dataset, &path, bulk_size)?;
        tracing::info!(
            dataset = %dataset,
            rows = summary.rows_inserted,
            rows_per_sec = summary.rows_per_second(),
            "staging table loaded"
        );
        summaries.push((dataset, summary));
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_in_memory;
    use crate::schema;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gzipped_tsv(dir: &std::path::Path, filename: &str, contents: &str) -> PathBuf {
        let path = dir.join(filename);
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn test_loads_title_basics_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gzipped_tsv(
            &dir,
            "title.basics.tsv.gz",
            "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
             tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short\n",
        );
        let mut conn = open_in_memory().unwrap();
        schema::create_all(&conn, schema::STAGING_TABLES).unwrap();

        let summary = load_dataset_file(&mut conn, ImdbDataset::TitleBasics, &path, 1024).unwrap();
        assert_eq!(summary.rows_inserted, 1);

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM title_basics", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_coercion_error_rolls_back_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gzipped_tsv(
            &dir,
            "title.basics.tsv.gz",
            "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
             tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short\n\
             tt0000002\tshort\tBad\tBad\tmaybe\t1895\t\\N\t1\tShort\n",
        );
        let mut conn = open_in_memory().unwrap();
        schema::create_all(&conn, schema::STAGING_TABLES).unwrap();

        let result = load_dataset_file(&mut conn, ImdbDataset::TitleBasics, &path, 1024);
        assert!(result.is_err());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM title_basics", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_dedup_keeps_one_row_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gzipped_tsv(
            &dir,
            "title.ratings.tsv.gz",
            "tconst\taverageRating\tnumVotes\ntt0000001\t5.0\t100\ntt0000001\t6.0\t200\n",
        );
        let mut conn = open_in_memory().unwrap();
        schema::create_all(&conn, schema::STAGING_TABLES).unwrap();

        load_dataset_file(&mut conn, ImdbDataset::TitleRatings, &path, 1024).unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM title_ratings", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
