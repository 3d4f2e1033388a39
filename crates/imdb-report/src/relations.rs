//! Row-oriented builders for the ordered relation and alias tables: these
//! can't be expressed as a single set-oriented `INSERT ... SELECT` because
//! they explode a delimited staging column into per-token rows, re-numbering
//! `ordering` densely when a token fails to resolve against its key table.

use std::collections::HashMap;

use imdb_common::{Error, Result};
use imdb_db::BulkWriter;
use imdb_tsv::Value;
use rusqlite::Transaction;

/// Outcome of building one ordered relation table.
#[derive(Debug, Clone, Copy)]
pub struct RelationBuildSummary {
    pub relation_table: &'static str,
    pub rows_inserted: u64,
    pub rows_dropped: u64,
}

/// Explode a delimited multi-valued staging column into an ordered relation
/// table `(owner_id, ordering, target_id)`.
///
/// `owner_select_sql` must return two columns: the owner's natural key and
/// the raw delimited value (nullable). A null or empty value drops the
/// owner entirely (no rows emitted for it, no dense-renumbering needed). A
/// token that fails to resolve against `target_map` is dropped and the
/// remaining tokens are renumbered densely starting at 1, per the ordering
/// invariant for this table family.
pub fn build_ordered_relation_by_explosion(
    tx: &Transaction<'_>,
    relation_table: &'static str,
    owner_select_sql: &str,
    owner_map: &HashMap<String, i64>,
    target_map: &HashMap<String, i64>,
    delimiter: char,
    bulk_size: usize,
) -> Result<RelationBuildSummary> {
    tx.execute(&format!("DELETE FROM {relation_table}"), [])
        .map_err(|e| Error::database(e.to_string()))?;

    let mut stmt = tx.prepare(owner_select_sql).map_err(|e| Error::database(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| Error::database(e.to_string()))?;

    let columns = ["owner_id", "ordering", "target_id"];
    let mut writer = BulkWriter::new(tx, relation_table, &columns, bulk_size);
    let mut rows_dropped = 0u64;

    while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
        let owner_key: String = row.get(0).map_err(|e| Error::database(e.to_string()))?;
        let raw: Option<String> = row.get(1).map_err(|e| Error::database(e.to_string()))?;
        let Some(raw) = raw else { continue };

        let Some(&owner_id) = owner_map.get(&owner_key) else {
            tracing::debug!(relation_table, owner_key, "owner key does not resolve, dropping row");
            continue;
        };

        let mut ordering = 0i64;
        for token in raw.split(delimiter) {
            if token.is_empty() {
                continue;
            }
            match target_map.get(token) {
                Some(&target_id) => {
                    ordering += 1;
                    writer.add(vec![Value::Int(owner_id), Value::Int(ordering), Value::Int(target_id)])?;
                }
                None => {
                    rows_dropped += 1;
                    tracing::debug!(relation_table, token, "target key does not resolve, dropping edge");
                }
            }
        }
    }
    drop(rows);
    drop(stmt);

    let summary = writer.finish()?;
    if rows_dropped > 0 {
        tracing::warn!(relation_table, rows_dropped, "edges dropped for unresolved targets");
    }
    Ok(RelationBuildSummary { relation_table, rows_inserted: summary.rows_inserted, rows_dropped })
}

/// Build `title_alias` from `title_akas`, dropping rows whose `titleId`
/// doesn't resolve against a known title. Unlike the ordered relations
/// above, `ordering` here is carried through unchanged from the source
/// (IMDb's own dense per-title akas ordering), never renumbered.
pub fn build_title_alias(tx: &Transaction<'_>, title_map: &HashMap<String, i64>, bulk_size: usize) -> Result<u64> {
    tx.execute("DELETE FROM title_alias", []).map_err(|e| Error::database(e.to_string()))?;

    let mut stmt = tx
        .prepare("SELECT titleId, ordering, title, region, language, isOriginalTitle FROM title_akas")
        .map_err(|e| Error::database(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| Error::database(e.to_string()))?;

    let columns = ["title_id", "ordering", "title", "region_code", "language_code", "is_original_title"];
    let mut writer = BulkWriter::new(tx, "title_alias", &columns, bulk_size);
    let mut dropped = 0u64;

    while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
        let title_id_nat: String = row.get(0).map_err(|e| Error::database(e.to_string()))?;
        let ordering: i64 = row.get(1).map_err(|e| Error::database(e.to_string()))?;
        let title: String = row.get(2).map_err(|e| Error::database(e.to_string()))?;
        let region: Option<String> = row.get(3).map_err(|e| Error::database(e.to_string()))?;
        let language: Option<String> = row.get(4).map_err(|e| Error::database(e.to_string()))?;
        let is_original: Option<bool> = row.get(5).map_err(|e| Error::database(e.to_string()))?;

        let Some(&title_id) = title_map.get(&title_id_nat) else {
            dropped += 1;
            tracing::debug!(titleId = title_id_nat, "titleId does not resolve to a title, dropping alias row");
            continue;
        };

        writer.add(vec![
            Value::Int(title_id),
            Value::Int(ordering),
            Value::Text(title),
            region.map(Value::Text).unwrap_or(Value::Null),
            language.map(Value::Text).unwrap_or(Value::Null),
            is_original.map(Value::Bool).unwrap_or(Value::Null),
        ])?;
    }
    drop(rows);
    drop(stmt);

    writer.finish()?;
    if dropped > 0 {
        tracing::warn!(table = "title_alias", dropped, "rows dropped due to unresolved titleId");
    }
    Ok(dropped)
}

/// Explode a delimited multi-valued staging column into a plain many-to-many
/// table `(owner_id, target_id)` with no `ordering` column — used for
/// `name_to_profession`, where the source list has no positional meaning
/// worth preserving, only membership. Unlike
/// [`build_ordered_relation_by_explosion`], duplicate `(owner_id, target_id)`
/// pairs arising from repeated tokens are deduped before insertion, since the
/// table's uniqueness index forbids them.
pub fn build_many_to_many_by_explosion(
    tx: &Transaction<'_>,
    relation_table: &'static str,
    owner_select_sql: &str,
    owner_map: &HashMap<String, i64>,
    target_map: &HashMap<String, i64>,
    delimiter: char,
    bulk_size: usize,
) -> Result<RelationBuildSummary> {
    tx.execute(&format!("DELETE FROM {relation_table}"), [])
        .map_err(|e| Error::database(e.to_string()))?;

    let mut stmt = tx.prepare(owner_select_sql).map_err(|e| Error::database(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| Error::database(e.to_string()))?;

    let columns = ["owner_id", "target_id"];
    let mut writer = BulkWriter::new(tx, relation_table, &columns, bulk_size);
    let mut pairs_seen: std::collections::HashSet<(i64, i64)> = std::collections::HashSet::new();
    let mut rows_dropped = 0u64;

    while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
        let owner_key: String = row.get(0).map_err(|e| Error::database(e.to_string()))?;
        let raw: Option<String> = row.get(1).map_err(|e| Error::database(e.to_string()))?;
        let Some(raw) = raw else { continue };

        let Some(&owner_id) = owner_map.get(&owner_key) else {
            tracing::debug!(relation_table, owner_key, "owner key does not resolve, dropping row");
            continue;
        };

        for token in raw.split(delimiter) {
            if token.is_empty() {
                continue;
            }
            match target_map.get(token) {
                Some(&target_id) => {
                    if pairs_seen.insert((owner_id, target_id)) {
                        writer.add(vec![Value::Int(owner_id), Value::Int(target_id)])?;
                    }
                }
                None => {
                    rows_dropped += 1;
                    tracing::debug!(relation_table, token, "target key does not resolve, dropping edge");
                }
            }
        }
    }
    drop(rows);
    drop(stmt);

    let summary = writer.finish()?;
    if rows_dropped > 0 {
        tracing::warn!(relation_table, rows_dropped, "edges dropped for unresolved targets");
    }
    Ok(RelationBuildSummary { relation_table, rows_inserted: summary.rows_inserted, rows_dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imdb_db::{create_all, open_in_memory, STAGING_TABLES};

    fn setup() -> rusqlite::Connection {
        let conn = open_in_memory().unwrap();
        create_all(&conn, STAGING_TABLES).unwrap();
        conn.execute_batch(
            "CREATE TABLE title (id INTEGER PRIMARY KEY, tconst TEXT NOT NULL UNIQUE);
             CREATE TABLE name (id INTEGER PRIMARY KEY, nconst TEXT NOT NULL UNIQUE);
             CREATE TABLE title_to_director (owner_id INTEGER NOT NULL, ordering INTEGER NOT NULL, target_id INTEGER NOT NULL);
             CREATE TABLE title_alias (
                 id INTEGER PRIMARY KEY, title_id INTEGER NOT NULL, ordering INTEGER NOT NULL,
                 title TEXT NOT NULL, region_code TEXT, language_code TEXT, is_original_title INTEGER
             );
             CREATE TABLE name_to_profession (name_id INTEGER NOT NULL, profession_id INTEGER NOT NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_explosion_drops_unresolved_targets_and_renumbers() {
        let mut conn = setup();
        conn.execute("INSERT INTO title (tconst) VALUES ('tt1')", []).unwrap();
        conn.execute("INSERT INTO name (nconst) VALUES ('nm1'), ('nm2')", []).unwrap();
        conn.execute("INSERT INTO title_crew (tconst, directors) VALUES ('tt1', 'nm1,nm404,nm2')", []).unwrap();

        let tx = conn.transaction().unwrap();
        let owner_map: HashMap<String, i64> = [("tt1".to_string(), 1i64)].into_iter().collect();
        let target_map: HashMap<String, i64> = [("nm1".to_string(), 1i64), ("nm2".to_string(), 2i64)].into_iter().collect();

        let summary = build_ordered_relation_by_explosion(
            &tx,
            "title_to_director",
            "SELECT tconst, directors FROM title_crew",
            &owner_map,
            &target_map,
            ',',
            1024,
        )
        .unwrap();
        assert_eq!(summary.rows_inserted, 2);
        assert_eq!(summary.rows_dropped, 1);

        let mut stmt = tx.prepare("SELECT ordering, target_id FROM title_to_director ORDER BY ordering").unwrap();
        let rows: Vec<(i64, i64)> = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?))).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_title_alias_drops_unresolved_title_id() {
        let mut conn = setup();
        conn.execute("INSERT INTO title (tconst) VALUES ('tt1')", []).unwrap();
        conn.execute(
            "INSERT INTO title_akas (titleId, ordering, title) VALUES ('tt1', 1, 'Known'), ('ttmissing', 1, 'Orphan')",
            [],
        )
        .unwrap();

        let tx = conn.transaction().unwrap();
        let title_map: HashMap<String, i64> = [("tt1".to_string(), 1i64)].into_iter().collect();
        let dropped = build_title_alias(&tx, &title_map, 1024).unwrap();
        assert_eq!(dropped, 1);

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM title_alias", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_many_to_many_dedupes_repeated_pairs() {
        let mut conn = setup();
        conn.execute("INSERT INTO name (nconst) VALUES ('nm1')", []).unwrap();
        conn.execute(
            "INSERT INTO name_basics (nconst, primaryName, primaryProfession) VALUES ('nm1', 'A', 'actor,actor,writer,ghost')",
            [],
        )
        .unwrap();

        let tx = conn.transaction().unwrap();
        let owner_map: HashMap<String, i64> = [("nm1".to_string(), 1i64)].into_iter().collect();
        let target_map: HashMap<String, i64> =
            [("actor".to_string(), 1i64), ("writer".to_string(), 2i64)].into_iter().collect();

        let summary = build_many_to_many_by_explosion(
            &tx,
            "name_to_profession",
            "SELECT nconst, primaryProfession FROM name_basics",
            &owner_map,
            &target_map,
            ',',
            1024,
        )
        .unwrap();
        assert_eq!(summary.rows_inserted, 2);
        assert_eq!(summary.rows_dropped, 1);

        let mut stmt = tx.prepare("SELECT profession_id FROM name_to_profession ORDER BY profession_id").unwrap();
        let ids: Vec<i64> = stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
