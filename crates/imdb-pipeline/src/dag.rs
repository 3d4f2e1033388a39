//! One function per step of the fixed report-table build order: the
//! set-oriented `INSERT ... SELECT` fact builds, plus the characters and
//! alias-type special cases that don't fit `imdb-report`'s two general
//! explosion primitives.
//!
//! Each `build_*` function here is one step of the DAG: it runs entirely
//! inside the [`rusqlite::Transaction`] its caller opened, and returns the
//! `(rows_inserted, rows_dropped)` pair [`crate::step`] folds into a
//! [`crate::ReportStepSummary`].

use imdb_common::{Error, Result};
use imdb_db::BulkWriter;
use imdb_report::{
    build_key_table, build_key_table_from_values, build_many_to_many_by_explosion,
    build_ordered_relation_by_explosion, build_title_alias as build_title_alias_relation, check_row_count_matches,
    natural_key_map, verify_non_empty, AliasTypeMatcher, CharactersPipeline, DelimiterMode, KeySource,
};
use imdb_tsv::Value;
use rusqlite::Transaction;

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// The sentinel `title_type` row an unrecognized `titleType` value resolves
/// to, rather than dropping the `title` row entirely (see DESIGN.md).
pub const UNKNOWN_TITLE_TYPE: &str = "unknown";

fn query_distinct(tx: &Transaction<'_>, sql: &str) -> Result<Vec<String>> {
    let mut stmt = tx.prepare(sql).map_err(db_err)?;
    let mut rows = stmt.query([]).map_err(db_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(db_err)? {
        let value: Option<String> = row.get(0).map_err(db_err)?;
        if let Some(value) = value {
            out.push(value);
        }
    }
    Ok(out)
}

/// Truncate `target_table` and run one `INSERT ... SELECT` against it,
/// returning the affected row count. Used for the set-oriented fact builds
/// that need no application-side row iteration.
fn insert_select(tx: &Transaction<'_>, target_table: &str, insert_sql: &str) -> Result<u64> {
    tx.execute(&format!("DELETE FROM {target_table}"), []).map_err(db_err)?;
    let affected = tx.execute(insert_sql, []).map_err(db_err)?;
    Ok(affected as u64)
}

pub fn build_title_type(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let mut values = query_distinct(tx, "SELECT DISTINCT titleType FROM title_basics")?;
    values.push(UNKNOWN_TITLE_TYPE.to_string());
    let inserted = build_key_table_from_values(tx, "title_type", values, bulk_size)?;
    Ok((inserted as u64, 0))
}

pub fn build_genre(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let sources = [KeySource { select_sql: "SELECT genres FROM title_basics", mode: DelimiterMode::Char(',') }];
    let inserted = build_key_table(tx, "genre", &sources, bulk_size)?;
    Ok((inserted as u64, 0))
}

/// The `profession` vocabulary is the union of `title_principals.category`
/// (distilled spec §4.6.3 step 3) and `name_basics.primaryProfession`'s
/// comma-list. The second source is pulled in for `name_to_profession`'s
/// sake: that table explodes `primaryProfession`, and a profession key table
/// built from `category` alone does not cover every profession name IMDb's
/// `primaryProfession` column carries (e.g. "producer" appears there but
/// never as a `title_principals.category` value), which would otherwise drop
/// edges `name_to_profession` should keep.
pub fn build_profession(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let sources = [
        KeySource { select_sql: "SELECT category FROM title_principals", mode: DelimiterMode::None },
        KeySource { select_sql: "SELECT primaryProfession FROM name_basics", mode: DelimiterMode::Char(',') },
    ];
    let inserted = build_key_table(tx, "profession", &sources, bulk_size)?;
    Ok((inserted as u64, 0))
}

pub fn build_title_alias_type(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let values = imdb_common::IMDB_ALIAS_TYPES.iter().map(|s| s.to_string());
    let inserted = build_key_table_from_values(tx, "title_alias_type", values, bulk_size)?;
    Ok((inserted as u64, 0))
}

pub fn build_name(tx: &Transaction<'_>, _bulk_size: usize) -> Result<(u64, u64)> {
    let inserted = insert_select(
        tx,
        "name",
        "INSERT INTO name (nconst, primary_name, birth_year, death_year, primary_professions)
         SELECT nconst, primaryName, birthYear, deathYear, primaryProfession FROM name_basics",
    )?;
    check_row_count_matches(tx, "name", "name_basics")?;
    verify_non_empty(tx, "name")?;
    Ok((inserted, 0))
}

pub fn build_title(tx: &Transaction<'_>, _bulk_size: usize) -> Result<(u64, u64)> {
    let inserted = insert_select(
        tx,
        "title",
        "INSERT INTO title (tconst, title_type_id, primary_title, original_title, is_adult,
                             start_year, end_year, runtime_minutes, average_rating, rating_count)
         SELECT tb.tconst,
                COALESCE(tt.id, (SELECT id FROM title_type WHERE name = 'unknown')),
                tb.primaryTitle, tb.originalTitle, tb.isAdult, tb.startYear, tb.endYear, tb.runtimeMinutes,
                COALESCE(tr.averageRating, 0.0), COALESCE(tr.numVotes, 0)
         FROM title_basics tb
         LEFT JOIN title_type tt ON tt.name = tb.titleType
         LEFT JOIN title_ratings tr ON tr.tconst = tb.tconst",
    )?;
    check_row_count_matches(tx, "title", "title_basics")?;
    verify_non_empty(tx, "title")?;
    Ok((inserted, 0))
}

pub fn build_title_to_genre(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let title_map = natural_key_map(tx, "title", "tconst", "id")?;
    let genre_map = natural_key_map(tx, "genre", "name", "id")?;
    let summary = build_ordered_relation_by_explosion(
        tx,
        "title_to_genre",
        "SELECT tconst, genres FROM title_basics",
        &title_map,
        &genre_map,
        ',',
        bulk_size,
    )?;
    Ok((summary.rows_inserted, summary.rows_dropped))
}

pub fn build_title_to_director(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let title_map = natural_key_map(tx, "title", "tconst", "id")?;
    let name_map = natural_key_map(tx, "name", "nconst", "id")?;
    let summary = build_ordered_relation_by_explosion(
        tx,
        "title_to_director",
        "SELECT tconst, directors FROM title_crew",
        &title_map,
        &name_map,
        ',',
        bulk_size,
    )?;
    Ok((summary.rows_inserted, summary.rows_dropped))
}

pub fn build_title_to_writer(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let title_map = natural_key_map(tx, "title", "tconst", "id")?;
    let name_map = natural_key_map(tx, "name", "nconst", "id")?;
    let summary = build_ordered_relation_by_explosion(
        tx,
        "title_to_writer",
        "SELECT tconst, writers FROM title_crew",
        &title_map,
        &name_map,
        ',',
        bulk_size,
    )?;
    Ok((summary.rows_inserted, summary.rows_dropped))
}

pub fn build_name_to_known_for_title(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let name_map = natural_key_map(tx, "name", "nconst", "id")?;
    let title_map = natural_key_map(tx, "title", "tconst", "id")?;
    let summary = build_ordered_relation_by_explosion(
        tx,
        "name_to_known_for_title",
        "SELECT nconst, knownForTitles FROM name_basics",
        &name_map,
        &title_map,
        ',',
        bulk_size,
    )?;
    Ok((summary.rows_inserted, summary.rows_dropped))
}

pub fn build_name_to_profession(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let name_map = natural_key_map(tx, "name", "nconst", "id")?;
    let profession_map = natural_key_map(tx, "profession", "name", "id")?;
    let summary = build_many_to_many_by_explosion(
        tx,
        "name_to_profession",
        "SELECT nconst, primaryProfession FROM name_basics",
        &name_map,
        &profession_map,
        ',',
        bulk_size,
    )?;
    Ok((summary.rows_inserted, summary.rows_dropped))
}

pub fn build_title_to_principal(tx: &Transaction<'_>, _bulk_size: usize) -> Result<(u64, u64)> {
    let inserted = insert_select(
        tx,
        "title_to_principal",
        "INSERT INTO title_to_principal (title_id, ordering, name_id, profession_id, job)
         SELECT t.id, tp.ordering, n.id, p.id, tp.job
         FROM title_principals tp
         JOIN title t ON t.tconst = tp.tconst
         JOIN name n ON n.nconst = tp.nconst
         JOIN profession p ON p.name = tp.category",
    )?;
    check_row_count_matches(tx, "title_to_principal", "title_principals")?;
    verify_non_empty(tx, "title_to_principal")?;
    Ok((inserted, 0))
}

pub fn build_title_alias_table(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    let title_map = natural_key_map(tx, "title", "tconst", "id")?;
    let dropped = build_title_alias_relation(tx, &title_map, bulk_size)?;
    let rows: i64 = tx.query_row("SELECT COUNT(*) FROM title_alias", [], |r| r.get(0)).map_err(db_err)?;
    verify_non_empty(tx, "title_alias")?;
    Ok((rows as u64, dropped))
}

pub fn build_title_alias_to_title_alias_type(tx: &Transaction<'_>, bulk_size: usize) -> Result<(u64, u64)> {
    tx.execute("DELETE FROM title_alias_to_title_alias_type", []).map_err(db_err)?;

    let alias_type_map = natural_key_map(tx, "title_alias_type", "name", "id")?;
    let mut matcher = AliasTypeMatcher::new();

    let mut stmt = tx
        .prepare(
            "SELECT ta.id, tk.types
             FROM title_akas tk
             JOIN title t ON t.tconst = tk.titleId
             JOIN title_alias ta ON ta.title_id = t.id AND ta.ordering = tk.ordering
             WHERE tk.types IS NOT NULL",
        )
        .map_err(db_err)?;
    let mut rows = stmt.query([]).map_err(db_err)?;

    let columns = ["owner_id", "ordering", "target_id"];
    let mut writer = BulkWriter::new(tx, "title_alias_to_title_alias_type", &columns, bulk_size);

    while let Some(row) = rows.next().map_err(db_err)? {
        let alias_id: i64 = row.get(0).map_err(db_err)?;
        let raw_types: String = row.get(1).map_err(db_err)?;
        for (index, tag) in matcher.match_tags(&raw_types).into_iter().enumerate() {
            if let Some(&type_id) = alias_type_map.get(tag) {
                writer.add(vec![Value::Int(alias_id), Value::Int((index + 1) as i64), Value::Int(type_id)])?;
            }
        }
    }
    drop(rows);
    drop(stmt);

    let summary = writer.finish()?;
    Ok((summary.rows_inserted, 0))
}

/// Decode every distinct `title_principals.characters` JSON literal, interning
/// each character name into a dense id and recording the literal's members
/// in `characters_to_character`. Returns the populated [`CharactersPipeline`]
/// so [`build_character`] can insert its id→name map.
pub fn build_characters_to_character(tx: &Transaction<'_>, bulk_size: usize) -> Result<(CharactersPipeline, u64)> {
    tx.execute("DELETE FROM characters_to_character", []).map_err(db_err)?;

    let mut stmt = tx
        .prepare("SELECT DISTINCT characters FROM title_principals WHERE characters IS NOT NULL")
        .map_err(db_err)?;
    let mut rows = stmt.query([]).map_err(db_err)?;

    let mut pipeline = CharactersPipeline::new();
    let columns = ["characters", "ordering", "character_id"];
    let mut writer = BulkWriter::new(tx, "characters_to_character", &columns, bulk_size);

    while let Some(row) = rows.next().map_err(db_err)? {
        let raw: String = row.get(0).map_err(db_err)?;
        for (ordering, character_id) in pipeline.intern(&raw)? {
            writer.add(vec![Value::Text(raw.clone()), Value::Int(ordering), Value::Int(character_id)])?;
        }
    }
    drop(rows);
    drop(stmt);

    let summary = writer.finish()?;
    Ok((pipeline, summary.rows_inserted))
}

pub fn build_character(tx: &Transaction<'_>, bulk_size: usize, pipeline: &CharactersPipeline) -> Result<(u64, u64)> {
    tx.execute("DELETE FROM character", []).map_err(db_err)?;

    let columns = ["id", "name"];
    let mut writer = BulkWriter::new(tx, "character", &columns, bulk_size);
    for (id, name) in pipeline.character_rows() {
        writer.add(vec![Value::Int(id), Value::Text(name.to_string())])?;
    }
    let summary = writer.finish()?;
    verify_non_empty(tx, "character")?;
    Ok((summary.rows_inserted, 0))
}

pub fn build_participation(tx: &Transaction<'_>, _bulk_size: usize) -> Result<(u64, u64)> {
    let inserted = insert_select(
        tx,
        "participation",
        "INSERT INTO participation (title_id, ordering, name_id, profession_id, job)
         SELECT t.id, tp.ordering, n.id, p.id, tp.job
         FROM title_principals tp
         JOIN title t ON t.tconst = tp.tconst
         JOIN name n ON n.nconst = tp.nconst
         JOIN profession p ON p.name = tp.category",
    )?;
    check_row_count_matches(tx, "participation", "title_principals")?;
    verify_non_empty(tx, "participation")?;
    Ok((inserted, 0))
}

/// Every `participation` row gets at least one `participation_to_character`
/// edge: named characters resolve through `characters_to_character`; a
/// principal with no `characters` field at all (directors, writers credited
/// as principals, etc.) resolves to the id-1 empty-string sentinel instead
/// of being skipped, so "what character did they play" is answerable
/// uniformly for every row.
pub fn build_participation_to_character(tx: &Transaction<'_>, _bulk_size: usize) -> Result<(u64, u64)> {
    tx.execute("DELETE FROM participation_to_character", []).map_err(db_err)?;

    let named = tx
        .execute(
            "INSERT INTO participation_to_character (owner_id, ordering, target_id)
             SELECT DISTINCT part.id, ctc.ordering, ctc.character_id
             FROM title_principals tp
             JOIN title t ON t.tconst = tp.tconst
             JOIN name n ON n.nconst = tp.nconst
             JOIN participation part ON part.title_id = t.id AND part.name_id = n.id AND part.ordering = tp.ordering
             JOIN characters_to_character ctc ON ctc.characters = tp.characters
             WHERE tp.characters IS NOT NULL",
            [],
        )
        .map_err(db_err)?;

    let sentineled = tx
        .execute(
            "INSERT INTO participation_to_character (owner_id, ordering, target_id)
             SELECT part.id, 1, 1
             FROM title_principals tp
             JOIN title t ON t.tconst = tp.tconst
             JOIN name n ON n.nconst = tp.nconst
             JOIN participation part ON part.title_id = t.id AND part.name_id = n.id AND part.ordering = tp.ordering
             WHERE tp.characters IS NULL",
            [],
        )
        .map_err(db_err)?;

    verify_non_empty(tx, "participation_to_character")?;
    Ok(((named + sentineled) as u64, 0))
}
