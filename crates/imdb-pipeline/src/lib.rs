//! Imdb-Pipeline: wires staging load to the report-table build DAG into one
//! two-stage rebuild.
//!
//! Stage one truncates and reloads the six staging tables from the gzip TSV
//! files under `config.dataset_folder`, one file per transaction
//! (`imdb_db::load_all_datasets`). Stage two walks
//! `imdb_common::REPORT_BUILD_ORDER`, building each report table in its own
//! transaction against the staging data stage one just loaded.

mod dag;

use imdb_common::{Error, ImdbDataset, PipelineConfig, ReportTable, Result, REPORT_BUILD_ORDER};
use imdb_db::BulkSummary;
use imdb_report::CharactersPipeline;
use rusqlite::{Connection, Transaction};

/// Outcome of building one report table.
#[derive(Debug, Clone, Copy)]
pub struct ReportStepSummary {
    pub table: ReportTable,
    pub rows_inserted: u64,
    pub rows_dropped: u64,
}

/// Outcome of a full rebuild: every staging file load, then every report
/// table build, both in the order they actually ran.
#[derive(Debug)]
pub struct RebuildSummary {
    pub staging: Vec<(ImdbDataset, BulkSummary)>,
    pub report: Vec<ReportStepSummary>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Run the complete rebuild described by `config`: (re)create the schema,
/// reload every staging table, then build the full report schema from the
/// freshly loaded staging data.
pub fn run_full_rebuild(conn: &mut Connection, config: &PipelineConfig) -> Result<RebuildSummary> {
    imdb_db::initialize(conn, config.has_to_drop_tables)?;

    tracing::info!(dataset_folder = %config.dataset_folder.display(), "loading staging tables");
    let staging = imdb_db::load_all_datasets(conn, &config.dataset_folder, config.bulk_size)?;

    let report = build_report_schema(conn, config.bulk_size)?;
    Ok(RebuildSummary { staging, report })
}

fn step<F>(conn: &mut Connection, table: ReportTable, f: F) -> Result<ReportStepSummary>
where
    F: FnOnce(&Transaction<'_>) -> Result<(u64, u64)>,
{
    tracing::info!(table = %table, "building report table");
    let tx = conn.transaction().map_err(db_err)?;
    let (rows_inserted, rows_dropped) = f(&tx)?;
    tx.commit().map_err(db_err)?;
    tracing::info!(table = %table, rows_inserted, rows_dropped, "report table built");
    Ok(ReportStepSummary { table, rows_inserted, rows_dropped })
}

/// Build every report table in [`REPORT_BUILD_ORDER`], each in its own
/// transaction. `character` threads the [`CharactersPipeline`] that
/// `characters_to_character`'s build populated one step earlier, since
/// `character`'s id→name vocabulary only exists in memory at that point —
/// there is no staging column to rediscover it from independently.
fn build_report_schema(conn: &mut Connection, bulk_size: usize) -> Result<Vec<ReportStepSummary>> {
    let mut summaries = Vec::with_capacity(REPORT_BUILD_ORDER.len());
    let mut characters_pipeline: Option<CharactersPipeline> = None;

    for table in REPORT_BUILD_ORDER {
        let summary = match table {
            ReportTable::TitleType => step(conn, table, |tx| dag::build_title_type(tx, bulk_size))?,
            ReportTable::Genre => step(conn, table, |tx| dag::build_genre(tx, bulk_size))?,
            ReportTable::Profession => step(conn, table, |tx| dag::build_profession(tx, bulk_size))?,
            ReportTable::TitleAliasType => step(conn, table, |tx| dag::build_title_alias_type(tx, bulk_size))?,
            ReportTable::Name => step(conn, table, |tx| dag::build_name(tx, bulk_size))?,
            ReportTable::Title => step(conn, table, |tx| dag::build_title(tx, bulk_size))?,
            ReportTable::TitleToGenre => step(conn, table, |tx| dag::build_title_to_genre(tx, bulk_size))?,
            ReportTable::TitleToDirector => step(conn, table, |tx| dag::build_title_to_director(tx, bulk_size))?,
            ReportTable::TitleToWriter => step(conn, table, |tx| dag::build_title_to_writer(tx, bulk_size))?,
            ReportTable::NameToKnownForTitle => {
                step(conn, table, |tx| dag::build_name_to_known_for_title(tx, bulk_size))?
            }
            ReportTable::NameToProfession => step(conn, table, |tx| dag::build_name_to_profession(tx, bulk_size))?,
            ReportTable::TitleToPrincipal => step(conn, table, |tx| dag::build_title_to_principal(tx, bulk_size))?,
            ReportTable::TitleAlias => step(conn, table, |tx| dag::build_title_alias_table(tx, bulk_size))?,
            ReportTable::TitleAliasToTitleAliasType => {
                step(conn, table, |tx| dag::build_title_alias_to_title_alias_type(tx, bulk_size))?
            }
            ReportTable::CharactersToCharacter => {
                tracing::info!(table = %table, "building report table");
                let tx = conn.transaction().map_err(db_err)?;
                let (pipeline, rows_inserted) = dag::build_characters_to_character(&tx, bulk_size)?;
                tx.commit().map_err(db_err)?;
                tracing::info!(table = %table, rows_inserted, "report table built");
                characters_pipeline = Some(pipeline);
                ReportStepSummary { table, rows_inserted, rows_dropped: 0 }
            }
            ReportTable::Character => {
                let pipeline = characters_pipeline.take().ok_or_else(|| {
                    Error::database("character cannot build before characters_to_character".to_string())
                })?;
                step(conn, table, |tx| dag::build_character(tx, bulk_size, &pipeline))?
            }
            ReportTable::Participation => step(conn, table, |tx| dag::build_participation(tx, bulk_size))?,
            ReportTable::ParticipationToCharacter => {
                step(conn, table, |tx| dag::build_participation_to_character(tx, bulk_size))?
            }
        };
        summaries.push(summary);
    }
    Ok(summaries)
}
