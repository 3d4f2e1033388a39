//! Declarative catalog of every staging and report table.
//!
//! Nothing here is polymorphic over table identity: a [`TableDef`] is a
//! plain data structure, and [`create_all`]/[`drop_all`] just walk the list.

use imdb_common::{Error, Result};
use rusqlite::Connection;

/// One column of a table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, sql_type: &'static str, nullable: bool) -> Self {
        Self { name, sql_type, nullable }
    }
}

/// A foreign key from one of this table's columns to another table's column.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
}

/// An index, plain or unique, over one or more columns.
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

/// A full table descriptor: name, columns, primary key, foreign keys, indexes.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub indexes: &'static [IndexDef],
}

impl TableDef {
    fn create_sql(&self) -> String {
        let mut column_clauses: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null_clause = if c.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", c.name, c.sql_type, null_clause)
            })
            .collect();

        if !self.primary_key.is_empty() {
            column_clauses.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }

        for fk in self.foreign_keys {
            column_clauses.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                fk.column, fk.references_table, fk.references_column
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n);",
            self.name,
            column_clauses.join(",\n  ")
        )
    }

    fn index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|idx| {
                let unique = if idx.unique { "UNIQUE " } else { "" };
                format!(
                    "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
                    unique,
                    idx.name,
                    self.name,
                    idx.columns.join(", ")
                )
            })
            .collect()
    }
}

macro_rules! col {
    ($name:literal, $sql_type:literal, nullable) => {
        ColumnDef::new($name, $sql_type, true)
    };
    ($name:literal, $sql_type:literal) => {
        ColumnDef::new($name, $sql_type, false)
    };
}

const TITLE_BASICS_COLUMNS: &[ColumnDef] = &[
    col!("tconst", "TEXT"),
    col!("titleType", "TEXT"),
    col!("primaryTitle", "TEXT"),
    col!("originalTitle", "TEXT"),
    col!("isAdult", "INTEGER"),
    col!("startYear", "INTEGER", nullable),
    col!("endYear", "INTEGER", nullable),
    col!("runtimeMinutes", "INTEGER", nullable),
    col!("genres", "TEXT", nullable),
];

const NAME_BASICS_COLUMNS: &[ColumnDef] = &[
    col!("nconst", "TEXT"),
    col!("primaryName", "TEXT"),
    col!("birthYear", "INTEGER", nullable),
    col!("deathYear", "INTEGER", nullable),
    col!("primaryProfession", "TEXT", nullable),
    col!("knownForTitles", "TEXT", nullable),
];

const TITLE_AKAS_COLUMNS: &[ColumnDef] = &[
    col!("titleId", "TEXT"),
    col!("ordering", "INTEGER"),
    col!("title", "TEXT"),
    col!("region", "TEXT", nullable),
    col!("language", "TEXT", nullable),
    col!("types", "TEXT", nullable),
    col!("attributes", "TEXT", nullable),
    col!("isOriginalTitle", "INTEGER", nullable),
];

const TITLE_CREW_COLUMNS: &[ColumnDef] = &[
    col!("tconst", "TEXT"),
    col!("directors", "TEXT", nullable),
    col!("writers", "TEXT", nullable),
];

const TITLE_PRINCIPALS_COLUMNS: &[ColumnDef] = &[
    col!("tconst", "TEXT"),
    col!("ordering", "INTEGER"),
    col!("nconst", "TEXT"),
    col!("category", "TEXT"),
    col!("job", "TEXT", nullable),
    col!("characters", "TEXT", nullable),
];

const TITLE_RATINGS_COLUMNS: &[ColumnDef] = &[
    col!("tconst", "TEXT"),
    col!("averageRating", "REAL"),
    col!("numVotes", "INTEGER"),
];

/// Every staging table, mirroring the six TSV files one-to-one.
pub const STAGING_TABLES: &[TableDef] = &[
    TableDef {
        name: "title_basics",
        columns: TITLE_BASICS_COLUMNS,
        primary_key: &["tconst"],
        foreign_keys: &[],
        indexes: &[],
    },
    TableDef {
        name: "name_basics",
        columns: NAME_BASICS_COLUMNS,
        primary_key: &["nconst"],
        foreign_keys: &[],
        indexes: &[],
    },
    TableDef {
        name: "title_akas",
        columns: TITLE_AKAS_COLUMNS,
        primary_key: &["titleId", "ordering"],
        foreign_keys: &[],
        indexes: &[],
    },
    TableDef {
        name: "title_crew",
        columns: TITLE_CREW_COLUMNS,
        primary_key: &["tconst"],
        foreign_keys: &[],
        indexes: &[],
    },
    TableDef {
        name: "title_principals",
        columns: TITLE_PRINCIPALS_COLUMNS,
        primary_key: &["tconst", "ordering"],
        foreign_keys: &[],
        indexes: &[],
    },
    TableDef {
        name: "title_ratings",
        columns: TITLE_RATINGS_COLUMNS,
        primary_key: &["tconst"],
        foreign_keys: &[],
        indexes: &[],
    },
];

const KEY_TABLE_COLUMNS: &[ColumnDef] = &[col!("id", "INTEGER"), col!("name", "TEXT")];

/// Builds the descriptor shared by every key table: surrogate `id` plus a
/// unique `name`. Index names are database-global in SQLite, so each
/// invocation is given its own literal `$index_name` — a shared name would
/// let `CREATE INDEX IF NOT EXISTS` silently no-op for every table after the
/// first, leaving the rest with no uniqueness constraint at all.
macro_rules! key_table {
    ($name:literal, $index_name:literal) => {
        TableDef {
            name: $name,
            columns: KEY_TABLE_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[],
            indexes: &[IndexDef { name: $index_name, columns: &["name"], unique: true }],
        }
    };
}

const NAME_COLUMNS: &[ColumnDef] = &[
    col!("id", "INTEGER"),
    col!("nconst", "TEXT"),
    col!("primary_name", "TEXT"),
    col!("birth_year", "INTEGER", nullable),
    col!("death_year", "INTEGER", nullable),
    col!("primary_professions", "TEXT", nullable),
];

const TITLE_COLUMNS: &[ColumnDef] = &[
    col!("id", "INTEGER"),
    col!("tconst", "TEXT"),
    col!("title_type_id", "INTEGER"),
    col!("primary_title", "TEXT"),
    col!("original_title", "TEXT"),
    col!("is_adult", "INTEGER"),
    col!("start_year", "INTEGER", nullable),
    col!("end_year", "INTEGER", nullable),
    col!("runtime_minutes", "INTEGER", nullable),
    col!("average_rating", "REAL"),
    col!("rating_count", "INTEGER"),
];

const TITLE_ALIAS_COLUMNS: &[ColumnDef] = &[
    col!("id", "INTEGER"),
    col!("title_id", "INTEGER"),
    col!("ordering", "INTEGER"),
    col!("title", "TEXT"),
    col!("region_code", "TEXT", nullable),
    col!("language_code", "TEXT", nullable),
    col!("is_original_title", "INTEGER", nullable),
];

const PARTICIPATION_COLUMNS: &[ColumnDef] = &[
    col!("id", "INTEGER"),
    col!("title_id", "INTEGER"),
    col!("ordering", "INTEGER"),
    col!("name_id", "INTEGER"),
    col!("profession_id", "INTEGER", nullable),
    col!("job", "TEXT", nullable),
];

const ORDERED_RELATION_COLUMNS: &[ColumnDef] =
    &[col!("id", "INTEGER"), col!("owner_id", "INTEGER"), col!("ordering", "INTEGER"), col!("target_id", "INTEGER")];

/// Builds the descriptor shared by every ordered relation table: an
/// `(owner_id, ordering, target_id)` edge with the unique-per-owner index and
/// a plain index on the target column.
macro_rules! ordered_relation {
    ($name:literal, $owner_table:literal, $target_table:literal, $unique_index:literal, $target_index:literal) => {
        TableDef {
            name: $name,
            columns: ORDERED_RELATION_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[
                ForeignKey { column: "owner_id", references_table: $owner_table, references_column: "id" },
                ForeignKey { column: "target_id", references_table: $target_table, references_column: "id" },
            ],
            indexes: &[
                IndexDef { name: $unique_index, columns: &["owner_id", "ordering"], unique: true },
                IndexDef { name: $target_index, columns: &["target_id"], unique: false },
            ],
        }
    };
}

const CHARACTERS_TO_CHARACTER_COLUMNS: &[ColumnDef] =
    &[col!("characters", "TEXT"), col!("ordering", "INTEGER"), col!("character_id", "INTEGER")];

const NAME_TO_PROFESSION_COLUMNS: &[ColumnDef] = &[col!("name_id", "INTEGER"), col!("profession_id", "INTEGER")];

const TITLE_TO_PRINCIPAL_COLUMNS: &[ColumnDef] = &[
    col!("title_id", "INTEGER"),
    col!("ordering", "INTEGER"),
    col!("name_id", "INTEGER"),
    col!("profession_id", "INTEGER", nullable),
    col!("job", "TEXT", nullable),
];

/// Every report table: key tables, entity tables, ordered relations, and the
/// characters interning table, in the same order [`imdb_common::REPORT_BUILD_ORDER`]
/// builds them.
pub fn report_tables() -> Vec<TableDef> {
    vec![
        key_table!("title_type", "idx_title_type_name"),
        key_table!("genre", "idx_genre_name"),
        key_table!("profession", "idx_profession_name"),
        key_table!("title_alias_type", "idx_title_alias_type_name"),
        key_table!("character", "idx_character_name"),
        TableDef {
            name: "name",
            columns: NAME_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[],
            indexes: &[IndexDef { name: "idx_name_nconst", columns: &["nconst"], unique: true }],
        },
        TableDef {
            name: "title",
            columns: TITLE_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[ForeignKey {
                column: "title_type_id",
                references_table: "title_type",
                references_column: "id",
            }],
            indexes: &[IndexDef { name: "idx_title_tconst", columns: &["tconst"], unique: true }],
        },
        TableDef {
            name: "title_alias",
            columns: TITLE_ALIAS_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[ForeignKey { column: "title_id", references_table: "title", references_column: "id" }],
            indexes: &[IndexDef {
                name: "idx_title_alias_unique",
                columns: &["title_id", "ordering"],
                unique: true,
            }],
        },
        TableDef {
            name: "participation",
            columns: PARTICIPATION_COLUMNS,
            primary_key: &["id"],
            foreign_keys: &[
                ForeignKey { column: "title_id", references_table: "title", references_column: "id" },
                ForeignKey { column: "name_id", references_table: "name", references_column: "id" },
                ForeignKey { column: "profession_id", references_table: "profession", references_column: "id" },
            ],
            indexes: &[IndexDef {
                name: "idx_participation_unique",
                columns: &["title_id", "ordering"],
                unique: true,
            }],
        },
        ordered_relation!(
            "title_to_director",
            "title",
            "name",
            "idx_title_to_director_unique",
            "idx_title_to_director_target"
        ),
        ordered_relation!(
            "title_to_writer",
            "title",
            "name",
            "idx_title_to_writer_unique",
            "idx_title_to_writer_target"
        ),
        ordered_relation!(
            "title_to_genre",
            "title",
            "genre",
            "idx_title_to_genre_unique",
            "idx_title_to_genre_target"
        ),
        ordered_relation!(
            "name_to_known_for_title",
            "name",
            "title",
            "idx_name_to_known_for_title_unique",
            "idx_name_to_known_for_title_target"
        ),
        ordered_relation!(
            "title_alias_to_title_alias_type",
            "title_alias",
            "title_alias_type",
            "idx_title_alias_to_type_unique",
            "idx_title_alias_to_type_target"
        ),
        ordered_relation!(
            "participation_to_character",
            "participation",
            "character",
            "idx_participation_to_character_unique",
            "idx_participation_to_character_target"
        ),
        TableDef {
            name: "characters_to_character",
            columns: CHARACTERS_TO_CHARACTER_COLUMNS,
            primary_key: &[],
            foreign_keys: &[ForeignKey {
                column: "character_id",
                references_table: "character",
                references_column: "id",
            }],
            indexes: &[IndexDef {
                name: "idx_characters_to_character_unique",
                columns: &["characters", "ordering"],
                unique: true,
            }],
        },
        TableDef {
            name: "name_to_profession",
            columns: NAME_TO_PROFESSION_COLUMNS,
            primary_key: &[],
            foreign_keys: &[
                ForeignKey { column: "name_id", references_table: "name", references_column: "id" },
                ForeignKey { column: "profession_id", references_table: "profession", references_column: "id" },
            ],
            indexes: &[IndexDef {
                name: "idx_name_to_profession_unique",
                columns: &["name_id", "profession_id"],
                unique: true,
            }],
        },
        TableDef {
            name: "title_to_principal",
            columns: TITLE_TO_PRINCIPAL_COLUMNS,
            primary_key: &[],
            foreign_keys: &[
                ForeignKey { column: "title_id", references_table: "title", references_column: "id" },
                ForeignKey { column: "name_id", references_table: "name", references_column: "id" },
                ForeignKey { column: "profession_id", references_table: "profession", references_column: "id" },
            ],
            indexes: &[IndexDef {
                name: "idx_title_to_principal_unique",
                columns: &["title_id", "ordering"],
                unique: true,
            }],
        },
    ]
}

/// Create every table and index in `tables`, idempotently.
pub fn create_all(conn: &Connection, tables: &[TableDef]) -> Result<()> {
    for table in tables {
        conn.execute_batch(&table.create_sql())
            .map_err(|e| Error::schema(table.name.to_string(), e.to_string()))?;
        for index_sql in table.index_sql() {
            conn.execute_batch(&index_sql)
                .map_err(|e| Error::schema(table.name.to_string(), e.to_string()))?;
        }
    }
    Ok(())
}

/// Drop every table in `tables`, in reverse order so dependents go first.
pub fn drop_all(conn: &Connection, tables: &[TableDef]) -> Result<()> {
    for table in tables.iter().rev() {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table.name))
            .map_err(|e| Error::schema(table.name.to_string(), e.to_string()))?;
    }
    Ok(())
}

/// Create the full pipeline schema (staging then report tables), optionally
/// dropping everything first.
pub fn initialize(conn: &Connection, drop_first: bool) -> Result<()> {
    let reports = report_tables();
    if drop_first {
        drop_all(conn, &reports)?;
        drop_all(conn, STAGING_TABLES)?;
    }
    create_all(conn, STAGING_TABLES)?;
    create_all(conn, &reports)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_in_memory;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = open_in_memory().unwrap();
        initialize(&conn, false).unwrap();
        initialize(&conn, false).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='title'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_all_staging_tables_created() {
        let conn = open_in_memory().unwrap();
        initialize(&conn, false).unwrap();
        for table in STAGING_TABLES {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'", table.name),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "staging table {} should exist", table.name);
        }
    }

    #[test]
    fn test_all_report_tables_created() {
        let conn = open_in_memory().unwrap();
        initialize(&conn, false).unwrap();
        for table in report_tables() {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'", table.name),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "report table {} should exist", table.name);
        }
    }

    #[test]
    fn test_drop_first_leaves_empty_schema() {
        let conn = open_in_memory().unwrap();
        initialize(&conn, false).unwrap();
        conn.execute(
            "INSERT INTO title_type (id, name) VALUES (1, 'movie')",
            [],
        )
        .unwrap();
        initialize(&conn, true).unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM title_type", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
