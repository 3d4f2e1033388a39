//! Imdb-Report: the report builder's primitives and special-case pipelines.
//!
//! This crate implements the report builder's core pieces: the two build primitives
//! (key-table interning and natural-to-surrogate mapping), the row-oriented
//! ordered-relation builders used whenever a token may fail to resolve, the
//! `title_principals.characters` JSON interning pipeline, and the greedy
//! `title_akas.types` tag matcher. The fixed build-order DAG that stitches
//! these into the full report schema lives in `imdb-pipeline`, one layer up,
//! because the DAG needs both this crate and `imdb-db`'s schema/staging
//! layer to run transactions against.

pub mod alias_types;
pub mod builder;
pub mod characters;
pub mod relations;

pub use alias_types::AliasTypeMatcher;
pub use builder::{
    build_key_table, build_key_table_from_values, check_row_count_matches, natural_key_map, verify_non_empty,
    DelimiterMode, KeySource,
};
pub use characters::CharactersPipeline;
pub use relations::{
    build_many_to_many_by_explosion, build_ordered_relation_by_explosion, build_title_alias, RelationBuildSummary,
};
