//! Interning for `title_principals.characters`, IMDb's JSON-encoded array of
//! character names carried by acting credits.
//!
//! Character id `1` is reserved for the empty-string sentinel so that a
//! principal row with no named character (or a row whose `characters` column
//! is the null sentinel) can still resolve to a character id when needed by
//! a caller, without colliding with a real, empty-string character name.

use std::collections::HashMap;

use imdb_common::Result;

const EMPTY_CHARACTER_ID: i64 = 1;

/// Assigns dense surrogate ids to distinct character names as they're
/// encountered, starting from [`EMPTY_CHARACTER_ID`] + 1.
pub struct CharactersPipeline {
    ids_by_name: HashMap<String, i64>,
    next_id: i64,
}

impl Default for CharactersPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CharactersPipeline {
    #[must_use]
    pub fn new() -> Self {
        let mut ids_by_name = HashMap::new();
        ids_by_name.insert(String::new(), EMPTY_CHARACTER_ID);
        Self { ids_by_name, next_id: EMPTY_CHARACTER_ID + 1 }
    }

    /// Decode one `characters` JSON literal and intern each name, returning
    /// the literal's members as `(ordering, character_id)` pairs in array
    /// order, 1-based.
    pub fn intern(&mut self, characters_json: &str) -> Result<Vec<(i64, i64)>> {
        let names = imdb_tsv::parse_json_string_array(characters_json)?;
        let mut pairs = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let id = *self.ids_by_name.entry(name).or_insert_with(|| {
                let id = self.next_id;
                self.next_id += 1;
                id
            });
            pairs.push(((index + 1) as i64, id));
        }
        Ok(pairs)
    }

    /// All interned `(character_id, name)` pairs, including the sentinel.
    #[must_use]
    pub fn character_rows(&self) -> Vec<(i64, &str)> {
        let mut rows: Vec<(i64, &str)> = self.ids_by_name.iter().map(|(name, &id)| (id, name.as_str())).collect();
        rows.sort_by_key(|&(id, _)| id);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_is_preseeded_at_id_one() {
        let pipeline = CharactersPipeline::new();
        let rows = pipeline.character_rows();
        assert_eq!(rows, vec![(1, "")]);
    }

    #[test]
    fn test_distinct_names_get_distinct_ids() {
        let mut pipeline = CharactersPipeline::new();
        let pairs = pipeline.intern(r#"["Self","Narrator"]"#).unwrap();
        assert_eq!(pairs, vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn test_repeated_name_across_literals_reuses_id() {
        let mut pipeline = CharactersPipeline::new();
        pipeline.intern(r#"["Self"]"#).unwrap();
        let pairs = pipeline.intern(r#"["Narrator","Self"]"#).unwrap();
        assert_eq!(pairs, vec![(1, 3), (2, 2)]);
    }

    #[test]
    fn test_empty_array_yields_no_pairs() {
        let mut pipeline = CharactersPipeline::new();
        let pairs = pipeline.intern("[]").unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let mut pipeline = CharactersPipeline::new();
        assert!(pipeline.intern("not json").is_err());
    }
}
