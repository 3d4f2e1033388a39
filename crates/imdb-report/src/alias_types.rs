//! Greedy matcher for `title_akas.types`, a whitespace-joined soup of
//! enumerated tags and occasional garbage that IMDb never documented a
//! strict grammar for.

use std::collections::{HashMap, HashSet};

use imdb_common::IMDB_ALIAS_TYPES;

/// Matches a raw `types` string against the closed [`IMDB_ALIAS_TYPES`] list,
/// memoizing per distinct raw value and warning once per distinct unmatched
/// residual.
#[derive(Debug, Default)]
pub struct AliasTypeMatcher {
    cache: HashMap<String, Vec<&'static str>>,
    warned_residuals: HashSet<String>,
}

impl AliasTypeMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the recognized tags present in `raw`, ordered by where each
    /// tag first appears in the string (not by the enumerated list's order).
    /// Any leftover text after every tag is stripped out is recorded as an
    /// unknown residual and logged the first time it's seen.
    pub fn match_tags(&mut self, raw: &str) -> Vec<&'static str> {
        if let Some(cached) = self.cache.get(raw) {
            return cached.clone();
        }

        let mut residual = raw.to_string();
        let mut positioned: Vec<(usize, &'static str)> = Vec::new();
        for &tag in IMDB_ALIAS_TYPES.iter() {
            if let Some(pos) = raw.find(tag) {
                positioned.push((pos, tag));
                if let Some(hit) = residual.find(tag) {
                    residual.replace_range(hit..hit + tag.len(), "");
                }
            }
        }
        positioned.sort_by_key(|&(pos, _)| pos);
        let matched: Vec<&'static str> = positioned.into_iter().map(|(_, tag)| tag).collect();

        let residual: String = residual.split_whitespace().collect::<Vec<_>>().join(" ");
        if !residual.is_empty() && self.warned_residuals.insert(residual.clone()) {
            tracing::warn!(residual = %residual, raw = %raw, "unrecognized title_akas.types residual");
        }

        self.cache.insert(raw.to_string(), matched.clone());
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_tags_in_occurrence_order() {
        let mut matcher = AliasTypeMatcher::new();
        let tags = matcher.match_tags("imdbDisplay original garbage");
        assert_eq!(tags, vec!["imdbDisplay", "original"]);
    }

    #[test]
    fn test_preserves_enumerated_order_when_string_order_matches() {
        let mut matcher = AliasTypeMatcher::new();
        let tags = matcher.match_tags("alternative working");
        assert_eq!(tags, vec!["alternative", "working"]);
    }

    #[test]
    fn test_no_recognized_tags_yields_empty_and_warns_once() {
        let mut matcher = AliasTypeMatcher::new();
        assert!(matcher.match_tags("nonsense").is_empty());
        assert!(matcher.match_tags("nonsense").is_empty());
        assert_eq!(matcher.warned_residuals.len(), 1);
    }

    #[test]
    fn test_results_are_memoized() {
        let mut matcher = AliasTypeMatcher::new();
        let first = matcher.match_tags("tv dvd");
        assert_eq!(matcher.cache.len(), 1);
        let second = matcher.match_tags("tv dvd");
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_tags_recognized_leaves_no_residual() {
        let mut matcher = AliasTypeMatcher::new();
        let tags = matcher.match_tags("original");
        assert_eq!(tags, vec!["original"]);
        assert!(matcher.warned_residuals.is_empty());
    }
}
