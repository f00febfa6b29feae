//! Resolution of embedded entries to canonical products.
//!
//! Candidates are the canonical products that survive deduplication; records
//! planned for removal are never returned as a match.

use std::collections::HashMap;

use catsync_core::{normalize_name, CanonicalProduct, EmbeddedProductEntry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    MatchedById { product_id: String },
    MatchedByName { product_id: String },
    /// The entry's id named a duplicate planned for removal and its name
    /// matched nothing; it resolves to that duplicate's survivor.
    MatchedByRedirect {
        product_id: String,
        removed_id: String,
    },
    Ambiguous { candidates: Vec<String> },
    Orphan,
}

impl MatchOutcome {
    /// The canonical product this entry resolves to, if any.
    #[must_use]
    pub fn product_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::MatchedById { product_id }
            | MatchOutcome::MatchedByName { product_id }
            | MatchOutcome::MatchedByRedirect { product_id, .. } => Some(product_id),
            MatchOutcome::Ambiguous { .. } | MatchOutcome::Orphan => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::MatchedById { .. } => "matched-by-id",
            MatchOutcome::MatchedByName { .. } => "matched-by-name",
            MatchOutcome::MatchedByRedirect { .. } => "matched-by-redirect",
            MatchOutcome::Ambiguous { .. } => "ambiguous",
            MatchOutcome::Orphan => "orphan",
        }
    }
}

/// Lookup tables over the surviving canonical products.
pub struct CandidateIndex<'a> {
    by_id: HashMap<&'a str, &'a CanonicalProduct>,
    by_key: HashMap<String, Vec<&'a CanonicalProduct>>,
    redirects: &'a HashMap<String, String>,
}

impl<'a> CandidateIndex<'a> {
    /// Builds the index from all products, skipping every id that is a key
    /// of `redirects` (removed id to survivor id).
    #[must_use]
    pub fn new(products: &'a [CanonicalProduct], redirects: &'a HashMap<String, String>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key: HashMap<String, Vec<&CanonicalProduct>> = HashMap::new();

        for product in products
            .iter()
            .filter(|p| !redirects.contains_key(&p.id))
        {
            by_id.insert(product.id.as_str(), product);
            by_key
                .entry(normalize_name(&product.name))
                .or_default()
                .push(product);
        }

        for candidates in by_key.values_mut() {
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
        }

        Self {
            by_id,
            by_key,
            redirects,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a CanonicalProduct> {
        self.by_id.get(id).copied()
    }

    /// Resolves an entry: exact id first, then normalized name, then a
    /// redirect from a removed duplicate. Anything else is an orphan.
    #[must_use]
    pub fn match_entry(&self, entry: &EmbeddedProductEntry) -> MatchOutcome {
        if let Some(product) = self.by_id.get(entry.id.as_str()) {
            return MatchOutcome::MatchedById {
                product_id: product.id.clone(),
            };
        }

        if let Some(candidates) = self.by_key.get(&normalize_name(&entry.name)) {
            match candidates.as_slice() {
                [only] => {
                    return MatchOutcome::MatchedByName {
                        product_id: only.id.clone(),
                    }
                }
                [] => {}
                many => {
                    return MatchOutcome::Ambiguous {
                        candidates: many.iter().map(|p| p.id.clone()).collect(),
                    }
                }
            }
        }

        if let Some(survivor) = self.redirects.get(&entry.id) {
            return MatchOutcome::MatchedByRedirect {
                product_id: survivor.clone(),
                removed_id: entry.id.clone(),
            };
        }

        MatchOutcome::Orphan
    }
}

#[cfg(test)]
mod tests {
    use catsync_core::RelationCounts;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    use super::*;

    fn product(id: &str, name: &str) -> CanonicalProduct {
        CanonicalProduct {
            id: id.to_string(),
            name: name.to_string(),
            images: Vec::new(),
            description: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            relations: RelationCounts::default(),
        }
    }

    fn entry(id: &str, name: &str) -> EmbeddedProductEntry {
        EmbeddedProductEntry {
            id: id.to_string(),
            name: name.to_string(),
            images: None,
            description: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn id_match_short_circuits_name() {
        let products = vec![product("p1", "Muffler"), product("p2", "Stole")];
        let redirects = HashMap::new();
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("p1", "Stole")),
            MatchOutcome::MatchedById {
                product_id: "p1".to_string()
            }
        );
    }

    #[test]
    fn unresolved_id_falls_back_to_normalized_name() {
        let products = vec![product("cuid-1", "aamvaraah muffler: green ")];
        let redirects = HashMap::new();
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("muffler-green-ec", "Aamvaraah Muffler: Green")),
            MatchOutcome::MatchedByName {
                product_id: "cuid-1".to_string()
            }
        );
    }

    #[test]
    fn substring_names_do_not_match() {
        let products = vec![product("p1", "Aamvaraah Muffler: Green")];
        let redirects = HashMap::new();
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("x", "Aamvaraah Muffler")),
            MatchOutcome::Orphan
        );
    }

    #[test]
    fn unknown_entry_is_orphan() {
        let products = vec![product("p1", "Muffler")];
        let redirects = HashMap::new();
        let index = CandidateIndex::new(&products, &redirects);
        let outcome = index.match_entry(&entry("widget", "Unknown Widget"));
        assert_eq!(outcome, MatchOutcome::Orphan);
        assert!(outcome.product_id().is_none());
    }

    #[test]
    fn removed_records_are_never_matched() {
        let products = vec![product("loser", "Bonsai"), product("winner", "bonsai ")];
        let redirects = HashMap::from([("loser".to_string(), "winner".to_string())]);
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("loser", "Bonsai")),
            MatchOutcome::MatchedByName {
                product_id: "winner".to_string()
            }
        );
        assert!(index.get("loser").is_none());
    }

    #[test]
    fn removed_id_with_unmatched_name_redirects_to_survivor() {
        let products = vec![product("loser", "Bonsai"), product("winner", "bonsai ")];
        let redirects = HashMap::from([("loser".to_string(), "winner".to_string())]);
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("loser", "Bonsai (old listing)")),
            MatchOutcome::MatchedByRedirect {
                product_id: "winner".to_string(),
                removed_id: "loser".to_string(),
            }
        );
    }

    #[test]
    fn several_name_candidates_are_ambiguous() {
        let products = vec![product("b", "Candle"), product("a", "candle")];
        let redirects = HashMap::new();
        let index = CandidateIndex::new(&products, &redirects);
        assert_eq!(
            index.match_entry(&entry("zzz", "CANDLE")),
            MatchOutcome::Ambiguous {
                candidates: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn matching_is_deterministic() {
        let products = vec![product("b", "Candle"), product("a", "candle"), product("c", "Shawl")];
        let redirects = HashMap::new();
        let entries = vec![entry("zzz", "CANDLE"), entry("c", "x"), entry("q", "shawl")];
        let first: Vec<_> = {
            let index = CandidateIndex::new(&products, &redirects);
            entries.iter().map(|e| index.match_entry(e)).collect()
        };
        for _ in 0..5 {
            let index = CandidateIndex::new(&products, &redirects);
            let again: Vec<_> = entries.iter().map(|e| index.match_entry(e)).collect();
            assert_eq!(again, first);
        }
    }
}
