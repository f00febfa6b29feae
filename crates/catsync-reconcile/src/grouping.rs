//! Duplicate detection over canonical products.
//!
//! Products are partitioned by [`normalize_name`]; a partition with more than
//! one member is a duplicate group. Members are ranked by relation count
//! (descending), then `created_at` (ascending), then `id` (ascending), and
//! the first member survives.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use catsync_core::{normalize_name, CanonicalProduct};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::report::ActionStatus;

/// One ranked member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberScore {
    pub id: String,
    pub name: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// A member marked for removal, with the outcome of its delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub id: String,
    /// Dependent rows at decision time.
    pub relations: i64,
    /// Dependent rows moved onto the survivor when the delete ran.
    pub reassigned: i64,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDecision {
    pub key: String,
    /// Members in rank order; `members[0]` is the survivor.
    pub members: Vec<MemberScore>,
    pub survivor_id: String,
    pub removed: Vec<Removal>,
}

impl GroupDecision {
    pub fn removed_ids(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(|r| r.id.as_str())
    }
}

/// Ranking used to pick the survivor: higher score first, then older, then
/// lexicographically smaller id.
fn rank(a: &CanonicalProduct, b: &CanonicalProduct) -> Ordering {
    b.relations
        .total()
        .cmp(&a.relations.total())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Finds every duplicate group and decides its survivor.
///
/// Pure: nothing is mutated, and the result depends only on the input set
/// (groups are returned ordered by key).
#[must_use]
pub fn find_duplicate_groups(products: &[CanonicalProduct]) -> Vec<GroupDecision> {
    let mut partitions: BTreeMap<String, Vec<&CanonicalProduct>> = BTreeMap::new();
    for product in products {
        partitions
            .entry(normalize_name(&product.name))
            .or_default()
            .push(product);
    }

    partitions
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, mut members)| {
            members.sort_by(|a, b| rank(a, b));
            let survivor_id = members[0].id.clone();
            let removed = members[1..]
                .iter()
                .map(|p| Removal {
                    id: p.id.clone(),
                    relations: p.relations.total(),
                    reassigned: 0,
                    status: ActionStatus::Planned,
                })
                .collect();
            let members = members
                .iter()
                .map(|p| MemberScore {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    score: p.relations.total(),
                    created_at: p.created_at,
                })
                .collect();
            GroupDecision {
                key,
                members,
                survivor_id,
                removed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use catsync_core::RelationCounts;
    use chrono::TimeZone;

    use super::*;

    fn product(id: &str, name: &str, day: u32, orders: i64) -> CanonicalProduct {
        CanonicalProduct {
            id: id.to_string(),
            name: name.to_string(),
            images: Vec::new(),
            description: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            relations: RelationCounts {
                order_items: orders,
                ..RelationCounts::default()
            },
        }
    }

    #[test]
    fn unique_names_form_no_groups() {
        let products = vec![
            product("a", "Muffler: Green", 1, 0),
            product("b", "Muffler: Blue", 2, 0),
        ];
        assert!(find_duplicate_groups(&products).is_empty());
    }

    #[test]
    fn higher_score_beats_older_record() {
        let products = vec![
            product("t1", "Aamvaraah Muffler: Green", 1, 0),
            product("t2", "aamvaraah muffler: green ", 2, 2),
        ];
        let groups = find_duplicate_groups(&products);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "aamvaraah muffler: green");
        assert_eq!(groups[0].survivor_id, "t2");
        assert_eq!(groups[0].removed_ids().collect::<Vec<_>>(), vec!["t1"]);
        assert_eq!(groups[0].removed[0].relations, 0);
    }

    #[test]
    fn zero_relations_keeps_the_oldest() {
        let products = vec![
            product("newest", "Bonsai Pot", 9, 0),
            product("oldest", "bonsai pot", 1, 0),
            product("middle", "BONSAI POT", 5, 0),
        ];
        let groups = find_duplicate_groups(&products);
        assert_eq!(groups[0].survivor_id, "oldest");
        assert_eq!(
            groups[0].removed_ids().collect::<Vec<_>>(),
            vec!["middle", "newest"]
        );
    }

    #[test]
    fn full_tie_falls_back_to_smallest_id() {
        let products = vec![
            product("zeta", "Stole", 3, 1),
            product("alpha", "stole", 3, 1),
        ];
        let groups = find_duplicate_groups(&products);
        assert_eq!(groups[0].survivor_id, "alpha");
    }

    #[test]
    fn survivor_never_has_strictly_lower_score() {
        let products = vec![
            product("a", "Shawl", 1, 0),
            product("b", "shawl", 2, 7),
            product("c", " Shawl", 3, 7),
            product("d", "SHAWL ", 4, 3),
        ];
        let groups = find_duplicate_groups(&products);
        let group = &groups[0];
        let survivor_score = group.members[0].score;
        assert!(group.members.iter().all(|m| m.score <= survivor_score));
        assert_eq!(group.survivor_id, "b");
        assert_eq!(group.removed.len(), 3);
    }

    #[test]
    fn groups_are_ordered_by_key() {
        let products = vec![
            product("1", "Planter", 1, 0),
            product("2", "planter", 2, 0),
            product("3", "Candle", 1, 0),
            product("4", "candle", 2, 0),
        ];
        let keys: Vec<_> = find_duplicate_groups(&products)
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(keys, vec!["candle", "planter"]);
    }
}
