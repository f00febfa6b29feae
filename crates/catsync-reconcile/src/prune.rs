//! Removal of repeated ids inside a single bucket.

use std::collections::HashMap;

use catsync_core::{Bucket, EmbeddedProductEntry};
use serde::Serialize;

/// An entry dropped because an earlier entry in the same bucket has its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunedEntry {
    pub bucket: Bucket,
    /// Position of the dropped entry in the original bucket.
    pub index: usize,
    pub id: String,
    pub name: String,
    /// Position of the kept entry it duplicated.
    pub duplicate_of: usize,
}

/// Keeps the first entry for every id and drops later repeats, preserving
/// the relative order of the survivors.
///
/// Keyed on `id` only: two entries with the same display name but
/// different ids are both kept.
#[must_use]
pub fn prune_duplicate_ids(
    bucket: Bucket,
    entries: Vec<EmbeddedProductEntry>,
) -> (Vec<EmbeddedProductEntry>, Vec<PrunedEntry>) {
    let mut first_seen: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut kept = Vec::with_capacity(entries.len());
    let mut pruned = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        if let Some(&duplicate_of) = first_seen.get(&entry.id) {
            pruned.push(PrunedEntry {
                bucket,
                index,
                id: entry.id,
                name: entry.name,
                duplicate_of,
            });
        } else {
            first_seen.insert(entry.id.clone(), index);
            kept.push(entry);
        }
    }

    (kept, pruned)
}
