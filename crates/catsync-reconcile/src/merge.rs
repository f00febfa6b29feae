//! Field-level synchronization rules between an embedded entry and its
//! canonical product.
//!
//! Images flow toward whichever side holds remote URIs; descriptions flow
//! from a non-empty entry description into the catalog, and from the catalog
//! into entries that have none. Every rule returns `None` when the target
//! already holds the value, which is what makes a second run a no-op.

use catsync_core::{has_remote_image, CanonicalProduct, EmbeddedProductEntry};
use serde::Serialize;

/// Whether the two sides disagreed before any merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub images_differ: bool,
    pub description_differs: bool,
}

impl FieldDiff {
    #[must_use]
    pub fn between(entry: &EmbeddedProductEntry, product: &CanonicalProduct) -> Self {
        Self {
            images_differ: entry.image_list() != product.images.as_slice(),
            description_differs: entry.description.as_deref().unwrap_or_default()
                != product.description,
        }
    }
}

/// Images the catalog should take from an entry.
///
/// The entry must hold at least one remote URI, and its list must differ
/// from the catalog's. A remote set is therefore never replaced by a purely
/// local or empty one.
#[must_use]
pub fn canonical_images_from_entry(entry_images: &[String], canonical: &[String]) -> Option<Vec<String>> {
    (has_remote_image(entry_images) && entry_images != canonical).then(|| entry_images.to_vec())
}

/// Description the catalog should take from an entry: a non-blank entry
/// description that differs from the catalog's.
#[must_use]
pub fn canonical_description_from_entry(entry: Option<&str>, canonical: &str) -> Option<String> {
    entry
        .filter(|d| !d.trim().is_empty() && *d != canonical)
        .map(str::to_string)
}

/// Images an entry should take from the catalog: only when the catalog holds
/// remote URIs and the entry holds none.
#[must_use]
pub fn entry_images_from_canonical(entry_images: &[String], canonical: &[String]) -> Option<Vec<String>> {
    (has_remote_image(canonical)
        && !has_remote_image(entry_images)
        && entry_images != canonical)
        .then(|| canonical.to_vec())
}

/// Description an entry should take from the catalog: only when the entry
/// has none and the catalog's is non-blank.
#[must_use]
pub fn entry_description_from_canonical(entry: Option<&str>, canonical: &str) -> Option<String> {
    let entry_blank = entry.is_none_or(|d| d.trim().is_empty());
    (entry_blank && !canonical.trim().is_empty()).then(|| canonical.to_string())
}
