//! Loads the working set from the store and validates journey content.

use catsync_core::{CanonicalProduct, CatalogStore, JourneyDocument, StoreError};

use crate::report::InvalidDocument;

/// Everything a run decides from. Loaded once; never refreshed mid-run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub products: Vec<CanonicalProduct>,
    /// Valid documents, ordered by slug.
    pub documents: Vec<JourneyDocument>,
    pub invalid_documents: Vec<InvalidDocument>,
}

/// Loads all canonical products and journey documents.
///
/// Documents whose content fails validation are set aside as
/// [`InvalidDocument`]s and are never rewritten.
///
/// # Errors
///
/// Returns [`StoreError`] if either load fails; nothing has been mutated at
/// that point.
pub async fn load_snapshot<S: CatalogStore>(store: &mut S) -> Result<Snapshot, StoreError> {
    let products = store.load_canonical_products().await?;
    let raw_documents = store.load_journey_documents().await?;

    let mut documents = Vec::with_capacity(raw_documents.len());
    let mut invalid_documents = Vec::new();

    for raw in raw_documents {
        let slug = raw.slug.clone();
        match JourneyDocument::from_raw(raw) {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "skipping journey with invalid content");
                invalid_documents.push(InvalidDocument {
                    slug,
                    reason: e.to_string(),
                });
            }
        }
    }

    documents.sort_by(|a, b| a.slug.cmp(&b.slug));
    invalid_documents.sort_by(|a, b| a.slug.cmp(&b.slug));

    tracing::info!(
        products = products.len(),
        documents = documents.len(),
        invalid_documents = invalid_documents.len(),
        "loaded reconciliation snapshot"
    );

    Ok(Snapshot {
        products,
        documents,
        invalid_documents,
    })
}
