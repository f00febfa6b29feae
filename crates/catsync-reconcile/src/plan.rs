//! Computes every decision of a run from a snapshot, before anything is
//! written.
//!
//! Order inside the plan: duplicate groups are decided first, so matching
//! only ever sees survivors; entries are then resolved and their ids
//! repaired; the catalog's new field values are chosen; finally each bucket
//! is corrected against those values and pruned of repeated ids.

use std::collections::{BTreeMap, HashMap, HashSet};

use catsync_core::{
    has_remote_image, Bucket, CategoryRules, Category, EmbeddedProductEntry, JourneyDocument,
    ProductPatch,
};
use chrono::Utc;
use uuid::Uuid;

use crate::grouping::find_duplicate_groups;
use crate::loader::Snapshot;
use crate::matching::{CandidateIndex, MatchOutcome};
use crate::merge::{
    canonical_description_from_entry, canonical_images_from_entry,
    entry_description_from_canonical, entry_images_from_canonical, FieldDiff,
};
use crate::prune::prune_duplicate_ids;
use crate::report::{
    ActionStatus, DocumentReport, EntryAction, EntryRef, EntryReport, ProductUpdate,
    ReconciliationReport, UncategorizedProduct,
};

/// First eligible entry offering each field for one canonical product.
#[derive(Default)]
struct Sources {
    images: Option<(EntryRef, Vec<String>)>,
    description: Option<(EntryRef, String)>,
}

/// An entry's resolution, and whether it survives pruning.
struct Resolved {
    outcome: MatchOutcome,
    kept: bool,
}

/// Builds the full plan for `snapshot`. Every action in the returned report
/// is [`ActionStatus::Planned`].
#[must_use]
pub fn plan_reconciliation(
    snapshot: &Snapshot,
    rules: &CategoryRules,
    run_id: Uuid,
    dry_run: bool,
) -> ReconciliationReport {
    let started_at = Utc::now();

    let groups = find_duplicate_groups(&snapshot.products);
    let redirects: HashMap<String, String> = groups
        .iter()
        .flat_map(|g| {
            g.removed
                .iter()
                .map(|r| (r.id.clone(), g.survivor_id.clone()))
        })
        .collect();
    for group in &groups {
        tracing::info!(
            group = %group.key,
            survivor = %group.survivor_id,
            removed = group.removed.len(),
            "duplicate group"
        );
    }

    let index = CandidateIndex::new(&snapshot.products, &redirects);

    let mut sources: BTreeMap<String, Sources> = BTreeMap::new();
    let resolved: Vec<Vec<Vec<Resolved>>> = snapshot
        .documents
        .iter()
        .map(|document| resolve_document(document, &index, &mut sources))
        .collect();

    let product_updates = plan_product_updates(&index, &sources);
    let updates_by_id: HashMap<&str, &ProductUpdate> = product_updates
        .iter()
        .map(|u| (u.product_id.as_str(), u))
        .collect();

    let documents = snapshot
        .documents
        .iter()
        .zip(resolved)
        .map(|(document, resolved)| plan_document(document, resolved, &index, &updates_by_id))
        .collect();

    let uncategorized = snapshot
        .products
        .iter()
        .filter(|p| !redirects.contains_key(&p.id))
        .filter(|p| rules.classify(&p.name) == Category::Uncategorized)
        .map(|p| {
            tracing::warn!(product = %p.id, name = %p.name, "no category rule matches product");
            UncategorizedProduct {
                product_id: p.id.clone(),
                name: p.name.clone(),
            }
        })
        .collect();

    ReconciliationReport {
        run_id,
        started_at,
        finished_at: None,
        dry_run,
        groups,
        product_updates,
        documents,
        invalid_documents: snapshot.invalid_documents.clone(),
        uncategorized,
        aborted: None,
    }
}

/// Resolves every entry of a document and records the first eligible
/// image/description source per matched product.
fn resolve_document(
    document: &JourneyDocument,
    index: &CandidateIndex<'_>,
    sources: &mut BTreeMap<String, Sources>,
) -> Vec<Vec<Resolved>> {
    Bucket::ALL
        .iter()
        .map(|&bucket| {
            let mut seen_ids: HashSet<String> = HashSet::new();
            let mut resolved = Vec::new();

            for (position, entry) in document.content.bucket(bucket).iter().enumerate() {
                let outcome = index.match_entry(entry);
                let final_id = outcome.product_id().unwrap_or(&entry.id).to_string();
                let kept = seen_ids.insert(final_id);

                match &outcome {
                    MatchOutcome::Orphan => tracing::warn!(
                        slug = %document.slug,
                        bucket = %bucket,
                        index = position,
                        name = %entry.name,
                        "embedded entry has no canonical product"
                    ),
                    MatchOutcome::Ambiguous { candidates } => tracing::warn!(
                        slug = %document.slug,
                        bucket = %bucket,
                        index = position,
                        name = %entry.name,
                        candidates = ?candidates,
                        "embedded entry matches several canonical products by name"
                    ),
                    _ => tracing::debug!(
                        slug = %document.slug,
                        bucket = %bucket,
                        index = position,
                        outcome = outcome.label(),
                        "embedded entry resolved"
                    ),
                }

                if let (true, Some(product_id)) = (kept, outcome.product_id()) {
                    let at = EntryRef {
                        slug: document.slug.clone(),
                        bucket,
                        index: position,
                    };
                    let source = sources.entry(product_id.to_string()).or_default();
                    if source.images.is_none() && has_remote_image(entry.image_list()) {
                        source.images = Some((at.clone(), entry.image_list().to_vec()));
                    }
                    if source.description.is_none() {
                        if let Some(description) = entry.non_empty_description() {
                            source.description = Some((at, description.to_string()));
                        }
                    }
                }

                resolved.push(Resolved { outcome, kept });
            }

            resolved
        })
        .collect()
}

fn plan_product_updates(
    index: &CandidateIndex<'_>,
    sources: &BTreeMap<String, Sources>,
) -> Vec<ProductUpdate> {
    let mut updates = Vec::new();

    for (product_id, source) in sources {
        let Some(product) = index.get(product_id) else {
            continue;
        };

        let mut patch = ProductPatch::default();
        let mut image_source = None;
        let mut description_source = None;

        if let Some((at, images)) = &source.images {
            if let Some(images) = canonical_images_from_entry(images, &product.images) {
                patch.images = Some(images);
                image_source = Some(at.clone());
            }
        }
        if let Some((at, description)) = &source.description {
            if let Some(description) =
                canonical_description_from_entry(Some(description.as_str()), &product.description)
            {
                patch.description = Some(description);
                description_source = Some(at.clone());
            }
        }

        if !patch.is_empty() {
            tracing::info!(
                product = %product_id,
                images = patch.images.is_some(),
                description = patch.description.is_some(),
                "catalog update planned"
            );
            updates.push(ProductUpdate {
                product_id: product_id.clone(),
                patch,
                image_source,
                description_source,
                status: ActionStatus::Planned,
            });
        }
    }

    updates
}

fn plan_document(
    document: &JourneyDocument,
    resolved: Vec<Vec<Resolved>>,
    index: &CandidateIndex<'_>,
    updates: &HashMap<&str, &ProductUpdate>,
) -> DocumentReport {
    let mut content = document.content.clone();
    let mut entries = Vec::new();
    let mut pruned = Vec::new();

    for (&bucket, resolved) in Bucket::ALL.iter().zip(resolved) {
        let original = document.content.bucket(bucket);
        let mut rewritten = Vec::with_capacity(original.len());

        for ((position, entry), resolved) in original.iter().enumerate().zip(resolved) {
            let at = EntryRef {
                slug: document.slug.clone(),
                bucket,
                index: position,
            };
            let product = resolved.outcome.product_id().and_then(|id| index.get(id));
            let mut new_entry = entry.clone();
            let mut actions = Vec::new();

            if let Some(product) = product {
                if entry.id != product.id {
                    actions.push(EntryAction::IdRewritten {
                        from: entry.id.clone(),
                        to: product.id.clone(),
                    });
                    new_entry.id.clone_from(&product.id);
                }

                if resolved.kept {
                    let update = updates.get(product.id.as_str()).copied();
                    let images = update
                        .and_then(|u| u.patch.images.as_deref())
                        .unwrap_or(&product.images);
                    let description = update
                        .and_then(|u| u.patch.description.as_deref())
                        .unwrap_or(&product.description);
                    sync_entry(&mut new_entry, entry, &at, update, images, description, &mut actions);
                }
            }

            entries.push(EntryReport {
                bucket,
                index: position,
                entry_id: entry.id.clone(),
                name: entry.name.clone(),
                diff: product.map(|p| FieldDiff::between(entry, p)),
                outcome: resolved.outcome,
                actions,
            });
            rewritten.push(new_entry);
        }

        let (kept, bucket_pruned) = prune_duplicate_ids(bucket, rewritten);
        for p in &bucket_pruned {
            tracing::info!(
                slug = %document.slug,
                bucket = %bucket,
                index = p.index,
                duplicate_of = p.duplicate_of,
                id = %p.id,
                "duplicate entry pruned"
            );
        }
        pruned.extend(bucket_pruned);
        content.set_bucket(bucket, kept);
    }

    let needs_rewrite = content != document.content;
    DocumentReport {
        slug: document.slug.clone(),
        entries,
        pruned,
        rewrite: needs_rewrite.then_some(ActionStatus::Planned),
        new_content: needs_rewrite.then_some(content),
    }
}

/// Corrects one surviving entry against the catalog's post-merge values.
fn sync_entry(
    new_entry: &mut EmbeddedProductEntry,
    entry: &EmbeddedProductEntry,
    at: &EntryRef,
    update: Option<&ProductUpdate>,
    images: &[String],
    description: &str,
    actions: &mut Vec<EntryAction>,
) {
    let supplied_images = update.is_some_and(|u| u.image_source.as_ref() == Some(at));
    let supplied_description = update.is_some_and(|u| u.description_source.as_ref() == Some(at));

    if supplied_images {
        actions.push(EntryAction::SuppliedImages);
    } else if let Some(replacement) = entry_images_from_canonical(entry.image_list(), images) {
        new_entry.images = Some(replacement);
        actions.push(EntryAction::ImagesFromCanonical);
    } else if has_remote_image(entry.image_list()) && entry.image_list() != images {
        actions.push(EntryAction::ImageConflict);
    }

    if supplied_description {
        actions.push(EntryAction::SuppliedDescription);
    } else if let Some(replacement) =
        entry_description_from_canonical(entry.description.as_deref(), description)
    {
        new_entry.description = Some(replacement);
        actions.push(EntryAction::DescriptionFromCanonical);
    } else if entry
        .non_empty_description()
        .is_some_and(|d| d != description)
    {
        actions.push(EntryAction::DescriptionConflict);
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
