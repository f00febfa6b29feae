//! Issues the mutations of a finished plan against the store.
//!
//! Deletes run first, then catalog updates, then journey rewrites. An
//! integrity refusal fails only its own action; a backend failure stops the
//! phase and leaves every remaining action `planned`.

use catsync_core::{CatalogStore, StoreError};
use chrono::Utc;

use crate::report::{ActionStatus, ReconciliationReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Move dependent rows to the survivor before deleting a duplicate.
    pub reassign_relations: bool,
}

/// Applies every planned action in `report`, recording each outcome in
/// place. Dry-run reports are only stamped as finished.
pub async fn apply_plan<S: CatalogStore>(
    store: &mut S,
    report: &mut ReconciliationReport,
    options: ApplyOptions,
) {
    if !report.dry_run {
        if let Err(e) = apply_actions(store, report, options).await {
            tracing::error!(run_id = %report.run_id, error = %e, "apply phase aborted");
            report.aborted = Some(e.to_string());
        }
    }
    report.finished_at = Some(Utc::now());
}

fn record_failure(status: &mut ActionStatus, err: StoreError) -> Result<(), StoreError> {
    if err.is_fatal() {
        return Err(err);
    }
    *status = ActionStatus::Failed {
        reason: err.to_string(),
    };
    Ok(())
}

async fn apply_actions<S: CatalogStore>(
    store: &mut S,
    report: &mut ReconciliationReport,
    options: ApplyOptions,
) -> Result<(), StoreError> {
    for group in &mut report.groups {
        let reassign_to = options.reassign_relations.then_some(group.survivor_id.as_str());
        for removal in &mut group.removed {
            if removal.status != ActionStatus::Planned {
                continue;
            }
            match store.delete_canonical_product(&removal.id, reassign_to).await {
                Ok(moved) => {
                    tracing::info!(
                        group = %group.key,
                        product = %removal.id,
                        survivor = %group.survivor_id,
                        reassigned = moved,
                        "deleted duplicate product"
                    );
                    removal.reassigned = moved;
                    removal.status = ActionStatus::Applied;
                }
                Err(e) => {
                    tracing::error!(
                        group = %group.key,
                        product = %removal.id,
                        error = %e,
                        "duplicate product not deleted"
                    );
                    record_failure(&mut removal.status, e)?;
                }
            }
        }
    }

    for update in &mut report.product_updates {
        if update.status != ActionStatus::Planned {
            continue;
        }
        match store
            .update_canonical_product(&update.product_id, &update.patch)
            .await
        {
            Ok(()) => {
                tracing::info!(product = %update.product_id, "updated catalog product");
                update.status = ActionStatus::Applied;
            }
            Err(e) => {
                tracing::error!(product = %update.product_id, error = %e, "catalog update failed");
                record_failure(&mut update.status, e)?;
            }
        }
    }

    for document in &mut report.documents {
        let (Some(status), Some(content)) = (document.rewrite.as_mut(), document.new_content.as_ref())
        else {
            continue;
        };
        if *status != ActionStatus::Planned {
            continue;
        }

        let value = match content.to_value() {
            Ok(value) => value,
            Err(e) => {
                *status = ActionStatus::Failed {
                    reason: format!("content serialization failed: {e}"),
                };
                continue;
            }
        };

        match store.replace_journey_content(&document.slug, &value).await {
            Ok(()) => {
                tracing::info!(
                    slug = %document.slug,
                    pruned = document.pruned.len(),
                    "rewrote journey content"
                );
                *status = ActionStatus::Applied;
            }
            Err(e) => {
                tracing::error!(slug = %document.slug, error = %e, "journey rewrite failed");
                record_failure(status, e)?;
            }
        }
    }

    Ok(())
}
