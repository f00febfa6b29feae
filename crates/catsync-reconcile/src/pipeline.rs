//! One reconciliation run: load, plan, apply.

use catsync_core::{CatalogStore, CategoryRules, StoreError};
use uuid::Uuid;

use crate::apply::{apply_plan, ApplyOptions};
use crate::loader::load_snapshot;
use crate::plan::plan_reconciliation;
use crate::report::ReconciliationReport;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub reassign_relations: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dry_run: false,
            reassign_relations: false,
        }
    }
}

/// Runs the full pipeline against `store`.
///
/// All decisions are computed from a single snapshot before the first
/// mutation is issued. The returned report marks which actions were applied,
/// which failed, and which remain planned (dry run or aborted apply).
///
/// # Errors
///
/// Returns [`StoreError`] only if loading the snapshot fails, in which case
/// nothing was written.
pub async fn reconcile<S: CatalogStore>(
    store: &mut S,
    rules: &CategoryRules,
    options: RunOptions,
) -> Result<ReconciliationReport, StoreError> {
    let snapshot = load_snapshot(store).await?;
    let mut report = plan_reconciliation(&snapshot, rules, options.run_id, options.dry_run);

    apply_plan(
        store,
        &mut report,
        ApplyOptions {
            reassign_relations: options.reassign_relations,
        },
    )
    .await;

    let summary = report.summary();
    tracing::info!(
        run_id = %report.run_id,
        dry_run = report.dry_run,
        applied = summary.applied,
        failed = summary.failed,
        planned = summary.planned,
        orphans = summary.orphans,
        "reconciliation finished"
    );

    Ok(report)
}
