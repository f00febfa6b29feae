//! `catsync reconcile` and `catsync runs`.
//!
//! Each invocation is tracked as a `reconcile_runs` row and leaves two files
//! in the report directory: `reconcile-<run id>.log` (human-readable) and
//! `reconcile-<run id>.jsonl` (one decision record per line). The files are
//! written even when the apply phase aborts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use catsync_core::CategoryRules;
use catsync_db::PgCatalogStore;
use catsync_reconcile::{reconcile, ReconciliationReport, RunOptions};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct ReconcileArgs {
    pub dry_run: bool,
    pub reassign_relations: bool,
    pub report_dir: PathBuf,
}

async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    message: &str,
    report_path: Option<&str>,
) {
    if let Err(mark_err) =
        catsync_db::fail_reconcile_run(pool, run_id, message, report_path).await
    {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark reconcile run as failed"
        );
    }
}

/// Paths of the two files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReportPaths {
    pub log: PathBuf,
    pub records: PathBuf,
}

pub(crate) fn report_paths(dir: &Path, run_id: Uuid) -> ReportPaths {
    ReportPaths {
        log: dir.join(format!("reconcile-{run_id}.log")),
        records: dir.join(format!("reconcile-{run_id}.jsonl")),
    }
}

/// Writes the text log and the decision records for `report` into `dir`,
/// creating the directory if needed.
pub(crate) fn write_report_files(
    dir: &Path,
    report: &ReconciliationReport,
) -> anyhow::Result<ReportPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;

    let paths = report_paths(dir, report.run_id);
    std::fs::write(&paths.log, report.to_string())
        .with_context(|| format!("writing {}", paths.log.display()))?;
    std::fs::write(&paths.records, report.to_json_lines()?)
        .with_context(|| format!("writing {}", paths.records.display()))?;

    Ok(paths)
}

fn clamp_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Run one reconciliation against the database and record it.
///
/// # Errors
///
/// Returns an error if the run row cannot be created, the snapshot cannot be
/// loaded, the report files cannot be written, or the apply phase aborted on
/// a store failure. Failed individual actions do not make the run fail.
pub(crate) async fn run_reconcile(
    pool: &sqlx::PgPool,
    rules: &CategoryRules,
    args: &ReconcileArgs,
) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    let run = catsync_db::create_reconcile_run(pool, run_id, "cli", args.dry_run).await?;
    if let Err(e) = catsync_db::start_reconcile_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, &format!("{e:#}"), None).await;
        return Err(e.into());
    }

    let mut store = PgCatalogStore::new(pool.clone());
    let options = RunOptions {
        run_id,
        dry_run: args.dry_run,
        reassign_relations: args.reassign_relations,
    };
    let report = match reconcile(&mut store, rules, options).await {
        Ok(report) => report,
        Err(e) => {
            let message = format!("{e:#}");
            let aborted = ReconciliationReport::aborted_before_planning(
                run_id,
                args.dry_run,
                message.clone(),
            );
            let log_path = match write_report_files(&args.report_dir, &aborted) {
                Ok(paths) => Some(paths.log.display().to_string()),
                Err(write_err) => {
                    tracing::error!(error = %write_err, "failed to write report for aborted run");
                    None
                }
            };
            fail_run_best_effort(pool, run.id, &message, log_path.as_deref()).await;
            return Err(anyhow::Error::new(e).context("loading catalog snapshot"));
        }
    };

    let paths = match write_report_files(&args.report_dir, &report) {
        Ok(paths) => paths,
        Err(e) => {
            fail_run_best_effort(pool, run.id, &format!("{e:#}"), None).await;
            return Err(e);
        }
    };
    let log_path = paths.log.display().to_string();

    let summary = report.summary();
    println!(
        "{}run {run_id}: {} duplicate groups, {} catalog updates, {} journey rewrites, \
         {} orphans, {} ambiguous, {} uncategorized",
        if args.dry_run { "dry-run " } else { "" },
        summary.duplicate_groups,
        summary.product_updates,
        summary.document_rewrites,
        summary.orphans,
        summary.ambiguous,
        summary.uncategorized,
    );
    println!(
        "actions: {} applied, {} failed, {} planned",
        summary.applied, summary.failed, summary.planned
    );
    println!("report: {log_path}");
    println!("records: {}", paths.records.display());

    if let Some(reason) = &report.aborted {
        fail_run_best_effort(pool, run.id, reason, Some(&log_path)).await;
        anyhow::bail!("reconciliation aborted: {reason}");
    }

    if let Err(err) = catsync_db::complete_reconcile_run(
        pool,
        run.id,
        clamp_count(summary.applied),
        clamp_count(summary.failed),
        Some(&log_path),
    )
    .await
    {
        fail_run_best_effort(pool, run.id, &format!("{err:#}"), Some(&log_path)).await;
        return Err(err.into());
    }

    if summary.failed > 0 {
        tracing::warn!(
            failed = summary.failed,
            "some actions failed; see the run report"
        );
    }
    Ok(())
}

/// Print the most recent reconciliation runs.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = catsync_db::list_reconcile_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no reconciliation runs recorded");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<9}  {}  applied={} failed={}  {}",
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.status,
            if run.dry_run { "dry-run" } else { "write  " },
            run.actions_applied,
            run.actions_failed,
            run.error_message
                .as_deref()
                .or(run.report_path.as_deref())
                .unwrap_or("-"),
        );
    }
    Ok(())
}
