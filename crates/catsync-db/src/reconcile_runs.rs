//! Database operations for `reconcile_runs`.
//!
//! A run moves `queued` -> `running` -> `succeeded` | `failed`. Each
//! transition is guarded on the current status.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `reconcile_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReconcileRunRow {
    pub id: i64,
    /// Same value as the report's run id.
    pub public_id: Uuid,
    pub trigger_source: String,
    pub dry_run: bool,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actions_applied: i32,
    pub actions_failed: i32,
    pub report_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, dry_run, status, started_at, \
     completed_at, actions_applied, actions_failed, report_path, error_message, created_at";

/// Creates a new run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_reconcile_run(
    pool: &PgPool,
    public_id: Uuid,
    trigger_source: &str,
    dry_run: bool,
) -> Result<ReconcileRunRow, DbError> {
    let row = sqlx::query_as::<_, ReconcileRunRow>(&format!(
        "INSERT INTO reconcile_runs (public_id, trigger_source, dry_run, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(trigger_source)
    .bind(dry_run)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_reconcile_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its action counts and report path.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_reconcile_run(
    pool: &PgPool,
    id: i64,
    actions_applied: i32,
    actions_failed: i32,
    report_path: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             actions_applied = $1, actions_failed = $2, report_path = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(actions_applied)
    .bind(actions_failed)
    .bind(report_path)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_reconcile_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    report_path: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reconcile_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1, \
             report_path = COALESCE($2, report_path) \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(error_message)
    .bind(report_path)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_reconcile_run(pool: &PgPool, id: i64) -> Result<ReconcileRunRow, DbError> {
    sqlx::query_as::<_, ReconcileRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM reconcile_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reconcile_runs(pool: &PgPool, limit: i64) -> Result<Vec<ReconcileRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ReconcileRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM reconcile_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
