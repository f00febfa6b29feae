//! Database operations for `journeys`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `journeys` table. `content` is returned unvalidated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JourneyRow {
    pub slug: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns every journey ordered by `slug`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_journeys(pool: &PgPool) -> Result<Vec<JourneyRow>, DbError> {
    let rows = sqlx::query_as::<_, JourneyRow>(
        "SELECT slug, content, created_at, updated_at FROM journeys ORDER BY slug",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single journey by `slug`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn get_journey(pool: &PgPool, slug: &str) -> Result<JourneyRow, DbError> {
    sqlx::query_as::<_, JourneyRow>(
        "SELECT slug, content, created_at, updated_at FROM journeys WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Replaces the whole `content` document of a journey.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// update fails.
pub async fn replace_journey_content(
    pool: &PgPool,
    slug: &str,
    content: &Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE journeys SET content = $1, updated_at = NOW() WHERE slug = $2",
    )
    .bind(content)
    .bind(slug)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
