//! Database operations for `products` and the tables that reference them.

use catsync_core::{CanonicalProduct, RelationCounts};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// Tables holding a `product_id` foreign key into `products`.
pub const RELATION_TABLES: [&str; 4] = [
    "product_variations",
    "combo_items",
    "cart_items",
    "order_items",
];

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table, with the number of rows in each
/// relation table that point at it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CanonicalProductRow {
    pub id: String,
    pub name: String,
    pub images: Vec<String>,
    pub description: String,
    /// `NULL` until `catsync categorize --apply` has run.
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub variation_count: i64,
    pub combo_item_count: i64,
    pub cart_item_count: i64,
    pub order_item_count: i64,
}

impl From<CanonicalProductRow> for CanonicalProduct {
    fn from(row: CanonicalProductRow) -> Self {
        CanonicalProduct {
            id: row.id,
            name: row.name,
            images: row.images,
            description: row.description,
            created_at: row.created_at,
            relations: RelationCounts {
                variations: row.variation_count,
                combo_items: row.combo_item_count,
                cart_items: row.cart_item_count,
                order_items: row.order_item_count,
            },
        }
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.images, p.description, p.category, \
     p.created_at, p.updated_at, \
     (SELECT COUNT(*) FROM product_variations r WHERE r.product_id = p.id) AS variation_count, \
     (SELECT COUNT(*) FROM combo_items r WHERE r.product_id = p.id) AS combo_item_count, \
     (SELECT COUNT(*) FROM cart_items r WHERE r.product_id = p.id) AS cart_item_count, \
     (SELECT COUNT(*) FROM order_items r WHERE r.product_id = p.id) AS order_item_count";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns every product with relation counts, ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_canonical_products(pool: &PgPool) -> Result<Vec<CanonicalProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CanonicalProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY p.id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single product by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn get_canonical_product(pool: &PgPool, id: &str) -> Result<CanonicalProductRow, DbError> {
    sqlx::query_as::<_, CanonicalProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Total number of rows across [`RELATION_TABLES`] that reference `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_product_relations(pool: &PgPool, id: &str) -> Result<i64, DbError> {
    let total = sqlx::query_scalar::<_, i64>(RELATION_TOTAL_SQL)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

const RELATION_TOTAL_SQL: &str = "SELECT \
     (SELECT COUNT(*) FROM product_variations WHERE product_id = $1) + \
     (SELECT COUNT(*) FROM combo_items WHERE product_id = $1) + \
     (SELECT COUNT(*) FROM cart_items WHERE product_id = $1) + \
     (SELECT COUNT(*) FROM order_items WHERE product_id = $1)";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

async fn lock_product(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<(), DbError> {
    sqlx::query_scalar::<_, String>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(())
}

/// Deletes a product in one transaction.
///
/// With `reassign_to`, every relation row pointing at `id` is first moved to
/// that product and the number of moved rows is returned. Without it, a
/// product that still has relation rows is refused with
/// [`DbError::HasRelations`]. The row lock taken on `id` blocks concurrent
/// inserts that would reference it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if either product is missing,
/// [`DbError::HasRelations`] as described above, or [`DbError::Sqlx`] on any
/// query failure. Nothing is written on error.
pub async fn delete_canonical_product(
    pool: &PgPool,
    id: &str,
    reassign_to: Option<&str>,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;
    lock_product(&mut tx, id).await?;

    let mut moved: i64 = 0;
    match reassign_to {
        Some(survivor_id) => {
            lock_product(&mut tx, survivor_id).await?;
            for table in RELATION_TABLES {
                let result = sqlx::query(&format!(
                    "UPDATE {table} SET product_id = $1 WHERE product_id = $2"
                ))
                .bind(survivor_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                moved += i64::try_from(result.rows_affected()).unwrap_or(i64::MAX);
            }
        }
        None => {
            let relations = sqlx::query_scalar::<_, i64>(RELATION_TOTAL_SQL)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            if relations > 0 {
                return Err(DbError::HasRelations {
                    id: id.to_string(),
                    relations,
                });
            }
        }
    }

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(moved)
}

/// Overwrites `images` and/or `description`; `None` leaves a column as is.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// update fails.
pub async fn update_canonical_product(
    pool: &PgPool,
    id: &str,
    images: Option<&[String]>,
    description: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE products \
         SET images = COALESCE($1, images), \
             description = COALESCE($2, description), \
             updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(images)
    .bind(description)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Stores an inferred category. `None` clears it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// update fails.
pub async fn set_product_category(
    pool: &PgPool,
    id: &str,
    category: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE products SET category = $1, updated_at = NOW() \
         WHERE id = $2 AND category IS DISTINCT FROM $1",
    )
    .bind(category)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(DbError::NotFound);
        }
    }
    Ok(())
}
