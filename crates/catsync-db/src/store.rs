//! [`CatalogStore`] backed by Postgres.

use catsync_core::{CanonicalProduct, CatalogStore, ProductPatch, RawJourneyDocument, StoreError};
use serde_json::Value;
use sqlx::PgPool;

use crate::{journeys, products, DbError};

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_error(err: DbError, entity: &'static str, id: &str) -> StoreError {
    match err {
        DbError::NotFound => StoreError::NotFound {
            entity,
            id: id.to_string(),
        },
        DbError::HasRelations { id, relations } => StoreError::IntegrityViolation { id, relations },
        other => StoreError::backend(other),
    }
}

impl CatalogStore for PgCatalogStore {
    async fn load_canonical_products(&mut self) -> Result<Vec<CanonicalProduct>, StoreError> {
        let rows = products::list_canonical_products(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        tracing::debug!(count = rows.len(), "loaded canonical products");
        Ok(rows.into_iter().map(CanonicalProduct::from).collect())
    }

    async fn load_journey_documents(&mut self) -> Result<Vec<RawJourneyDocument>, StoreError> {
        let rows = journeys::list_journeys(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        tracing::debug!(count = rows.len(), "loaded journey documents");
        Ok(rows
            .into_iter()
            .map(|row| RawJourneyDocument {
                slug: row.slug,
                content: row.content,
            })
            .collect())
    }

    async fn delete_canonical_product(
        &mut self,
        id: &str,
        reassign_to: Option<&str>,
    ) -> Result<i64, StoreError> {
        products::delete_canonical_product(&self.pool, id, reassign_to)
            .await
            .map_err(|e| store_error(e, "product", id))
    }

    async fn update_canonical_product(
        &mut self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<(), StoreError> {
        products::update_canonical_product(
            &self.pool,
            id,
            patch.images.as_deref(),
            patch.description.as_deref(),
        )
        .await
        .map_err(|e| store_error(e, "product", id))
    }

    async fn replace_journey_content(
        &mut self,
        slug: &str,
        content: &Value,
    ) -> Result<(), StoreError> {
        journeys::replace_journey_content(&self.pool, slug, content)
            .await
            .map_err(|e| store_error(e, "journey", slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_refusal_maps_to_integrity_violation() {
        let err = store_error(
            DbError::HasRelations {
                id: "p1".to_string(),
                relations: 3,
            },
            "product",
            "p1",
        );
        assert!(matches!(
            err,
            StoreError::IntegrityViolation { ref id, relations: 3 } if id == "p1"
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let err = store_error(DbError::NotFound, "journey", "winter");
        assert!(matches!(
            err,
            StoreError::NotFound { entity: "journey", ref id } if id == "winter"
        ));
    }

    #[test]
    fn sqlx_errors_are_fatal() {
        let err = store_error(DbError::Sqlx(sqlx::Error::PoolTimedOut), "product", "p1");
        assert!(err.is_fatal());
    }
}
