//! Contract between the reconciliation pipeline and whatever holds the
//! catalog rows and journey documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::products::CanonicalProduct;

/// A journey as it sits in the store, before content validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawJourneyDocument {
    pub slug: String,
    pub content: Value,
}

/// Field-level update for a canonical product. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The product still has dependent rows; the delete was refused.
    #[error("product '{id}' still has {relations} dependent rows")]
    IntegrityViolation { id: String, relations: i64 },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Connectivity, permission, or query failure in the backing store.
    #[error("store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps any backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }

    /// `true` when the error should abort the whole run rather than a
    /// single action.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Read and write access to the catalog and the journey documents.
///
/// Implementations must not reorder or coalesce calls; the pipeline issues
/// every mutation only after its full plan is computed.
#[allow(async_fn_in_trait)]
pub trait CatalogStore {
    /// All canonical products with relation counts populated.
    async fn load_canonical_products(&mut self) -> Result<Vec<CanonicalProduct>, StoreError>;

    /// All journeys with their raw content.
    async fn load_journey_documents(&mut self) -> Result<Vec<RawJourneyDocument>, StoreError>;

    /// Deletes a canonical product.
    ///
    /// With `reassign_to = Some(survivor)`, dependent rows are first moved to
    /// the survivor in the same unit of work. Without it, a product that
    /// still has dependent rows must be refused with
    /// [`StoreError::IntegrityViolation`].
    ///
    /// Returns the number of dependent rows moved.
    async fn delete_canonical_product(
        &mut self,
        id: &str,
        reassign_to: Option<&str>,
    ) -> Result<i64, StoreError>;

    async fn update_canonical_product(
        &mut self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<(), StoreError>;

    /// Overwrites a journey's whole content.
    async fn replace_journey_content(&mut self, slug: &str, content: &Value)
        -> Result<(), StoreError>;
}
