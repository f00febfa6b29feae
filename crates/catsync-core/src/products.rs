use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URI prefixes that mark an image as hosted remotely (CDN/object storage)
/// rather than a relative path served by the storefront itself.
const REMOTE_SCHEMES: &[&str] = &["https://", "http://"];

/// Counts of dependent rows that reference a canonical product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCounts {
    pub variations: i64,
    pub combo_items: i64,
    pub cart_items: i64,
    pub order_items: i64,
}

impl RelationCounts {
    /// Sum of all dependent rows; used as the duplicate retention score.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.variations
            .saturating_add(self.combo_items)
            .saturating_add(self.cart_items)
            .saturating_add(self.order_items)
    }
}

/// A product row from the relational catalog, loaded with its relation counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub id: String,
    pub name: String,
    pub images: Vec<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub relations: RelationCounts,
}

impl CanonicalProduct {
    /// Returns `true` if at least one image is a remote URI.
    #[must_use]
    pub fn has_remote_image(&self) -> bool {
        has_remote_image(&self.images)
    }
}

/// Returns `true` if `uri` begins with a recognized network scheme.
///
/// Scheme comparison is ASCII case-insensitive.
#[must_use]
pub fn is_remote_uri(uri: &str) -> bool {
    let uri = uri.trim_start();
    REMOTE_SCHEMES.iter().any(|scheme| {
        uri.len() >= scheme.len()
            && uri.is_char_boundary(scheme.len())
            && uri[..scheme.len()].eq_ignore_ascii_case(scheme)
    })
}

/// Returns `true` if any URI in `images` is remote.
#[must_use]
pub fn has_remote_image(images: &[String]) -> bool {
    images.iter().any(|uri| is_remote_uri(uri))
}
