//! Journey documents and the product entries embedded in their content.
//!
//! Content is validated into explicit types when it is loaded. Keys this
//! crate does not model (on the content object or on individual entries)
//! are carried in `extra` maps so a rewrite never drops data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::RawJourneyDocument;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("journey '{slug}' content is not a JSON object")]
    NotAnObject { slug: String },

    #[error("journey '{slug}' has invalid content: {source}")]
    Invalid {
        slug: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One of the two named product lists inside a journey's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "featuredProducts")]
    Featured,
    #[serde(rename = "relatedProducts")]
    Related,
}

impl Bucket {
    /// Both buckets in processing order.
    pub const ALL: [Bucket; 2] = [Bucket::Featured, Bucket::Related];

    /// JSON key of the bucket inside journey content.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Bucket::Featured => "featuredProducts",
            Bucket::Related => "relatedProducts",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A denormalized product copy stored inside a journey bucket.
///
/// An explicit `"images": null` or `"description": null` is kept in `extra`
/// so it is written back unchanged; setting the field replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryWire", into = "EntryWire")]
pub struct EmbeddedProductEntry {
    /// Intended to reference `CanonicalProduct::id`; may be a stale or
    /// hand-written slug before reconciliation.
    pub id: String,
    pub name: String,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    pub extra: Map<String, Value>,
}

const IMAGES_KEY: &str = "images";
const DESCRIPTION_KEY: &str = "description";

/// Stored shape of an entry. The outer `Option` tells an absent key from an
/// explicit `null`.
#[derive(Serialize, Deserialize)]
struct EntryWire {
    id: String,
    name: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    images: Option<Option<Vec<String>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    description: Option<Option<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn keep_explicit_null<T>(
    field: Option<Option<T>>,
    key: &str,
    extra: &mut Map<String, Value>,
) -> Option<T> {
    match field {
        Some(None) => {
            extra.insert(key.to_string(), Value::Null);
            None
        }
        Some(value) => value,
        None => None,
    }
}

impl From<EntryWire> for EmbeddedProductEntry {
    fn from(wire: EntryWire) -> Self {
        let mut extra = wire.extra;
        let images = keep_explicit_null(wire.images, IMAGES_KEY, &mut extra);
        let description = keep_explicit_null(wire.description, DESCRIPTION_KEY, &mut extra);
        Self {
            id: wire.id,
            name: wire.name,
            images,
            description,
            extra,
        }
    }
}

impl From<EmbeddedProductEntry> for EntryWire {
    fn from(entry: EmbeddedProductEntry) -> Self {
        let mut extra = entry.extra;
        if entry.images.is_some() {
            extra.remove(IMAGES_KEY);
        }
        if entry.description.is_some() {
            extra.remove(DESCRIPTION_KEY);
        }
        Self {
            id: entry.id,
            name: entry.name,
            images: entry.images.map(Some),
            description: entry.description.map(Some),
            extra,
        }
    }
}

impl EmbeddedProductEntry {
    /// Image list, treating an absent field as empty.
    #[must_use]
    pub fn image_list(&self) -> &[String] {
        self.images.as_deref().unwrap_or(&[])
    }

    /// Description, or `None` when absent or blank.
    #[must_use]
    pub fn non_empty_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyContent {
    #[serde(
        rename = "featuredProducts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub featured: Option<Vec<EmbeddedProductEntry>>,
    #[serde(
        rename = "relatedProducts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub related: Option<Vec<EmbeddedProductEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JourneyContent {
    /// Entries of `bucket`; an absent bucket reads as empty.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> &[EmbeddedProductEntry] {
        let entries = match bucket {
            Bucket::Featured => &self.featured,
            Bucket::Related => &self.related,
        };
        entries.as_deref().unwrap_or(&[])
    }

    /// Serializes the content back to the JSON shape stored for a journey.
    ///
    /// # Errors
    ///
    /// Returns an error only if an `extra` value fails to serialize.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Replaces the entries of `bucket`.
    ///
    /// An absent bucket stays absent when `entries` is empty, so a rewrite
    /// of untouched content serializes identically.
    pub fn set_bucket(&mut self, bucket: Bucket, entries: Vec<EmbeddedProductEntry>) {
        let slot = match bucket {
            Bucket::Featured => &mut self.featured,
            Bucket::Related => &mut self.related,
        };
        if slot.is_none() && entries.is_empty() {
            return;
        }
        *slot = Some(entries);
    }
}

/// A journey with validated content.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyDocument {
    pub slug: String,
    pub content: JourneyContent,
}

impl JourneyDocument {
    /// Validates raw content loaded from the store.
    ///
    /// `null` content is treated as an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if the content is not an object or a bucket
    /// entry is missing its `id`/`name` or carries fields of the wrong type.
    pub fn from_raw(raw: RawJourneyDocument) -> Result<Self, ContentError> {
        let RawJourneyDocument { slug, content } = raw;
        let content = match content {
            Value::Null => JourneyContent::default(),
            Value::Object(_) => serde_json::from_value(content).map_err(|source| {
                ContentError::Invalid {
                    slug: slug.clone(),
                    source,
                }
            })?,
            _ => return Err(ContentError::NotAnObject { slug }),
        };
        Ok(Self { slug, content })
    }
}
