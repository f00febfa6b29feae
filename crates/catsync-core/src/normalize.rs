//! Comparison keys for product names.
//!
//! Every place that compares a canonical name with another canonical name or
//! with an embedded entry's name goes through [`normalize_name`].

/// Returns the comparison key for a display name: surrounding whitespace
/// trimmed and the remainder folded to lowercase.
///
/// Total and idempotent; an empty or all-whitespace name yields `""`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
