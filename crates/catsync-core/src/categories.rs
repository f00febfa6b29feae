//! Ordered, first-match-wins category inference from product names.
//!
//! Rule order is part of the contract: a name matching several patterns
//! always resolves to the earliest rule. Names matching nothing are
//! reported as [`Category::Uncategorized`] for a human to resolve.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_name;
use crate::ConfigError;

/// Built-in rules, highest priority first.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("wall hanging", "Wall Hangings"),
    ("bonsai", "Bonsai"),
    ("muffler", "Mufflers"),
    ("stole", "Stoles"),
    ("shawl", "Shawls"),
    ("planter", "Planters"),
    ("candle", "Candles"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Substring looked for in the normalized product name.
    pub contains: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct RulesFile {
    pub rules: Vec<CategoryRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "category", rename_all = "snake_case")]
pub enum Category {
    Matched(String),
    Uncategorized,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Matched(label) => f.write_str(label),
            Category::Uncategorized => f.write_str("uncategorized"),
        }
    }
}

/// A validated rule list. Patterns are stored normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .map(|(contains, category)| CategoryRule {
                    contains: (*contains).to_string(),
                    category: (*category).to_string(),
                })
                .collect(),
        }
    }

    /// Validates and normalizes a rule list, keeping its order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an empty list, blank patterns
    /// or categories, duplicate patterns, or a rule that can never fire
    /// because an earlier pattern is contained in it.
    pub fn from_rules(rules: Vec<CategoryRule>) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::Validation(
                "at least one category rule is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut normalized: Vec<CategoryRule> = Vec::with_capacity(rules.len());

        for rule in rules {
            let contains = normalize_name(&rule.contains);
            let category = rule.category.trim().to_string();

            if contains.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rule for category '{category}' has an empty pattern"
                )));
            }
            if category.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rule '{contains}' has an empty category"
                )));
            }
            if !seen.insert(contains.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate category pattern: '{contains}'"
                )));
            }
            if let Some(earlier) = normalized.iter().find(|r| contains.contains(&r.contains)) {
                return Err(ConfigError::Validation(format!(
                    "rule '{contains}' is unreachable: earlier rule '{}' always matches first",
                    earlier.contains
                )));
            }

            normalized.push(CategoryRule { contains, category });
        }

        Ok(Self { rules: normalized })
    }

    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Returns the category of the first rule whose pattern occurs in the
    /// normalized `name`.
    #[must_use]
    pub fn classify(&self, name: &str) -> Category {
        let key = normalize_name(name);
        self.rules
            .iter()
            .find(|rule| key.contains(&rule.contains))
            .map_or(Category::Uncategorized, |rule| {
                Category::Matched(rule.category.clone())
            })
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Loads category rules from a YAML file, or the built-in list when `path`
/// is `None`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_category_rules(path: Option<&Path>) -> Result<CategoryRules, ConfigError> {
    let Some(path) = path else {
        return Ok(CategoryRules::builtin());
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RulesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: RulesFile = serde_yaml::from_str(&content)?;
    CategoryRules::from_rules(file.rules)
}
