//! `catsync categorize`: name-based category inference over the catalog.

use catsync_core::{Category, CategoryRules};

/// One product's inferred category next to what is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CategoryChange {
    pub product_id: String,
    pub name: String,
    pub stored: Option<String>,
    pub inferred: Category,
}

impl CategoryChange {
    /// The category `--apply` would store. `Uncategorized` is only reported,
    /// so a category set by hand is never cleared.
    pub(crate) fn pending_write(&self) -> Option<&str> {
        match &self.inferred {
            Category::Matched(name) if self.stored.as_deref() != Some(name.as_str()) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

pub(crate) fn infer_categories(
    rules: &CategoryRules,
    rows: Vec<catsync_db::CanonicalProductRow>,
) -> Vec<CategoryChange> {
    rows.into_iter()
        .map(|row| CategoryChange {
            inferred: rules.classify(&row.name),
            product_id: row.id,
            name: row.name,
            stored: row.category,
        })
        .collect()
}

/// Print each product's inferred category and optionally store it.
///
/// # Errors
///
/// Returns an error if products cannot be listed. Per-product update
/// failures are logged and counted, not propagated.
pub(crate) async fn run_categorize(
    pool: &sqlx::PgPool,
    rules: &CategoryRules,
    uncategorized_only: bool,
    apply: bool,
) -> anyhow::Result<()> {
    let rows = catsync_db::list_canonical_products(pool).await?;
    let changes = infer_categories(rules, rows);

    let mut uncategorized = 0usize;
    let mut stored = 0usize;
    let mut failed = 0usize;

    for change in &changes {
        let matched = matches!(change.inferred, Category::Matched(_));
        if !matched {
            uncategorized += 1;
        }
        if !uncategorized_only || !matched {
            println!("{}\t{}\t{}", change.product_id, change.name, change.inferred);
        }

        if !apply {
            continue;
        }
        if let Some(category) = change.pending_write() {
            match catsync_db::set_product_category(pool, &change.product_id, Some(category)).await
            {
                Ok(()) => stored += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        product = %change.product_id,
                        error = %e,
                        "failed to store category"
                    );
                }
            }
        }
    }

    println!(
        "{} products, {uncategorized} uncategorized",
        changes.len()
    );
    if apply {
        println!("stored {stored} category changes, {failed} failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: &str, name: &str, category: Option<&str>) -> catsync_db::CanonicalProductRow {
        catsync_db::CanonicalProductRow {
            id: id.to_string(),
            name: name.to_string(),
            images: Vec::new(),
            description: String::new(),
            category: category.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            variation_count: 0,
            combo_item_count: 0,
            cart_item_count: 0,
            order_item_count: 0,
        }
    }

    #[test]
    fn inferred_category_is_compared_with_stored_value() {
        let changes = infer_categories(
            &CategoryRules::builtin(),
            vec![
                row("p1", "Pine Bonsai", Some("Bonsai")),
                row("p2", "Silk Stole", None),
                row("p3", "Brass Lamp", None),
                row("p4", "Brass Lamp", Some("Lamps")),
            ],
        );

        assert_eq!(changes[0].pending_write(), None);
        assert_eq!(changes[1].pending_write(), Some("Stoles"));
        assert_eq!(changes[2].pending_write(), None);
        assert_eq!(changes[2].inferred, Category::Uncategorized);
        assert_eq!(changes[3].pending_write(), None);
    }

    #[test]
    fn hand_set_category_survives_when_no_rule_matches() {
        let changes = infer_categories(
            &CategoryRules::builtin(),
            vec![row("p4", "Brass Lamp", Some("Lamps"))],
        );

        assert_eq!(changes[0].inferred, Category::Uncategorized);
        assert_eq!(changes[0].stored.as_deref(), Some("Lamps"));
        assert_eq!(changes[0].pending_write(), None);
    }

    #[test]
    fn matched_category_replaces_a_different_stored_value() {
        let changes = infer_categories(
            &CategoryRules::builtin(),
            vec![row("p5", "Wool Muffler", Some("Scarves"))],
        );

        assert_eq!(changes[0].pending_write(), Some("Mufflers"));
    }
}
