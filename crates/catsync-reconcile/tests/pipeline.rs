//! End-to-end runs against an in-memory store.

use std::collections::BTreeMap;

use catsync_core::{
    CanonicalProduct, CatalogStore, CategoryRules, ProductPatch, RawJourneyDocument,
    RelationCounts, StoreError,
};
use catsync_reconcile::{reconcile, ActionStatus, MatchOutcome, RunOptions};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryStore {
    products: BTreeMap<String, CanonicalProduct>,
    journeys: BTreeMap<String, Value>,
    fail_loads: bool,
    fail_updates: bool,
    mutations: usize,
}

impl MemoryStore {
    fn with_product(mut self, product: CanonicalProduct) -> Self {
        self.products.insert(product.id.clone(), product);
        self
    }

    fn with_journey(mut self, slug: &str, content: Value) -> Self {
        self.journeys.insert(slug.to_string(), content);
        self
    }
}

fn unavailable() -> StoreError {
    StoreError::backend(std::io::Error::other("connection refused"))
}

impl CatalogStore for MemoryStore {
    async fn load_canonical_products(&mut self) -> Result<Vec<CanonicalProduct>, StoreError> {
        if self.fail_loads {
            return Err(unavailable());
        }
        Ok(self.products.values().cloned().collect())
    }

    async fn load_journey_documents(&mut self) -> Result<Vec<RawJourneyDocument>, StoreError> {
        if self.fail_loads {
            return Err(unavailable());
        }
        Ok(self
            .journeys
            .iter()
            .map(|(slug, content)| RawJourneyDocument {
                slug: slug.clone(),
                content: content.clone(),
            })
            .collect())
    }

    async fn delete_canonical_product(
        &mut self,
        id: &str,
        reassign_to: Option<&str>,
    ) -> Result<i64, StoreError> {
        let relations = self
            .products
            .get(id)
            .map(|p| p.relations)
            .ok_or_else(|| StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;

        let moved = match reassign_to {
            Some(survivor_id) => {
                let survivor =
                    self.products
                        .get_mut(survivor_id)
                        .ok_or_else(|| StoreError::NotFound {
                            entity: "product",
                            id: survivor_id.to_string(),
                        })?;
                survivor.relations.variations += relations.variations;
                survivor.relations.combo_items += relations.combo_items;
                survivor.relations.cart_items += relations.cart_items;
                survivor.relations.order_items += relations.order_items;
                relations.total()
            }
            None if relations.total() > 0 => {
                return Err(StoreError::IntegrityViolation {
                    id: id.to_string(),
                    relations: relations.total(),
                });
            }
            None => 0,
        };

        self.products.remove(id);
        self.mutations += 1;
        Ok(moved)
    }

    async fn update_canonical_product(
        &mut self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<(), StoreError> {
        if self.fail_updates {
            return Err(unavailable());
        }
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;
        if let Some(images) = &patch.images {
            product.images.clone_from(images);
        }
        if let Some(description) = &patch.description {
            product.description.clone_from(description);
        }
        self.mutations += 1;
        Ok(())
    }

    async fn replace_journey_content(
        &mut self,
        slug: &str,
        content: &Value,
    ) -> Result<(), StoreError> {
        let slot = self
            .journeys
            .get_mut(slug)
            .ok_or_else(|| StoreError::NotFound {
                entity: "journey",
                id: slug.to_string(),
            })?;
        *slot = content.clone();
        self.mutations += 1;
        Ok(())
    }
}

fn product(id: &str, name: &str, day: u32, cart_items: i64) -> CanonicalProduct {
    CanonicalProduct {
        id: id.to_string(),
        name: name.to_string(),
        images: Vec::new(),
        description: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
        relations: RelationCounts {
            cart_items,
            ..RelationCounts::default()
        },
    }
}

fn options(dry_run: bool, reassign_relations: bool) -> RunOptions {
    RunOptions {
        run_id: Uuid::new_v4(),
        dry_run,
        reassign_relations,
    }
}

fn winter_store() -> MemoryStore {
    MemoryStore::default()
        .with_product(product("t1", "Aamvaraah Muffler: Green", 1, 0))
        .with_product(product("t2", "aamvaraah muffler: green ", 2, 2))
        .with_product(product("p-bonsai", "Bonsai Pot", 3, 0))
        .with_journey(
            "winter",
            json!({
                "title": "Winter Journey",
                "featuredProducts": [
                    {
                        "id": "old-1",
                        "name": "Aamvaraah Muffler: Green",
                        "images": ["https://cdn.example.com/muffler.jpg"],
                        "price": 1200
                    },
                    { "id": "t2", "name": "duplicate card" },
                    { "id": "ghost", "name": "Unknown Thing" }
                ],
                "relatedProducts": [
                    { "id": "t1", "name": "Aamvaraah Muffler: Green" }
                ]
            }),
        )
}

#[tokio::test]
async fn full_run_repairs_catalog_and_journeys() {
    let mut store = winter_store();
    let rules = CategoryRules::builtin();

    let report = reconcile(&mut store, &rules, options(false, false))
        .await
        .expect("run");

    assert!(report.aborted.is_none());
    assert!(report.finished_at.is_some());
    assert_eq!(report.summary().failed, 0);
    assert_eq!(report.summary().planned, 0);

    assert!(!store.products.contains_key("t1"));
    assert_eq!(
        store.products["t2"].images,
        vec!["https://cdn.example.com/muffler.jpg".to_string()]
    );

    let winter = &store.journeys["winter"];
    assert_eq!(winter["title"], "Winter Journey");

    let featured = winter["featuredProducts"].as_array().expect("featured");
    let ids: Vec<&str> = featured.iter().map(|e| e["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["t2", "ghost"]);
    assert_eq!(featured[0]["price"], 1200);

    let related = winter["relatedProducts"].as_array().expect("related");
    assert_eq!(related[0]["id"], "t2");
    assert_eq!(related[0]["images"], json!(["https://cdn.example.com/muffler.jpg"]));

    let orphans: Vec<_> = report.orphans().map(|(slug, e)| (slug, e.entry_id.as_str())).collect();
    assert_eq!(orphans, [("winter", "ghost")]);
}

#[tokio::test]
async fn second_run_is_a_noop() {
    let mut store = winter_store();
    let rules = CategoryRules::builtin();

    reconcile(&mut store, &rules, options(false, false))
        .await
        .expect("first run");
    let after_first = store.mutations;

    let second = reconcile(&mut store, &rules, options(false, false))
        .await
        .expect("second run");

    assert!(second.is_noop());
    assert_eq!(store.mutations, after_first);
    assert!(second
        .documents
        .iter()
        .flat_map(|d| &d.entries)
        .filter(|e| e.entry_id == "t2")
        .all(|e| matches!(e.outcome, MatchOutcome::MatchedById { .. })));
}

#[tokio::test]
async fn dry_run_leaves_store_untouched() {
    let mut store = winter_store();
    let before_journeys = store.journeys.clone();

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(true, false))
        .await
        .expect("dry run");

    assert!(report.dry_run);
    assert_eq!(store.mutations, 0);
    assert!(store.products.contains_key("t1"));
    assert_eq!(store.journeys, before_journeys);
    assert!(report.statuses().all(|s| *s == ActionStatus::Planned));
    assert!(report.summary().planned > 0);
}

#[tokio::test]
async fn duplicate_with_relations_is_refused_without_reassignment() {
    let mut store = MemoryStore::default()
        .with_product(product("a", "Pine Bonsai", 1, 3))
        .with_product(product("b", "pine bonsai", 2, 5));

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(false, false))
        .await
        .expect("run");

    let removal = &report.groups[0].removed[0];
    assert_eq!(removal.id, "a");
    assert!(matches!(removal.status, ActionStatus::Failed { .. }));
    assert!(report.aborted.is_none());
    assert!(store.products.contains_key("a"));
    assert_eq!(store.products["b"].relations.cart_items, 5);
}

#[tokio::test]
async fn refused_removal_does_not_stop_other_groups() {
    let mut store = MemoryStore::default()
        .with_product(product("a", "Pine Bonsai", 1, 3))
        .with_product(product("b", "pine bonsai", 2, 5))
        .with_product(product("c", "Silk Stole", 1, 0))
        .with_product(product("d", "silk stole", 2, 0));

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(false, false))
        .await
        .expect("run");

    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.groups[0].key, "pine bonsai");
    assert!(matches!(
        report.groups[0].removed[0].status,
        ActionStatus::Failed { .. }
    ));

    let second = &report.groups[1];
    assert_eq!(second.key, "silk stole");
    assert_eq!(second.survivor_id, "c");
    assert_eq!(second.removed[0].id, "d");
    assert_eq!(second.removed[0].status, ActionStatus::Applied);

    assert!(report.aborted.is_none());
    assert!(store.products.contains_key("a"));
    assert!(store.products.contains_key("c"));
    assert!(!store.products.contains_key("d"));
}

#[tokio::test]
async fn reassignment_moves_relations_to_survivor() {
    let mut store = MemoryStore::default()
        .with_product(product("a", "Pine Bonsai", 1, 3))
        .with_product(product("b", "pine bonsai", 2, 5));

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(false, true))
        .await
        .expect("run");

    let removal = &report.groups[0].removed[0];
    assert_eq!(removal.status, ActionStatus::Applied);
    assert_eq!(removal.reassigned, 3);
    assert!(!store.products.contains_key("a"));
    assert_eq!(store.products["b"].relations.cart_items, 8);
}

#[tokio::test]
async fn backend_failure_aborts_and_leaves_later_actions_planned() {
    let mut store = winter_store();
    store.fail_updates = true;
    let before_journeys = store.journeys.clone();

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(false, false))
        .await
        .expect("planning succeeds");

    assert!(report.aborted.is_some());
    assert_eq!(report.groups[0].removed[0].status, ActionStatus::Applied);
    assert_eq!(report.product_updates[0].status, ActionStatus::Planned);
    assert!(report
        .documents
        .iter()
        .filter_map(|d| d.rewrite.as_ref())
        .all(|s| *s == ActionStatus::Planned));
    assert_eq!(store.journeys, before_journeys);
    assert!(report.to_string().contains("ABORTED"));
}

#[tokio::test]
async fn load_failure_returns_error_before_any_write() {
    let mut store = winter_store();
    store.fail_loads = true;

    let result = reconcile(&mut store, &CategoryRules::builtin(), options(false, false)).await;

    assert!(matches!(result, Err(StoreError::Backend(_))));
    assert_eq!(store.mutations, 0);
}

#[tokio::test]
async fn invalid_document_is_reported_and_left_alone() {
    let mut store = winter_store().with_journey("broken", json!(["not", "an", "object"]));

    let report = reconcile(&mut store, &CategoryRules::builtin(), options(false, false))
        .await
        .expect("run");

    assert_eq!(report.invalid_documents.len(), 1);
    assert_eq!(report.invalid_documents[0].slug, "broken");
    assert_eq!(store.journeys["broken"], json!(["not", "an", "object"]));
}
