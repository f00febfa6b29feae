//! Image URI verification for catalog products and journey entries.

use std::collections::BTreeSet;

use catsync_core::{is_remote_uri, AppConfig, Bucket, JourneyDocument, RawJourneyDocument};
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;

/// A remote image reference and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ImageTarget {
    pub kind: &'static str,
    pub label: String,
    pub url: String,
}

/// Remote image URIs from catalog rows and journey entries. Local URIs are
/// skipped, and journeys whose content fails validation are skipped with a
/// warning.
pub(crate) fn collect_image_targets(
    products: &[catsync_db::CanonicalProductRow],
    journeys: Vec<catsync_db::JourneyRow>,
) -> Vec<ImageTarget> {
    let mut targets = BTreeSet::new();

    for product in products {
        for url in product.images.iter().filter(|u| is_remote_uri(u)) {
            targets.insert(ImageTarget {
                kind: "product",
                label: format!("{} / {}", product.id, product.name),
                url: url.clone(),
            });
        }
    }

    for row in journeys {
        let raw = RawJourneyDocument {
            slug: row.slug,
            content: row.content,
        };
        let document = match JourneyDocument::from_raw(raw) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "skipping journey with invalid content");
                continue;
            }
        };
        for bucket in Bucket::ALL {
            for entry in document.content.bucket(bucket) {
                for url in entry.image_list().iter().filter(|u| is_remote_uri(u)) {
                    targets.insert(ImageTarget {
                        kind: "journey",
                        label: format!("{} / {bucket} / {}", document.slug, entry.id),
                        url: url.clone(),
                    });
                }
            }
        }
    }

    targets.into_iter().collect()
}

/// Verify remote image URIs currently referenced by products and journeys.
///
/// Logs non-200 URIs for cleanup and prints aggregate totals.
pub(crate) async fn run_verify_images(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    concurrency: usize,
) -> anyhow::Result<()> {
    let products = catsync_db::list_canonical_products(pool).await?;
    let journeys = catsync_db::list_journeys(pool).await?;
    let targets = collect_image_targets(&products, journeys);

    if targets.is_empty() {
        println!("no remote image URIs found to verify");
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.image_check_timeout_secs))
        .user_agent(config.image_check_user_agent.clone())
        .build()?;

    let checks = stream::iter(targets.into_iter().map(|target| {
        let client = client.clone();
        async move {
            let result = client.head(&target.url).send().await;
            (target, result)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    let mut ok_count = 0usize;
    let mut bad_count = 0usize;
    for (target, result) in checks {
        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                ok_count += 1;
            }
            Ok(resp) => {
                bad_count += 1;
                tracing::warn!(
                    image_kind = target.kind,
                    label = %target.label,
                    status = resp.status().as_u16(),
                    url = %target.url,
                    "image URI verification failed"
                );
            }
            Err(e) => {
                bad_count += 1;
                tracing::warn!(
                    image_kind = target.kind,
                    label = %target.label,
                    error = %e,
                    url = %target.url,
                    "image URI verification failed"
                );
            }
        }
    }

    println!("verified image URIs: {ok_count} OK, {bad_count} bad");
    Ok(())
}
