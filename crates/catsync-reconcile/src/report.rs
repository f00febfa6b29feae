//! The reconciliation report: every decision a run made, and whether each
//! mutation was applied, failed, or is still only planned.

use std::fmt;

use catsync_core::{Bucket, JourneyContent, ProductPatch};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::grouping::{GroupDecision, Removal};
use crate::matching::MatchOutcome;
use crate::merge::FieldDiff;
use crate::prune::PrunedEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActionStatus {
    Planned,
    Applied,
    Failed { reason: String },
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Planned => f.write_str("planned"),
            ActionStatus::Applied => f.write_str("applied"),
            ActionStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Position of an entry inside the journey documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRef {
    pub slug: String,
    pub bucket: Bucket,
    pub index: usize,
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.slug, self.bucket, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EntryAction {
    IdRewritten { from: String, to: String },
    ImagesFromCanonical,
    DescriptionFromCanonical,
    /// The entry's images were chosen for the canonical product.
    SuppliedImages,
    /// The entry's description was chosen for the canonical product.
    SuppliedDescription,
    /// Remote images that disagree with the chosen set; left untouched.
    ImageConflict,
    /// A description that disagrees with the chosen one; left untouched.
    DescriptionConflict,
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryAction::IdRewritten { from, to } => write!(f, "id {from} -> {to}"),
            EntryAction::ImagesFromCanonical => f.write_str("images copied from catalog"),
            EntryAction::DescriptionFromCanonical => {
                f.write_str("description copied from catalog")
            }
            EntryAction::SuppliedImages => f.write_str("supplied catalog images"),
            EntryAction::SuppliedDescription => f.write_str("supplied catalog description"),
            EntryAction::ImageConflict => f.write_str("image conflict (kept)"),
            EntryAction::DescriptionConflict => f.write_str("description conflict (kept)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub bucket: Bucket,
    pub index: usize,
    pub entry_id: String,
    pub name: String,
    pub outcome: MatchOutcome,
    /// Present for matched entries; compares against the catalog as loaded.
    pub diff: Option<FieldDiff>,
    pub actions: Vec<EntryAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub slug: String,
    pub entries: Vec<EntryReport>,
    pub pruned: Vec<PrunedEntry>,
    /// `None` when the document needs no rewrite.
    pub rewrite: Option<ActionStatus>,
    #[serde(skip)]
    pub(crate) new_content: Option<JourneyContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductUpdate {
    pub product_id: String,
    pub patch: ProductPatch,
    pub image_source: Option<EntryRef>,
    pub description_source: Option<EntryRef>,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidDocument {
    pub slug: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UncategorizedProduct {
    pub product_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub groups: Vec<GroupDecision>,
    pub product_updates: Vec<ProductUpdate>,
    pub documents: Vec<DocumentReport>,
    pub invalid_documents: Vec<InvalidDocument>,
    pub uncategorized: Vec<UncategorizedProduct>,
    /// Set when a store failure stopped the run; every action still
    /// `planned` was not attempted.
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub duplicate_groups: usize,
    pub removals: usize,
    pub product_updates: usize,
    pub document_rewrites: usize,
    pub orphans: usize,
    pub ambiguous: usize,
    pub pruned_entries: usize,
    pub invalid_documents: usize,
    pub uncategorized: usize,
    pub applied: usize,
    pub failed: usize,
    pub planned: usize,
}

/// One machine-readable decision, borrowed from a report.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionRecord<'a> {
    DuplicateGroup {
        key: &'a str,
        survivor_id: &'a str,
        removed: &'a [Removal],
    },
    ProductUpdate {
        #[serde(flatten)]
        update: &'a ProductUpdate,
    },
    EntryMatch {
        slug: &'a str,
        #[serde(flatten)]
        entry: &'a EntryReport,
    },
    EntryPruned {
        slug: &'a str,
        #[serde(flatten)]
        pruned: &'a PrunedEntry,
    },
    DocumentRewrite {
        slug: &'a str,
        status: &'a ActionStatus,
    },
    InvalidDocument {
        #[serde(flatten)]
        document: &'a InvalidDocument,
    },
    Uncategorized {
        #[serde(flatten)]
        product: &'a UncategorizedProduct,
    },
    Aborted {
        reason: &'a str,
    },
}

impl ReconciliationReport {
    /// Report for a run that failed before anything could be planned.
    #[must_use]
    pub fn aborted_before_planning(run_id: Uuid, dry_run: bool, reason: String) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: Some(now),
            dry_run,
            groups: Vec::new(),
            product_updates: Vec::new(),
            documents: Vec::new(),
            invalid_documents: Vec::new(),
            uncategorized: Vec::new(),
            aborted: Some(reason),
        }
    }

    /// Every mutation status in the report, in apply order.
    pub fn statuses(&self) -> impl Iterator<Item = &ActionStatus> {
        self.groups
            .iter()
            .flat_map(|g| g.removed.iter().map(|r| &r.status))
            .chain(self.product_updates.iter().map(|u| &u.status))
            .chain(self.documents.iter().filter_map(|d| d.rewrite.as_ref()))
    }

    /// Entries that resolved to no canonical product, with their journey slug.
    pub fn orphans(&self) -> impl Iterator<Item = (&str, &EntryReport)> {
        self.documents.iter().flat_map(|d| {
            d.entries
                .iter()
                .filter(|e| e.outcome == MatchOutcome::Orphan)
                .map(move |e| (d.slug.as_str(), e))
        })
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            duplicate_groups: self.groups.len(),
            removals: self.groups.iter().map(|g| g.removed.len()).sum(),
            product_updates: self.product_updates.len(),
            document_rewrites: self.documents.iter().filter(|d| d.rewrite.is_some()).count(),
            orphans: self.orphans().count(),
            ambiguous: self
                .documents
                .iter()
                .flat_map(|d| d.entries.iter())
                .filter(|e| matches!(e.outcome, MatchOutcome::Ambiguous { .. }))
                .count(),
            pruned_entries: self.documents.iter().map(|d| d.pruned.len()).sum(),
            invalid_documents: self.invalid_documents.len(),
            uncategorized: self.uncategorized.len(),
            ..ReportSummary::default()
        };

        for status in self.statuses() {
            match status {
                ActionStatus::Planned => summary.planned += 1,
                ActionStatus::Applied => summary.applied += 1,
                ActionStatus::Failed { .. } => summary.failed += 1,
            }
        }

        summary
    }

    /// `true` when the report plans no mutation at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.statuses().next().is_none()
    }

    /// Flattens the report into a sequence of decision records.
    #[must_use]
    pub fn decision_records(&self) -> Vec<DecisionRecord<'_>> {
        let mut records = Vec::new();

        for group in &self.groups {
            records.push(DecisionRecord::DuplicateGroup {
                key: &group.key,
                survivor_id: &group.survivor_id,
                removed: &group.removed,
            });
        }
        for update in &self.product_updates {
            records.push(DecisionRecord::ProductUpdate { update });
        }
        for document in &self.documents {
            for entry in &document.entries {
                records.push(DecisionRecord::EntryMatch {
                    slug: &document.slug,
                    entry,
                });
            }
            for pruned in &document.pruned {
                records.push(DecisionRecord::EntryPruned {
                    slug: &document.slug,
                    pruned,
                });
            }
            if let Some(status) = &document.rewrite {
                records.push(DecisionRecord::DocumentRewrite {
                    slug: &document.slug,
                    status,
                });
            }
        }
        for document in &self.invalid_documents {
            records.push(DecisionRecord::InvalidDocument { document });
        }
        for product in &self.uncategorized {
            records.push(DecisionRecord::Uncategorized { product });
        }
        if let Some(reason) = &self.aborted {
            records.push(DecisionRecord::Aborted { reason });
        }

        records
    }

    /// Renders the decision records as JSON lines.
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in self.decision_records() {
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "reconciliation run {}{}",
            self.run_id,
            if self.dry_run { " (dry run)" } else { "" }
        )?;
        writeln!(f, "started: {}", self.started_at.to_rfc3339())?;
        if let Some(finished) = self.finished_at {
            writeln!(f, "finished: {}", finished.to_rfc3339())?;
        }

        for group in &self.groups {
            writeln!(f)?;
            writeln!(f, "== duplicate group \"{}\" ==", group.key)?;
            for (rank, member) in group.members.iter().enumerate() {
                let role = if rank == 0 { "keep  " } else { "remove" };
                writeln!(
                    f,
                    "  {role} {} \"{}\" score={} created={}",
                    member.id,
                    member.name,
                    member.score,
                    member.created_at.to_rfc3339()
                )?;
            }
            for removal in &group.removed {
                write!(f, "  delete {}: {}", removal.id, removal.status)?;
                if removal.reassigned > 0 {
                    write!(f, " ({} relations moved to {})", removal.reassigned, group.survivor_id)?;
                }
                writeln!(f)?;
            }
        }

        for document in &self.documents {
            writeln!(f)?;
            writeln!(f, "== document \"{}\" ==", document.slug)?;
            for entry in &document.entries {
                write!(
                    f,
                    "  {}[{}] \"{}\" id={} {}",
                    entry.bucket,
                    entry.index,
                    entry.name,
                    entry.entry_id,
                    entry.outcome.label()
                )?;
                match &entry.outcome {
                    MatchOutcome::Ambiguous { candidates } => {
                        write!(f, " candidates=[{}]", candidates.join(", "))?;
                    }
                    other => {
                        if let Some(product_id) = other.product_id() {
                            write!(f, " -> {product_id}")?;
                        }
                    }
                }
                if let Some(diff) = entry.diff {
                    if diff.images_differ {
                        write!(f, "; images differ")?;
                    }
                    if diff.description_differs {
                        write!(f, "; description differs")?;
                    }
                }
                for action in &entry.actions {
                    write!(f, "; {action}")?;
                }
                writeln!(f)?;
            }
            for pruned in &document.pruned {
                writeln!(
                    f,
                    "  {}[{}] \"{}\" id={} removed: duplicate of [{}]",
                    pruned.bucket, pruned.index, pruned.name, pruned.id, pruned.duplicate_of
                )?;
            }
            match &document.rewrite {
                Some(status) => writeln!(f, "  rewrite: {status}")?,
                None => writeln!(f, "  rewrite: not needed")?,
            }
        }

        if !self.product_updates.is_empty() {
            writeln!(f)?;
            writeln!(f, "== catalog updates ==")?;
            for update in &self.product_updates {
                let mut fields = Vec::new();
                if update.patch.images.is_some() {
                    fields.push("images");
                }
                if update.patch.description.is_some() {
                    fields.push("description");
                }
                write!(f, "  {} [{}]: {}", update.product_id, fields.join(", "), update.status)?;
                if let Some(source) = &update.image_source {
                    write!(f, "; images from {source}")?;
                }
                if let Some(source) = &update.description_source {
                    write!(f, "; description from {source}")?;
                }
                writeln!(f)?;
            }
        }

        if !self.invalid_documents.is_empty() {
            writeln!(f)?;
            writeln!(f, "== invalid documents (skipped) ==")?;
            for document in &self.invalid_documents {
                writeln!(f, "  {}: {}", document.slug, document.reason)?;
            }
        }

        if !self.uncategorized.is_empty() {
            writeln!(f)?;
            writeln!(f, "== uncategorized products ==")?;
            for product in &self.uncategorized {
                writeln!(f, "  {} \"{}\"", product.product_id, product.name)?;
            }
        }

        let s = self.summary();
        writeln!(f)?;
        writeln!(
            f,
            "summary: {} groups, {} removals, {} catalog updates, {} document rewrites, \
             {} orphans, {} ambiguous, {} pruned, {} invalid documents, {} uncategorized",
            s.duplicate_groups,
            s.removals,
            s.product_updates,
            s.document_rewrites,
            s.orphans,
            s.ambiguous,
            s.pruned_entries,
            s.invalid_documents,
            s.uncategorized
        )?;
        writeln!(
            f,
            "actions: {} applied, {} failed, {} planned",
            s.applied, s.failed, s.planned
        )?;
        if let Some(reason) = &self.aborted {
            writeln!(f, "ABORTED: {reason}; planned actions were not applied")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Snapshot;
    use crate::plan::plan_reconciliation;
    use catsync_core::{
        CanonicalProduct, CategoryRules, EmbeddedProductEntry, JourneyDocument, RelationCounts,
    };
    use chrono::TimeZone;
    use serde_json::{Map, Value};

    fn product(id: &str, name: &str, day: u32, cart_items: i64) -> CanonicalProduct {
        CanonicalProduct {
            id: id.to_string(),
            name: name.to_string(),
            images: Vec::new(),
            description: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 2, day, 0, 0, 0).unwrap(),
            relations: RelationCounts {
                cart_items,
                ..RelationCounts::default()
            },
        }
    }

    fn entry(id: &str, name: &str) -> EmbeddedProductEntry {
        EmbeddedProductEntry {
            id: id.to_string(),
            name: name.to_string(),
            images: None,
            description: None,
            extra: Map::new(),
        }
    }

    fn sample_report() -> ReconciliationReport {
        let snapshot = Snapshot {
            products: vec![
                product("t1", "Aamvaraah Muffler: Green", 1, 0),
                product("t2", "aamvaraah muffler: green", 2, 2),
                product("lamp", "Brass Lamp", 3, 0),
            ],
            documents: vec![JourneyDocument {
                slug: "winter".to_string(),
                content: JourneyContent {
                    featured: Some(vec![
                        entry("t2", "Aamvaraah Muffler: Green"),
                        entry("x", "Unknown Widget"),
                        entry("t2", "again"),
                    ]),
                    related: None,
                    extra: Map::new(),
                },
            }],
            invalid_documents: vec![InvalidDocument {
                slug: "broken".to_string(),
                reason: "content is not an object".to_string(),
            }],
        };
        plan_reconciliation(&snapshot, &CategoryRules::builtin(), Uuid::nil(), true)
    }

    #[test]
    fn summary_counts_every_kind_of_decision() {
        let summary = sample_report().summary();
        assert_eq!(summary.duplicate_groups, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.orphans, 1);
        assert_eq!(summary.pruned_entries, 1);
        assert_eq!(summary.document_rewrites, 1);
        assert_eq!(summary.invalid_documents, 1);
        assert_eq!(summary.uncategorized, 1);
        assert_eq!(summary.planned, 2);
        assert_eq!(summary.applied, 0);
    }

    #[test]
    fn text_log_has_a_section_per_group_and_document() {
        let text = sample_report().to_string();
        assert!(text.contains("(dry run)"));
        assert!(text.contains("== duplicate group \"aamvaraah muffler: green\" =="));
        assert!(text.contains("  keep   t2"));
        assert!(text.contains("  delete t1: planned"));
        assert!(text.contains("== document \"winter\" =="));
        assert!(text.contains("\"Unknown Widget\" id=x orphan"));
        assert!(text.contains("removed: duplicate of [0]"));
        assert!(text.contains("== invalid documents (skipped) =="));
        assert!(text.contains("lamp \"Brass Lamp\""));
        assert!(!text.contains("ABORTED"));
    }

    #[test]
    fn json_lines_are_one_record_per_decision() {
        let report = sample_report();
        let lines = report.to_json_lines().unwrap();
        let records: Vec<Value> = lines
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), report.decision_records().len());
        assert_eq!(records[0]["kind"], "duplicate_group");
        assert_eq!(records[0]["survivor_id"], "t2");
        assert_eq!(records[0]["removed"][0]["id"], "t1");
        assert!(records
            .iter()
            .any(|r| r["kind"] == "entry_match" && r["outcome"]["outcome"] == "orphan"));
        assert!(records
            .iter()
            .any(|r| r["kind"] == "entry_pruned" && r["duplicate_of"] == 0));
        assert!(records.iter().any(|r| r["kind"] == "invalid_document"));
    }

    #[test]
    fn report_before_planning_carries_only_the_abort() {
        let report =
            ReconciliationReport::aborted_before_planning(Uuid::nil(), false, "timeout".to_string());
        assert!(report.is_noop());
        assert!(report.to_string().contains("ABORTED: timeout"));

        let lines = report.to_json_lines().unwrap();
        assert_eq!(lines.lines().count(), 1);
        assert!(lines.contains("\"kind\":\"aborted\""));
    }

    #[test]
    fn failed_status_renders_reason() {
        let status = ActionStatus::Failed {
            reason: "product 't1' still has 2 dependent rows".to_string(),
        };
        assert_eq!(
            status.to_string(),
            "failed: product 't1' still has 2 dependent rows"
        );
    }
}
