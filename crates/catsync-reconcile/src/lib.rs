//! Product identity reconciliation between the relational catalog and the
//! product entries embedded in journey documents.
//!
//! A run is a single pass: [`loader`] takes a snapshot, [`plan`] decides
//! everything (duplicate survivors, entry matches, field merges, bucket
//! pruning), and [`apply`] issues the mutations. The [`report`] records each
//! decision and whether it was applied.

pub mod apply;
pub mod grouping;
pub mod loader;
pub mod matching;
pub mod merge;
pub mod pipeline;
pub mod plan;
pub mod prune;
pub mod report;

pub use apply::{apply_plan, ApplyOptions};
pub use grouping::{find_duplicate_groups, GroupDecision, MemberScore, Removal};
pub use loader::{load_snapshot, Snapshot};
pub use matching::{CandidateIndex, MatchOutcome};
pub use merge::FieldDiff;
pub use pipeline::{reconcile, RunOptions};
pub use plan::plan_reconciliation;
pub use prune::{prune_duplicate_ids, PrunedEntry};
pub use report::{
    ActionStatus, DecisionRecord, DocumentReport, EntryAction, EntryRef, EntryReport,
    InvalidDocument, ProductUpdate, ReconciliationReport, ReportSummary, UncategorizedProduct,
};
