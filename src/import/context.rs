//! Per-run accounting. A fresh [`RunContext`] is made for every run and each
//! category worker fills its own [`CategoryTally`]; they are merged at the end.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::entities::{FeedEntry, ImportOutcome};

/// Where an entry stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing title or link.
    Unusable,
    /// The store's duplicate check itself failed.
    DuplicateCheck,
    /// Create failed after every retry, or the store rejected the record.
    Persistence,
    /// Taxonomy lookups failed, so there was nothing to attach the article to.
    Taxonomy,
    Cancelled,
}

/// One failed or skipped entry, attributed to its feed item.
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub category: String,
    pub title: String,
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryTally {
    pub outcome: ImportOutcome,
    pub failures: Vec<EntryFailure>,
    pub fallback_used: u32,
    pub structured: u32,
}

impl CategoryTally {
    pub fn imported(&mut self) {
        self.outcome.imported += 1;
    }

    pub fn skipped(&mut self) {
        self.outcome.skipped += 1;
    }

    pub fn skip_with(&mut self, category: &str, entry: &FeedEntry, kind: ErrorKind, message: impl Into<String>) {
        self.outcome.skipped += 1;
        self.failures.push(EntryFailure::new(category, entry, kind, message));
    }

    pub fn error(&mut self, category: &str, entry: &FeedEntry, kind: ErrorKind, message: impl Into<String>) {
        self.outcome.errors += 1;
        self.failures.push(EntryFailure::new(category, entry, kind, message));
    }
}

impl EntryFailure {
    fn new(category: &str, entry: &FeedEntry, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            title: entry.title.clone(),
            url: entry.link.clone(),
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct RunContext {
    started_at: DateTime<Utc>,
    categories: BTreeMap<String, CategoryTally>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            categories: BTreeMap::new(),
        }
    }

    pub fn merge(&mut self, category: impl Into<String>, tally: CategoryTally) {
        let slot = self.categories.entry(category.into()).or_default();
        slot.outcome += tally.outcome;
        slot.failures.extend(tally.failures);
        slot.fallback_used += tally.fallback_used;
        slot.structured += tally.structured;
    }

    pub fn finish(self, cancelled: bool) -> RunReport {
        let mut totals = ImportOutcome::default();
        let mut per_category = BTreeMap::new();
        let mut failures = Vec::new();
        let mut fallback_used = 0;
        let mut structured = 0;

        for (name, tally) in self.categories {
            totals += tally.outcome;
            fallback_used += tally.fallback_used;
            structured += tally.structured;
            failures.extend(tally.failures);
            per_category.insert(name, tally.outcome);
        }

        RunReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            per_category,
            totals,
            failures,
            fallback_used,
            structured,
            cancelled,
        }
    }
}

/// The result of one `run_import` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub per_category: BTreeMap<String, ImportOutcome>,
    pub totals: ImportOutcome,
    pub failures: Vec<EntryFailure>,
    pub fallback_used: u32,
    pub structured: u32,
    pub cancelled: bool,
}

impl RunReport {
    pub fn category(&self, name: &str) -> ImportOutcome {
        self.per_category.get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_merge_into_totals() {
        let entry = FeedEntry::new("Broken", "https://e.com/broken");
        let mut world = CategoryTally::default();
        world.imported();
        world.imported();
        world.error("world", &entry, ErrorKind::Persistence, "store down");

        let mut tech = CategoryTally::default();
        tech.skipped();
        tech.fallback_used = 1;

        let mut ctx = RunContext::new();
        ctx.merge("world", world);
        ctx.merge("tech", tech);
        let report = ctx.finish(false);

        assert_eq!(report.totals.imported, 2);
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(report.totals.errors, 1);
        assert_eq!(report.category("tech").skipped, 1);
        assert_eq!(report.category("missing"), ImportOutcome::default());
        assert_eq!(report.fallback_used, 1);

        let failure = &report.failures[0];
        assert_eq!(failure.title, "Broken");
        assert_eq!(failure.url, "https://e.com/broken");
        assert_eq!(failure.kind, ErrorKind::Persistence);
    }

    #[test]
    fn fresh_context_starts_at_zero() {
        let report = RunContext::new().finish(false);
        assert_eq!(report.totals, ImportOutcome::default());
        assert!(report.failures.is_empty());
    }
}
