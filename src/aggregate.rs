//! Merging of worker outcomes into one best-effort result.

use std::fmt;

use serde::Serialize;

use crate::error::HarvestError;
use crate::models::{DiscussionRecord, WorkerOutcome};

/// One distinct failure message and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub message: String,
    pub count: usize,
    /// Listing pages the failure stopped on; empty for detail failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<u32>,
}

/// Failures grouped by message, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorSummary {
    entries: Vec<ErrorEntry>,
}

impl ErrorSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `error`, optionally on a listing page.
    pub fn record(&mut self, error: &HarvestError, page: Option<u32>) {
        self.record_message(error.summary_key(), page);
    }

    pub fn record_message(&mut self, message: String, page: Option<u32>) {
        let index = if let Some(i) = self.entries.iter().position(|e| e.message == message) {
            self.entries[i].count += 1;
            i
        } else {
            self.entries.push(ErrorEntry {
                message,
                count: 1,
                pages: Vec::new(),
            });
            self.entries.len() - 1
        };
        if let Some(page) = page {
            let pages = &mut self.entries[index].pages;
            pages.push(page);
            pages.sort_unstable();
        }
    }

    pub fn merge(&mut self, other: Self) {
        for entry in other.entries {
            if let Some(existing) = self.entries.iter_mut().find(|e| e.message == entry.message) {
                existing.count += entry.count;
                existing.pages.extend(entry.pages);
                existing.pages.sort_unstable();
            } else {
                self.entries.push(entry);
            }
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total occurrences across all messages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} (x{}", entry.message, entry.count)?;
            if !entry.pages.is_empty() {
                let pages: Vec<String> = entry.pages.iter().map(ToString::to_string).collect();
                write!(f, ", pages {}", pages.join(", "))?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Records plus an optional error summary.
///
/// Non-empty records with errors means some pages were lost; callers decide
/// whether that counts as failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub records: Vec<DiscussionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorSummary>,
    pub pages_planned: u32,
    pub pages_completed: u32,
}

impl AggregateResult {
    /// Fold further failures (e.g. from enrichment) into the summary.
    pub fn absorb_errors(&mut self, summary: ErrorSummary) {
        if summary.is_empty() {
            return;
        }
        match &mut self.errors {
            Some(existing) => existing.merge(summary),
            None => self.errors = Some(summary),
        }
    }
}

/// Collects worker outcomes. Used only after workers report, on one task.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<DiscussionRecord>,
    errors: ErrorSummary,
    pages_planned: u32,
    pages_completed: u32,
    outcomes: usize,
}

impl ResultAggregator {
    #[must_use]
    pub fn new(pages_planned: u32) -> Self {
        Self {
            pages_planned,
            ..Self::default()
        }
    }

    pub fn push(&mut self, outcome: WorkerOutcome) {
        self.outcomes += 1;
        self.pages_completed += outcome.pages_completed;
        self.records.extend(outcome.records);
        if let Some(failure) = outcome.failure {
            self.errors.record(&failure.error, Some(failure.page));
        }
    }

    /// A worker that never reported, e.g. because its task panicked.
    pub fn push_lost_worker(&mut self, message: String) {
        self.outcomes += 1;
        self.errors.record_message(message, None);
    }

    #[must_use]
    pub fn outcomes(&self) -> usize {
        self.outcomes
    }

    #[must_use]
    pub fn finish(self) -> AggregateResult {
        AggregateResult {
            records: self.records,
            errors: (!self.errors.is_empty()).then_some(self.errors),
            pages_planned: self.pages_planned,
            pages_completed: self.pages_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageFailure;

    fn status_error(url: &str) -> HarvestError {
        HarvestError::HttpStatus {
            url: url.to_string(),
            status: reqwest::StatusCode::FORBIDDEN,
        }
    }

    #[test]
    fn test_identical_errors_group_with_count() {
        let mut aggregator = ResultAggregator::new(12);
        for (worker, page) in [(0, 2), (1, 5), (2, 8)] {
            aggregator.push(WorkerOutcome {
                worker_index: worker,
                records: Vec::new(),
                pages_completed: 1,
                failure: Some(PageFailure {
                    page,
                    error: status_error(&format!("https://s/?start={page}")),
                }),
            });
        }
        aggregator.push(WorkerOutcome::empty(3));
        assert_eq!(aggregator.outcomes(), 4);

        let result = aggregator.finish();
        let errors = result.errors.unwrap();
        assert_eq!(errors.entries().len(), 1);
        assert_eq!(errors.total(), 3);
        assert_eq!(
            errors.to_string(),
            "http status 403 Forbidden (x3, pages 2, 5, 8)"
        );
        assert_eq!(result.pages_completed, 3);
        assert_eq!(result.pages_planned, 12);
    }

    #[test]
    fn test_no_errors_means_none() {
        let mut aggregator = ResultAggregator::new(1);
        aggregator.push(WorkerOutcome::empty(0));
        assert!(aggregator.finish().errors.is_none());
    }

    #[test]
    fn test_absorb_errors_merges() {
        let mut result = AggregateResult::default();
        let mut detail = ErrorSummary::new();
        detail.record_message("missing '.color-green' on detail page".to_string(), None);
        detail.record_message("missing '.color-green' on detail page".to_string(), None);
        result.absorb_errors(detail.clone());
        result.absorb_errors(detail);

        let errors = result.errors.unwrap();
        assert_eq!(errors.entries()[0].count, 4);
        assert_eq!(
            errors.to_string(),
            "missing '.color-green' on detail page (x4)"
        );
    }
}
