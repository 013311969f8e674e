//! Title filtering and run-wide duplicate suppression.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use regex::Regex;

use crate::models::DiscussionRecord;

/// Predicate deciding whether a record is worth keeping.
pub trait RecordFilter: Send + Sync {
    fn accepts(&self, record: &DiscussionRecord) -> bool;
}

/// Passes a record when any pattern matches its title.
#[derive(Debug, Clone)]
pub struct TitlePatterns {
    patterns: Vec<Regex>,
}

impl TitlePatterns {
    #[must_use]
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Compile a semicolon-joined pattern list. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        let patterns = raw
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Regex::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(patterns))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl RecordFilter for TitlePatterns {
    fn accepts(&self, record: &DiscussionRecord) -> bool {
        self.patterns.iter().any(|p| p.is_match(&record.title))
    }
}

/// Keys already admitted during this run. First sighting wins.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`, returning true only the first time it is offered.
    pub fn first_sighting(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(key) {
            return false;
        }
        seen.insert(key.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Filter and dedup state scoped to a single harvesting run.
///
/// Shared by every worker of the run. When two workers see the same thread
/// concurrently, which copy is kept depends on arrival order.
pub struct HarvestContext {
    filter: Box<dyn RecordFilter>,
    dedup: DedupSet,
}

impl HarvestContext {
    #[must_use]
    pub fn new(filter: Box<dyn RecordFilter>) -> Self {
        Self {
            filter,
            dedup: DedupSet::new(),
        }
    }

    /// Filter first, then dedup, so rejected records never claim a key.
    pub fn admit(&self, record: &DiscussionRecord) -> bool {
        self.filter.accepts(record) && self.dedup.first_sighting(record.dedup_key())
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.dedup.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::derive_id;

    fn record(title: &str, link: &str) -> DiscussionRecord {
        DiscussionRecord {
            title: title.to_string(),
            short_title: title.to_string(),
            link: link.to_string(),
            id: derive_id(link),
            author: "alice".to_string(),
            reply_count: 0,
            last_activity: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            created_at: None,
            content: None,
            favor_count: None,
        }
    }

    #[test]
    fn test_parse_semicolon_joined() {
        let patterns = TitlePatterns::parse("整租; 两居室 ;;").unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.accepts(&record("整租 近地铁", "https://s/t/1/")));
        assert!(patterns.accepts(&record("次卧 两居室", "https://s/t/2/")));
        assert!(!patterns.accepts(&record("合租 单间", "https://s/t/3/")));
    }

    #[test]
    fn test_parse_invalid_pattern() {
        assert!(TitlePatterns::parse("ok;(unclosed").is_err());
    }

    #[test]
    fn test_dedup_first_sighting_wins() {
        let context = HarvestContext::new(Box::new(TitlePatterns::parse(".").unwrap()));
        let first = record("room", "https://s/topic/9/");
        let again = record("room again", "https://s/topic/9");

        assert!(context.admit(&first));
        assert!(!context.admit(&again));
        assert!(!context.admit(&first));
        assert_eq!(context.seen_count(), 1);
    }

    #[test]
    fn test_rejected_records_do_not_claim_key() {
        let context = HarvestContext::new(Box::new(TitlePatterns::parse("整租").unwrap()));
        assert!(!context.admit(&record("合租", "https://s/topic/5/")));
        assert!(context.admit(&record("整租", "https://s/topic/5/")));
    }

    #[test]
    fn test_dedup_across_threads() {
        let context = Arc::new(HarvestContext::new(Box::new(
            TitlePatterns::parse(".").unwrap(),
        )));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|n| context.admit(&record("t", &format!("https://s/topic/{n}/"))))
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
