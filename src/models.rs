//! Records and work units passed between the harvesting stages.

use std::ops::RangeInclusive;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::HarvestError;

/// Number of discussions on one listing page.
pub const PAGE_SIZE: u32 = 25;

/// Largest page index whose `start` offset still fits in a `u32`.
pub const MAX_PAGE_INDEX: u32 = (u32::MAX - 1) / PAGE_SIZE;

/// One fetchable listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPageRef {
    pub forum_id: String,
    pub page_offset: u32,
}

impl ListingPageRef {
    #[must_use]
    pub fn new(forum_id: impl Into<String>, page_offset: u32) -> Self {
        Self {
            forum_id: forum_id.into(),
            page_offset,
        }
    }

    /// Listing URL on `base` (scheme and host, no trailing slash).
    #[must_use]
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/group/{}/discussion?start={}",
            base.trim_end_matches('/'),
            self.forum_id,
            u64::from(self.page_offset) * u64::from(PAGE_SIZE) + 1
        )
    }
}

/// One discussion thread as extracted from a listing page.
///
/// The optional trailing fields are filled only by detail enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscussionRecord {
    pub title: String,
    pub short_title: String,
    pub link: String,
    pub id: String,
    pub author: String,
    pub reply_count: u32,
    pub last_activity: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favor_count: Option<u32>,
}

impl DiscussionRecord {
    /// Key used to suppress duplicates: the id, or the link when no id
    /// could be derived.
    #[must_use]
    pub fn dedup_key(&self) -> &str {
        if self.id.is_empty() {
            &self.link
        } else {
            &self.id
        }
    }
}

/// Thread id from its link: trailing slashes trimmed, last path segment kept.
///
/// ```
/// use discussion_harvester::models::derive_id;
/// assert_eq!(derive_id("https://site/group/x/topic/12345/"), "12345");
/// assert_eq!(derive_id("https://site/group/x/topic/12345"), "12345");
/// ```
#[must_use]
pub fn derive_id(link: &str) -> String {
    let trimmed = link.trim_end_matches('/');
    trimmed
        .rsplit_once('/')
        .map_or(trimmed, |(_, last)| last)
        .to_string()
}

/// Contiguous page range owned by one worker. Assigned once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchJob {
    pub worker_index: usize,
    pub page_range_start: u32,
    pub page_range_end: u32,
}

impl FetchJob {
    /// Pages of this job in increasing order. Empty when the clipped range
    /// starts past its end.
    #[must_use]
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.page_range_start..=self.page_range_end
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page_range_start > self.page_range_end
    }
}

/// The error that stopped a worker, with the page it happened on.
#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: HarvestError,
}

/// What one worker hands back, exactly once.
#[derive(Debug)]
pub struct WorkerOutcome {
    pub worker_index: usize,
    pub records: Vec<DiscussionRecord>,
    pub pages_completed: u32,
    pub failure: Option<PageFailure>,
}

impl WorkerOutcome {
    #[must_use]
    pub fn empty(worker_index: usize) -> Self {
        Self {
            worker_index,
            records: Vec::new(),
            pages_completed: 0,
            failure: None,
        }
    }
}
