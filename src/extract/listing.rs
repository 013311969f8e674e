use std::sync::Arc;

use chrono::{Datelike, Local};
use scraper::{Html, Selector};
use tracing::trace;

use super::layout::{RowLayout, SiblingOffsetLayout};
use super::timestamp::{parse_last_activity, parse_reply_count};
use super::element_text;
use crate::error::HarvestError;
use crate::models::{derive_id, DiscussionRecord};

/// Anchors whose parent cell carries exactly the `title` class.
const TITLE_ANCHOR_SELECTOR: &str = r#"td[class="title"] > a"#;

/// Turns one listing page into discussion records.
#[derive(Clone)]
pub struct ListingExtractor {
    layout: Arc<dyn RowLayout>,
    reference_year: Option<i32>,
}

impl ListingExtractor {
    #[must_use]
    pub fn new(layout: Arc<dyn RowLayout>) -> Self {
        Self {
            layout,
            reference_year: None,
        }
    }

    /// Pin the year used for short `MM-DD HH:MM` timestamps instead of
    /// reading the clock at extraction time.
    #[must_use]
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    #[must_use]
    pub fn layout_name(&self) -> &'static str {
        self.layout.name()
    }

    /// Extract every record on the page, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `NoMatch` when the page has no title anchors, `Schema` when
    /// the layout does not fit, and `FieldConversion` when a column fails
    /// to parse. Any single bad row fails the whole page.
    pub fn extract(&self, html: &str, url: &str) -> Result<Vec<DiscussionRecord>, HarvestError> {
        let document = Html::parse_document(html);
        self.layout.validate_header(&document)?;

        let anchor_selector = Selector::parse(TITLE_ANCHOR_SELECTOR).expect("Invalid selector");
        let year = self.reference_year.unwrap_or_else(|| Local::now().year());

        let mut records = Vec::new();
        for anchor in document.select(&anchor_selector) {
            let cells = self.layout.locate(anchor)?;

            let link = anchor.value().attr("href").unwrap_or_default().to_string();
            let short_title = element_text(&anchor);
            let title = anchor
                .value()
                .attr("title")
                .map_or_else(|| short_title.clone(), ToString::to_string);

            let record = DiscussionRecord {
                id: derive_id(&link),
                author: element_text(&cells.author),
                reply_count: parse_reply_count(&element_text(&cells.reply_count))?,
                last_activity: parse_last_activity(&element_text(&cells.last_activity), year)?,
                title,
                short_title,
                link,
                created_at: None,
                content: None,
                favor_count: None,
            };
            trace!(id = %record.id, title = %record.title, "Extracted record");
            records.push(record);
        }

        if records.is_empty() {
            return Err(HarvestError::NoMatch {
                url: url.to_string(),
            });
        }

        Ok(records)
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new(Arc::new(SiblingOffsetLayout::default()))
    }
}
