//! Structural extraction of discussion records from site markup.
//!
//! The listing page offers no machine-readable schema. Records are found by
//! a positional rule (an anchor whose parent cell is flagged `title`) and the
//! remaining columns are reached through a [`RowLayout`].

mod detail;
mod layout;
mod listing;
mod paginator;
mod timestamp;

pub use detail::{parse_detail, DetailFields};
pub use layout::{RowCells, RowLayout, SiblingOffsetLayout};
pub use listing::ListingExtractor;
pub use paginator::probe_total_pages;
pub use timestamp::{parse_created_at, parse_last_activity, parse_reply_count};

use scraper::ElementRef;

/// Concatenated, trimmed text of an element.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
