//! Column layouts of a listing row.

use scraper::{ElementRef, Html, Selector};

use super::element_text;
use crate::error::HarvestError;

/// The cells of one listing row, located from its title anchor.
#[derive(Debug, Clone, Copy)]
pub struct RowCells<'a> {
    pub author: ElementRef<'a>,
    pub reply_count: ElementRef<'a>,
    pub last_activity: ElementRef<'a>,
}

/// How a title anchor maps onto the other columns of its row.
///
/// A layout change on the site is absorbed by adding one implementation.
pub trait RowLayout: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Check the page's column header against the layout's expectations.
    ///
    /// # Errors
    ///
    /// Returns `Schema` when the header is present but does not match.
    fn validate_header(&self, document: &Html) -> Result<(), HarvestError>;

    /// Locate the row cells belonging to `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `Schema` when a column is not where the layout says it is.
    fn locate<'a>(&self, anchor: ElementRef<'a>) -> Result<RowCells<'a>, HarvestError>;
}

/// Header labels of the discussion table, in column order.
pub const DEFAULT_HEADER_LABELS: [&str; 4] = ["讨论", "作者", "回应", "最后回应"];

/// Default layout: each column sits a fixed number of raw DOM siblings after
/// the previous one.
///
/// With the site's markup the whitespace text between `<td>`s counts as a
/// sibling, so the hop is two: title cell, author, reply count, last activity.
#[derive(Debug, Clone)]
pub struct SiblingOffsetLayout {
    hop: usize,
    header_labels: Vec<String>,
}

impl SiblingOffsetLayout {
    #[must_use]
    pub fn new(hop: usize, header_labels: Vec<String>) -> Self {
        Self { hop, header_labels }
    }

    /// Skip header validation; only the per-row hops are checked.
    #[must_use]
    pub fn without_header_check(mut self) -> Self {
        self.header_labels.clear();
        self
    }

    fn hop_from<'a>(
        &self,
        from: ElementRef<'a>,
        column: &'static str,
    ) -> Result<ElementRef<'a>, HarvestError> {
        let mut current = Some(*from);
        for _ in 0..self.hop {
            current = current.and_then(|node| node.next_sibling());
        }

        current
            .and_then(ElementRef::wrap)
            .filter(|cell| cell.value().name() == "td")
            .ok_or_else(|| {
                HarvestError::Schema(format!(
                    "{column} column is not a <td> {} siblings after the previous column",
                    self.hop
                ))
            })
    }
}

impl Default for SiblingOffsetLayout {
    fn default() -> Self {
        Self::new(2, DEFAULT_HEADER_LABELS.iter().map(ToString::to_string).collect())
    }
}

impl RowLayout for SiblingOffsetLayout {
    fn name(&self) -> &'static str {
        "sibling-offset"
    }

    fn validate_header(&self, document: &Html) -> Result<(), HarvestError> {
        if self.header_labels.is_empty() {
            return Ok(());
        }

        let header_selector = Selector::parse("tr.th").expect("Invalid selector");
        let Some(header) = document.select(&header_selector).next() else {
            return Ok(());
        };

        let labels: Vec<String> = header
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| cell.value().name() == "td")
            .map(|cell| element_text(&cell))
            .collect();

        if labels != self.header_labels {
            return Err(HarvestError::Schema(format!(
                "expected columns {:?}, found {:?}",
                self.header_labels, labels
            )));
        }
        Ok(())
    }

    fn locate<'a>(&self, anchor: ElementRef<'a>) -> Result<RowCells<'a>, HarvestError> {
        let title_cell = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .ok_or_else(|| HarvestError::Schema("title anchor has no parent cell".to_string()))?;

        let author = self.hop_from(title_cell, "author")?;
        let reply_count = self.hop_from(author, "reply count")?;
        let last_activity = self.hop_from(reply_count, "last activity")?;

        Ok(RowCells {
            author,
            reply_count,
            last_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_anchor(document: &Html) -> ElementRef<'_> {
        let selector = Selector::parse("td.title > a").unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn test_locate_with_whitespace_siblings() {
        let html = r#"<table><tr>
            <td class="title"><a href="https://site/topic/1/" title="One">One</a></td>
            <td><a href="https://site/people/a/">alice</a></td>
            <td>4</td>
            <td>05-09 14:30</td>
        </tr></table>"#;
        let document = Html::parse_document(html);
        let cells = SiblingOffsetLayout::default()
            .locate(first_anchor(&document))
            .unwrap();

        assert_eq!(element_text(&cells.author), "alice");
        assert_eq!(element_text(&cells.reply_count), "4");
        assert_eq!(element_text(&cells.last_activity), "05-09 14:30");
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let html = r#"<table><tr>
            <td class="title"><a href="https://site/topic/1/">One</a></td>
            <td>alice</td>
        </tr></table>"#;
        let document = Html::parse_document(html);
        let err = SiblingOffsetLayout::default()
            .locate(first_anchor(&document))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Schema(_)));
    }

    #[test]
    fn test_header_validation() {
        let good = r#"<table>
            <tr class="th"><td>讨论</td><td>作者</td><td>回应</td><td>最后回应</td></tr>
        </table>"#;
        let bad = r#"<table>
            <tr class="th"><td>讨论</td><td>回应</td><td>作者</td><td>最后回应</td></tr>
        </table>"#;
        let layout = SiblingOffsetLayout::default();

        assert!(layout.validate_header(&Html::parse_document(good)).is_ok());
        assert!(matches!(
            layout.validate_header(&Html::parse_document(bad)),
            Err(HarvestError::Schema(_))
        ));
        assert!(layout
            .clone()
            .without_header_check()
            .validate_header(&Html::parse_document(bad))
            .is_ok());
    }

    #[test]
    fn test_no_header_row_passes() {
        let layout = SiblingOffsetLayout::default();
        assert!(layout
            .validate_header(&Html::parse_document("<table></table>"))
            .is_ok());
    }
}
