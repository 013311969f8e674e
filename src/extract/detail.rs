use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};

use super::element_text;
use super::timestamp::parse_created_at;
use crate::error::HarvestError;

const CREATED_SELECTOR: &str = ".color-green";
const CONTENT_SELECTOR: &str = "#link-report";
const FAVOR_SELECTOR: &str = ".fav-num";

/// `"<n>人 喜欢"`: how many people liked the thread.
static FAVOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)人\s*喜欢").expect("Invalid regex"));

/// Fields only available on a thread's own page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub created_at: NaiveDateTime,
    pub content: String,
    pub favor_count: u32,
}

/// Parse a thread detail page.
///
/// A missing favor phrase means nobody liked the thread.
///
/// # Errors
///
/// Returns `Parse` when the creation time or the body anchor is missing,
/// and `FieldConversion` when the creation time does not parse.
pub fn parse_detail(html: &str, url: &str) -> Result<DetailFields, HarvestError> {
    let document = Html::parse_document(html);

    let created_text = select_text(&document, CREATED_SELECTOR).ok_or_else(|| {
        HarvestError::Parse {
            url: url.to_string(),
            selector: CREATED_SELECTOR.to_string(),
        }
    })?;
    let created_at = parse_created_at(&created_text)?;

    let content_selector = Selector::parse(CONTENT_SELECTOR).expect("Invalid selector");
    let content = document
        .select(&content_selector)
        .next()
        .map(|node| {
            node.text()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .ok_or_else(|| HarvestError::Parse {
            url: url.to_string(),
            selector: CONTENT_SELECTOR.to_string(),
        })?;

    let favor_count = select_text(&document, FAVOR_SELECTOR)
        .as_deref()
        .and_then(parse_favor_count)
        .unwrap_or(0);

    Ok(DetailFields {
        created_at,
        content,
        favor_count,
    })
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).expect("Invalid selector");
    document.select(&selector).next().map(|el| element_text(&el))
}

fn parse_favor_count(text: &str) -> Option<u32> {
    FAVOR_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const DETAIL: &str = r##"<html><head><title>整租 两居室</title></head><body>
        <div class="topic-doc">
            <h3><span class="from">来自: <a href="https://www.douban.com/people/alice/">alice</a></span>
            <span class="color-green">2017-03-01 08:15:42</span></h3>
            <div id="link-report">
                <div class="topic-content"><p>两居室整租</p><p>近地铁，押一付三</p></div>
            </div>
            <div class="sns-bar"><span class="fav-num"><a href="#">8人 喜欢</a></span></div>
        </div>
    </body></html>"##;

    #[test]
    fn test_parse_detail() {
        let detail = parse_detail(DETAIL, "https://test/topic/1/").unwrap();
        assert_eq!(
            detail.created_at,
            NaiveDate::from_ymd_opt(2017, 3, 1)
                .unwrap()
                .and_hms_opt(8, 15, 42)
                .unwrap()
        );
        assert_eq!(detail.content, "两居室整租\n近地铁，押一付三");
        assert_eq!(detail.favor_count, 8);
    }

    #[test]
    fn test_missing_favor_is_zero() {
        let html = DETAIL.replace("8人 喜欢", "喜欢");
        assert_eq!(parse_detail(&html, "u").unwrap().favor_count, 0);

        let html = DETAIL.replace("fav-num", "other");
        assert_eq!(parse_detail(&html, "u").unwrap().favor_count, 0);
    }

    #[test]
    fn test_missing_created_is_parse_error() {
        let html = DETAIL.replace("color-green", "color-gray");
        let err = parse_detail(&html, "u").unwrap_err();
        assert!(
            matches!(err, HarvestError::Parse { ref selector, .. } if selector == ".color-green")
        );
    }

    #[test]
    fn test_missing_body_is_parse_error() {
        let html = DETAIL.replace("link-report", "link-other");
        let err = parse_detail(&html, "u").unwrap_err();
        assert!(matches!(err, HarvestError::Parse { ref selector, .. } if selector == "#link-report"));
    }

    #[test]
    fn test_favor_pattern() {
        assert_eq!(parse_favor_count("12人喜欢"), Some(12));
        assert_eq!(parse_favor_count("3人  喜欢"), Some(3));
        assert_eq!(parse_favor_count("喜欢"), None);
    }
}
