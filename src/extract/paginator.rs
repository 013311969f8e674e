use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::element_text;

/// Total number of listing pages advertised by the paginator, if any.
///
/// Prefers the `data-total-page` attribute on the current-page marker and
/// falls back to the largest numbered paginator link. A paginator that elides
/// pages (`...`) without advertising a total yields `None`, since its largest
/// visible link is only a lower bound.
#[must_use]
pub fn probe_total_pages(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let paginator_selector = Selector::parse(".paginator").expect("Invalid selector");
    let current_selector = Selector::parse(".paginator .thispage").expect("Invalid selector");
    let link_selector = Selector::parse(".paginator a, .paginator .thispage").expect("Invalid selector");
    let break_selector = Selector::parse(".paginator .break").expect("Invalid selector");

    let advertised = document
        .select(&current_selector)
        .find_map(|el| el.value().attr("data-total-page")?.trim().parse::<u32>().ok());
    if advertised.is_some() {
        return advertised;
    }

    let truncated = document.select(&break_selector).next().is_some()
        || document.select(&paginator_selector).any(|paginator| {
            let text = element_text(&paginator);
            text.contains("...") || text.contains('…')
        });
    if truncated {
        warn!("Paginator elides pages and advertises no total, leaving the end unknown");
        return None;
    }

    let highest = document
        .select(&link_selector)
        .filter_map(|el| element_text(&el).parse::<u32>().ok())
        .max();
    if let Some(pages) = highest {
        debug!(pages, "No advertised page total, using the highest paginator link");
    }
    highest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_page_attribute() {
        let html = r#"<div class="paginator">
            <span class="thispage" data-total-page="40">1</span>
            <a href="?start=25">2</a>
        </div>"#;
        assert_eq!(probe_total_pages(html), Some(40));
    }

    #[test]
    fn test_largest_link_fallback() {
        let html = r#"<div class="paginator">
            <span class="prev">&lt;前页</span>
            <span class="thispage">1</span>
            <a href="?start=25">2</a>
            <a href="?start=50">3</a>
            <span class="next"><a href="?start=25">后页&gt;</a></span>
        </div>"#;
        assert_eq!(probe_total_pages(html), Some(3));
    }

    #[test]
    fn test_elided_paginator_without_total_is_unknown() {
        let html = r#"<div class="paginator">
            <span class="thispage">1</span>
            <a href="?start=25">2</a>
            <a href="?start=50">3</a>
            <span class="break">...</span>
            <a href="?start=725">30</a>
            <span class="next"><a href="?start=25">后页&gt;</a></span>
        </div>"#;
        assert_eq!(probe_total_pages(html), None);

        let html = html.replace("<span class=\"break\">...</span>", "<span>…</span>");
        assert_eq!(probe_total_pages(&html), None);
    }

    #[test]
    fn test_elided_paginator_with_total_uses_total() {
        let html = r#"<div class="paginator">
            <span class="thispage" data-total-page="120">1</span>
            <a href="?start=25">2</a>
            <span class="break">...</span>
            <a href="?start=2975">120</a>
        </div>"#;
        assert_eq!(probe_total_pages(html), Some(120));
    }

    #[test]
    fn test_no_paginator() {
        assert_eq!(probe_total_pages("<p>nothing</p>"), None);
    }
}
