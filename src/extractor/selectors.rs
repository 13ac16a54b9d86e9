use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::extractor::dom;
use crate::extractor::model::{ReadabilityResult, text_len};

/// Most specific first; the first whose visible text clears the threshold wins.
pub const CONTENT_SELECTORS: &[&str] = &[
    "[itemprop='articleBody']",
    ".article-body",
    ".article__body",
    ".article-content",
    ".article-text",
    ".entry-content",
    ".post-content",
    ".post-body",
    ".story-body",
    ".story-content",
    ".content-body",
    ".body-text",
    "#article-body",
    "#story",
    "article",
    "main",
    "[role='main']",
    ".post",
    "#content",
    ".content",
];

static PARSED_SELECTORS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok().map(|sel| (*css, sel)))
        .collect()
});

pub fn extract(html: &str, min_chars: usize) -> Option<ReadabilityResult> {
    let document = Html::parse_document(html);
    extract_from_document(&document, min_chars)
}

/// Also used against browser-rendered DOMs.
pub fn extract_from_document(document: &Html, min_chars: usize) -> Option<ReadabilityResult> {
    for (css, selector) in PARSED_SELECTORS.iter() {
        for element in document.select(selector) {
            if dom::inside_boilerplate(&element) {
                continue;
            }
            let text = dom::visible_text(&element);
            if text_len(text.trim()) >= min_chars {
                tracing::debug!(selector = css, "content selector matched");
                return Some(ReadabilityResult {
                    title: dom::page_title(document),
                    html: dom::content_html(&element),
                    text,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sufficient_selector_wins() {
        let long = "Officials said the storm would reach the coast by evening. ".repeat(6);
        let html = format!(
            r#"<html><body><main><div class="entry-content"><p>{long}</p></div><div class="teaser">short teaser</div></main></body></html>"#
        );
        let result = extract(&html, 200).unwrap();
        assert!(result.text.contains("Officials said"));
        assert!(!result.text.contains("short teaser"));
        assert!(result.html.contains("<p>"));
    }

    #[test]
    fn short_matches_are_skipped() {
        let html = r#"<html><body><article><p>Too short.</p></article></body></html>"#;
        assert!(extract(html, 200).is_none());
    }

    #[test]
    fn layout_classes_on_body_do_not_hide_content() {
        let long = "The transit authority confirmed the new timetable takes effect in May. ".repeat(5);
        let html = format!(
            r#"<html class="menu-open"><body class="post-template-default single no-sidebar"><div class="entry-content"><p>{long}</p></div></body></html>"#
        );
        let result = extract(&html, 200).unwrap();
        assert!(result.text.contains("new timetable"));
    }

    #[test]
    fn selector_inside_sidebar_is_ignored() {
        let long = "Sidebar copy that goes on and on about unrelated things. ".repeat(6);
        let html = format!(
            r#"<html><body><aside><div class="entry-content"><p>{long}</p></div></aside></body></html>"#
        );
        assert!(extract(&html, 200).is_none());
    }
}
