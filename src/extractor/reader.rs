use readability::extractor;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::extractor::dom;
use crate::extractor::model::{ReadabilityResult, text_len};

static CANDIDATE_HINT: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)(article|body|content|entry|main|post|story|text)").unwrap()
});

static COMMA: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"[,，、]").unwrap());

const MIN_PARAGRAPH_CHARS: usize = 25;

/// Readability-style extraction: the `readability` crate first, then our own
/// paragraph-density scoring when the crate comes back short or fails.
pub fn extract(html: &str, url: &Url, min_chars: usize) -> Option<ReadabilityResult> {
    let document = Html::parse_document(html);
    let title = dom::page_title(&document);

    if let Ok(article) = extractor::extract(&mut html.as_bytes(), url)
        && text_len(article.text.trim()) >= min_chars
    {
        let title = title.or_else(|| Some(article.title).filter(|t| !t.trim().is_empty()));
        return Some(ReadabilityResult {
            title,
            text: article.text,
            html: article.content,
        });
    }

    debug!("readability crate came back short, scoring paragraphs");
    density_extract(&document, title)
}

/// Scores the parents of paragraphs by text mass and comma count, penalised by
/// link density, and returns the best-scoring container.
fn density_extract(document: &Html, title: Option<String>) -> Option<ReadabilityResult> {
    let mut scores = HashMap::new();

    for paragraph in document.select(&dom::PARAGRAPH) {
        if dom::inside_boilerplate(&paragraph) {
            continue;
        }
        let text = paragraph.text().collect::<String>();
        let len = text_len(text.trim());
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let points = 1.0 + COMMA.find_iter(&text).count() as f64 + (len as f64 / 100.0).min(3.0);

        let mut ancestors = paragraph.ancestors().filter_map(ElementRef::wrap);
        if let Some(parent) = ancestors.next() {
            *scores.entry(parent.id()).or_insert(0.0) += points;
        }
        if let Some(grandparent) = ancestors.next() {
            *scores.entry(grandparent.id()).or_insert(0.0) += points / 2.0;
        }
    }

    let best = scores
        .into_iter()
        .filter_map(|(id, score)| {
            let element = document.tree.get(id).and_then(ElementRef::wrap)?;
            let name = element.value().name();
            if name == "body" || name == "html" {
                return None;
            }
            let mut weighted = score * (1.0 - dom::link_density(&element));
            let hints = [element.value().attr("class"), element.value().attr("id")];
            if hints.iter().flatten().any(|h| CANDIDATE_HINT.is_match(h)) {
                weighted *= 1.25;
            }
            if name == "article" {
                weighted *= 1.5;
            }
            Some((element, weighted))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let (element, _) = best.or_else(|| body_candidate(document))?;
    let text = dom::visible_text(&element);
    if text.trim().is_empty() {
        return None;
    }

    Some(ReadabilityResult {
        title,
        html: dom::content_html(&element),
        text,
    })
}

fn body_candidate(document: &Html) -> Option<(ElementRef<'_>, f64)> {
    static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
    document
        .select(&ARTICLE)
        .next()
        .map(|el| (el, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/story").unwrap()
    }

    #[test]
    fn density_prefers_paragraph_cluster_over_navigation() {
        let para = "The council voted on Tuesday to approve the new budget, which includes funding for schools, parks, and transit improvements across the city. ";
        let html = format!(
            r#"<html><head><title>Budget Passes</title></head><body>
            <div class="nav-links"><p><a href="/a">Home</a> <a href="/b">World</a> <a href="/c">Business news and more links here</a></p></div>
            <div class="story-text"><p>{para}</p><p>{para}</p><p>{para}</p></div>
            <div class="comments"><p>First comment that is long enough to count as a paragraph here.</p></div>
            </body></html>"#
        );
        let document = Html::parse_document(&html);
        let result = density_extract(&document, dom::page_title(&document)).unwrap();
        assert!(result.text.contains("council voted"));
        assert!(!result.text.contains("First comment"));
        assert!(!result.text.contains("Home"));
        assert_eq!(result.title.as_deref(), Some("Budget Passes"));
    }

    #[test]
    fn extract_returns_long_article() {
        let body = "Researchers announced a new method for discovering drug candidates, combining lab data with large models. ".repeat(20);
        let html = format!(
            "<html><head><title>Drug Discovery</title></head><body><article><h1>Drug Discovery</h1><p>{body}</p><p>{body}</p></article></body></html>"
        );
        let result = extract(&html, &url(), 200).unwrap();
        assert!(text_len(&result.text) >= 200);
        assert!(result.text.contains("Researchers announced"));
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(extract("<html><body></body></html>", &url(), 200).is_none());
    }
}
