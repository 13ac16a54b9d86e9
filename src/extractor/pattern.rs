use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

use crate::extractor::dom::paragraphs_to_html;
use crate::extractor::model::{ReadabilityResult, text_len};

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<!--.*?-->")
        .unwrap()
});

static ARTICLE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").unwrap());

static CONTENT_DIV_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<div\b[^>]*(?:class|id)\s*=\s*["'][^"']*(?:content|article|story|post|entry|body|text)[^"']*["'][^>]*>"#,
    )
    .unwrap()
});

static SPAN_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<footer\b|<aside\b|<nav\b|</main>|</body>").unwrap());

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").unwrap());

const MAX_SPAN_BYTES: usize = 200_000;

/// Last static resort: no DOM, just the largest article-like span of raw markup.
pub fn extract(html: &str) -> Option<ReadabilityResult> {
    let stripped = NOISE.replace_all(html, " ");

    let mut spans: Vec<&str> = ARTICLE_SPAN
        .captures_iter(&stripped)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    for open in CONTENT_DIV_OPEN.find_iter(&stripped) {
        let rest = &stripped[open.end()..];
        let end = SPAN_END
            .find(rest)
            .map(|m| m.start())
            .unwrap_or(rest.len())
            .min(MAX_SPAN_BYTES);
        let end = floor_char_boundary(rest, end);
        spans.push(&rest[..end]);
    }

    let best = spans
        .into_iter()
        .map(paragraphs_in)
        .filter(|paragraphs| !paragraphs.is_empty())
        .max_by_key(|paragraphs| paragraphs.iter().map(|p| text_len(p)).sum::<usize>())?;

    let title = TITLE
        .captures(&stripped)
        .and_then(|c| c.get(1))
        .map(|m| decode_text(m.as_str()))
        .filter(|t| !t.is_empty());

    Some(ReadabilityResult {
        title,
        html: paragraphs_to_html(best.iter().map(String::as_str)),
        text: best.join("\n\n"),
    })
}

fn paragraphs_in(span: &str) -> Vec<String> {
    let from_tags: Vec<String> = PARAGRAPH
        .captures_iter(span)
        .filter_map(|c| c.get(1))
        .map(|m| decode_text(m.as_str()))
        .filter(|p| !p.is_empty())
        .collect();

    if !from_tags.is_empty() {
        return from_tags;
    }

    // Spans without <p> markup: treat the whole span as one paragraph
    let whole = decode_text(span);
    if whole.is_empty() { Vec::new() } else { vec![whole] }
}

/// Strips tags and decodes entities by letting html5ever parse the fragment.
fn decode_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
