//! Read-only DOM helpers shared by the selector-driven strategies and fallback recovery.
//!
//! `scraper` trees are immutable, so boilerplate is skipped while walking
//! rather than removed up front.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "aside", "footer", "header", "form", "button", "iframe",
    "svg", "template", "select", "object", "embed", "dialog",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "blockquote", "pre", "table", "figure",
];

const CONTAINER_TAGS: &[&str] = &["div", "section", "article", "main", "span", "center", "font"];

static BOILERPLATE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(nav|navbar|navigation|menu|share|sharing|social|advert\w*|ads?|adslot|promo\w*|newsletter|subscribe|subscription|related|recommend\w*|comments?|cookie\w*|consent|sidebar|breadcrumbs?|popup|modal|outbrain|taboola|sponsor\w*|paywall|signup|most-read|trending)\b",
    )
    .unwrap()
});

static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property='og:title']").unwrap());
static TWITTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='twitter:title']").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
pub static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
pub static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

const PAGE_ROOTS: &[&str] = &["html", "body"];

/// Page roots are never boilerplate; their classes describe the layout, not a region.
pub fn is_boilerplate(element: &ElementRef) -> bool {
    let value = element.value();
    if PAGE_ROOTS.contains(&value.name()) {
        return false;
    }
    if BOILERPLATE_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") || value.attr("hidden").is_some() {
        return true;
    }
    if matches!(value.attr("role"), Some("navigation" | "banner" | "complementary")) {
        return true;
    }
    let hints = [value.attr("class"), value.attr("id")];
    hints
        .iter()
        .flatten()
        .any(|hint| BOILERPLATE_HINT.is_match(hint))
}

/// True when the element or any ancestor below `<body>` is boilerplate.
pub fn inside_boilerplate(element: &ElementRef) -> bool {
    if is_boilerplate(element) {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| !PAGE_ROOTS.contains(&ancestor.value().name()))
        .any(|ancestor| is_boilerplate(&ancestor))
}

/// Text of an element with boilerplate subtrees skipped and block boundaries kept as newlines.
pub fn visible_text(element: &ElementRef) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out
}

fn push_text(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_boilerplate(&child) {
                    continue;
                }
                let name = child.value().name();
                let block = BLOCK_TAGS.contains(&name) || name == "li" || name == "div";
                if block {
                    out.push('\n');
                }
                if name == "br" {
                    out.push('\n');
                }
                push_text(&child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Outer HTML of the content blocks beneath `element`, descending through plain containers.
pub fn content_html(element: &ElementRef) -> String {
    let mut out = String::new();
    collect_blocks(element, &mut out);
    if out.trim().is_empty() {
        return element.html();
    }
    out
}

fn collect_blocks(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) if text.trim().chars().count() > 40 => {
                out.push_str("<p>");
                out.push_str(&escape_html(text.trim()));
                out.push_str("</p>");
            }
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_boilerplate(&child) {
                    continue;
                }
                let name = child.value().name();
                if BLOCK_TAGS.contains(&name) || name == "img" {
                    out.push_str(&child.html());
                } else if CONTAINER_TAGS.contains(&name) {
                    collect_blocks(&child, out);
                }
            }
            _ => {}
        }
    }
}

/// Share of an element's text that sits inside links.
pub fn link_density(element: &ElementRef) -> f64 {
    let total: usize = element.text().map(|t| t.trim().chars().count()).sum();
    if total == 0 {
        return 1.0;
    }
    let linked: usize = element
        .select(&ANCHOR)
        .flat_map(|a| a.text())
        .map(|t| t.trim().chars().count())
        .sum();
    linked as f64 / total as f64
}

pub fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// og:title, then twitter:title, then the first `<h1>`, then `<title>`.
pub fn page_title(document: &Html) -> Option<String> {
    meta_content(document, &OG_TITLE)
        .or_else(|| meta_content(document, &TWITTER_TITLE))
        .or_else(|| first_text(document, &H1))
        .or_else(|| first_text(document, &TITLE))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps plain-text paragraphs (separated by blank lines) in `<p>` tags.
pub fn paragraphs_to_html<'a>(paragraphs: impl IntoIterator<Item = &'a str>) -> String {
    paragraphs
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect()
}
