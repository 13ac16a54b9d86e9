//! Last-resort content recovery.
//!
//! Runs only after every extraction strategy has come up short. Each method
//! lowers the bar a little further; when nothing reaches the threshold the
//! caller still gets a stub that points readers at the source.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::entities::FeedEntry;
use crate::extractor::model::{normalize_whitespace, text_len, truncate_on_word};
use crate::extractor::{cleaner, dom, reject};
use crate::fetcher;

pub const DEFAULT_MIN_FALLBACK_CHARS: usize = 100;
const PAGE_TIMEOUT: Duration = Duration::from_secs(20);
const EXCERPT_CHARS: usize = 200;
const MIN_PARAGRAPH_CHARS: usize = 30;
const MIN_LINE_CHARS: usize = 20;
const SENTENCES_PER_PARAGRAPH: usize = 3;

static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property='og:description']").unwrap());
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='description']").unwrap());
static TWITTER_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='twitter:description']").unwrap());
static OG_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property='og:image']").unwrap());
static TWITTER_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='twitter:image']").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMethod {
    FeedContent,
    PageScrape,
    MetaTags,
    PlainText,
    Stub,
}

impl FallbackMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackMethod::FeedContent => "feed_content",
            FallbackMethod::PageScrape => "page_scrape",
            FallbackMethod::MetaTags => "meta_tags",
            FallbackMethod::PlainText => "plain_text",
            FallbackMethod::Stub => "stub",
        }
    }
}

impl std::fmt::Display for FallbackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What recovery produced. `content` is HTML; `images` are absolute URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackContent {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub images: Vec<String>,
    pub succeeded: bool,
    pub method_used: FallbackMethod,
}

#[derive(Debug, Clone)]
pub struct FallbackRecovery {
    min_chars: usize,
    page_timeout: Duration,
}

impl Default for FallbackRecovery {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FALLBACK_CHARS)
    }
}

impl FallbackRecovery {
    pub fn new(min_chars: usize) -> Self {
        Self {
            min_chars,
            page_timeout: PAGE_TIMEOUT,
        }
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Always returns content. The page is only fetched if the feed entry alone is not enough.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn recover(&self, url: &str, entry: Option<&FeedEntry>) -> FallbackContent {
        if let Some(content) = self.from_feed(entry) {
            info!(method = %content.method_used, "content recovered");
            return content;
        }

        let page = match fetcher::fetch_with_timeout(url, self.page_timeout).await {
            Ok(page) => Some(page.body_utf8),
            Err(e) => {
                warn!(error = %e, timed_out = e.is_timeout(), "fallback page fetch failed");
                None
            }
        };
        self.recover_with_page(url, entry, page.as_deref())
    }

    /// Same as [`recover`](Self::recover) against markup already in hand.
    pub fn recover_with_page(
        &self,
        url: &str,
        entry: Option<&FeedEntry>,
        html: Option<&str>,
    ) -> FallbackContent {
        if let Some(content) = self.from_feed(entry) {
            return content;
        }

        let base = Url::parse(url).ok();
        if let Some(html) = html {
            let document = Html::parse_document(html);
            let images = page_images(&document, base.as_ref());
            let title = entry
                .map(|e| e.title.trim().to_string())
                .filter(|t| !t.is_empty())
                .or_else(|| dom::page_title(&document));

            let methods: [fn(&Self, &Html) -> Option<(String, String)>; 3] =
                [Self::scrape_body, Self::from_meta_tags, Self::plain_text];
            let kinds = [
                FallbackMethod::PageScrape,
                FallbackMethod::MetaTags,
                FallbackMethod::PlainText,
            ];

            for (method, kind) in methods.iter().zip(kinds) {
                if let Some((content, text)) = method(self, &document) {
                    info!(method = %kind, chars = text_len(&text), "content recovered");
                    return FallbackContent {
                        title: title.clone().unwrap_or_else(|| untitled(url)),
                        content,
                        excerpt: truncate_on_word(&text, EXCERPT_CHARS),
                        images,
                        succeeded: true,
                        method_used: kind,
                    };
                }
                debug!(method = %kind, "fallback method insufficient");
            }
        }

        warn!("all recovery methods failed, emitting stub");
        stub(url, entry)
    }

    fn from_feed(&self, entry: Option<&FeedEntry>) -> Option<FallbackContent> {
        let entry = entry?;
        let candidates = [entry.content.as_deref(), entry.raw_content_snippet.as_deref()];

        for raw in candidates.into_iter().flatten() {
            let (html, text) = feed_body(raw);
            if text_len(&text) < self.min_chars || reject::looks_like_boilerplate(&text) {
                continue;
            }
            let images = feed_images(&html, Url::parse(&entry.link).ok().as_ref());
            return Some(FallbackContent {
                title: entry.title.trim().to_string(),
                content: html,
                excerpt: truncate_on_word(&text, EXCERPT_CHARS),
                images,
                succeeded: true,
                method_used: FallbackMethod::FeedContent,
            });
        }
        None
    }

    /// Paragraphs outside boilerplate regions.
    fn scrape_body(&self, document: &Html) -> Option<(String, String)> {
        let paragraphs: Vec<String> = document
            .select(&dom::PARAGRAPH)
            .filter(|p| !dom::inside_boilerplate(p))
            .map(|p| normalize_whitespace(&dom::visible_text(&p)))
            .filter(|t| text_len(t) >= MIN_PARAGRAPH_CHARS)
            .collect();

        let text = paragraphs.join("\n\n");
        self.accept(&text)?;
        Some((dom::paragraphs_to_html(paragraphs.iter().map(String::as_str)), text))
    }

    fn from_meta_tags(&self, document: &Html) -> Option<(String, String)> {
        let description = dom::meta_content(document, &OG_DESCRIPTION)
            .or_else(|| dom::meta_content(document, &META_DESCRIPTION))
            .or_else(|| dom::meta_content(document, &TWITTER_DESCRIPTION))?;
        let text = normalize_whitespace(&description);
        self.accept(&text)?;
        Some((dom::paragraphs_to_html([text.as_str()]), text))
    }

    /// The whole visible body, regrouped into pseudo-paragraphs.
    fn plain_text(&self, document: &Html) -> Option<(String, String)> {
        let body = document.select(&dom::BODY).next()?;
        let raw = normalize_whitespace(&dom::visible_text(&body));
        let paragraphs = pseudo_paragraphs(&raw);
        let text = paragraphs.join("\n\n");
        self.accept(&text)?;
        Some((dom::paragraphs_to_html(paragraphs.iter().map(String::as_str)), text))
    }

    fn accept(&self, text: &str) -> Option<()> {
        (text_len(text) >= self.min_chars && !reject::looks_like_boilerplate(text)).then_some(())
    }
}

/// Feed bodies may be HTML or plain text.
fn feed_body(raw: &str) -> (String, String) {
    if raw.contains('<') {
        let html = cleaner::sanitize(raw);
        let fragment = Html::parse_fragment(&html);
        let text = normalize_whitespace(&dom::visible_text(&fragment.root_element()));
        (html, text)
    } else {
        let text = normalize_whitespace(raw);
        (dom::paragraphs_to_html(text.split("\n\n")), text)
    }
}

fn feed_images(html: &str, base: Option<&Url>) -> Vec<String> {
    static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());
    let fragment = Html::parse_fragment(html);
    let mut images: Vec<String> = fragment
        .select(&IMG)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| absolutize(src, base))
        .collect();
    images.dedup();
    images
}

fn page_images(document: &Html, base: Option<&Url>) -> Vec<String> {
    let mut images = Vec::new();
    for selector in [&*OG_IMAGE, &*TWITTER_IMAGE] {
        if let Some(src) = dom::meta_content(document, selector)
            && let Some(abs) = absolutize(&src, base)
            && !images.contains(&abs)
        {
            images.push(abs);
        }
    }
    images
}

fn absolutize(src: &str, base: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    let url = match base {
        Some(base) => base.join(src).ok()?,
        None => Url::parse(src).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Keeps substantive lines; a single wall of text is split every few sentences.
fn pseudo_paragraphs(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| text_len(l) >= MIN_LINE_CHARS)
        .collect();

    let mut paragraphs = Vec::new();
    for line in lines {
        let sentences = split_sentences(line);
        if sentences.len() <= SENTENCES_PER_PARAGRAPH {
            paragraphs.push(line.to_string());
            continue;
        }
        for group in sentences.chunks(SENTENCES_PER_PARAGRAPH) {
            paragraphs.push(group.join(" "));
        }
    }
    paragraphs
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn untitled(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("Story from {h}")))
        .unwrap_or_else(|| "Untitled story".to_string())
}

/// The hard floor: a pointer back to the source.
fn stub(url: &str, entry: Option<&FeedEntry>) -> FallbackContent {
    let title = entry
        .map(|e| e.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| untitled(url));
    let label = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());

    let snippet = entry
        .and_then(|e| e.raw_content_snippet.as_deref())
        .map(|s| normalize_whitespace(&feed_body(s).1))
        .filter(|s| !s.is_empty());

    let mut content = String::new();
    if let Some(snippet) = &snippet {
        content.push_str(&dom::paragraphs_to_html([snippet.as_str()]));
    }
    content.push_str(&format!(
        r#"<p>Read the full story at <a href="{}">{}</a>.</p>"#,
        dom::escape_html(url),
        dom::escape_html(&label)
    ));

    let excerpt = snippet
        .map(|s| truncate_on_word(&s, EXCERPT_CHARS))
        .unwrap_or_else(|| title.clone());

    FallbackContent {
        title,
        content,
        excerpt,
        images: Vec::new(),
        succeeded: false,
        method_used: FallbackMethod::Stub,
    }
}
