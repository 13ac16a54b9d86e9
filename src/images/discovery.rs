//! Finding image candidates in page markup.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

pub const MAX_CANDIDATES: usize = 15;
const MIN_HINT_DIMENSION: u32 = 50;

static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:image'], meta[property='og:image:url'], meta[property='og:image:secure_url']")
        .unwrap()
});
static TWITTER_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[name='twitter:image'], meta[name='twitter:image:src']").unwrap()
});
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[/_.\-])(icons?|logos?|sprites?|pixel|spacer|blank|tracking|beacon|avatars?|gravatar|badges?|emoji|placeholder|loader|1x1)([/_.\-]|$)|/ads?/|doubleclick|\.svg$",
    )
    .unwrap()
});

/// An image reference plus whatever the markup says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImage {
    pub url: String,
    pub alt: Option<String>,
    pub width_hint: Option<u32>,
    pub height_hint: Option<u32>,
}

impl DiscoveredImage {
    pub fn from_url(url: String) -> Self {
        Self {
            url,
            alt: None,
            width_hint: None,
            height_hint: None,
        }
    }
}

/// Social-card images first, then images inside the extracted body, then the rest of the page.
pub fn discover(fragment_html: &str, page_html: Option<&str>, base: &Url) -> Vec<DiscoveredImage> {
    let mut found: Vec<DiscoveredImage> = Vec::new();
    let page = page_html.map(Html::parse_document);

    if let Some(page) = &page {
        for selector in [&*OG_IMAGE, &*TWITTER_IMAGE] {
            for meta in page.select(selector) {
                if let Some(url) = meta.value().attr("content").and_then(|c| absolutize(c, base)) {
                    push_unique(&mut found, DiscoveredImage::from_url(url));
                }
            }
        }
    }

    let fragment = Html::parse_fragment(fragment_html);
    for img in fragment.select(&IMG) {
        if let Some(image) = from_img(&img, base) {
            push_unique(&mut found, image);
        }
    }

    if let Some(page) = &page {
        for img in page.select(&IMG) {
            if let Some(image) = from_img(&img, base) {
                push_unique(&mut found, image);
            }
        }
    }

    found.retain(|image| !is_noise(image));
    found.truncate(MAX_CANDIDATES);
    found
}

/// Width/height/alt hints for one URL from surrounding markup.
pub fn hints_for(url: &str, context_html: &str, base: &Url) -> Option<DiscoveredImage> {
    let fragment = Html::parse_fragment(context_html);
    fragment
        .select(&IMG)
        .filter_map(|img| from_img(&img, base))
        .find(|image| image.url == url)
}

fn push_unique(found: &mut Vec<DiscoveredImage>, image: DiscoveredImage) {
    match found.iter_mut().find(|f| f.url == image.url) {
        // Keep the first position but learn hints from later sightings
        Some(existing) => {
            existing.alt = existing.alt.take().or(image.alt);
            existing.width_hint = existing.width_hint.or(image.width_hint);
            existing.height_hint = existing.height_hint.or(image.height_hint);
        }
        None => found.push(image),
    }
}

fn from_img(img: &ElementRef, base: &Url) -> Option<DiscoveredImage> {
    let value = img.value();
    let src = value
        .attr("srcset")
        .and_then(largest_srcset_entry)
        .or_else(|| value.attr("data-src"))
        .or_else(|| value.attr("data-lazy-src"))
        .or_else(|| value.attr("src"))?;
    let url = absolutize(src, base)?;

    Some(DiscoveredImage {
        url,
        alt: value
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        width_hint: value.attr("width").and_then(parse_dimension),
        height_hint: value.attr("height").and_then(parse_dimension),
    })
}

/// Picks the widest `w` descriptor; falls back to the first entry.
fn largest_srcset_entry(srcset: &str) -> Option<&str> {
    let entries: Vec<(&str, u32)> = srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let width = parts
                .next()
                .and_then(|d| d.strip_suffix('w'))
                .and_then(|w| w.parse().ok())
                .unwrap_or(0);
            Some((url, width))
        })
        .collect();
    entries
        .iter()
        .max_by_key(|(_, width)| *width)
        .filter(|(_, width)| *width > 0)
        .or_else(|| entries.first())
        .map(|(url, _)| *url)
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().trim_end_matches("px").parse().ok()
}

fn absolutize(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    let url = base.join(src).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn is_noise(image: &DiscoveredImage) -> bool {
    // Host and path only; query strings are ignored
    let Ok(url) = Url::parse(&image.url) else {
        return true;
    };
    let location = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
    if NOISE.is_match(&location) {
        return true;
    }
    let tiny = |hint: Option<u32>| hint.is_some_and(|d| d < MIN_HINT_DIMENSION);
    tiny(image.width_hint) || tiny(image.height_hint)
}
