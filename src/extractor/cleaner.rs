use ammonia::{Builder, UrlRelative};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Every tag that may appear in published body HTML.
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "strong", "em",
    "b", "i", "u", "a", "img", "figure", "figcaption", "table", "thead", "tbody", "tr", "th",
    "td", "pre", "code", "hr", "sub", "sup",
];

/// Dropped together with everything inside them.
const STRIPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "svg", "form", "button", "nav",
    "aside", "footer", "template", "select", "textarea",
];

fn sanitizer(base: Option<&Url>) -> Builder<'static> {
    let mut tag_attributes: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
    tag_attributes.insert("a", HashSet::from(["href", "title"]));
    tag_attributes.insert("img", HashSet::from(["src", "alt", "title", "width", "height"]));
    tag_attributes.insert("td", HashSet::from(["colspan", "rowspan"]));
    tag_attributes.insert("th", HashSet::from(["colspan", "rowspan"]));

    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean_content_tags(STRIPPED_WITH_CONTENT.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .strip_comments(true);

    match base {
        Some(base) => {
            builder.url_relative(UrlRelative::RewriteWithBase(base.clone()));
        }
        None => {
            builder.url_relative(UrlRelative::PassThrough);
        }
    }
    builder
}

/// Reduce arbitrary markup to the allow-listed tag set. Idempotent.
pub fn sanitize(html: &str) -> String {
    sanitizer(None).clean(html).to_string()
}

/// Sanitize and rewrite relative `href`/`src` against the page URL.
pub fn sanitize_with_base(html: &str, base_url: &Url) -> String {
    let cleaned = sanitizer(Some(base_url)).clean(html).to_string();
    drop_empty_paragraphs(&cleaned)
}

fn drop_empty_paragraphs(html: &str) -> String {
    let mut out = html.to_string();
    for empty in ["<p></p>", "<p> </p>", "<p><br></p>"] {
        out = out.replace(empty, "");
    }
    out
}

/// Tag names present in `html`, lowercased. Used to check output against the allow-list.
pub fn tag_names(html: &str) -> HashSet<String> {
    let fragment = scraper::Html::parse_fragment(html);
    fragment
        .root_element()
        .descendants()
        .filter_map(scraper::ElementRef::wrap)
        .map(|el| el.value().name().to_ascii_lowercase())
        .filter(|name| name != "html")
        .collect()
}


#[cfg(all(test, feature = "fuzz"))]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sanitize_idempotent_for_any_markup(html in "(<[a-z]{1,6}( [a-z]+=\"[^\"]*\")?>|</[a-z]{1,6}>|[a-zA-Z &<>;]{0,12}){0,30}") {
            let once = sanitize(&html);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn sanitize_only_emits_allowed_tags(html in ".{0,400}") {
            let clean = sanitize(&html);
            for tag in tag_names(&clean) {
                prop_assert!(ALLOWED_TAGS.contains(&tag.as_str()));
            }
        }
    }
}
