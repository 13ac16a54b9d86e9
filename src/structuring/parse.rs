use scraper::Html;
use serde_json::Value;

use super::{StructuredArticle, StructuringError, StructuringRequest};
use crate::extractor::dom;
use crate::extractor::model::{normalize_whitespace, text_len, truncate_on_word};
use crate::transform::derive::slugify;

/// Minimum plain-text length of a usable `content` field.
pub const MIN_STRUCTURED_CHARS: usize = 200;

const EXCERPT_CHARS: usize = 200;
const SEO_TITLE_CHARS: usize = 60;
const SEO_DESCRIPTION_CHARS: usize = 160;
const MAX_TAGS: usize = 8;

const REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "i cannot",
    "i can't",
    "i can not",
    "i'm unable",
    "i am unable",
    "as an ai",
    "as a language model",
    "cannot assist with",
    "can't help with",
    "against my guidelines",
    "content policy",
];

/// Fields as the service sent them, before gaps are filled.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawStructured {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
}

/// Validates a raw completion and fills whatever optional fields are missing.
pub fn parse_response(raw: &str, request: &StructuringRequest) -> Result<StructuredArticle, StructuringError> {
    let body = strip_fences(raw);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            if is_refusal(body) {
                return Err(StructuringError::Refused);
            }
            return Err(StructuringError::Malformed(e.to_string()));
        }
    };
    let Value::Object(fields) = value else {
        return Err(StructuringError::Malformed("expected a JSON object".into()));
    };

    let string = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let raw = RawStructured {
        title: string("title"),
        excerpt: string("excerpt"),
        content: string("content"),
        slug: string("slug"),
        seo_title: string("seoTitle").or_else(|| string("seo_title")),
        seo_description: string("seoDescription").or_else(|| string("seo_description")),
        tags: fields.get("tags").map(tags_from_value),
        location: string("location"),
    };

    let Some(content) = raw.content.as_deref() else {
        return Err(StructuringError::Malformed("missing content".into()));
    };
    let text = plain_text(content);
    if is_refusal(&text) || raw.title.as_deref().is_some_and(is_refusal) {
        return Err(StructuringError::Refused);
    }
    let chars = text_len(&text);
    if chars < MIN_STRUCTURED_CHARS {
        return Err(StructuringError::TooShort(chars));
    }

    Ok(fill_missing(raw, request))
}

/// Deterministic defaults for anything the service left out.
pub fn fill_missing(raw: RawStructured, request: &StructuringRequest) -> StructuredArticle {
    let title = raw.title.unwrap_or_else(|| request.title.trim().to_string());
    let content = raw.content.unwrap_or_else(|| request.text.clone());
    let excerpt = raw
        .excerpt
        .unwrap_or_else(|| truncate_on_word(&plain_text(&content), EXCERPT_CHARS));
    let slug = raw
        .slug
        .map(|s| slugify(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&title));
    let seo_title = raw
        .seo_title
        .unwrap_or_else(|| truncate_on_word(&title, SEO_TITLE_CHARS));
    let seo_description = raw
        .seo_description
        .unwrap_or_else(|| truncate_on_word(&excerpt, SEO_DESCRIPTION_CHARS));

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.tags.unwrap_or_default() {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.truncate(MAX_TAGS);

    StructuredArticle {
        title,
        excerpt,
        content,
        slug,
        seo_title,
        seo_description,
        tags,
        location: raw.location,
    }
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(joined) => joined.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn plain_text(content: &str) -> String {
    if !content.contains('<') {
        return normalize_whitespace(content);
    }
    let fragment = Html::parse_fragment(content);
    normalize_whitespace(&dom::visible_text(&fragment.root_element()))
}

/// Only the opening of a response is checked; article text can quote these phrases.
fn is_refusal(text: &str) -> bool {
    let opening: String = text.chars().take(160).collect::<String>().to_lowercase();
    REFUSAL_PHRASES.iter().any(|phrase| opening.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StructuringRequest {
        StructuringRequest::new(
            "Council Approves Budget - Metro Daily",
            "The council approved the budget.",
            "https://metro.example/budget",
        )
    }

    fn long_content() -> String {
        format!(
            "<p>{}</p>",
            "The council approved a record budget for road repairs on Monday evening. ".repeat(4)
        )
    }

    #[test]
    fn complete_response_round_trips() {
        let raw = serde_json::json!({
            "title": "Council Approves Budget",
            "excerpt": "Record budget for roads.",
            "content": long_content(),
            "slug": "Council Approves Budget!",
            "seoTitle": "Budget approved",
            "seoDescription": "The council approved a record budget.",
            "tags": ["Budget", "roads", "budget"],
            "location": "Springfield"
        })
        .to_string();

        let article = parse_response(&raw, &request()).unwrap();
        assert_eq!(article.title, "Council Approves Budget");
        assert_eq!(article.slug, "council-approves-budget");
        assert_eq!(article.tags, vec!["budget", "roads"]);
        assert_eq!(article.location.as_deref(), Some("Springfield"));
    }

    #[test]
    fn fenced_json_with_missing_optionals_is_filled() {
        let raw = format!(
            "```json\n{}\n```",
            serde_json::json!({ "title": "Budget Passes", "content": long_content(), "tags": "a, b" })
        );
        let article = parse_response(&raw, &request()).unwrap();
        assert_eq!(article.slug, "budget-passes");
        assert_eq!(article.seo_title, "Budget Passes");
        assert!(article.excerpt.starts_with("The council approved"));
        assert!(article.excerpt.chars().count() <= 200);
        assert_eq!(article.tags, vec!["a", "b"]);
        assert!(article.location.is_none());
    }

    #[test]
    fn refusals_are_detected() {
        let plain = "I'm sorry, but I can't help with rewriting this article.";
        assert!(matches!(parse_response(plain, &request()), Err(StructuringError::Refused)));

        let wrapped = serde_json::json!({
            "title": "Request declined",
            "content": format!("As an AI language model I cannot do this. {}", "x ".repeat(200)),
        })
        .to_string();
        assert!(matches!(parse_response(&wrapped, &request()), Err(StructuringError::Refused)));
    }

    #[test]
    fn short_or_malformed_responses_fail() {
        let short = serde_json::json!({ "title": "T", "content": "<p>Too short.</p>" }).to_string();
        assert!(matches!(parse_response(&short, &request()), Err(StructuringError::TooShort(_))));

        assert!(matches!(
            parse_response("{\"title\": ", &request()),
            Err(StructuringError::Malformed(_))
        ));
        assert!(matches!(
            parse_response("[1, 2, 3]", &request()),
            Err(StructuringError::Malformed(_))
        ));
        let no_content = serde_json::json!({ "title": "T" }).to_string();
        assert!(matches!(
            parse_response(&no_content, &request()),
            Err(StructuringError::Malformed(_))
        ));
    }
}
