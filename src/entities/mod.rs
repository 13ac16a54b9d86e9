use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use crate::images::ImageCandidate;

/// --- Pipeline input ---

/// One syndicated item as handed over by the feed reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw_content_snippet: Option<String>,
    /// Full `content:encoded` style body when the feed embeds one.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source_label: Option<String>,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
            raw_content_snippet: None,
            content: None,
            source_label: None,
        }
    }

    /// An entry needs a non-blank title and an absolute http(s) link to be processed.
    pub fn is_usable(&self) -> bool {
        if self.title.trim().is_empty() {
            return false;
        }
        match url::Url::parse(self.link.trim()) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub original_url: String,
    pub resolved_url: String,
}

impl ResolvedSource {
    pub fn unchanged(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            original_url: url.clone(),
            resolved_url: url,
        }
    }

    pub fn was_redirected(&self) -> bool {
        self.original_url != self.resolved_url
    }
}

/// --- Pipeline output ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedArticle {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body_html: String,
    /// Valid images only, best first.
    pub images: Vec<ImageCandidate>,
    pub featured_image: Option<String>,
    pub thumbnail_image: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub reading_time_minutes: u32,
    pub is_breaking: bool,
    /// The feed link; duplicate suppression keys on this value.
    pub source_url: String,
    pub canonical_url: String,
    pub published_at: DateTime<Utc>,
    pub language: Option<String>,
    pub seo_title: String,
    pub seo_description: String,
    pub word_count: usize,
    /// How the body was obtained, e.g. `readability` or `fallback:meta_tags`.
    pub extraction_method: String,
    pub structured: bool,
    pub checksum: String,
}

/// --- Taxonomy ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Category,
    Author,
    Tag,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Author => "author",
            TaxonomyKind::Tag => "tag",
        }
    }
}

/// What the orchestrator hands to the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub article: NormalizedArticle,
    pub category_id: String,
    pub author_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub featured_asset_id: Option<String>,
}

/// --- Run accounting ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl ImportOutcome {
    pub fn total(&self) -> u32 {
        self.imported + self.skipped + self.errors
    }
}

impl AddAssign for ImportOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.imported += rhs.imported;
        self.skipped += rhs.skipped;
        self.errors += rhs.errors;
    }
}
