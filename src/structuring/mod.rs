//! Optional structuring through an external text-generation service.
//!
//! The collaborator is reached through [`StructuringClient`]. Responses are
//! validated and gaps filled deterministically; refusals and thin answers are
//! failures. [`structure_with_retry`] bounds the attempts so a flaky service
//! only ever costs a few seconds per article.

mod http;
mod parse;

pub use http::{HttpStructuringClient, StructuringSettings};
pub use parse::{MIN_STRUCTURED_CHARS, fill_missing, parse_response};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Field names the service is asked to return.
pub const STRUCTURED_FIELDS: &[&str] = &[
    "title",
    "excerpt",
    "content",
    "slug",
    "seoTitle",
    "seoDescription",
    "tags",
    "location",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuringRequest {
    pub title: String,
    pub text: String,
    pub source_url: String,
    pub source_label: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fields: &'static [&'static str],
}

impl StructuringRequest {
    pub fn new(title: impl Into<String>, text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            source_url: source_url.into(),
            source_label: None,
            published_at: None,
            fields: STRUCTURED_FIELDS,
        }
    }
}

/// A validated response with every field present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub slug: String,
    pub seo_title: String,
    pub seo_description: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
}

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("structuring service not configured")]
    Disabled,

    #[error("structuring request timed out")]
    Timeout,

    #[error("structuring service returned http {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service refused the request")]
    Refused,

    #[error("response too short ({0} chars)")]
    TooShort(usize),
}

impl StructuringError {
    /// A missing configuration will not fix itself between attempts.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, StructuringError::Disabled)
    }
}

#[async_trait]
pub trait StructuringClient: Send + Sync {
    async fn structure(&self, request: &StructuringRequest) -> Result<StructuredArticle, StructuringError>;

    fn name(&self) -> &'static str;
}

/// Stand-in when no service is configured.
pub struct DisabledStructuring;

#[async_trait]
impl StructuringClient for DisabledStructuring {
    async fn structure(&self, _request: &StructuringRequest) -> Result<StructuredArticle, StructuringError> {
        Err(StructuringError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Up to `attempts` calls, sleeping `attempt × base_delay` between them.
pub async fn structure_with_retry(
    client: &dyn StructuringClient,
    request: &StructuringRequest,
    attempts: u32,
    base_delay: Duration,
) -> Result<StructuredArticle, StructuringError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match client.structure(request).await {
            Ok(article) => {
                debug!(client = client.name(), attempt, "structuring succeeded");
                return Ok(article);
            }
            Err(e) if attempt < attempts && e.is_retriable() => {
                let delay = base_delay * attempt;
                warn!(
                    client = client.name(),
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "structuring failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
