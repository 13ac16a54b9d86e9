use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::entities::FeedEntry;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("failed to read feed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid feed file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplies feed entries per category. Feed parsing itself happens upstream.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn entries(&self, category: &str) -> Result<Vec<FeedEntry>, FeedError>;

    fn categories(&self) -> Vec<String>;
}

/// Entries held in memory, typically loaded from a JSON object of
/// `{ "category": [FeedEntry, ...] }`.
#[derive(Debug, Clone, Default)]
pub struct StaticFeedSource {
    feeds: BTreeMap<String, Vec<FeedEntry>>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>, entries: Vec<FeedEntry>) -> Self {
        self.feeds.insert(category.into(), entries);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        let feeds: BTreeMap<String, Vec<FeedEntry>> = serde_json::from_str(json)?;
        Ok(Self { feeds })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn entries(&self, category: &str) -> Result<Vec<FeedEntry>, FeedError> {
        self.feeds
            .get(category)
            .cloned()
            .ok_or_else(|| FeedError::UnknownCategory(category.to_string()))
    }

    fn categories(&self) -> Vec<String> {
        self.feeds.keys().cloned().collect()
    }
}
