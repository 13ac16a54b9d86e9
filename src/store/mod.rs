//! The content store contract and an in-memory implementation.
//!
//! Persistent storage is owned elsewhere; the pipeline only needs duplicate
//! checks, taxonomy get-or-create, article creation and image upload. Every
//! call is fallible and retried by the import orchestrator.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{ArticleRecord, TaxonomyKind};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    #[error("article already exists for {0}")]
    Duplicate(String),

    #[error("rejected by content store: {0}")]
    Rejected(String),
}

impl StoreError {
    /// A duplicate or a validation rejection will not change on retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Exact match on the source URL string.
    async fn exists(&self, source_url: &str) -> Result<bool, StoreError>;

    async fn get_or_create_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<String, StoreError>;

    /// Must fail with [`StoreError::Duplicate`] if the source URL is already stored.
    async fn create_article(&self, record: &ArticleRecord) -> Result<String, StoreError>;

    /// `None` when the store declines the image.
    async fn upload_image(
        &self,
        bytes: Bytes,
        content_type: &str,
        alt_text: &str,
    ) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub content_type: String,
    pub alt_text: String,
    pub size: usize,
}

/// Process-local store used by the importer binary and tests.
#[derive(Default)]
pub struct InMemoryStore {
    articles: DashMap<String, (String, ArticleRecord)>,
    taxonomy: DashMap<(TaxonomyKind, String), String>,
    assets: DashMap<String, StoredAsset>,
    creates: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    pub fn article(&self, source_url: &str) -> Option<ArticleRecord> {
        self.articles.get(source_url).map(|entry| entry.value().1.clone())
    }

    pub fn taxonomy_count(&self, kind: TaxonomyKind) -> usize {
        self.taxonomy.iter().filter(|e| e.key().0 == kind).count()
    }

    pub fn asset(&self, id: &str) -> Option<StoredAsset> {
        self.assets.get(id).map(|a| a.value().clone())
    }

    /// Successful `create_article` calls so far.
    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn exists(&self, source_url: &str) -> Result<bool, StoreError> {
        Ok(self.articles.contains_key(source_url))
    }

    async fn get_or_create_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<String, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Rejected(format!("empty {} name", kind.as_str())));
        }
        let key = (kind, name.to_lowercase());
        let id = self
            .taxonomy
            .entry(key)
            .or_insert_with(|| format!("{}_{}", kind.as_str(), Uuid::new_v4().simple()))
            .value()
            .clone();
        Ok(id)
    }

    async fn create_article(&self, record: &ArticleRecord) -> Result<String, StoreError> {
        let source_url = record.article.source_url.clone();
        // The entry lock makes check-then-insert atomic per URL
        match self.articles.entry(source_url.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(source_url)),
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4().to_string();
                slot.insert((id.clone(), record.clone()));
                self.creates.fetch_add(1, Ordering::Relaxed);
                Ok(id)
            }
        }
    }

    async fn upload_image(
        &self,
        bytes: Bytes,
        content_type: &str,
        alt_text: &str,
    ) -> Result<Option<String>, StoreError> {
        if bytes.is_empty() || !content_type.starts_with("image/") {
            return Ok(None);
        }
        let id = format!("{:x}", md5::compute(&bytes));
        self.assets.entry(id.clone()).or_insert_with(|| StoredAsset {
            content_type: content_type.to_string(),
            alt_text: alt_text.to_string(),
            size: bytes.len(),
        });
        Ok(Some(id))
    }
}
