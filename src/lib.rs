//! News content acquisition and normalization.
//!
//! A [`FeedEntry`](entities::FeedEntry) is resolved, extracted, sanitized,
//! optionally structured and finally derived into a
//! [`NormalizedArticle`](entities::NormalizedArticle). The import layer drives
//! whole categories of entries into a [`ContentStore`](store::ContentStore).

pub mod config;
pub mod entities;
pub mod extractor;
pub mod fallback;
pub mod fetcher;
pub mod images;
pub mod import;
pub mod resolver;
pub mod store;
pub mod structuring;
pub mod transform;
