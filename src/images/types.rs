use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Unknown,
}

impl ImageFormat {
    pub fn from_mime(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => ImageFormat::Jpeg,
            "image/png" => ImageFormat::Png,
            "image/gif" => ImageFormat::Gif,
            "image/webp" => ImageFormat::Webp,
            _ => ImageFormat::Unknown,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Unknown => "application/octet-stream",
        }
    }
}

/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCandidate {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub byte_size: Option<u64>,
    pub aspect_ratio: f64,
    pub quality_tier: QualityTier,
    pub score: u8,
    pub valid: bool,
    #[serde(default)]
    pub alt: Option<String>,
}

impl ImageCandidate {
    /// A candidate that could not be inspected. Never selected for any use case.
    pub fn rejected(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: 0,
            height: 0,
            format: ImageFormat::Unknown,
            byte_size: None,
            aspect_ratio: 0.0,
            quality_tier: QualityTier::Low,
            score: 0,
            valid: false,
            alt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Hero,
    Thumbnail,
    Gallery,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSelection {
    pub hero: Option<ImageCandidate>,
    pub thumbnail: Option<ImageCandidate>,
    pub gallery: Vec<ImageCandidate>,
}

impl ImageSelection {
    pub fn use_case_of(&self, url: &str) -> Option<UseCase> {
        if self.hero.as_ref().is_some_and(|c| c.url == url) {
            Some(UseCase::Hero)
        } else if self.thumbnail.as_ref().is_some_and(|c| c.url == url) {
            Some(UseCase::Thumbnail)
        } else if self.gallery.iter().any(|c| c.url == url) {
            Some(UseCase::Gallery)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hero.is_none() && self.thumbnail.is_none() && self.gallery.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("invalid image url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("image too large ({0} bytes)")]
    TooLarge(u64),

    #[error("could not read image dimensions")]
    Unreadable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_from_content_type() {
        assert_eq!(ImageFormat::from_mime("image/jpeg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_mime("IMAGE/PNG; charset=binary"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_mime("image/svg+xml"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_mime(""), ImageFormat::Unknown);
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(QualityTier::High > QualityTier::Medium);
        assert!(QualityTier::Medium > QualityTier::Low);
    }
}
