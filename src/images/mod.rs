//! Image discovery, quality scoring and use-case assignment.

pub mod analyzer;
pub mod discovery;
pub mod probe;
pub mod scoring;
pub mod types;

pub use analyzer::ImageAnalyzer;
pub use discovery::{DiscoveredImage, discover};
pub use types::{ImageCandidate, ImageError, ImageFormat, ImageSelection, QualityTier, UseCase};

pub const MAX_GALLERY: usize = 10;

const HERO_MIN_RATIO: f64 = 1.2;
const HERO_MIN_WIDTH: u32 = 800;
const THUMBNAIL_RATIO: std::ops::RangeInclusive<f64> = 0.75..=1.33;

fn is_hero(c: &ImageCandidate) -> bool {
    c.valid
        && c.quality_tier == QualityTier::High
        && c.aspect_ratio >= HERO_MIN_RATIO
        && c.width >= HERO_MIN_WIDTH
}

fn is_thumbnail(c: &ImageCandidate) -> bool {
    c.valid && c.quality_tier >= QualityTier::Medium && THUMBNAIL_RATIO.contains(&c.aspect_ratio)
}

/// Partitions a scored set. Invalid images are never picked; an empty slot beats a bad one.
pub fn assign_use_case(candidates: &[ImageCandidate]) -> ImageSelection {
    let mut ranked: Vec<&ImageCandidate> = candidates.iter().filter(|c| c.valid).collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let hero = ranked.iter().position(|c| is_hero(c)).map(|i| ranked.remove(i));
    let thumbnail = ranked
        .iter()
        .position(|c| is_thumbnail(c))
        .map(|i| ranked.remove(i));

    ImageSelection {
        hero: hero.cloned(),
        thumbnail: thumbnail.cloned(),
        gallery: ranked.into_iter().take(MAX_GALLERY).cloned().collect(),
    }
}

/// Valid candidates only, best first.
pub fn rank_valid(candidates: Vec<ImageCandidate>) -> Vec<ImageCandidate> {
    let mut valid: Vec<ImageCandidate> = candidates.into_iter().filter(|c| c.valid).collect();
    valid.sort_by(|a, b| b.score.cmp(&a.score));
    valid
}
