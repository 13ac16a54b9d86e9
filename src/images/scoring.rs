use super::types::{ImageFormat, QualityTier};

pub const MIN_WIDTH: u32 = 300;
pub const MIN_HEIGHT: u32 = 200;
pub const PREFERRED_RATIO: f64 = 16.0 / 9.0;

const HIGH_TIER_SCORE: u8 = 7;
const MEDIUM_TIER_SCORE: u8 = 4;

/// Each signal contributes independently; the total decides the tier.
pub fn score(width: u32, height: u32, format: ImageFormat, byte_size: Option<u64>) -> u8 {
    resolution_points(width)
        + ratio_points(aspect_ratio(width, height))
        + format_points(format)
        + size_points(byte_size)
}

pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        return 0.0;
    }
    f64::from(width) / f64::from(height)
}

fn resolution_points(width: u32) -> u8 {
    match width {
        w if w >= 1200 => 3,
        w if w >= 800 => 2,
        w if w >= MIN_WIDTH => 1,
        _ => 0,
    }
}

fn ratio_points(ratio: f64) -> u8 {
    if ratio <= 0.0 {
        return 0;
    }
    let distance = (ratio - PREFERRED_RATIO).abs();
    if distance <= 0.15 {
        2
    } else if distance <= 0.5 {
        1
    } else {
        0
    }
}

fn format_points(format: ImageFormat) -> u8 {
    match format {
        ImageFormat::Jpeg | ImageFormat::Webp => 2,
        ImageFormat::Png => 1,
        ImageFormat::Gif | ImageFormat::Unknown => 0,
    }
}

fn size_points(byte_size: Option<u64>) -> u8 {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    match byte_size {
        Some(size) if (30 * KB..=2 * MB).contains(&size) => 2,
        Some(size) if (10 * KB..=5 * MB).contains(&size) => 1,
        _ => 0,
    }
}

pub fn tier(score: u8) -> QualityTier {
    if score >= HIGH_TIER_SCORE {
        QualityTier::High
    } else if score >= MEDIUM_TIER_SCORE {
        QualityTier::Medium
    } else {
        QualityTier::Low
    }
}

/// `valid` implies a usable tier and both dimensions at or above the minimums.
pub fn is_valid(width: u32, height: u32, tier: QualityTier) -> bool {
    tier != QualityTier::Low && width >= MIN_WIDTH && height >= MIN_HEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_landscape_jpeg_is_high() {
        let s = score(1600, 900, ImageFormat::Jpeg, Some(250 * 1024));
        assert_eq!(s, 9);
        assert_eq!(tier(s), QualityTier::High);
        assert!(is_valid(1600, 900, tier(s)));
    }

    #[test]
    fn square_png_is_medium() {
        let s = score(600, 600, ImageFormat::Png, Some(80 * 1024));
        // 1 resolution + 0 ratio + 1 format + 2 size
        assert_eq!(s, 4);
        assert_eq!(tier(s), QualityTier::Medium);
    }

    #[test]
    fn tiny_gif_is_low_and_invalid() {
        let s = score(120, 90, ImageFormat::Gif, Some(2 * 1024));
        assert_eq!(tier(s), QualityTier::Low);
        assert!(!is_valid(120, 90, tier(s)));
    }

    #[test]
    fn validity_requires_minimum_dimensions_even_with_good_tier() {
        assert!(!is_valid(1200, 150, QualityTier::High));
        assert!(!is_valid(299, 400, QualityTier::Medium));
        assert!(is_valid(300, 200, QualityTier::Medium));
    }

    #[test]
    fn ratio_bands() {
        assert_eq!(ratio_points(16.0 / 9.0), 2);
        assert_eq!(ratio_points(1.5), 1);
        assert_eq!(ratio_points(1.0), 0);
        assert_eq!(ratio_points(0.0), 0);
    }

    #[test]
    fn size_bands() {
        assert_eq!(size_points(None), 0);
        assert_eq!(size_points(Some(5 * 1024)), 0);
        assert_eq!(size_points(Some(20 * 1024)), 1);
        assert_eq!(size_points(Some(500 * 1024)), 2);
        assert_eq!(size_points(Some(4 * 1024 * 1024)), 1);
        assert_eq!(size_points(Some(8 * 1024 * 1024)), 0);
    }
}
