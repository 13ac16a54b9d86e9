use bytes::{Bytes, BytesMut};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE, RANGE},
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, instrument, warn};
use url::Url;

use super::discovery::{self, DiscoveredImage};
use super::probe::{self, Dimensions};
use super::scoring;
use super::types::{ImageCandidate, ImageError, ImageFormat};
use crate::fetcher::{FetchError, RequestPacer, get_client};

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024; // 10MB
const PROBE_BYTES: usize = 64 * 1024;
const IMAGE_TIMEOUT: Duration = Duration::from_secs(15);
const CONCURRENT_PROBES: usize = 4;

/// What a partial download told us about an image.
#[derive(Debug)]
struct ProbeResult {
    content_type: String,
    total_size: Option<u64>,
    head: Bytes,
}

#[derive(Clone)]
pub struct ImageAnalyzer {
    client: Client,
    timeout: Duration,
    pacer: Arc<RequestPacer>,
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self {
            client: get_client().clone(),
            timeout: IMAGE_TIMEOUT,
            pacer: Arc::new(RequestPacer::unlimited()),
        }
    }
}

impl ImageAnalyzer {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every probe and download waits on `pacer` first.
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Never fails; images that cannot be inspected come back invalid.
    pub async fn score(&self, image_url: &str, context_html: Option<&str>) -> ImageCandidate {
        let hints = match (context_html, Url::parse(image_url)) {
            (Some(html), Ok(base)) => discovery::hints_for(image_url, html, &base),
            _ => None,
        };
        let discovered = hints.unwrap_or_else(|| DiscoveredImage {
            url: image_url.to_string(),
            alt: None,
            width_hint: None,
            height_hint: None,
        });
        self.score_discovered(&discovered).await
    }

    pub async fn score_discovered(&self, image: &DiscoveredImage) -> ImageCandidate {
        match self.analyze(image).await {
            Ok(candidate) => candidate,
            Err(e) => {
                debug!(url = %image.url, error = %e, "image rejected");
                let mut rejected = ImageCandidate::rejected(image.url.clone());
                rejected.alt = image.alt.clone();
                rejected
            }
        }
    }

    /// Scores every candidate and returns them best first. Ties keep discovery order.
    pub async fn score_all(&self, images: Vec<DiscoveredImage>) -> Vec<ImageCandidate> {
        let semaphore = Arc::new(Semaphore::new(CONCURRENT_PROBES));
        let mut set = JoinSet::new();

        for (index, image) in images.into_iter().enumerate() {
            let analyzer = self.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, analyzer.score_discovered(&image).await)
            });
        }

        let mut scored = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => scored.push(result),
                Err(e) => warn!(error = %e, "image probe task failed"),
            }
        }

        scored.sort_by(|(ia, a), (ib, b)| b.score.cmp(&a.score).then(ia.cmp(ib)));
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }

    #[instrument(skip_all, fields(url = %image.url))]
    async fn analyze(&self, image: &DiscoveredImage) -> Result<ImageCandidate, ImageError> {
        let url = Url::parse(&image.url).map_err(|_| ImageError::InvalidUrl(image.url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ImageError::InvalidUrl(image.url.clone()));
        }

        let probed = self.fetch_head(url).await?;
        let declared = ImageFormat::from_mime(&probed.content_type);

        let dimensions = probe::probe(&probed.head).or_else(|| {
            // Markup hints stand in when the header could not be parsed
            match (image.width_hint, image.height_hint) {
                (Some(width), Some(height)) => Some(Dimensions {
                    width,
                    height,
                    format: declared,
                }),
                _ => None,
            }
        });
        let Some(dimensions) = dimensions else {
            return Err(ImageError::Unreadable);
        };

        let format = match dimensions.format {
            ImageFormat::Unknown => declared,
            sniffed => sniffed,
        };
        let score = scoring::score(dimensions.width, dimensions.height, format, probed.total_size);
        let tier = scoring::tier(score);

        Ok(ImageCandidate {
            url: image.url.clone(),
            width: dimensions.width,
            height: dimensions.height,
            format,
            byte_size: probed.total_size,
            aspect_ratio: scoring::aspect_ratio(dimensions.width, dimensions.height),
            quality_tier: tier,
            score,
            valid: scoring::is_valid(dimensions.width, dimensions.height, tier),
            alt: image.alt.clone(),
        })
    }

    /// Reads at most the first 64 KiB, asking the server for a range when it supports one.
    async fn fetch_head(&self, url: Url) -> Result<ProbeResult, ImageError> {
        self.pacer.acquire().await;
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "image/avif,image/webp,image/*,*/*;q=0.8")
            .header(RANGE, format!("bytes=0-{}", PROBE_BYTES - 1))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http(status).into());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ImageError::NotAnImage(content_type));
        }

        let total_size = if status == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
        } else {
            response.content_length()
        };
        if let Some(size) = total_size
            && size > MAX_IMAGE_BYTES
        {
            return Err(ImageError::TooLarge(size));
        }

        let mut head = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(FetchError::from_reqwest_error)?
        {
            head.extend_from_slice(&chunk);
            if head.len() >= PROBE_BYTES {
                break;
            }
        }

        Ok(ProbeResult {
            content_type,
            total_size,
            head: head.freeze(),
        })
    }

    /// Full download for re-hosting. Returns the bytes and their content type.
    #[instrument(skip(self))]
    pub async fn download(&self, image_url: &str) -> Result<(Bytes, String), ImageError> {
        let url = Url::parse(image_url).map_err(|_| ImageError::InvalidUrl(image_url.to_string()))?;
        self.pacer.acquire().await;
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "image/avif,image/webp,image/*,*/*;q=0.8")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http(status).into());
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ImageError::NotAnImage(content_type));
        }
        if let Some(size) = response.content_length()
            && size > MAX_IMAGE_BYTES
        {
            return Err(ImageError::TooLarge(size));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(FetchError::from_reqwest_error)?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > MAX_IMAGE_BYTES {
                return Err(ImageError::TooLarge(body.len() as u64));
            }
        }
        Ok((body.freeze(), content_type))
    }
}

/// `bytes 0-65535/1234567` -> 1234567. An unknown total (`*`) gives `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("bytes 0-65535/1234567"), Some(1234567));
        assert_eq!(parse_content_range_total("bytes 0-99/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected_without_network() {
        let analyzer = ImageAnalyzer::default();
        let candidate = analyzer.score("not a url", None).await;
        assert!(!candidate.valid);
        assert_eq!(candidate.score, 0);

        let candidate = analyzer.score("ftp://example.com/a.jpg", None).await;
        assert!(!candidate.valid);
    }
}
