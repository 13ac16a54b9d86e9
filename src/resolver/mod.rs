//! Canonical source URL resolution.
//!
//! Feed links are frequently indirections: aggregator wrappers, tracking
//! redirectors, feed proxies. [`UrlResolver::resolve`] first tries to decode
//! the target out of the link itself, then falls back to following redirects
//! over the network. It never fails; the worst case is the input URL.

mod decode;

pub use decode::{decode_embedded_target, is_aggregator_host};

use regex::Regex;
use reqwest::Client;
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::entities::ResolvedSource;
use crate::fetcher::{FetchError, RequestPacer, client::build_client};

const MAX_INTERSTITIAL_BYTES: usize = 256 * 1024;

static INTERSTITIAL_TARGETS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"data-n-au\s*=\s*["'](https?://[^"']+)["']"#,
        r#"(?i)<meta[^>]+http-equiv\s*=\s*["']?refresh["']?[^>]+content\s*=\s*["'][^"']*url\s*=\s*([^"'\s>]+)"#,
        r#"(?i)<link[^>]+rel\s*=\s*["']canonical["'][^>]+href\s*=\s*["'](https?://[^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_hops: usize,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_hops: 8,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone)]
pub struct UrlResolver {
    client: Client,
    config: ResolverConfig,
    pacer: Arc<RequestPacer>,
}

impl UrlResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, FetchError> {
        let client = build_client(reqwest::redirect::Policy::limited(config.max_hops))
            .map_err(FetchError::from_reqwest_error)?;
        Ok(Self {
            client,
            config,
            pacer: Arc::new(RequestPacer::unlimited()),
        })
    }

    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn resolve(&self, url: &str) -> ResolvedSource {
        let Ok(parsed) = Url::parse(url.trim()) else {
            debug!("unparsable link, keeping as-is");
            return ResolvedSource::unchanged(url);
        };

        if let Some(target) = decode_embedded_target(&parsed) {
            debug!(target = %target, "decoded embedded target without network");
            return ResolvedSource {
                original_url: url.to_string(),
                resolved_url: target,
            };
        }

        match self.follow_redirects(&parsed).await {
            Ok(final_url) => ResolvedSource {
                original_url: url.to_string(),
                resolved_url: final_url,
            },
            Err(e) => {
                warn!(error = %e, "redirect resolution failed, keeping original link");
                ResolvedSource::unchanged(url)
            }
        }
    }

    async fn follow_redirects(&self, url: &Url) -> Result<String, FetchError> {
        self.pacer.acquire().await;
        let mut response = self
            .client
            .get(url.clone())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let final_url = response.url().clone();
        let still_wrapped = final_url.host_str().is_some_and(is_aggregator_host);

        if !still_wrapped || !response.status().is_success() {
            return Ok(final_url.to_string());
        }

        // Aggregator interstitial pages carry the target in markup rather than a Location header
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(FetchError::from_reqwest_error)?
        {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_INTERSTITIAL_BYTES {
                break;
            }
        }
        let html = String::from_utf8_lossy(&body);

        Ok(find_interstitial_target(&html, &final_url).unwrap_or_else(|| final_url.to_string()))
    }
}

fn find_interstitial_target(html: &str, page_url: &Url) -> Option<String> {
    INTERSTITIAL_TARGETS.iter().find_map(|re| {
        let raw = re.captures(html)?.get(1)?.as_str().replace("&amp;", "&");
        let target = page_url.join(&raw).ok()?;
        let external = target
            .host_str()
            .is_some_and(|h| !is_aggregator_host(h));
        (matches!(target.scheme(), "http" | "https") && external).then(|| target.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interstitial_data_attribute() {
        let page = Url::parse("https://news.google.com/articles/abc").unwrap();
        let html = r#"<div jscontroller="x" data-n-au="https://publisher.example/story?a=1&amp;b=2"></div>"#;
        assert_eq!(
            find_interstitial_target(html, &page).as_deref(),
            Some("https://publisher.example/story?a=1&b=2")
        );
    }

    #[test]
    fn interstitial_meta_refresh() {
        let page = Url::parse("https://news.google.com/articles/abc").unwrap();
        let html = r#"<meta http-equiv="refresh" content="0;url=https://site.example/a">"#;
        assert_eq!(
            find_interstitial_target(html, &page).as_deref(),
            Some("https://site.example/a")
        );
    }

    #[test]
    fn interstitial_ignores_self_links() {
        let page = Url::parse("https://news.google.com/articles/abc").unwrap();
        let html = r#"<link rel="canonical" href="https://news.google.com/articles/abc">"#;
        assert!(find_interstitial_target(html, &page).is_none());
    }

    #[tokio::test]
    async fn unparsable_link_is_returned_unchanged() {
        let resolver = UrlResolver::new(ResolverConfig::default()).unwrap();
        let resolved = resolver.resolve("not a url").await;
        assert_eq!(resolved.resolved_url, "not a url");
        assert!(!resolved.was_redirected());
    }
}
