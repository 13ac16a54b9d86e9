//! Article transformation: one feed entry in, one complete article out.
//!
//! Stages run in order `Resolving → Extracting → Sanitizing → ScoringImages →
//! Structuring → Deriving`. Extraction falls back to recovery when every
//! strategy comes up short, and recovery itself bottoms out in a stub, so
//! [`ArticleTransformer::transform`] always returns an article.

pub mod derive;
pub mod titles;

pub use derive::DerivationConfig;

use chrono::Utc;
use scraper::Html;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::entities::{FeedEntry, NormalizedArticle, ResolvedSource};
use crate::extractor::model::{normalize_whitespace, word_count};
use crate::extractor::{ExtractionCascade, cleaner, dom, language};
use crate::fallback::FallbackRecovery;
use crate::fetcher::{HttpPageLoader, PageLoader, RequestPacer};
use crate::images::{self, DiscoveredImage, ImageAnalyzer, ImageCandidate};
use crate::resolver::{ResolverConfig, UrlResolver};
use crate::structuring::{
    DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY, HttpStructuringClient, StructuredArticle, StructuringClient,
    StructuringRequest, structure_with_retry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Extracting,
    Sanitizing,
    ScoringImages,
    Structuring,
    Deriving,
    Done,
    /// Every extraction path failed; the article carries a stub body.
    Failed,
}

/// Body content before derivation, whichever path produced it.
struct Extracted {
    title: Option<String>,
    body_html: String,
    method: String,
    recovered_images: Vec<String>,
    from_fallback: bool,
    stub: bool,
}

pub struct ArticleTransformer {
    resolver: Option<UrlResolver>,
    loader: Arc<dyn PageLoader>,
    cascade: ExtractionCascade,
    fallback: FallbackRecovery,
    images: Option<ImageAnalyzer>,
    structuring: Option<Arc<dyn StructuringClient>>,
    structuring_attempts: u32,
    structuring_delay: Duration,
    derivation: DerivationConfig,
    pacer: Arc<RequestPacer>,
}

impl ArticleTransformer {
    /// Network-backed defaults: redirect resolution, HTTP pages, image probing, no structuring.
    pub fn new(resolver: UrlResolver) -> Self {
        Self {
            resolver: Some(resolver),
            loader: Arc::new(HttpPageLoader::default()),
            cascade: ExtractionCascade::default(),
            fallback: FallbackRecovery::default(),
            images: Some(ImageAnalyzer::default()),
            structuring: None,
            structuring_attempts: DEFAULT_ATTEMPTS,
            structuring_delay: DEFAULT_RETRY_DELAY,
            derivation: DerivationConfig::default(),
            pacer: Arc::new(RequestPacer::unlimited()),
        }
    }

    /// No resolver and no image probing; pages come from `loader`.
    pub fn offline(loader: Arc<dyn PageLoader>) -> Self {
        Self {
            resolver: None,
            loader,
            cascade: ExtractionCascade::default(),
            fallback: FallbackRecovery::default(),
            images: None,
            structuring: None,
            structuring_attempts: DEFAULT_ATTEMPTS,
            structuring_delay: DEFAULT_RETRY_DELAY,
            derivation: DerivationConfig::default(),
            pacer: Arc::new(RequestPacer::unlimited()),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn PageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_cascade(mut self, cascade: ExtractionCascade) -> Self {
        self.cascade = cascade.with_pacer(self.pacer.clone());
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackRecovery) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_image_analyzer(mut self, analyzer: Option<ImageAnalyzer>) -> Self {
        self.images = analyzer.map(|a| a.with_pacer(self.pacer.clone()));
        self
    }

    /// Charges every outbound request (resolve, page load, render, image
    /// probe) against `pacer`. Components attached later inherit it.
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.resolver = self.resolver.take().map(|r| r.with_pacer(pacer.clone()));
        self.images = self.images.take().map(|a| a.with_pacer(pacer.clone()));
        self.cascade = self.cascade.with_pacer(pacer.clone());
        self.pacer = pacer;
        self
    }

    pub fn pacer(&self) -> &Arc<RequestPacer> {
        &self.pacer
    }

    pub fn with_structuring(
        mut self,
        client: Arc<dyn StructuringClient>,
        attempts: u32,
        delay: Duration,
    ) -> Self {
        self.structuring = Some(client);
        self.structuring_attempts = attempts;
        self.structuring_delay = delay;
        self
    }

    pub fn with_derivation(mut self, derivation: DerivationConfig) -> Self {
        self.derivation = derivation;
        self
    }

    /// Network-backed transformer wired from runtime configuration.
    ///
    /// Launches headless Chromium when the browser strategy is enabled and the
    /// crate was built with the `browser` feature.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let resolver = UrlResolver::new(ResolverConfig::default())?;
        let mut cascade = ExtractionCascade::new(config.min_content_chars());

        if config.browser_enabled() {
            #[cfg(feature = "browser")]
            {
                use crate::extractor::{BrowserPool, rendered::ChromiumRenderer};
                let renderer = ChromiumRenderer::launch(Duration::from_secs(2)).await?;
                cascade = cascade.with_browser(BrowserPool::new(
                    Arc::new(renderer),
                    config.browser_pool_size(),
                    Duration::from_secs(45),
                ));
                info!(pool = config.browser_pool_size(), "rendered extraction enabled");
            }
            #[cfg(not(feature = "browser"))]
            warn!("browser extraction requested but the `browser` feature is not compiled in");
        }

        let mut transformer = Self::new(resolver)
            .with_cascade(cascade)
            .with_fallback(FallbackRecovery::new(config.min_fallback_chars()))
            .with_derivation(config.derivation());

        if let Some(settings) = config.structuring() {
            let client = HttpStructuringClient::new(settings)?;
            transformer = transformer.with_structuring(Arc::new(client), DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY);
        }
        Ok(transformer)
    }

    #[instrument(skip_all, fields(url = %entry.link, title = %entry.title))]
    pub async fn transform(&self, entry: &FeedEntry) -> NormalizedArticle {
        debug!(stage = ?Stage::Resolving);
        let resolved = match &self.resolver {
            Some(resolver) => resolver.resolve(&entry.link).await,
            None => ResolvedSource::unchanged(entry.link.trim()),
        };

        debug!(stage = ?Stage::Extracting, resolved = %resolved.resolved_url);
        self.pacer.acquire().await;
        let page = match self.loader.load(&resolved.resolved_url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(
                    error = %e,
                    status = e.status().map(|s| s.as_u16()),
                    transient = e.should_retry(),
                    "page load failed"
                );
                None
            }
        };
        let page_url = page
            .as_ref()
            .map(|p| p.url_final.clone())
            .or_else(|| Url::parse(&resolved.resolved_url).ok());
        let html = page.as_ref().map(|p| p.body_utf8.as_str());

        let extracted = self.extract(entry, &resolved, page_url.as_ref(), html).await;
        if extracted.stub {
            warn!(stage = ?Stage::Failed, "no extractable content, publishing stub");
        }

        debug!(stage = ?Stage::Sanitizing);
        let mut body_html = match &page_url {
            Some(base) => cleaner::sanitize_with_base(&extracted.body_html, base),
            None => cleaner::sanitize(&extracted.body_html),
        };
        if extracted.from_fallback && !links_to(&body_html, entry.link.trim()) {
            body_html.push_str(&source_attribution(entry.link.trim()));
            body_html = cleaner::sanitize(&body_html);
        }

        debug!(stage = ?Stage::ScoringImages);
        let candidates = self
            .score_images(&body_html, html, page_url.as_ref(), &extracted.recovered_images)
            .await;
        let selection = images::assign_use_case(&candidates);
        let ranked = images::rank_valid(candidates);

        let raw_title = Some(entry.title.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or(extracted.title)
            .unwrap_or_default();
        let title = titles::clean_title(&raw_title, entry.source_label.as_deref());
        let text = body_text(&body_html);

        debug!(stage = ?Stage::Structuring);
        let structured = if extracted.stub {
            None
        } else {
            self.structure(entry, &title, &text, &resolved).await
        };

        debug!(stage = ?Stage::Deriving);
        let article = self.derive(DeriveInput {
            entry,
            resolved: &resolved,
            title,
            body_html,
            text,
            method: extracted.method,
            structured,
            attributed: extracted.from_fallback,
            images: ranked,
            featured_image: selection.hero.as_ref().map(|c| c.url.clone()),
            thumbnail_image: selection
                .thumbnail
                .as_ref()
                .or(selection.hero.as_ref())
                .map(|c| c.url.clone()),
            declared_language: html.and_then(language::declared_language),
        });

        info!(
            stage = ?Stage::Done,
            method = %article.extraction_method,
            words = article.word_count,
            images = article.images.len(),
            structured = article.structured,
            "article transformed"
        );
        article
    }

    async fn extract(
        &self,
        entry: &FeedEntry,
        resolved: &ResolvedSource,
        page_url: Option<&Url>,
        html: Option<&str>,
    ) -> Extracted {
        if let Some(url) = page_url {
            let outcome = self.cascade.run(html, url).await;
            if let Some(attempt) = outcome.into_winner() {
                return Extracted {
                    title: attempt.title,
                    body_html: attempt.html_fragment,
                    method: attempt.strategy.to_string(),
                    recovered_images: Vec::new(),
                    from_fallback: false,
                    stub: false,
                };
            }
        }

        let recovered = self
            .fallback
            .recover_with_page(&resolved.resolved_url, Some(entry), html);
        Extracted {
            title: Some(recovered.title),
            body_html: recovered.content,
            method: format!("fallback:{}", recovered.method_used),
            recovered_images: recovered.images,
            from_fallback: true,
            stub: !recovered.succeeded,
        }
    }

    async fn score_images(
        &self,
        body_html: &str,
        page_html: Option<&str>,
        page_url: Option<&Url>,
        recovered: &[String],
    ) -> Vec<ImageCandidate> {
        let (Some(analyzer), Some(base)) = (&self.images, page_url) else {
            return Vec::new();
        };

        let mut discovered = images::discover(body_html, page_html, base);
        for url in recovered {
            if discovered.len() >= images::discovery::MAX_CANDIDATES {
                break;
            }
            if !discovered.iter().any(|d| &d.url == url) {
                discovered.push(DiscoveredImage::from_url(url.clone()));
            }
        }
        if discovered.is_empty() {
            return Vec::new();
        }
        analyzer.score_all(discovered).await
    }

    async fn structure(
        &self,
        entry: &FeedEntry,
        title: &str,
        text: &str,
        resolved: &ResolvedSource,
    ) -> Option<StructuredArticle> {
        let client = self.structuring.as_ref()?;
        let mut request = StructuringRequest::new(title, text, resolved.resolved_url.clone());
        request.source_label = entry.source_label.clone();
        request.published_at = entry.published_at;

        match structure_with_retry(
            client.as_ref(),
            &request,
            self.structuring_attempts,
            self.structuring_delay,
        )
        .await
        {
            Ok(structured) => Some(structured),
            Err(e) => {
                warn!(error = %e, "structuring failed, using rule-based fields");
                None
            }
        }
    }

    fn derive(&self, input: DeriveInput<'_>) -> NormalizedArticle {
        let DeriveInput {
            entry,
            resolved,
            title,
            mut body_html,
            mut text,
            method,
            structured,
            attributed,
            images,
            featured_image,
            thumbnail_image,
            declared_language,
        } = input;

        let now = Utc::now();
        let published_at = entry.published_at.unwrap_or(now);
        let is_breaking = derive::is_breaking(
            &entry.title,
            entry.raw_content_snippet.as_deref(),
            entry.published_at,
            now,
        );

        let (title, excerpt, tags, location, seo_title, seo_description, was_structured) =
            match structured {
                Some(s) => {
                    let content = cleaner::sanitize(&s.content);
                    if !content.trim().is_empty() {
                        // Recovered bodies keep pointing readers at the source
                        body_html = if attributed && !links_to(&content, entry.link.trim()) {
                            cleaner::sanitize(&format!("{content}{}", source_attribution(entry.link.trim())))
                        } else {
                            content
                        };
                        text = body_text(&body_html);
                    }
                    let tags = if s.tags.is_empty() {
                        derive::extract_tags(&s.title, &text, self.derivation.max_tags)
                    } else {
                        s.tags
                    };
                    let excerpt = bounded_excerpt(&s.excerpt, &text, &self.derivation);
                    let location = s.location.or_else(|| derive::guess_location(&s.title, &text));
                    (s.title, excerpt, tags, location, s.seo_title, s.seo_description, true)
                }
                None => {
                    let excerpt = derive::excerpt(&text, &self.derivation);
                    let tags = derive::extract_tags(&title, &text, self.derivation.max_tags);
                    let location = derive::guess_location(&title, &text);
                    let seo_title = crate::extractor::model::truncate_on_word(&title, 60);
                    let seo_description = crate::extractor::model::truncate_on_word(&excerpt, 160);
                    (title, excerpt, tags, location, seo_title, seo_description, false)
                }
            };

        let words = word_count(&text);
        NormalizedArticle {
            slug: derive::unique_slug(&title, published_at),
            title,
            excerpt,
            body_html,
            images,
            featured_image,
            thumbnail_image,
            tags,
            location,
            reading_time_minutes: derive::reading_time_minutes(
                words,
                self.derivation.words_per_minute,
            ),
            is_breaking,
            source_url: entry.link.trim().to_string(),
            canonical_url: resolved.resolved_url.clone(),
            published_at,
            language: language::detect_language(&text, declared_language.as_deref()),
            seo_title,
            seo_description,
            word_count: words,
            extraction_method: method,
            structured: was_structured,
            checksum: derive::checksum(&text),
        }
    }
}

struct DeriveInput<'a> {
    entry: &'a FeedEntry,
    resolved: &'a ResolvedSource,
    title: String,
    body_html: String,
    text: String,
    method: String,
    structured: Option<StructuredArticle>,
    /// Body came from fallback recovery and must link to the source.
    attributed: bool,
    images: Vec<ImageCandidate>,
    featured_image: Option<String>,
    thumbnail_image: Option<String>,
    declared_language: Option<String>,
}

fn source_attribution(link: &str) -> String {
    let label = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| link.to_string());
    format!(
        r#"<p>Source: <a href="{}">{}</a></p>"#,
        dom::escape_html(link),
        dom::escape_html(&label)
    )
}

/// Sanitized markup escapes `&` inside attributes, so both spellings are checked.
fn links_to(html: &str, link: &str) -> bool {
    let escaped = link.replace('&', "&amp;");
    html.contains(&format!("href=\"{escaped}")) || html.contains(&format!("href=\"{link}"))
}

fn body_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    normalize_whitespace(&dom::visible_text(&fragment.root_element()))
}

/// A service-provided excerpt is kept only when it fits the configured bounds.
fn bounded_excerpt(candidate: &str, text: &str, config: &DerivationConfig) -> String {
    let len = candidate.chars().count();
    if len >= config.excerpt_min && len <= config.excerpt_max {
        candidate.to_string()
    } else if len > config.excerpt_max {
        crate::extractor::model::truncate_on_word(candidate, config.excerpt_max)
    } else {
        derive::excerpt(text, config)
    }
}
