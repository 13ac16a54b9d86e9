use dashmap::DashSet;
use std::future::Future;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tokio::{sync::Semaphore, task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::backoff::linear_backoff_delay;
use super::context::{CategoryTally, ErrorKind, RunContext, RunReport};
use super::feeds::FeedSource;
use super::ImportConfig;
use crate::entities::{ArticleRecord, FeedEntry, NormalizedArticle, TaxonomyKind};
use crate::fetcher::RequestPacer;
use crate::images::ImageAnalyzer;
use crate::store::{ContentStore, StoreError};
use crate::transform::ArticleTransformer;

/// What happened to a single feed entry.
#[derive(Debug)]
enum EntryResult {
    Imported { fallback: bool, structured: bool },
    Duplicate,
    Skipped(ErrorKind, String),
    Failed(ErrorKind, String),
    Cancelled,
}

/// Drives feed entries through the transformer into the content store.
#[derive(Clone)]
pub struct ImportOrchestrator {
    transformer: Arc<ArticleTransformer>,
    store: Arc<dyn ContentStore>,
    feeds: Arc<dyn FeedSource>,
    pacer: Arc<RequestPacer>,
    uploader: Option<ImageAnalyzer>,
    config: ImportConfig,
}

impl ImportOrchestrator {
    /// The transformer is re-paced so all workers share one request budget.
    pub fn new(
        transformer: ArticleTransformer,
        store: Arc<dyn ContentStore>,
        feeds: Arc<dyn FeedSource>,
        config: ImportConfig,
    ) -> Self {
        let pacer = Arc::new(RequestPacer::new(config.requests_per_sec, config.pacer_burst));
        Self {
            transformer: Arc::new(transformer.with_pacer(pacer.clone())),
            store,
            feeds,
            pacer,
            uploader: None,
            config,
        }
    }

    /// Re-host hero images through the store using this analyzer's client.
    pub fn with_image_uploads(mut self, analyzer: ImageAnalyzer) -> Self {
        self.uploader = Some(analyzer.with_pacer(self.pacer.clone()));
        self
    }

    pub fn pacer(&self) -> &Arc<RequestPacer> {
        &self.pacer
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn categories(&self) -> Vec<String> {
        self.feeds.categories()
    }

    /// Runs `run_import` but cancels whatever is still in flight once `deadline` passes.
    pub async fn run_import_within(
        &self,
        categories: &[String],
        max_per_category: usize,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> RunReport {
        let scoped = cancel.child_token();
        let timer = {
            let scoped = scoped.clone();
            tokio::spawn(async move {
                sleep(deadline).await;
                warn!(deadline_secs = deadline.as_secs(), "import deadline reached");
                scoped.cancel();
            })
        };
        let report = self.run_import(categories, max_per_category, &scoped).await;
        timer.abort();
        report
    }

    /// Imports up to `max_per_category` entries from each category.
    ///
    /// Categories run on a bounded pool; entries within a category run one at
    /// a time. Never fails: per-entry problems are counted in the report.
    pub async fn run_import(
        &self,
        categories: &[String],
        max_per_category: usize,
        cancel: &CancellationToken,
    ) -> RunReport {
        let run_span = info_span!("import_run", categories = categories.len(), max_per_category);
        async {
            info!(
                "Starting import - concurrency: {}, item_delay: {}ms, category_delay: {}ms",
                self.config.category_concurrency,
                self.config.item_delay.as_millis(),
                self.config.category_delay.as_millis()
            );

            let mut context = RunContext::new();
            let semaphore = Arc::new(Semaphore::new(self.config.category_concurrency.max(1)));
            let claims: Arc<DashSet<String>> = Arc::new(DashSet::new());
            let started = Arc::new(AtomicUsize::new(0));
            let mut workers = JoinSet::new();

            for category in categories {
                let this = self.clone();
                let category = category.clone();
                let semaphore = semaphore.clone();
                let claims = claims.clone();
                let started = started.clone();
                let cancel = cancel.clone();
                let span = info_span!("category", name = %category);

                workers.spawn(
                    async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return (category, CategoryTally::default());
                        };
                        if started.fetch_add(1, Ordering::SeqCst) > 0
                            && !this.pause(this.config.category_delay, &cancel).await
                        {
                            return (category, CategoryTally::default());
                        }
                        let tally = this
                            .process_category(&category, max_per_category, &claims, &cancel)
                            .await;
                        (category, tally)
                    }
                    .instrument(span),
                );
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((category, tally)) => {
                        info!(
                            category = %category,
                            imported = tally.outcome.imported,
                            skipped = tally.outcome.skipped,
                            errors = tally.outcome.errors,
                            "category finished"
                        );
                        context.merge(category, tally);
                    }
                    Err(e) => error!("Category worker failed: {}", e),
                }
            }

            let report = context.finish(cancel.is_cancelled());
            info!(
                imported = report.totals.imported,
                skipped = report.totals.skipped,
                errors = report.totals.errors,
                cancelled = report.cancelled,
                "import finished"
            );
            report
        }
        .instrument(run_span)
        .await
    }

    async fn process_category(
        &self,
        category: &str,
        max_per_category: usize,
        claims: &DashSet<String>,
        cancel: &CancellationToken,
    ) -> CategoryTally {
        let mut tally = CategoryTally::default();

        let entries = match self.feeds.entries(category).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(category, error = %e, "no entries for category");
                return tally;
            }
        };

        let mut category_id: Option<String> = None;
        for (index, entry) in entries.iter().take(max_per_category).enumerate() {
            if cancel.is_cancelled() {
                debug!(category, "run cancelled, leaving remaining entries");
                break;
            }
            if index > 0 && !self.pause(self.config.item_delay, cancel).await {
                break;
            }

            let result = self.process_entry(category, entry, &mut category_id, claims, cancel).await;
            match result {
                EntryResult::Imported { fallback, structured } => {
                    tally.imported();
                    tally.fallback_used += u32::from(fallback);
                    tally.structured += u32::from(structured);
                }
                EntryResult::Duplicate => {
                    debug!(title = %entry.title, url = %entry.link, "already imported");
                    tally.skipped();
                }
                EntryResult::Skipped(kind, message) => {
                    warn!(title = %entry.title, url = %entry.link, ?kind, "skipped: {}", message);
                    tally.skip_with(category, entry, kind, message);
                }
                EntryResult::Failed(kind, message) => {
                    error!(title = %entry.title, url = %entry.link, ?kind, "failed: {}", message);
                    tally.error(category, entry, kind, message);
                }
                EntryResult::Cancelled => break,
            }
        }
        tally
    }

    async fn process_entry(
        &self,
        category: &str,
        entry: &FeedEntry,
        category_id: &mut Option<String>,
        claims: &DashSet<String>,
        cancel: &CancellationToken,
    ) -> EntryResult {
        if !entry.is_usable() {
            return EntryResult::Skipped(ErrorKind::Unusable, "missing title or http(s) link".into());
        }
        let source_url = entry.link.trim().to_string();

        // One worker per URL for the rest of the run
        if !claims.insert(source_url.clone()) {
            return EntryResult::Duplicate;
        }

        match self.retrying(cancel, || self.store.exists(&source_url)).await {
            Ok(true) => return EntryResult::Duplicate,
            Ok(false) => {}
            Err(RetryError::Cancelled) => return EntryResult::Cancelled,
            Err(RetryError::Store(e)) => {
                return EntryResult::Failed(ErrorKind::DuplicateCheck, e.to_string());
            }
        }

        let article = tokio::select! {
            _ = cancel.cancelled() => return EntryResult::Cancelled,
            article = self.transformer.transform(entry) => article,
        };

        if category_id.is_none() {
            match self
                .retrying(cancel, || self.store.get_or_create_taxonomy(TaxonomyKind::Category, category))
                .await
            {
                Ok(id) => *category_id = Some(id),
                Err(RetryError::Cancelled) => return EntryResult::Cancelled,
                Err(RetryError::Store(e)) => return EntryResult::Failed(ErrorKind::Taxonomy, e.to_string()),
            }
        }

        let record = ArticleRecord {
            author_id: self.author_id(entry, cancel).await,
            tag_ids: self.tag_ids(&article, cancel).await,
            featured_asset_id: self.upload_hero(&article, cancel).await,
            category_id: category_id.clone().unwrap_or_default(),
            article,
        };
        let fallback = record.article.extraction_method.starts_with("fallback");
        let structured = record.article.structured;

        match self.retrying(cancel, || self.store.create_article(&record)).await {
            Ok(id) => {
                info!(id = %id, title = %record.article.title, method = %record.article.extraction_method, "article imported");
                EntryResult::Imported { fallback, structured }
            }
            Err(RetryError::Store(StoreError::Duplicate(_))) => EntryResult::Duplicate,
            Err(RetryError::Store(e)) => EntryResult::Failed(ErrorKind::Persistence, e.to_string()),
            Err(RetryError::Cancelled) => EntryResult::Cancelled,
        }
    }

    /// Retried like any store call, then dropped: an article without an author still imports.
    async fn author_id(&self, entry: &FeedEntry, cancel: &CancellationToken) -> Option<String> {
        let label = entry.source_label.as_deref()?.trim();
        if label.is_empty() {
            return None;
        }
        match self
            .retrying(cancel, || self.store.get_or_create_taxonomy(TaxonomyKind::Author, label))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(author = label, error = ?e, "author lookup failed");
                None
            }
        }
    }

    async fn tag_ids(&self, article: &NormalizedArticle, cancel: &CancellationToken) -> Vec<String> {
        let mut ids = Vec::with_capacity(article.tags.len());
        for tag in &article.tags {
            match self
                .retrying(cancel, || self.store.get_or_create_taxonomy(TaxonomyKind::Tag, tag))
                .await
            {
                Ok(id) => ids.push(id),
                Err(RetryError::Cancelled) => break,
                Err(e) => warn!(tag = %tag, error = ?e, "tag lookup failed"),
            }
        }
        ids
    }

    /// Best effort. On any failure the article keeps the remote URL.
    async fn upload_hero(&self, article: &NormalizedArticle, cancel: &CancellationToken) -> Option<String> {
        let analyzer = self.uploader.as_ref()?;
        let url = article.featured_image.as_deref()?;

        let (bytes, content_type) = match analyzer.download(url).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                debug!(image = url, error = %e, "hero download failed");
                return None;
            }
        };
        match self
            .retrying(cancel, || self.store.upload_image(bytes.clone(), &content_type, &article.title))
            .await
        {
            Ok(asset) => asset,
            Err(e) => {
                warn!(image = url, error = ?e, "hero upload failed");
                None
            }
        }
    }

    /// Retries retriable store errors with linear backoff. Gives up early on cancellation.
    async fn retrying<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retriable() || attempt >= attempts => {
                    return Err(RetryError::Store(e));
                }
                Err(e) => {
                    let delay = linear_backoff_delay(
                        attempt,
                        self.config.persist_base_delay,
                        self.config.backoff_jitter,
                    );
                    warn!(
                        "Store call failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    if !self.pause(delay, cancel).await {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Sleeps unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }
}

#[derive(Debug)]
enum RetryError {
    Store(StoreError),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionCascade;
    use crate::fetcher::{PageLoader, PageResponse, loader::MockPageLoader};
    use crate::import::feeds::StaticFeedSource;
    use crate::store::{InMemoryStore, MockContentStore};
    use std::sync::atomic::AtomicU32;
    use url::Url;

    fn article_html(topic: &str) -> String {
        let paragraph = format!(
            "The city council met on Tuesday to debate the {topic} plan, which would reshape \
             how residents commute across the river for the next decade and beyond. "
        );
        format!(
            "<html><head><title>{topic}</title></head><body><article><h1>{topic}</h1>{}</article></body></html>",
            (0..6).map(|_| format!("<p>{paragraph}</p>")).collect::<String>()
        )
    }

    fn loader() -> Arc<dyn PageLoader> {
        let mut loader = MockPageLoader::new();
        loader.expect_load().returning(|url| {
            Ok(PageResponse::from_html(Url::parse(url).unwrap(), article_html("transit")))
        });
        Arc::new(loader)
    }

    fn transformer() -> ArticleTransformer {
        ArticleTransformer::offline(loader()).with_cascade(ExtractionCascade::default())
    }

    fn quick_config() -> ImportConfig {
        ImportConfig {
            item_delay: Duration::ZERO,
            category_delay: Duration::ZERO,
            requests_per_sec: 0.0,
            backoff_jitter: 0.0,
            ..ImportConfig::default()
        }
    }

    fn feeds(entries: Vec<FeedEntry>) -> Arc<dyn FeedSource> {
        Arc::new(StaticFeedSource::new().with_category("local", entries))
    }

    fn categories() -> Vec<String> {
        vec!["local".to_string()]
    }

    #[tokio::test]
    async fn importing_the_same_url_twice_skips_the_second_time() {
        let store = Arc::new(InMemoryStore::new());
        let entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), feeds(vec![entry]), quick_config());
        let cancel = CancellationToken::new();

        let first = orchestrator.run_import(&categories(), 10, &cancel).await;
        let second = orchestrator.run_import(&categories(), 10, &cancel).await;

        assert_eq!(first.totals.imported, 1);
        assert_eq!(second.totals.imported, 0);
        assert_eq!(second.totals.skipped, 1);
        assert_eq!(first.totals.imported + second.totals.imported, 1);
        assert_eq!(store.article_count(), 1);
    }

    #[tokio::test]
    async fn unusable_and_repeated_entries_are_skipped_within_a_run() {
        let store = Arc::new(InMemoryStore::new());
        let entries = vec![
            FeedEntry::new("", "https://news.example/untitled"),
            FeedEntry::new("No link", "not a url"),
            FeedEntry::new("Transit plan approved", "https://news.example/transit"),
            FeedEntry::new("Transit plan approved (again)", "https://news.example/transit"),
        ];
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), feeds(entries), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;

        assert_eq!(report.totals.imported, 1);
        assert_eq!(report.totals.skipped, 3);
        assert_eq!(report.totals.errors, 0);
        let unusable: Vec<_> = report.failures.iter().filter(|f| f.kind == ErrorKind::Unusable).collect();
        assert_eq!(unusable.len(), 2);
        assert_eq!(unusable[1].title, "No link");
    }

    #[tokio::test]
    async fn respects_max_per_category() {
        let store = Arc::new(InMemoryStore::new());
        let entries = (0..5)
            .map(|i| FeedEntry::new(format!("Story {i}"), format!("https://news.example/{i}")))
            .collect();
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), feeds(entries), quick_config());

        let report = orchestrator.run_import(&categories(), 2, &CancellationToken::new()).await;

        assert_eq!(report.totals.total(), 2);
        assert_eq!(store.article_count(), 2);
    }

    fn permissive_store() -> MockContentStore {
        let mut store = MockContentStore::new();
        store.expect_exists().returning(|_| Ok(false));
        store
            .expect_get_or_create_taxonomy()
            .returning(|kind, name| Ok(format!("{}-{name}", kind.as_str())));
        store.expect_upload_image().returning(|_, _, _| Ok(None));
        store
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_that_fails_twice_then_succeeds_counts_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut store = permissive_store();
        let counter = calls.clone();
        store.expect_create_article().times(3).returning(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(StoreError::Unavailable("connection reset".into())),
                _ => Ok("article-1".into()),
            }
        });

        let entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(vec![entry]), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.totals.imported, 1);
        assert_eq!(report.totals.errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_count_an_error_and_the_run_continues() {
        let mut store = permissive_store();
        store.expect_create_article().returning(|record| {
            if record.article.source_url.ends_with("/bad") {
                Err(StoreError::Unavailable("timeout".into()))
            } else {
                Ok("ok".into())
            }
        });

        let entries = vec![
            FeedEntry::new("Bad story", "https://news.example/bad"),
            FeedEntry::new("Good story", "https://news.example/good"),
        ];
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(entries), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;

        assert_eq!(report.totals.errors, 1);
        assert_eq!(report.totals.imported, 1);
        let failure = &report.failures[0];
        assert_eq!(failure.kind, ErrorKind::Persistence);
        assert_eq!(failure.title, "Bad story");
        assert_eq!(failure.url, "https://news.example/bad");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_author_lookup_is_retried() {
        let author_calls = Arc::new(AtomicU32::new(0));
        let counter = author_calls.clone();
        let mut store = MockContentStore::new();
        store.expect_exists().returning(|_| Ok(false));
        store.expect_get_or_create_taxonomy().returning(move |kind, name| {
            if kind == TaxonomyKind::Author && counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            Ok(format!("{}-{name}", kind.as_str()))
        });
        store.expect_create_article().times(1).returning(|record| {
            match record.author_id.as_deref() {
                Some("author-Metro Daily") => Ok("article-1".into()),
                other => Err(StoreError::Rejected(format!("unexpected author {other:?}"))),
            }
        });

        let mut entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        entry.source_label = Some("Metro Daily".into());
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(vec![entry]), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;

        assert_eq!(author_calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.totals.imported, 1);
        assert_eq!(report.totals.errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tag_lookups_do_not_block_the_import() {
        let mut store = MockContentStore::new();
        store.expect_exists().returning(|_| Ok(false));
        store.expect_get_or_create_taxonomy().returning(|kind, name| match kind {
            TaxonomyKind::Tag => Err(StoreError::Unavailable("tag service down".into())),
            _ => Ok(format!("{}-{name}", kind.as_str())),
        });
        store.expect_create_article().times(1).returning(|record| {
            assert!(record.tag_ids.is_empty());
            Ok("article-1".into())
        });

        let entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(vec![entry]), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;
        assert_eq!(report.totals.imported, 1);
    }

    #[tokio::test]
    async fn page_loads_are_charged_to_the_shared_pacer() {
        let store = Arc::new(InMemoryStore::new());
        let entries = (0..3)
            .map(|i| FeedEntry::new(format!("Story {i}"), format!("https://news.example/{i}")))
            .collect();
        let orchestrator = ImportOrchestrator::new(transformer(), store, feeds(entries), quick_config());

        orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;
        assert_eq!(orchestrator.pacer().granted(), 3);
    }

    #[tokio::test]
    async fn duplicate_on_create_is_a_skip_not_an_error() {
        let mut store = permissive_store();
        store
            .expect_create_article()
            .times(1)
            .returning(|record| Err(StoreError::Duplicate(record.article.source_url.clone())));

        let entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(vec![entry]), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(report.totals.errors, 0);
    }

    #[tokio::test]
    async fn failing_duplicate_check_is_an_error() {
        let mut store = MockContentStore::new();
        store
            .expect_exists()
            .returning(|_| Err(StoreError::Rejected("bad query".into())));
        store.expect_create_article().never();

        let entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let orchestrator = ImportOrchestrator::new(transformer(), Arc::new(store), feeds(vec![entry]), quick_config());

        let report = orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;
        assert_eq!(report.totals.errors, 1);
        assert_eq!(report.failures[0].kind, ErrorKind::DuplicateCheck);
    }

    #[tokio::test]
    async fn attaches_category_author_and_tags() {
        let store = Arc::new(InMemoryStore::new());
        let mut entry = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        entry.source_label = Some("Metro Daily".into());
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), feeds(vec![entry]), quick_config());

        orchestrator.run_import(&categories(), 10, &CancellationToken::new()).await;

        let record = store.article("https://news.example/transit").unwrap();
        assert!(record.category_id.starts_with("category_"));
        assert!(record.author_id.is_some());
        assert_eq!(record.tag_ids.len(), record.article.tags.len());
        assert_eq!(store.taxonomy_count(TaxonomyKind::Category), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_items() {
        let store = Arc::new(InMemoryStore::new());
        let entries = (0..5)
            .map(|i| FeedEntry::new(format!("Story {i}"), format!("https://news.example/{i}")))
            .collect();
        let config = ImportConfig {
            item_delay: Duration::from_secs(10),
            ..quick_config()
        };
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), feeds(entries), config);

        let report = orchestrator
            .run_import_within(&categories(), 10, Duration::from_secs(15), &CancellationToken::new())
            .await;

        assert!(report.cancelled);
        assert_eq!(report.totals.imported, 2);
        assert_eq!(store.article_count(), 2);
    }

    #[tokio::test]
    async fn categories_run_on_a_pool_and_share_claims() {
        let store = Arc::new(InMemoryStore::new());
        let shared = FeedEntry::new("Transit plan approved", "https://news.example/transit");
        let source = StaticFeedSource::new()
            .with_category("local", vec![shared.clone(), FeedEntry::new("Local only", "https://news.example/local")])
            .with_category("politics", vec![shared, FeedEntry::new("Politics only", "https://news.example/politics")]);
        let config = ImportConfig {
            category_concurrency: 2,
            ..quick_config()
        };
        let orchestrator = ImportOrchestrator::new(transformer(), store.clone(), Arc::new(source), config);

        let report = orchestrator
            .run_import(&orchestrator.categories(), 10, &CancellationToken::new())
            .await;

        assert_eq!(report.totals.imported, 3);
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(store.article_count(), 3);
        assert_eq!(report.per_category.len(), 2);
    }
}
