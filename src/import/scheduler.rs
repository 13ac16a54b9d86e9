use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::{sync::Mutex as RunLock, task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use super::{ImportOrchestrator, RunReport};

/// Snapshot returned by [`ImportScheduler::status`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// A schedule is active.
    pub running: bool,
    /// A run is executing right now, scheduled or manual.
    pub in_progress: bool,
    pub interval_secs: Option<u64>,
    pub runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<RunReport>,
}

struct Schedule {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic trigger around [`ImportOrchestrator::run_import`].
pub struct ImportScheduler {
    orchestrator: Arc<ImportOrchestrator>,
    status: Arc<Mutex<SchedulerStatus>>,
    run_lock: Arc<RunLock<()>>,
    schedule: Mutex<Option<Schedule>>,
}

impl ImportScheduler {
    pub fn new(orchestrator: Arc<ImportOrchestrator>) -> Self {
        Self {
            orchestrator,
            status: Arc::new(Mutex::new(SchedulerStatus::default())),
            run_lock: Arc::new(RunLock::new(())),
            schedule: Mutex::new(None),
        }
    }

    /// Starts the schedule. The first run begins immediately. Returns false if already started.
    pub fn start(&self, every: Duration) -> bool {
        let Ok(mut schedule) = self.schedule.lock() else {
            return false;
        };
        if schedule.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            warn!("Scheduler already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            Self::run_loop(
                self.orchestrator.clone(),
                self.status.clone(),
                self.run_lock.clone(),
                every,
                shutdown.clone(),
            )
            .instrument(info_span!("scheduler", interval_secs = every.as_secs())),
        );
        *schedule = Some(Schedule { shutdown, handle });
        self.update(|status| {
            status.running = true;
            status.interval_secs = Some(every.as_secs());
        });
        info!("Scheduler started with interval {}s", every.as_secs());
        true
    }

    /// Stops the schedule and cancels any scheduled run in flight, waiting for it to wind down.
    pub async fn stop(&self) {
        let schedule = self.schedule.lock().ok().and_then(|mut s| s.take());
        if let Some(Schedule { shutdown, handle }) = schedule {
            shutdown.cancel();
            if let Err(e) = handle.await {
                error!("Scheduler task failed: {}", e);
            }
            info!("Scheduler stopped");
        }
        self.update(|status| {
            status.running = false;
            status.interval_secs = None;
        });
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// One run outside the schedule. Waits for a run in progress to finish first.
    pub async fn run_now(&self, cancel: &CancellationToken) -> RunReport {
        let _guard = self.run_lock.lock().await;
        Self::execute(&self.orchestrator, &self.status, cancel).await
    }

    async fn run_loop(
        orchestrator: Arc<ImportOrchestrator>,
        status: Arc<Mutex<SchedulerStatus>>,
        run_lock: Arc<RunLock<()>>,
        every: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let Ok(_guard) = run_lock.try_lock() else {
                        warn!("Previous import still in progress, skipping tick");
                        continue;
                    };
                    Self::execute(&orchestrator, &status, &shutdown).await;
                }
            }
        }
    }

    async fn execute(
        orchestrator: &ImportOrchestrator,
        status: &Mutex<SchedulerStatus>,
        cancel: &CancellationToken,
    ) -> RunReport {
        if let Ok(mut s) = status.lock() {
            s.in_progress = true;
        }

        let categories = orchestrator.categories();
        let config = orchestrator.config();
        let report = match config.run_deadline {
            Some(deadline) => {
                orchestrator
                    .run_import_within(&categories, config.max_per_category, deadline, cancel)
                    .await
            }
            None => orchestrator.run_import(&categories, config.max_per_category, cancel).await,
        };

        if let Ok(mut s) = status.lock() {
            s.in_progress = false;
            s.runs += 1;
            s.last_run_at = Some(report.finished_at);
            s.last_result = Some(report.clone());
        }
        report
    }

    fn update(&self, f: impl FnOnce(&mut SchedulerStatus)) {
        if let Ok(mut status) = self.status.lock() {
            f(&mut status);
        }
    }
}

impl Drop for ImportScheduler {
    fn drop(&mut self) {
        if let Ok(mut schedule) = self.schedule.lock()
            && let Some(schedule) = schedule.take()
        {
            schedule.shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FeedEntry;
    use crate::fetcher::{FetchError, loader::MockPageLoader};
    use crate::import::{ImportConfig, StaticFeedSource};
    use crate::store::InMemoryStore;
    use crate::transform::ArticleTransformer;

    fn scheduler(store: Arc<InMemoryStore>) -> ImportScheduler {
        let mut loader = MockPageLoader::new();
        loader
            .expect_load()
            .returning(|_| Err(FetchError::Connect("offline".into())));
        let transformer = ArticleTransformer::offline(Arc::new(loader));
        let feeds = Arc::new(StaticFeedSource::new().with_category(
            "world",
            vec![FeedEntry::new("Short", "https://example.com/a")],
        ));
        let config = ImportConfig {
            item_delay: Duration::ZERO,
            category_delay: Duration::ZERO,
            requests_per_sec: 0.0,
            ..ImportConfig::default()
        };
        ImportScheduler::new(Arc::new(ImportOrchestrator::new(transformer, store, feeds, config)))
    }

    #[tokio::test]
    async fn run_now_records_last_result() {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = scheduler(store.clone());
        assert!(!scheduler.status().running);
        assert!(scheduler.status().last_result.is_none());

        let report = scheduler.run_now(&CancellationToken::new()).await;
        assert_eq!(report.totals.imported, 1);

        let status = scheduler.status();
        assert_eq!(status.runs, 1);
        assert!(!status.in_progress);
        assert_eq!(status.last_result.unwrap().totals.imported, 1);
        assert_eq!(store.article_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_on_interval_until_stopped() {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = scheduler(store.clone());

        assert!(scheduler.start(Duration::from_secs(60)));
        assert!(!scheduler.start(Duration::from_secs(60)));
        assert!(scheduler.status().running);

        tokio::time::sleep(Duration::from_secs(150)).await;
        scheduler.stop().await;

        let status = scheduler.status();
        assert!(!status.running);
        // Ticks at 0s, 60s and 120s; only the first imports, the rest see a duplicate
        assert_eq!(status.runs, 3);
        assert_eq!(status.last_result.unwrap().totals.skipped, 1);
        assert_eq!(store.article_count(), 1);

        assert!(scheduler.start(Duration::from_secs(60)));
        scheduler.stop().await;
    }
}
