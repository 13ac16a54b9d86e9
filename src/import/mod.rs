//! Import runs: feed entries in, stored articles out.

pub mod backoff;
pub mod context;
pub mod feeds;
pub mod orchestrator;
pub mod scheduler;

pub use backoff::linear_backoff_delay;
pub use context::{CategoryTally, EntryFailure, ErrorKind, RunContext, RunReport};
pub use feeds::{FeedError, FeedSource, StaticFeedSource};
pub use orchestrator::ImportOrchestrator;
pub use crate::fetcher::RequestPacer;
pub use scheduler::{ImportScheduler, SchedulerStatus};

use std::time::Duration;

/// Import run configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub max_per_category: usize,
    pub item_delay: Duration,
    pub category_delay: Duration,
    pub category_concurrency: usize,
    /// Outbound requests per second shared by all workers, covering every
    /// resolve, page load, render and image request. Zero disables pacing.
    pub requests_per_sec: f64,
    pub pacer_burst: u32,
    pub persist_attempts: u32,
    /// Retry `n` waits `n × persist_base_delay`.
    pub persist_base_delay: Duration,
    pub backoff_jitter: f64,
    pub interval: Duration,
    pub run_deadline: Option<Duration>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_per_category: 10,
            item_delay: Duration::from_millis(1500),
            category_delay: Duration::from_millis(5000),
            category_concurrency: 1,
            requests_per_sec: 2.0,
            pacer_burst: 2,
            persist_attempts: 3,
            persist_base_delay: Duration::from_secs(1),
            backoff_jitter: 0.0,
            interval: Duration::from_secs(3600),
            run_deadline: None,
        }
    }
}
