//! Scheduled imports from a JSON feed file into the in-memory store.
//!
//! Usage: `importer <feeds.json> [--once]`
//!
//! The feed file maps category names to arrays of feed entries.

use anyhow::{Context, Result, bail};
use newsloom::{
    config::Config,
    images::ImageAnalyzer,
    import::{ImportOrchestrator, ImportScheduler, StaticFeedSource},
    store::InMemoryStore,
    transform::ArticleTransformer,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(feed_path) = args.iter().find(|a| !a.starts_with("--")) else {
        bail!("usage: importer <feeds.json> [--once]");
    };
    let once = args.iter().any(|a| a == "--once");

    // Load configuration
    let config = Config::from_env()?;
    let feeds = StaticFeedSource::from_file(feed_path)
        .await
        .with_context(|| format!("loading feeds from {feed_path}"))?;

    let store = Arc::new(InMemoryStore::new());
    let transformer = ArticleTransformer::from_config(&config).await?;
    let orchestrator = ImportOrchestrator::new(transformer, store.clone(), Arc::new(feeds), config.import())
        .with_image_uploads(ImageAnalyzer::default());
    let scheduler = ImportScheduler::new(Arc::new(orchestrator));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown.cancel();
        });
    }

    if once {
        let report = scheduler.run_now(&shutdown).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    scheduler.start(config.import_interval());
    shutdown.cancelled().await;
    scheduler.stop().await;

    let status = scheduler.status();
    info!(runs = status.runs, stored = store.article_count(), "importer stopped");
    if let Some(report) = status.last_result {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
