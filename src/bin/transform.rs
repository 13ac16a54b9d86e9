//! Transform a single URL and print the normalized article as JSON.
//!
//! Usage: `transform <url> [title]`

use anyhow::{Context, Result, bail};
use newsloom::{config::Config, entities::FeedEntry, transform::ArticleTransformer};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        bail!("usage: transform <url> [title]");
    };
    let title = args.next().unwrap_or_else(|| url.clone());

    let config = Config::from_env()?;
    let transformer = ArticleTransformer::from_config(&config).await?;

    let entry = FeedEntry::new(title, url);
    if !entry.is_usable() {
        bail!("not an absolute http(s) URL: {}", entry.link);
    }

    let article = transformer.transform(&entry).await;
    let json = serde_json::to_string_pretty(&article).context("serializing article")?;
    println!("{json}");
    Ok(())
}
