use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::extractor::model::text_len;
use crate::extractor::{
    BrowserPool, ExtractionCascade, PageRenderer, RenderError, Strategy, StrategyName, cleaner,
    extract_static,
};

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("src/extractor/tests/fixtures/{name}"))
        .expect("Failed to read test fixture")
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

struct StaticRenderer(String);

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, _url: &Url) -> Result<String, RenderError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_single_article_is_taken_by_first_strategy() {
    let html = fixture("single_article.html");
    let cascade = ExtractionCascade::default();
    let outcome = cascade
        .run(Some(&html), &url("https://example.com/drug-discovery"))
        .await;

    assert_eq!(outcome.tried(), vec![StrategyName::Readability]);
    let winner = outcome.winner().unwrap();
    assert_eq!(winner.strategy, StrategyName::Readability);
    assert!(winner.succeeded);
    assert!(winner.word_count >= 400);
    assert!(winner.plain_text.contains("Scientists at the coastal research institute"));
}

#[tokio::test]
async fn test_news_article_strips_boilerplate() {
    let html = fixture("news_article.html");
    let page_url = url("https://metro.example/news/transit-plan");
    let outcome = ExtractionCascade::default().run(Some(&html), &page_url).await;

    let winner = outcome.into_winner().unwrap();
    assert!(winner.plain_text.contains("voted 7-2 on Tuesday night"));
    assert!(winner.plain_text.contains("Residents who spoke"));
    assert!(!winner.plain_text.contains("window.analytics"));
    assert!(!winner.plain_text.contains("All rights reserved"));

    let body = cleaner::sanitize_with_base(&winner.html_fragment, &page_url);
    assert!(!body.contains("<script"));
    assert!(!body.contains("<nav"));
    assert!(body.contains("https://metro.example/related/transit-history"));
}

#[tokio::test]
async fn test_cascade_falls_through_to_pattern() {
    let html = fixture("pattern_only.html");
    let cascade =
        ExtractionCascade::default().with_strategies(&[Strategy::Pattern, Strategy::Selectors]);
    let outcome = cascade
        .run(Some(&html), &url("https://port.example/harbor"))
        .await;

    assert_eq!(cascade.strategies(), &[Strategy::Selectors, Strategy::Pattern]);
    let winner = outcome.winner().unwrap();
    assert_eq!(winner.strategy, StrategyName::Pattern);
    assert_eq!(winner.title.as_deref(), Some("Harbor Expansion Stalls"));
    assert!(text_len(&winner.plain_text) >= 200);
}

#[tokio::test]
async fn test_empty_page_has_no_winner() {
    let html = fixture("empty.html");
    let outcome = ExtractionCascade::default()
        .run(Some(&html), &url("https://example.com/empty"))
        .await;
    assert!(outcome.winner().is_none());
}

#[tokio::test]
async fn test_unfetched_page_without_browser_tries_nothing() {
    let outcome = ExtractionCascade::default()
        .run(None, &url("https://example.com/down"))
        .await;
    assert!(outcome.attempts.is_empty());
    assert!(outcome.winner.is_none());
}

#[tokio::test]
async fn test_rendered_strategy_runs_last() {
    let rendered = format!(
        "<html><body><main><p>{}</p></main></body></html>",
        "Rendered content that only exists after the page scripts run. ".repeat(6)
    );
    let pool = BrowserPool::new(Arc::new(StaticRenderer(rendered)), 1, Duration::from_secs(5));
    let cascade = ExtractionCascade::default().with_browser(pool);

    let shell = r#"<html><body><div id="root"></div><script src="/app.js"></script></body></html>"#;
    let outcome = cascade
        .run(Some(shell), &url("https://spa.example/story"))
        .await;

    let winner = outcome.winner().unwrap();
    assert_eq!(winner.strategy, StrategyName::Rendered);
    assert!(winner.plain_text.contains("only exists after"));
}

#[tokio::test]
async fn test_malformed_html() {
    let html = "<html><head><title>Broken</title><body><p>Unclosed tags<div>More content".to_string();
    let outcome = ExtractionCascade::default()
        .run(Some(&html), &url("https://example.com/broken"))
        .await;
    // Too short for any strategy, but must not panic
    assert!(outcome.winner().is_none());
}

#[test]
fn test_extract_static_convenience() {
    let html = fixture("single_article.html");
    let attempt = extract_static(&html, &url("https://example.com/a")).unwrap();
    assert!(attempt.succeeded);
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_extract_never_panics(html in ".*") {
            let _ = extract_static(&html, &url("https://example.com/fuzz"));
        }
    }
}
