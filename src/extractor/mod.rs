//! The extraction strategy set.
//!
//! Strategies form a closed enum evaluated in a fixed order by
//! [`ExtractionCascade`]. Static strategies run against markup already in
//! hand; the rendered strategy needs the URL and a browser lease and always
//! runs last. The cascade stops at the first attempt whose plain text meets
//! the minimum length.

pub mod cleaner;
pub mod dom;
pub mod language;
pub mod model;
pub mod pattern;
pub mod reader;
pub mod reject;
pub mod rendered;
pub mod selectors;

#[cfg(test)]
mod tests;

pub use model::{ExtractionAttempt, StrategyName};
pub use rendered::{BrowserPool, PageRenderer, RenderError};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::extractor::model::ReadabilityResult;
use crate::fetcher::RequestPacer;

pub const DEFAULT_MIN_CONTENT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Readability,
    Selectors,
    Pattern,
    Rendered,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Readability,
        Strategy::Selectors,
        Strategy::Pattern,
        Strategy::Rendered,
    ];

    pub fn name(&self) -> StrategyName {
        match self {
            Strategy::Readability => StrategyName::Readability,
            Strategy::Selectors => StrategyName::Selectors,
            Strategy::Pattern => StrategyName::Pattern,
            Strategy::Rendered => StrategyName::Rendered,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self, Strategy::Rendered)
    }

    /// Runs a static strategy against `html`. A panic inside a parser counts as a miss.
    pub fn extract_static(&self, html: &str, url: &Url, min_chars: usize) -> Option<ExtractionAttempt> {
        let strategy = *self;
        let raw = catch_unwind(AssertUnwindSafe(|| match strategy {
            Strategy::Readability => reader::extract(html, url, min_chars),
            Strategy::Selectors => selectors::extract(html, min_chars),
            Strategy::Pattern => pattern::extract(html),
            Strategy::Rendered => None,
        }))
        .unwrap_or_else(|_| {
            warn!(strategy = %strategy.name(), url = %url, "strategy panicked");
            None
        })?;

        Some(into_attempt(strategy.name(), raw, min_chars))
    }
}

fn into_attempt(name: StrategyName, raw: ReadabilityResult, min_chars: usize) -> ExtractionAttempt {
    ExtractionAttempt::new(name, raw.title, raw.html, &raw.text, min_chars)
}

/// Every attempt made for one page, plus which one (if any) cleared the bar.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub attempts: Vec<ExtractionAttempt>,
    pub winner: Option<usize>,
}

impl CascadeOutcome {
    pub fn winner(&self) -> Option<&ExtractionAttempt> {
        self.winner.and_then(|i| self.attempts.get(i))
    }

    pub fn into_winner(mut self) -> Option<ExtractionAttempt> {
        let index = self.winner?;
        Some(self.attempts.swap_remove(index))
    }

    pub fn tried(&self) -> Vec<StrategyName> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }
}

#[derive(Clone)]
pub struct ExtractionCascade {
    strategies: Vec<Strategy>,
    min_chars: usize,
    browser: Option<BrowserPool>,
    pacer: Arc<RequestPacer>,
}

impl Default for ExtractionCascade {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONTENT_CHARS)
    }
}

impl ExtractionCascade {
    /// All strategies in their fixed order. Rendered is skipped until a browser is attached.
    pub fn new(min_chars: usize) -> Self {
        Self {
            strategies: Strategy::ALL.to_vec(),
            min_chars,
            browser: None,
            pacer: Arc::new(RequestPacer::unlimited()),
        }
    }

    /// Restrict to a subset; order is still the fixed one regardless of the order given.
    pub fn with_strategies(mut self, enabled: &[Strategy]) -> Self {
        self.strategies = Strategy::ALL
            .into_iter()
            .filter(|s| enabled.contains(s))
            .collect();
        self
    }

    pub fn with_browser(mut self, pool: BrowserPool) -> Self {
        self.browser = Some(pool);
        self
    }

    /// Renders wait on `pacer`; static strategies make no requests.
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// `html` is `None` when the page could not be fetched; only the rendered strategy can help then.
    pub async fn run(&self, html: Option<&str>, url: &Url) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();

        for strategy in &self.strategies {
            let attempt = if strategy.is_static() {
                match html {
                    Some(html) => strategy.extract_static(html, url, self.min_chars),
                    None => None,
                }
            } else {
                match &self.browser {
                    Some(pool) => {
                        self.pacer.acquire().await;
                        rendered::extract(pool, url, self.min_chars)
                            .await
                            .map(|raw| into_attempt(strategy.name(), raw, self.min_chars))
                    }
                    None => None,
                }
            };

            let Some(attempt) = attempt else {
                debug!(strategy = %strategy.name(), "strategy produced nothing");
                continue;
            };

            let succeeded = attempt.succeeded;
            debug!(
                strategy = %attempt.strategy,
                chars = attempt.plain_text.chars().count(),
                succeeded,
                "extraction attempt"
            );
            outcome.attempts.push(attempt);

            if succeeded {
                outcome.winner = Some(outcome.attempts.len() - 1);
                info!(strategy = %strategy.name(), url = %url, "content extracted");
                break;
            }
        }

        outcome
    }
}

/// Static-only convenience used by the fuzz target and tooling.
pub fn extract_static(html: &str, url: &Url) -> Option<ExtractionAttempt> {
    Strategy::ALL
        .iter()
        .filter(|s| s.is_static())
        .filter_map(|s| s.extract_static(html, url, DEFAULT_MIN_CONTENT_CHARS))
        .find(|a| a.succeeded)
}
