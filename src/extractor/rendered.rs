//! Rendered-browser extraction for pages whose content is built client-side.
//!
//! The browser is a pooled resource: callers take a [`BrowserLease`] from a
//! [`BrowserPool`] and the permit returns to the pool when the lease drops,
//! whichever way the extraction exits.

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};
use url::Url;

use crate::extractor::model::ReadabilityResult;
use crate::extractor::selectors;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser pool closed")]
    PoolClosed,
    #[error("render timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser failure: {0}")]
    Browser(String),
}

/// Something that can load a URL and hand back the settled DOM as HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String, RenderError>;
}

#[derive(Clone)]
pub struct BrowserPool {
    renderer: Arc<dyn PageRenderer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

pub struct BrowserLease {
    renderer: Arc<dyn PageRenderer>,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl BrowserPool {
    pub fn new(renderer: Arc<dyn PageRenderer>, size: usize, timeout: Duration) -> Self {
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(size.max(1))),
            timeout,
        }
    }

    pub async fn acquire(&self) -> Result<BrowserLease, RenderError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RenderError::PoolClosed)?;
        Ok(BrowserLease {
            renderer: self.renderer.clone(),
            timeout: self.timeout,
            _permit: permit,
        })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stops handing out leases; outstanding leases finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl BrowserLease {
    pub async fn render(&self, url: &Url) -> Result<String, RenderError> {
        tokio::time::timeout(self.timeout, self.renderer.render(url))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
    }
}

/// Renders `url` and reruns the selector logic against the live DOM.
pub async fn extract(pool: &BrowserPool, url: &Url, min_chars: usize) -> Option<ReadabilityResult> {
    let lease = match pool.acquire().await {
        Ok(lease) => lease,
        Err(e) => {
            warn!(error = %e, "no browser available");
            return None;
        }
    };

    let html = match lease.render(url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %url, error = %e, "rendered extraction failed");
            return None;
        }
    };
    drop(lease);

    debug!(url = %url, bytes = html.len(), "page rendered");
    let document = Html::parse_document(&html);
    selectors::extract_from_document(&document, min_chars)
}

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;

#[cfg(feature = "browser")]
mod chromium {
    use super::{PageRenderer, RenderError};
    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use url::Url;

    use crate::fetcher::BROWSER_USER_AGENT;

    /// Headless Chromium driven over CDP.
    pub struct ChromiumRenderer {
        browser: Browser,
        handler: JoinHandle<()>,
        settle: Duration,
    }

    impl ChromiumRenderer {
        pub async fn launch(settle: Duration) -> Result<Self, RenderError> {
            let config = BrowserConfig::builder()
                .args(vec![
                    "--no-sandbox",
                    "--disable-dev-shm-usage",
                    "--disable-gpu",
                ])
                .build()
                .map_err(RenderError::Browser)?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| RenderError::Browser(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            Ok(Self {
                browser,
                handler,
                settle,
            })
        }
    }

    #[async_trait]
    impl PageRenderer for ChromiumRenderer {
        async fn render(&self, url: &Url) -> Result<String, RenderError> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Browser(e.to_string()))?;

            let result = async {
                page.set_user_agent(SetUserAgentOverrideParams::new(BROWSER_USER_AGENT))
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                page.goto(url.as_str())
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                page.wait_for_navigation()
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                // Let late XHR-driven content land before reading the DOM
                tokio::time::sleep(self.settle).await;
                page.content()
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))
            }
            .await;

            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "closing page failed");
            }
            result
        }
    }

    impl Drop for ChromiumRenderer {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }
}
