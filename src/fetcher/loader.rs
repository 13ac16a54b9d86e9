use async_trait::async_trait;
use std::time::Duration;

use super::{FetchError, PageResponse, client::DEFAULT_PAGE_TIMEOUT, fetch_with_timeout};

/// Where the pipeline gets page markup from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<PageResponse, FetchError>;
}

/// Plain HTTP through the shared client.
#[derive(Debug, Clone)]
pub struct HttpPageLoader {
    timeout: Duration,
}

impl HttpPageLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpPageLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TIMEOUT)
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(&self, url: &str) -> Result<PageResponse, FetchError> {
        fetch_with_timeout(url, self.timeout).await
    }
}
