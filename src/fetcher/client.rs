use crate::fetcher::{errors::FetchError, pipeline::process_response, types::PageResponse};
use once_cell::sync::Lazy;
use reqwest::{
    Client, ClientBuilder,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};
use std::time::Duration;
use tracing::{debug, instrument};

pub const MAX_PAGE_SIZE: u64 = 5 * 1024 * 1024; // 5MB
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Many publishers refuse clients that do not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_client(reqwest::redirect::Policy::limited(10)).expect("Failed to build HTTP client")
});

pub(crate) fn build_client(redirects: reqwest::redirect::Policy) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .user_agent(BROWSER_USER_AGENT)
        .redirect(redirects)
        .default_headers(headers)
        .build()
}

pub fn get_client() -> &'static Client {
    &HTTP_CLIENT
}

/// Fetch an HTML page with the default page timeout.
pub async fn fetch(url: &str) -> Result<PageResponse, FetchError> {
    fetch_with_timeout(url, DEFAULT_PAGE_TIMEOUT).await
}

#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_with_timeout(url: &str, timeout: Duration) -> Result<PageResponse, FetchError> {
    let parsed_url = url::Url::parse(url)?;

    let response = HTTP_CLIENT
        .get(parsed_url)
        .timeout(timeout)
        .send()
        .await
        .map_err(FetchError::from_reqwest_error)?;

    if let Some(content_length) = response.content_length()
        && content_length > MAX_PAGE_SIZE
    {
        return Err(FetchError::BodyTooLarge(content_length));
    }

    let final_url = response.url().clone();
    let status = response.status();
    let headers = response.headers().clone();

    if !status.is_success() {
        return Err(FetchError::http(status));
    }

    let content_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    if !is_markup(&content_type) {
        return Err(FetchError::UnsupportedContentType(content_type));
    }

    let body_bytes = response
        .bytes()
        .await
        .map_err(FetchError::from_reqwest_error)?;

    // Content-Length may be absent or wrong
    if body_bytes.len() as u64 > MAX_PAGE_SIZE {
        return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
    }

    debug!(status = %status, bytes = body_bytes.len(), final_url = %final_url, "page fetched");
    process_response(final_url, status, headers, body_bytes, &content_type)
}

fn is_markup(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml") || ct.contains("text/plain")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_content_types() {
        assert!(is_markup("text/html; charset=utf-8"));
        assert!(is_markup("application/xhtml+xml"));
        assert!(is_markup("TEXT/HTML"));
        assert!(!is_markup("image/jpeg"));
        assert!(!is_markup("application/pdf"));
    }
}
