use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, header::HeaderMap};
use url::Url;

#[derive(Debug)]
pub struct PageResponse {
    pub url_final: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body_raw: Bytes,
    pub body_utf8: String,
    /// Name of the encoding the body was decoded from, e.g. `UTF-8`.
    pub charset: &'static str,
    pub fetched_at: DateTime<Utc>,
}

impl PageResponse {
    /// Builds a response around markup that did not come over the wire (rendered pages, tests).
    pub fn from_html(url: Url, html: impl Into<String>) -> Self {
        let html = html.into();
        Self {
            url_final: url,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body_raw: Bytes::from(html.clone()),
            body_utf8: html,
            charset: encoding_rs::UTF_8.name(),
            fetched_at: Utc::now(),
        }
    }
}
