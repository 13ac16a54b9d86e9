//! Bytes to text for fetched pages.

use bytes::Bytes;
use chrono::Utc;
use encoding_rs::Encoding;
use regex::Regex;
use reqwest::{StatusCode, header::HeaderMap};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::fetcher::{errors::FetchError, types::PageResponse};

static HEADER_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

// Matches <meta charset=..> and the http-equiv content="..; charset=.." form
static MARKUP_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

const SNIFF_WINDOW: usize = 4096;

/// Where the encoding decision came from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    ByteOrderMark,
    Header,
    Markup,
    Detected,
}

pub fn process_response(
    url_final: Url,
    status: StatusCode,
    headers: HeaderMap,
    body_raw: Bytes,
    content_type: &str,
) -> Result<PageResponse, FetchError> {
    let (encoding, source) = detect_encoding(content_type, &body_raw);
    debug!(charset = encoding.name(), source = ?source, "decoding body");
    let body_utf8 = decode_lossy(&body_raw, encoding);

    Ok(PageResponse {
        url_final,
        status,
        headers,
        body_raw,
        body_utf8,
        charset: encoding.name(),
        fetched_at: Utc::now(),
    })
}

/// BOM, then the Content-Type header, then a `<meta>` declaration near the
/// top of the document, then statistical detection.
pub fn detect_encoding(content_type: &str, body: &[u8]) -> (&'static Encoding, CharsetSource) {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return (encoding, CharsetSource::ByteOrderMark);
    }
    if let Some(encoding) = declared(&HEADER_CHARSET, content_type) {
        return (encoding, CharsetSource::Header);
    }

    let head = &body[..body.len().min(SNIFF_WINDOW)];
    if let Some(encoding) = declared(&MARKUP_CHARSET, &String::from_utf8_lossy(head)) {
        return (encoding, CharsetSource::Markup);
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, head.len() == body.len());
    (detector.guess(None, true), CharsetSource::Detected)
}

fn declared(pattern: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = pattern.captures(haystack)?.get(1)?.as_str().trim();
    Encoding::for_label(label.as_bytes())
}

/// Pages routinely lie about their charset. Undecodable bytes become U+FFFD
/// rather than failing the fetch.
fn decode_lossy(body: &[u8], encoding: &'static Encoding) -> String {
    let (decoded, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!(encoding = used.name(), "body contained undecodable bytes");
    }
    decoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_mark_beats_a_wrong_header() {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice("<p>Zürich</p>".as_bytes());
        let (encoding, source) = detect_encoding("text/html; charset=iso-8859-1", &body);
        assert_eq!(encoding, encoding_rs::UTF_8);
        assert_eq!(source, CharsetSource::ByteOrderMark);
        assert!(decode_lossy(&body, encoding).contains("Zürich"));
    }

    #[test]
    fn header_declaration_is_used_when_present() {
        let (encoding, source) = detect_encoding("text/html; charset=\"Shift_JIS\"", b"<html></html>");
        assert_eq!(encoding, encoding_rs::SHIFT_JIS);
        assert_eq!(source, CharsetSource::Header);
    }

    #[test]
    fn markup_declarations_in_both_forms() {
        let short = b"<head><meta charset=\"iso-8859-1\"></head>";
        let http_equiv = b"<head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head>";
        // iso-8859-1 is an alias of windows-1252 for the web
        for body in [&short[..], &http_equiv[..]] {
            let (encoding, source) = detect_encoding("text/html", body);
            assert_eq!(encoding, encoding_rs::WINDOWS_1252);
            assert_eq!(source, CharsetSource::Markup);
        }
    }

    #[test]
    fn undeclared_bytes_fall_to_detection() {
        let (_, source) = detect_encoding("text/html", "plain ascii article text".as_bytes());
        assert_eq!(source, CharsetSource::Detected);
    }

    #[test]
    fn broken_bytes_are_replaced() {
        let decoded = decode_lossy(b"lead \xff\xfe tail", encoding_rs::UTF_8);
        assert!(decoded.starts_with("lead "));
        assert!(decoded.ends_with(" tail"));
        assert!(decoded.contains('\u{FFFD}'));
    }
}
