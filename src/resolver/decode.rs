use percent_encoding::percent_decode_str;
use url::Url;

/// Hosts whose links are wrappers around a publisher URL.
const AGGREGATOR_HOSTS: &[&str] = &[
    "news.google.com",
    "google.com",
    "www.google.com",
    "feedproxy.google.com",
    "l.facebook.com",
    "lm.facebook.com",
    "www.bing.com",
    "bing.com",
    "flipboard.com",
    "r.search.yahoo.com",
    "news.yahoo.com",
    "www.msn.com",
    "out.reddit.com",
];

/// Query parameters that commonly carry the wrapped target.
const TARGET_PARAMS: &[&str] = &[
    "url",
    "u",
    "q",
    "target",
    "dest",
    "destination",
    "redirect",
    "redirect_url",
    "to",
    "link",
    "RU",
];

pub fn is_aggregator_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    AGGREGATOR_HOSTS.contains(&host.as_str())
}

/// Attempts to pull the publisher URL out of an aggregator link without a network call.
pub fn decode_embedded_target(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !is_aggregator_host(host) {
        return None;
    }

    from_query(url)
        .or_else(|| from_path_segments(url))
        .or_else(|| from_article_token(url))
}

fn accept(candidate: &str) -> Option<String> {
    let parsed = Url::parse(candidate.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    if is_aggregator_host(host) {
        return None;
    }
    Some(parsed.to_string())
}

fn from_query(url: &Url) -> Option<String> {
    url.query_pairs()
        .filter(|(k, _)| TARGET_PARAMS.contains(&k.as_ref()))
        .find_map(|(_, v)| accept(&v))
}

/// `https://agg.example/redirect/https%3A%2F%2Fsite.example%2Fstory`
fn from_path_segments(url: &Url) -> Option<String> {
    url.path_segments()?.find_map(|segment| {
        let decoded = percent_decode_str(segment).decode_utf8().ok()?;
        if decoded.starts_with("http://") || decoded.starts_with("https://") {
            accept(&decoded)
        } else {
            None
        }
    })
}

/// Google News `/articles/<token>` links where the token is base64url-encoded
/// protobuf that embeds the publisher URL verbatim. Newer opaque tokens carry
/// no URL and fall through to network resolution.
fn from_article_token(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "articles" || *s == "read")?;
    let token = segments.next()?;
    let bytes = decode_base64url(token)?;

    let start = find_subslice(&bytes, b"https://").or_else(|| find_subslice(&bytes, b"http://"))?;
    let tail = &bytes[start..];
    let end = tail
        .iter()
        .position(|b| !(0x21..=0x7e).contains(b))
        .unwrap_or(tail.len());
    let candidate = std::str::from_utf8(&tail[..end]).ok()?;
    accept(candidate)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_base64url(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for c in input.bytes() {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            b'-' | b'+' => 62,
            b'_' | b'/' => 63,
            b'=' => break,
            _ => return None,
        } as u32;

        buffer = (buffer << 6) | value;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    Some(out)
}
