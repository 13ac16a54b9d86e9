//! Rule-based field derivation.
//!
//! Everything here is deterministic apart from the slug suffix, which mixes
//! the clock with a process-wide counter so two articles never share a slug.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{
    LazyLock,
    atomic::{AtomicU64, Ordering},
};

use crate::extractor::model::{text_len, truncate_on_word};

pub const WORDS_PER_MINUTE: usize = 200;
const MAX_SLUG_BASE: usize = 80;
const BREAKING_WINDOW_HOURS: i64 = 2;

static SLUG_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct DerivationConfig {
    pub excerpt_min: usize,
    pub excerpt_max: usize,
    pub max_tags: usize,
    pub words_per_minute: usize,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            excerpt_min: 120,
            excerpt_max: 300,
            max_tags: 8,
            words_per_minute: WORDS_PER_MINUTE,
        }
    }
}

/// Lowercase ASCII words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let folded = fold_ascii(c);
        match folded {
            Some(ch) if ch.is_ascii_alphanumeric() => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(ch);
            }
            Some('\'') | None if c == '\'' || c == '’' => {}
            _ => pending_hyphen = true,
        }
    }

    if slug.len() > MAX_SLUG_BASE {
        let cut = &slug[..MAX_SLUG_BASE];
        slug = match cut.rfind('-') {
            Some(pos) if pos > MAX_SLUG_BASE / 2 => cut[..pos].to_string(),
            _ => cut.to_string(),
        };
    }
    slug
}

fn fold_ascii(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'ś' | 'š' => 's',
        'ź' | 'ż' | 'ž' => 'z',
        'ł' => 'l',
        'ř' => 'r',
        'ď' => 'd',
        'ť' => 't',
        _ => return None,
    };
    Some(folded)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `<title-slug>-<YYYY-MM-DD>-<suffix>`, unique within the process.
pub fn unique_slug(title: &str, published_at: DateTime<Utc>) -> String {
    let base = match slugify(title) {
        s if s.is_empty() => "article".to_string(),
        s => s,
    };
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let counter = SLUG_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{base}-{}-{}{}",
        published_at.format("%Y-%m-%d"),
        to_base36(millis),
        to_base36(counter)
    )
}

/// Whole sentences until `min` is reached, never longer than `max`.
pub fn excerpt(text: &str, config: &DerivationConfig) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text_len(&text) <= config.excerpt_min {
        return text;
    }

    let mut out = String::new();
    for sentence in text.split_inclusive(['.', '!', '?']) {
        out.push_str(sentence);
        if text_len(out.trim()) >= config.excerpt_min {
            break;
        }
    }
    truncate_on_word(out.trim(), config.excerpt_max)
}

pub fn reading_time_minutes(word_count: usize, words_per_minute: usize) -> u32 {
    let wpm = words_per_minute.max(1);
    word_count.div_ceil(wpm).max(1) as u32
}

pub fn checksum(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Topic tags and the words that signal them.
const TOPICS: &[(&str, &[&str])] = &[
    ("politics", &["election", "parliament", "senate", "congress", "minister", "president", "governor", "vote", "campaign", "legislation", "lawmakers"]),
    ("economy", &["economy", "inflation", "gdp", "interest rate", "recession", "unemployment", "central bank", "tariff", "trade deficit"]),
    ("business", &["company", "shares", "earnings", "revenue", "profit", "merger", "acquisition", "ceo", "startup", "investors"]),
    ("markets", &["stocks", "stock market", "nasdaq", "dow jones", "s&p 500", "bond yields", "wall street"]),
    ("technology", &["technology", "software", "artificial intelligence", "ai", "smartphone", "cyber", "chip", "semiconductor", "app", "internet"]),
    ("science", &["scientists", "research", "study", "researchers", "laboratory", "space", "nasa", "discovery"]),
    ("health", &["health", "hospital", "patients", "disease", "vaccine", "virus", "medical", "doctors", "drug", "cancer"]),
    ("climate", &["climate", "emissions", "carbon", "global warming", "renewable", "heatwave", "drought", "wildfire"]),
    ("weather", &["storm", "hurricane", "flood", "rainfall", "snow", "tornado", "forecast"]),
    ("crime", &["police", "arrested", "murder", "court", "charged", "suspect", "trial", "prison"]),
    ("sports", &["match", "tournament", "championship", "league", "goal", "coach", "olympic", "world cup", "season"]),
    ("education", &["school", "university", "students", "teachers", "education", "campus"]),
    ("entertainment", &["film", "movie", "music", "album", "celebrity", "festival", "concert", "television"]),
    ("transport", &["transit", "railway", "airline", "airport", "traffic", "bus", "train", "highway"]),
    ("conflict", &["war", "military", "troops", "missile", "ceasefire", "attack", "invasion"]),
];

const TITLE_WEIGHT: usize = 3;
const MIN_TOPIC_SCORE: usize = 2;

static KEYWORD_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    TOPICS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .filter_map(|kw| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                .ok()
                .map(|re| (*kw, re))
        })
        .collect()
});

/// Topic tags ranked by how strongly title and body mention them.
pub fn extract_tags(title: &str, text: &str, max_tags: usize) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(tag, keywords)| {
            let score = keywords
                .iter()
                .filter_map(|kw| KEYWORD_PATTERNS.get(kw))
                .map(|re| re.find_iter(title).count() * TITLE_WEIGHT + re.find_iter(text).count())
                .sum();
            (*tag, score)
        })
        .filter(|(_, score)| *score >= MIN_TOPIC_SCORE)
        .collect();

    // Stable sort keeps table order for ties
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_tags)
        .map(|(tag, _)| tag.to_string())
        .collect()
}

static DATELINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z][A-Z.'\-]+(?:\s[A-Z][A-Z.'\-]+){0,3})(?:,\s*([A-Z][A-Za-z.]+(?:\s[A-Z][A-Za-z.]+)?))?\s*(?:\([^)]{1,40}\))?\s*[\-–—:]")
        .unwrap()
});

/// Well-known places checked when there is no dateline.
const KNOWN_PLACES: &[&str] = &[
    "New York", "Washington", "Los Angeles", "Chicago", "San Francisco", "Houston", "Miami",
    "Boston", "Seattle", "London", "Paris", "Berlin", "Madrid", "Rome", "Brussels", "Moscow",
    "Kyiv", "Beijing", "Shanghai", "Hong Kong", "Tokyo", "Seoul", "New Delhi", "Mumbai",
    "Sydney", "Toronto", "Mexico City", "Sao Paulo", "Cairo", "Dubai", "Jerusalem", "Tehran",
    "Istanbul", "Nairobi", "Lagos", "Johannesburg", "Singapore", "Geneva", "Vienna", "Warsaw",
    "Prague", "Amsterdam", "Stockholm", "Oslo", "Dublin", "Ottawa", "Canberra", "Bangkok",
];

static PLACE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    KNOWN_PLACES
        .iter()
        .filter_map(|place| {
            Regex::new(&format!(r"\b{}\b", regex::escape(place)))
                .ok()
                .map(|re| (*place, re))
        })
        .collect()
});

/// A dateline (`LONDON (Reuters) -`) wins; otherwise the first known place in the title, then the body.
pub fn guess_location(title: &str, text: &str) -> Option<String> {
    // Bodies often open with the headline, so the dateline may sit on a later line
    let opening = text.lines().map(str::trim).filter(|l| !l.is_empty()).take(3);
    if let Some(place) = opening.filter_map(dateline).next() {
        return Some(place);
    }

    for haystack in [title, text] {
        let first = PLACE_PATTERNS
            .iter()
            .filter_map(|(place, re)| re.find(haystack).map(|m| (m.start(), *place)))
            .min_by_key(|(start, _)| *start);
        if let Some((_, place)) = first {
            return Some(place.to_string());
        }
    }
    None
}

fn dateline(line: &str) -> Option<String> {
    let caps = DATELINE.captures(line)?;
    let city = title_case(caps.get(1)?.as_str());
    // Wire-service names and labels are not places
    if city.len() <= 2 || matches!(city.as_str(), "Ap" | "Afp" | "Reuters" | "Update" | "Breaking") {
        return None;
    }
    Some(match caps.get(2) {
        Some(region) => format!("{city}, {}", region.as_str()),
        None => city,
    })
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

static BREAKING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(breaking|just\s+in|developing|urgent)\b").unwrap());
static URGENT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(alerts?|live|emergency|evacuat\w*|updates?)\b").unwrap()
});

/// Explicit breaking markers, or a very recent item that reads as urgent.
pub fn is_breaking(
    title: &str,
    snippet: Option<&str>,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let haystack = format!("{} {}", title, snippet.unwrap_or_default());
    if BREAKING_MARKER.is_match(&haystack) {
        return true;
    }
    let recent = published_at
        .is_some_and(|p| p <= now && now - p <= ChronoDuration::hours(BREAKING_WINDOW_HOURS));
    recent && URGENT_WORD.is_match(&haystack)
}
