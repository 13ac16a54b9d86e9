//! Publisher and byline stripping for headlines.
//!
//! Best effort only. The pattern table catches the common shapes; odd
//! headlines may keep some residue.

use regex::Regex;
use std::sync::LazyLock;

const TITLE_PATTERNS: &[&str] = &[
    // Wire services and large outlets appended after a separator
    r"(?i)\s*[|\-–—:]\s*(reuters|ap news|associated press|afp|bbc news|bbc|cnn|cnbc|the guardian|guardian|the new york times|new york times|nytimes|the washington post|washington post|bloomberg|al jazeera|fox news|nbc news|cbs news|abc news|npr|financial times|the times|sky news|yahoo news|yahoo finance|google news|usa today|politico|axios|the verge|techcrunch|wired|the independent|daily mail|the telegraph|euronews|dw|france 24)\s*$",
    // Bylines
    r"(?i)\s*[|\-–—]\s*by\s+[\w .'\-]{2,40}$",
    // Label prefixes
    r"(?i)^(breaking( news)?|update[d]?|watch|live|exclusive|video|opinion|analysis|just in)\s*[:|\-–—]\s*",
    // Trailing media markers
    r"(?i)\s*[\[(](video|photos?|gallery|updated?|live|watch)[\])]\s*$",
    // "Headline | Section | Site"
    r"\s+\|\s+[^|]{2,40}$",
    // "Headline - example.com"
    r"(?i)\s+[\-–—]\s+[\w\-]+\.(com|net|org|co\.uk|news|io)$",
];

static COMPILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TITLE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MAX_PASSES: usize = 3;

/// Strips known suffixes/prefixes, plus the feed's own source label when it trails the title.
pub fn clean_title(title: &str, source_label: Option<&str>) -> String {
    let original = WHITESPACE.replace_all(title.trim(), " ").to_string();
    let mut current = original.clone();

    for _ in 0..MAX_PASSES {
        let before = current.clone();
        if let Some(label) = source_label.map(str::trim).filter(|l| !l.is_empty()) {
            current = strip_label(&current, label);
        }
        for pattern in COMPILED.iter() {
            current = pattern.replace(&current, "").trim().to_string();
        }
        if current == before {
            break;
        }
    }

    let current = current
        .trim_end_matches(|c: char| matches!(c, '-' | '|' | ':' | '–' | '—') || c.is_whitespace())
        .to_string();
    if current.is_empty() { original } else { current }
}

fn strip_label(title: &str, label: &str) -> String {
    let escaped = regex::escape(label);
    match Regex::new(&format!(r"(?i)\s*[|\-–—:]\s*{escaped}\s*$")) {
        Ok(re) => re.replace(title, "").to_string(),
        Err(_) => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wire_suffixes() {
        assert_eq!(
            clean_title("Markets rally on rate cut hopes - Reuters", None),
            "Markets rally on rate cut hopes"
        );
        assert_eq!(
            clean_title("Storm batters coast | BBC News", None),
            "Storm batters coast"
        );
    }

    #[test]
    fn strips_source_label_and_prefixes() {
        assert_eq!(
            clean_title("BREAKING: Bridge closed after crash — Metro Daily", Some("Metro Daily")),
            "Bridge closed after crash"
        );
        assert_eq!(
            clean_title("Council vote delayed (VIDEO)", None),
            "Council vote delayed"
        );
    }

    #[test]
    fn strips_bylines() {
        assert_eq!(
            clean_title("Why the budget matters - By Jane Doe", None),
            "Why the budget matters"
        );
    }

    #[test]
    fn leaves_plain_titles_alone() {
        let title = "AI Revolutionizes Drug Discovery";
        assert_eq!(clean_title(title, None), title);
        assert_eq!(clean_title("  Extra   spaces  here ", None), "Extra spaces here");
    }

    #[test]
    fn never_empties_a_title() {
        assert_eq!(clean_title("Reuters", None), "Reuters");
        assert_eq!(clean_title("BREAKING:", None), "BREAKING:");
    }
}
