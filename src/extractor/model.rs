use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());
static NEWLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    Readability,
    Selectors,
    Pattern,
    Rendered,
}

impl StrategyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyName::Readability => "readability",
            StrategyName::Selectors => "selectors",
            StrategyName::Pattern => "pattern",
            StrategyName::Rendered => "rendered",
        }
    }
}

impl std::fmt::Display for StrategyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's output for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub strategy: StrategyName,
    pub succeeded: bool,
    pub title: Option<String>,
    pub html_fragment: String,
    pub plain_text: String,
    pub word_count: usize,
}

impl ExtractionAttempt {
    pub fn new(
        strategy: StrategyName,
        title: Option<String>,
        html_fragment: String,
        plain_text: &str,
        min_chars: usize,
    ) -> Self {
        let plain_text = normalize_whitespace(plain_text);
        let succeeded = text_len(&plain_text) >= min_chars;
        Self {
            strategy,
            succeeded,
            title: title.filter(|t| !t.trim().is_empty()),
            word_count: word_count(&plain_text),
            html_fragment,
            plain_text,
        }
    }
}

/// Title/body pair before it is judged against a threshold.
#[derive(Debug)]
pub struct ReadabilityResult {
    pub title: Option<String>,
    pub text: String,
    pub html: String,
}

pub fn normalize_whitespace(text: &str) -> String {
    let text = text.trim();
    let spaced = SPACE_REGEX.replace_all(text, " ");
    let collapsed = NEWLINE_REGEX.replace_all(&spaced, "\n\n");
    collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Length in characters, which is what every content threshold measures.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cut `text` to at most `max_chars`, backing off to the last word boundary and adding an ellipsis.
pub fn truncate_on_word(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text_len(text) <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(1);
    let cut: String = text.chars().take(budget).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > budget / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "  Hello    world  \n\n\n  Test  ";
        assert_eq!(normalize_whitespace(text), "Hello world\n\nTest");
    }

    #[test]
    fn attempt_success_is_measured_in_chars() {
        let text = "é".repeat(200);
        let attempt = ExtractionAttempt::new(StrategyName::Pattern, None, String::new(), &text, 200);
        assert!(attempt.succeeded);

        let short = ExtractionAttempt::new(StrategyName::Pattern, None, String::new(), "tiny", 200);
        assert!(!short.succeeded);
        assert_eq!(short.word_count, 1);
    }

    #[test]
    fn truncation_respects_word_boundaries() {
        let text = "The council approved the budget after a long debate on Tuesday";
        let cut = truncate_on_word(text, 30);
        assert!(cut.chars().count() <= 30);
        assert!(cut.ends_with('…'));
        assert_eq!(cut, "The council approved the…");
        assert_eq!(truncate_on_word("short", 30), "short");
    }

    #[test]
    fn blank_titles_are_dropped() {
        let attempt = ExtractionAttempt::new(
            StrategyName::Selectors,
            Some("   ".into()),
            String::new(),
            "",
            1,
        );
        assert!(attempt.title.is_none());
    }
}
