use regex::Regex;
use std::sync::LazyLock;
use whatlang::{Lang, detect};

const MIN_CONFIDENCE: f64 = 0.25;
const MIN_TEXT_CHARS: usize = 50;

static HTML_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<html\b[^>]*?\blang\s*=\s*["']?([a-z]{2,3})(?:[-_][a-z0-9]+)?"#).unwrap());

/// Primary subtag of the `<html lang>` attribute, lowercased.
pub fn declared_language(html: &str) -> Option<String> {
    let head = &html[..floor_char_boundary(html, 4096)];
    HTML_LANG
        .captures(head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// ISO 639-1 code of the body text.
///
/// A reliable detection wins. Otherwise the publisher's declaration is
/// trusted, and a low-confidence guess is the last resort.
pub fn detect_language(text: &str, declared: Option<&str>) -> Option<String> {
    let declared = declared.filter(|d| !d.is_empty()).map(str::to_string);
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return declared;
    }

    let Some(info) = detect(text) else {
        return declared;
    };
    if info.is_reliable() {
        return Some(iso_639_1(info.lang()));
    }
    declared.or_else(|| (info.confidence() >= MIN_CONFIDENCE).then(|| iso_639_1(info.lang())))
}

fn iso_639_1(lang: Lang) -> String {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Tur => "tr",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Heb => "he",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Ukr => "uk",
        Lang::Ell => "el",
        Lang::Ind => "id",
        other => return other.code().to_string(),
    };
    code.to_string()
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
