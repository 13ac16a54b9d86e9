const MAX_BOILERPLATE_RATIO: f64 = 0.3;

const BOILERPLATE_KEYWORDS: &[&str] = &[
    "cookie",
    "privacy",
    "terms",
    "policy",
    "gdpr",
    "consent",
    "accept",
    "decline",
    "preferences",
    "tracking",
    "advertisement",
    "subscribe",
    "newsletter",
    "login",
    "sign up",
    "sign in",
    "register",
    "password",
    "404",
    "not found",
    "access denied",
    "loading",
    "please wait",
    "javascript",
    "enable",
    "browser",
    "captcha",
    "click here",
    "read more",
];

/// True when text is mostly consent banners, error pages, paywall prompts and the like.
pub fn looks_like_boilerplate(text: &str) -> bool {
    let total_words = text.split_whitespace().count();
    if total_words == 0 {
        return true;
    }

    let text_lower = text.to_lowercase();
    let hits: usize = BOILERPLATE_KEYWORDS
        .iter()
        .map(|keyword| text_lower.matches(keyword).count())
        .sum();

    hits as f64 / total_words as f64 > MAX_BOILERPLATE_RATIO
}
