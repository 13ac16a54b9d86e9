#![no_main]

use libfuzzer_sys::fuzz_target;
use url::Url;

use newsloom::extractor::{cleaner, extract_static};
use newsloom::fallback::FallbackRecovery;

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);
    let Ok(url) = Url::parse("https://example.com/story") else {
        return;
    };

    // Neither the static cascade nor recovery may panic, whatever the markup
    if let Some(attempt) = extract_static(&html, &url) {
        let once = cleaner::sanitize(&attempt.html_fragment);
        assert_eq!(cleaner::sanitize(&once), once);
    }

    let recovered = FallbackRecovery::default().recover_with_page(url.as_str(), None, Some(&html));
    assert!(!recovered.content.is_empty());
});
