//! Configuration handling for the pipeline.
//!
//! Everything is read from environment variables with development defaults.
//! `Config::from_env` fails only when a variable is set but cannot be parsed
//! or is out of range.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::import::ImportConfig;
use crate::structuring::StructuringSettings;
use crate::transform::DerivationConfig;

/// Environment variable names. Public so binaries and tests can refer to them.
pub const ENV_MIN_CONTENT_CHARS: &str = "NEWSLOOM_MIN_CONTENT_CHARS";
pub const ENV_MIN_FALLBACK_CHARS: &str = "NEWSLOOM_MIN_FALLBACK_CHARS";
pub const ENV_MAX_PER_CATEGORY: &str = "NEWSLOOM_MAX_PER_CATEGORY";
pub const ENV_ITEM_DELAY_MS: &str = "NEWSLOOM_ITEM_DELAY_MS";
pub const ENV_CATEGORY_DELAY_MS: &str = "NEWSLOOM_CATEGORY_DELAY_MS";
pub const ENV_CATEGORY_CONCURRENCY: &str = "NEWSLOOM_CATEGORY_CONCURRENCY";
pub const ENV_REQUESTS_PER_SEC: &str = "NEWSLOOM_REQUESTS_PER_SEC";
pub const ENV_PERSIST_ATTEMPTS: &str = "NEWSLOOM_PERSIST_ATTEMPTS";
pub const ENV_BROWSER_ENABLED: &str = "NEWSLOOM_BROWSER_ENABLED";
pub const ENV_BROWSER_POOL_SIZE: &str = "NEWSLOOM_BROWSER_POOL_SIZE";
pub const ENV_EXCERPT_MIN: &str = "NEWSLOOM_EXCERPT_MIN";
pub const ENV_EXCERPT_MAX: &str = "NEWSLOOM_EXCERPT_MAX";
pub const ENV_IMPORT_INTERVAL_SECS: &str = "NEWSLOOM_IMPORT_INTERVAL_SECS";
pub const ENV_STRUCTURING_API_URL: &str = "STRUCTURING_API_URL";
pub const ENV_STRUCTURING_API_KEY: &str = "STRUCTURING_API_KEY";
pub const ENV_STRUCTURING_MODEL: &str = "STRUCTURING_MODEL";

const DEFAULT_MIN_CONTENT_CHARS: usize = 200;
const DEFAULT_MIN_FALLBACK_CHARS: usize = 100;
const DEFAULT_MAX_PER_CATEGORY: usize = 10;
const DEFAULT_ITEM_DELAY_MS: u64 = 1500;
const DEFAULT_CATEGORY_DELAY_MS: u64 = 5000;
const DEFAULT_CATEGORY_CONCURRENCY: usize = 1;
const DEFAULT_REQUESTS_PER_SEC: f64 = 2.0;
const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;
const DEFAULT_BROWSER_POOL_SIZE: usize = 2;
const DEFAULT_EXCERPT_MIN: usize = 120;
const DEFAULT_EXCERPT_MAX: usize = 300;
const DEFAULT_IMPORT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_STRUCTURING_MODEL: &str = "gpt-4o-mini";

/// Pipeline runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    min_content_chars: usize,
    min_fallback_chars: usize,
    max_per_category: usize,
    item_delay_ms: u64,
    category_delay_ms: u64,
    category_concurrency: usize,
    requests_per_sec: f64,
    persist_attempts: u32,
    browser_enabled: bool,
    browser_pool_size: usize,
    excerpt_min: usize,
    excerpt_max: usize,
    import_interval_secs: u64,
    structuring_api_url: Option<String>,
    structuring_api_key: Option<String>,
    structuring_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
            min_fallback_chars: DEFAULT_MIN_FALLBACK_CHARS,
            max_per_category: DEFAULT_MAX_PER_CATEGORY,
            item_delay_ms: DEFAULT_ITEM_DELAY_MS,
            category_delay_ms: DEFAULT_CATEGORY_DELAY_MS,
            category_concurrency: DEFAULT_CATEGORY_CONCURRENCY,
            requests_per_sec: DEFAULT_REQUESTS_PER_SEC,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
            browser_enabled: false,
            browser_pool_size: DEFAULT_BROWSER_POOL_SIZE,
            excerpt_min: DEFAULT_EXCERPT_MIN,
            excerpt_max: DEFAULT_EXCERPT_MAX,
            import_interval_secs: DEFAULT_IMPORT_INTERVAL_SECS,
            structuring_api_url: None,
            structuring_api_key: None,
            structuring_model: DEFAULT_STRUCTURING_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            min_content_chars: parse_var(ENV_MIN_CONTENT_CHARS, defaults.min_content_chars)?,
            min_fallback_chars: parse_var(ENV_MIN_FALLBACK_CHARS, defaults.min_fallback_chars)?,
            max_per_category: parse_var(ENV_MAX_PER_CATEGORY, defaults.max_per_category)?,
            item_delay_ms: parse_var(ENV_ITEM_DELAY_MS, defaults.item_delay_ms)?,
            category_delay_ms: parse_var(ENV_CATEGORY_DELAY_MS, defaults.category_delay_ms)?,
            category_concurrency: parse_var(ENV_CATEGORY_CONCURRENCY, defaults.category_concurrency)?,
            requests_per_sec: parse_var(ENV_REQUESTS_PER_SEC, defaults.requests_per_sec)?,
            persist_attempts: parse_var(ENV_PERSIST_ATTEMPTS, defaults.persist_attempts)?,
            browser_enabled: parse_bool(ENV_BROWSER_ENABLED, defaults.browser_enabled)?,
            browser_pool_size: parse_var(ENV_BROWSER_POOL_SIZE, defaults.browser_pool_size)?,
            excerpt_min: parse_var(ENV_EXCERPT_MIN, defaults.excerpt_min)?,
            excerpt_max: parse_var(ENV_EXCERPT_MAX, defaults.excerpt_max)?,
            import_interval_secs: parse_var(ENV_IMPORT_INTERVAL_SECS, defaults.import_interval_secs)?,
            structuring_api_url: non_empty(ENV_STRUCTURING_API_URL),
            structuring_api_key: non_empty(ENV_STRUCTURING_API_KEY),
            structuring_model: non_empty(ENV_STRUCTURING_MODEL).unwrap_or(defaults.structuring_model),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.category_concurrency == 0 {
            return Err(ConfigError::invalid(ENV_CATEGORY_CONCURRENCY, "must be at least 1"));
        }
        if self.persist_attempts == 0 {
            return Err(ConfigError::invalid(ENV_PERSIST_ATTEMPTS, "must be at least 1"));
        }
        if self.browser_enabled && self.browser_pool_size == 0 {
            return Err(ConfigError::invalid(ENV_BROWSER_POOL_SIZE, "must be at least 1"));
        }
        if self.excerpt_min > self.excerpt_max {
            return Err(ConfigError::invalid(
                ENV_EXCERPT_MIN,
                format!("{} exceeds {ENV_EXCERPT_MAX} ({})", self.excerpt_min, self.excerpt_max),
            ));
        }
        if !self.requests_per_sec.is_finite() || self.requests_per_sec < 0.0 {
            return Err(ConfigError::invalid(ENV_REQUESTS_PER_SEC, "must be a non-negative number"));
        }
        if let Some(url) = &self.structuring_api_url
            && url::Url::parse(url).is_err()
        {
            return Err(ConfigError::invalid(ENV_STRUCTURING_API_URL, "not an absolute URL"));
        }
        Ok(())
    }

    /// Minimum extracted text length for a strategy to count as successful.
    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }
    pub fn min_fallback_chars(&self) -> usize {
        self.min_fallback_chars
    }
    pub fn browser_enabled(&self) -> bool {
        self.browser_enabled
    }
    pub fn browser_pool_size(&self) -> usize {
        self.browser_pool_size
    }
    pub fn import_interval(&self) -> Duration {
        Duration::from_secs(self.import_interval_secs)
    }

    /// Settings for the structuring collaborator, when both URL and key are set.
    pub fn structuring(&self) -> Option<StructuringSettings> {
        match (&self.structuring_api_url, &self.structuring_api_key) {
            (Some(url), Some(key)) => {
                Some(StructuringSettings::new(url.clone(), key.clone()).with_model(self.structuring_model.clone()))
            }
            _ => None,
        }
    }

    pub fn import(&self) -> ImportConfig {
        ImportConfig {
            max_per_category: self.max_per_category,
            item_delay: Duration::from_millis(self.item_delay_ms),
            category_delay: Duration::from_millis(self.category_delay_ms),
            category_concurrency: self.category_concurrency,
            requests_per_sec: self.requests_per_sec,
            persist_attempts: self.persist_attempts,
            interval: self.import_interval(),
            ..ImportConfig::default()
        }
    }

    pub fn derivation(&self) -> DerivationConfig {
        DerivationConfig {
            excerpt_min: self.excerpt_min,
            excerpt_max: self.excerpt_max,
            ..DerivationConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, format!("{raw:?}: {e}"))),
        _ => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::invalid(key, format!("{other:?} is not a boolean"))),
        },
        Err(_) => Ok(default),
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Ensure environment-variable manipulating tests run serially.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_KEYS: &[&str] = &[
        ENV_MIN_CONTENT_CHARS,
        ENV_MIN_FALLBACK_CHARS,
        ENV_MAX_PER_CATEGORY,
        ENV_ITEM_DELAY_MS,
        ENV_CATEGORY_DELAY_MS,
        ENV_CATEGORY_CONCURRENCY,
        ENV_REQUESTS_PER_SEC,
        ENV_PERSIST_ATTEMPTS,
        ENV_BROWSER_ENABLED,
        ENV_BROWSER_POOL_SIZE,
        ENV_EXCERPT_MIN,
        ENV_EXCERPT_MAX,
        ENV_IMPORT_INTERVAL_SECS,
        ENV_STRUCTURING_API_URL,
        ENV_STRUCTURING_API_KEY,
        ENV_STRUCTURING_MODEL,
    ];

    fn clear_env() {
        for key in ALL_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_when_env_missing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.min_content_chars(), 200);
        assert_eq!(cfg.min_fallback_chars(), 100);
        assert!(!cfg.browser_enabled());
        assert!(cfg.structuring().is_none());

        let import = cfg.import();
        assert_eq!(import.max_per_category, 10);
        assert_eq!(import.item_delay, Duration::from_millis(1500));
        assert_eq!(import.persist_attempts, 3);
        assert_eq!(import.interval, Duration::from_secs(3600));
        assert_eq!(cfg.derivation().excerpt_max, 300);
    }

    #[test]
    fn overrides_when_env_present() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_MAX_PER_CATEGORY, "25");
            env::set_var(ENV_ITEM_DELAY_MS, "250");
            env::set_var(ENV_CATEGORY_CONCURRENCY, "4");
            env::set_var(ENV_BROWSER_ENABLED, "yes");
            env::set_var(ENV_EXCERPT_MIN, "80");
            env::set_var(ENV_STRUCTURING_API_URL, "https://llm.internal/v1/chat/completions");
            env::set_var(ENV_STRUCTURING_API_KEY, "sk-test");
        }
        let cfg = Config::from_env().unwrap();
        clear_env();

        assert!(cfg.browser_enabled());
        let import = cfg.import();
        assert_eq!(import.max_per_category, 25);
        assert_eq!(import.item_delay, Duration::from_millis(250));
        assert_eq!(import.category_concurrency, 4);
        assert_eq!(cfg.derivation().excerpt_min, 80);

        let structuring = cfg.structuring().unwrap();
        assert_eq!(structuring.api_key, "sk-test");
        assert_eq!(structuring.model, "gpt-4o-mini");
    }

    #[test]
    fn rejects_unparsable_and_inconsistent_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        unsafe { env::set_var(ENV_MAX_PER_CATEGORY, "ten") };
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == ENV_MAX_PER_CATEGORY));
        clear_env();

        unsafe {
            env::set_var(ENV_EXCERPT_MIN, "400");
            env::set_var(ENV_EXCERPT_MAX, "300");
        }
        assert!(Config::from_env().is_err());
        clear_env();

        unsafe { env::set_var(ENV_BROWSER_ENABLED, "maybe") };
        assert!(Config::from_env().is_err());
        clear_env();

        unsafe { env::set_var(ENV_PERSIST_ATTEMPTS, "0") };
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
