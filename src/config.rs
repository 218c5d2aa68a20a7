//! Engine configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_IMAGE_BASE_PATH: &str = "/uploads/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SCROLL_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_SCROLL_THRESHOLD_PX: f64 = 500.0;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_POLL_BACKOFF: f64 = 1.0;
pub const DEFAULT_POLL_MAX_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:5000/api`.
    pub base_url: String,
    /// Static path images are resolved against, with a trailing slash.
    pub image_base_path: String,
    pub timeouts: HttpTimeouts,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            image_base_path: DEFAULT_IMAGE_BASE_PATH.to_owned(),
            timeouts: HttpTimeouts::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub scroll_debounce: Duration,
    pub scroll_threshold_px: f64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_debounce: Duration::from_millis(DEFAULT_SCROLL_DEBOUNCE_MS),
            scroll_threshold_px: DEFAULT_SCROLL_THRESHOLD_PX,
        }
    }
}

/// Timing for the image status probe.
///
/// The default probes every 3000ms with no attempt limit, so a request the
/// server never resolves is polled until superseded or cancelled. Setting
/// `max_attempts` bounds the loop; `backoff > 1.0` grows the delay
/// geometrically up to `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub backoff: f64,
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: None,
            backoff: DEFAULT_POLL_BACKOFF,
            max_interval: Duration::from_millis(DEFAULT_POLL_MAX_INTERVAL_MS),
        }
    }
}

impl PollPolicy {
    /// Delay before the probe that follows one waited for `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        if !self.backoff.is_finite() || self.backoff <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff).map_or(cap, |d| d.min(cap))
    }

    #[must_use]
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub api: ApiConfig,
    pub pagination: PaginationConfig,
    pub poll: PollPolicy,
}

impl EngineConfig {
    /// Build typed config from environment variables.
    ///
    /// All optional:
    /// - `CARDFORGE_API_BASE_URL`: default `http://127.0.0.1:5000/api`
    /// - `CARDFORGE_IMAGE_BASE_PATH`: default `/uploads/`
    /// - `CARDFORGE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CARDFORGE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CARDFORGE_PAGE_SIZE`: default 20
    /// - `CARDFORGE_SCROLL_DEBOUNCE_MS`: default 200
    /// - `CARDFORGE_SCROLL_THRESHOLD_PX`: default 500
    /// - `CARDFORGE_POLL_INTERVAL_MS`: default 3000
    /// - `CARDFORGE_POLL_MAX_ATTEMPTS`: unset polls without limit
    /// - `CARDFORGE_POLL_BACKOFF`: default 1.0 (fixed interval); non-finite or below 1.0 is ignored
    /// - `CARDFORGE_POLL_MAX_INTERVAL_MS`: default 30000
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_string("CARDFORGE_API_BASE_URL", DEFAULT_API_BASE_URL);
        let mut image_base_path = env_string("CARDFORGE_IMAGE_BASE_PATH", DEFAULT_IMAGE_BASE_PATH);
        if !image_base_path.ends_with('/') {
            image_base_path.push('/');
        }

        let api = ApiConfig {
            base_url: normalize_base_url(&base_url)?,
            image_base_path,
            timeouts: HttpTimeouts {
                request_secs: env_parse("CARDFORGE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("CARDFORGE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        };
        let pagination = PaginationConfig {
            page_size: env_parse("CARDFORGE_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            scroll_debounce: Duration::from_millis(env_parse("CARDFORGE_SCROLL_DEBOUNCE_MS", DEFAULT_SCROLL_DEBOUNCE_MS)),
            scroll_threshold_px: env_parse("CARDFORGE_SCROLL_THRESHOLD_PX", DEFAULT_SCROLL_THRESHOLD_PX),
        };
        let poll = PollPolicy {
            interval: Duration::from_millis(env_parse("CARDFORGE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            max_attempts: env_parse_opt::<u32>("CARDFORGE_POLL_MAX_ATTEMPTS").filter(|n| *n > 0),
            backoff: env_parse_opt::<f64>("CARDFORGE_POLL_BACKOFF")
                .filter(|b| b.is_finite() && *b >= 1.0)
                .unwrap_or(DEFAULT_POLL_BACKOFF),
            max_interval: Duration::from_millis(env_parse(
                "CARDFORGE_POLL_MAX_INTERVAL_MS",
                DEFAULT_POLL_MAX_INTERVAL_MS,
            )),
        };

        Ok(Self { api, pagination, poll })
    }
}

/// Validate an absolute http(s) URL and strip trailing slashes.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for relative or non-http URLs.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidBaseUrl { url: raw.to_owned(), reason: e.to_string() })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_owned(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_owned())
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_owned(),
        _ => default.to_owned(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_parse_opt(key).unwrap_or(default)
}

fn env_parse_opt<T: std::str::FromStr>(key: &str) -> Option<T> {
    let Ok(value) = std::env::var(key) else {
        return None;
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
