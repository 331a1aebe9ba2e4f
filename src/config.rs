use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com/";
pub const DEFAULT_API_KEY: &str = "e753590b";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(5 * 60 * 1_000);
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Settings for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub api_key: String,
    /// Per-attempt deadline. An attempt that exceeds it is aborted and not retried.
    pub timeout: Duration,
    /// Attempts allowed beyond the first one.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Maximum age of a cached response. Zero disables caching.
    pub cache_ttl: Duration,
    /// Maximum number of cached responses. Zero means unbounded.
    pub cache_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            api_key: DEFAULT_API_KEY.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// A partial [`ClientConfig`]; only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub base_url: Option<Url>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cache_ttl: Option<Duration>,
    pub cache_capacity: Option<usize>,
}

impl ClientConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(api_key) = overrides.api_key {
            self.api_key = api_key;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(retry_delay) = overrides.retry_delay {
            self.retry_delay = retry_delay;
        }
        if let Some(cache_ttl) = overrides.cache_ttl {
            self.cache_ttl = cache_ttl;
        }
        if let Some(cache_capacity) = overrides.cache_capacity {
            self.cache_capacity = cache_capacity;
        }
        self
    }
}
