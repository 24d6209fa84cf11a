//! Configuration types for eia-fetch

use crate::error::{Error, Result};
use crate::reducer::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fetch engine configuration
///
/// This is the only configuration the engine consumes. Transport, retry and
/// caching settings belong to the endpoint client and live in [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Number of long-lived workers draining the job queue (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Deadline for a single job's endpoint call (None = no deadline)
    ///
    /// An elapsed deadline is recorded as a failed outcome for that job.
    #[serde(default, with = "optional_duration_serde")]
    pub job_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            job_timeout: None,
        }
    }
}

impl EngineConfig {
    /// Create an engine configuration with the given worker count and no deadline
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            job_timeout: None,
        }
    }

    /// Check that the configuration can start an engine
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("worker_count", "must be at least 1"));
        }
        if self.job_timeout == Some(Duration::ZERO) {
            return Err(Error::config("job_timeout", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Retry configuration for transient endpoint failures
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Response cache backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local in-memory cache (default)
    #[default]
    Memory,
    /// No caching
    Disabled,
}

/// Response cache configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Cache backend (default: memory)
    #[serde(default)]
    pub backend: CacheBackend,

    /// How long a cached response stays valid (default: 600 seconds)
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Parameters left out of the cache key (default: ["api_key"])
    #[serde(default = "default_ignored_parameters")]
    pub ignored_parameters: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl: default_cache_ttl(),
            ignored_parameters: default_ignored_parameters(),
        }
    }
}

/// Query planning and reduction settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Maximum number of series ids per request (default: 100)
    #[serde(default = "default_id_chunk_size")]
    pub id_chunk_size: usize,

    /// Rows per page for the updates endpoint (default: 10000)
    #[serde(default = "default_row_page_size")]
    pub row_page_size: usize,

    /// Results per page for "fetch all" searches (default: 7500)
    #[serde(default = "default_search_page_size")]
    pub search_page_size: usize,

    /// What reducers do with failed jobs (default: fail fast)
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            id_chunk_size: default_id_chunk_size(),
            row_page_size: default_row_page_size(),
            search_page_size: default_search_page_size(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Main configuration for the EIA query types
///
/// Fields are organized into sub-configs:
/// - [`engine`](EngineConfig) - worker pool size and per-job deadline
/// - [`retry`](RetryConfig) - backoff for transient endpoint failures
/// - [`cache`](CacheConfig) - response cache
/// - [`query`](QueryConfig) - chunk/page sizes and failure policy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// EIA API key, sent as the `api_key` query parameter
    pub api_key: String,

    /// API host (default: "https://api.eia.gov")
    #[serde(default = "default_host")]
    pub host: String,

    /// Requested output format, sent as the `out` query parameter (default: "json")
    #[serde(default = "default_output")]
    pub output: String,

    /// Timeout for a single HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Fetch engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query planning settings
    #[serde(default)]
    pub query: QueryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: default_host(),
            output: default_output(),
            request_timeout: default_request_timeout(),
            engine: EngineConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration with the given API key and defaults for everything else
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config("api_key", "API key is required"));
        }
        url::Url::parse(&self.host)
            .map_err(|e| Error::config("host", format!("invalid host URL: {e}")))?;
        self.engine.validate()?;
        if self.query.id_chunk_size == 0 {
            return Err(Error::config("id_chunk_size", "must be at least 1"));
        }
        if self.query.row_page_size == 0 {
            return Err(Error::config("row_page_size", "must be at least 1"));
        }
        if self.query.search_page_size == 0 {
            return Err(Error::config("search_page_size", "must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier",
                "must be greater than or equal to 1.0",
            ));
        }
        Ok(())
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_ignored_parameters() -> Vec<String> {
    vec!["api_key".to_string()]
}

fn default_id_chunk_size() -> usize {
    100
}

fn default_row_page_size() -> usize {
    10_000
}

fn default_search_page_size() -> usize {
    7_500
}

fn default_host() -> String {
    "https://api.eia.gov".to_string()
}

fn default_output() -> String {
    "json".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_api_limits() {
        let config = Config::default();
        assert_eq!(config.host, "https://api.eia.gov");
        assert_eq!(config.output, "json");
        assert_eq!(config.engine.worker_count, 4);
        assert_eq!(config.engine.job_timeout, None);
        assert_eq!(config.query.id_chunk_size, 100);
        assert_eq!(config.query.row_page_size, 10_000);
        assert_eq!(config.query.search_page_size, 7_500);
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.cache.ignored_parameters, vec!["api_key"]);
    }

    #[test]
    fn test_deserialize_minimal_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_key": "KEY"}"#).unwrap();
        assert_eq!(config.api_key, "KEY");
        assert_eq!(config, Config::new("KEY"));
    }

    #[test]
    fn test_deserialize_durations_as_seconds() {
        let config: Config = serde_json::from_str(
            r#"{
                "api_key": "KEY",
                "request_timeout": 5,
                "engine": {"worker_count": 8, "job_timeout": 12},
                "cache": {"backend": "disabled", "ttl": 60}
            }"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.engine.worker_count, 8);
        assert_eq!(config.engine.job_timeout, Some(Duration::from_secs(12)));
        assert_eq!(config.cache.backend, CacheBackend::Disabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "api_key"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::new("KEY");
        config.engine.worker_count = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "worker_count"));
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let mut config = Config::new("KEY");
        config.host = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults_with_key() {
        Config::new("KEY").validate().unwrap();
    }
}
