//! In-memory response cache with TTL
//!
//! The cache is an explicit collaborator handed to the endpoint client, not a
//! process-wide side effect. Keys are built from the request URL plus its
//! parameters with the configured ignored parameters (the API key by default)
//! removed, so two users of the same endpoint share entries regardless of key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{CacheBackend, CacheConfig};
use crate::types::Params;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

/// Shared response cache
///
/// Wrap in an `Arc` to share between endpoint clients.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    ignored_parameters: Vec<String>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Create a cache with the given TTL and ignored parameters
    pub fn new(ttl: Duration, ignored_parameters: Vec<String>) -> Self {
        Self {
            ttl,
            ignored_parameters,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Build a cache from configuration
    ///
    /// Returns `None` for [`CacheBackend::Disabled`].
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        match config.backend {
            CacheBackend::Memory => Some(Self::new(config.ttl, config.ignored_parameters.clone())),
            CacheBackend::Disabled => None,
        }
    }

    /// Canonical cache key for a request
    ///
    /// Parameters are form-encoded, so a value containing `&` or `=` can never
    /// collide with a different parameter set.
    pub fn key(&self, url: &str, params: &Params) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in params.iter() {
            if self.ignored_parameters.iter().any(|ignored| ignored == k) {
                continue;
            }
            query.append_pair(k, v);
        }
        let query = query.finish();
        if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{query}")
        }
    }

    /// Look up a fresh entry
    ///
    /// A stale entry is removed on the way out.
    pub async fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            let entry = entries.get(key)?;
            if self.is_fresh(entry) {
                tracing::trace!(key, "Response cache hit");
                return Some(entry.value.clone());
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have refreshed it in between
        match entries.get(key) {
            Some(entry) if self.is_fresh(entry) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::trace!(key, "Evicted stale cache entry");
                None
            }
            None => None,
        }
    }

    /// Store a response, dropping every expired entry first
    pub async fn insert(&self, key: String, value: Value) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Evicted expired cache entries");
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of stored entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(ttl: Duration) -> ResponseCache {
        ResponseCache::new(ttl, vec!["api_key".to_string()])
    }

    #[test]
    fn test_key_ignores_api_key() {
        let cache = cache(Duration::from_secs(60));
        let a = Params::new().with("api_key", "one").with("series_id", "PET.RWTC.D");
        let b = Params::new().with("series_id", "PET.RWTC.D").with("api_key", "two");
        assert_eq!(
            cache.key("https://api.eia.gov/series/", &a),
            cache.key("https://api.eia.gov/series/", &b)
        );
        assert_eq!(
            cache.key("https://api.eia.gov/series/", &a),
            "https://api.eia.gov/series/?series_id=PET.RWTC.D"
        );
    }

    #[test]
    fn test_key_distinguishes_params() {
        let cache = cache(Duration::from_secs(60));
        let a = Params::new().with("rows", 1);
        let b = Params::new().with("rows", 2);
        assert_ne!(cache.key("u", &a), cache.key("u", &b));
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let cache = cache(Duration::from_secs(60));
        cache.insert("k".to_string(), json!({"a": 1})).await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));
        assert_eq!(cache.get("missing").await, None);
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_key_escapes_separators_in_values() {
        let cache = cache(Duration::from_secs(60));
        let smuggled = Params::new().with("a", "1&b=2");
        let split = Params::new().with("a", 1).with("b", 2);
        assert_ne!(cache.key("u", &smuggled), cache.key("u", &split));
        assert_eq!(cache.key("u", &smuggled), "u?a=1%26b%3D2");
        assert_eq!(cache.key("u", &Params::new().with("api_key", "x")), "u");
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_lookup() {
        let cache = cache(Duration::from_millis(20));
        cache.insert("k".to_string(), json!(1)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_sweeps_expired_entries() {
        let cache = cache(Duration::from_millis(100));
        for i in 0..100 {
            cache.insert(format!("old-{i}"), json!(i)).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        for i in 0..100 {
            assert_eq!(cache.get(&format!("new-{i}")).await, None);
            cache.insert(format!("new-{i}"), json!(i)).await;
        }
        assert!(cache.len().await <= 100);
        assert_eq!(cache.get("new-99").await, Some(json!(99)));
    }

    #[tokio::test]
    async fn test_purge_expired_counts_removed_entries() {
        let cache = cache(Duration::from_millis(20));
        cache.insert("a".to_string(), json!(1)).await;
        cache.insert("b".to_string(), json!(2)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.purge_expired().await, 2);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_disabled_backend_builds_no_cache() {
        let config = CacheConfig {
            backend: CacheBackend::Disabled,
            ..CacheConfig::default()
        };
        assert!(ResponseCache::from_config(&config).is_none());
        assert!(ResponseCache::from_config(&CacheConfig::default()).is_some());
    }
}
