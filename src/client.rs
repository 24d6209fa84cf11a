//! Endpoint clients: one remote call per parameter bundle.
//!
//! [`EndpointClient`] is the seam between the fetch engine and the network.
//! [`HttpEndpointClient`] is the production implementation for the EIA API;
//! tests substitute their own implementations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::cache::ResponseCache;
use crate::config::{Config, RetryConfig};
use crate::error::{FetchError, Result};
use crate::retry::fetch_with_retry;
use crate::types::Params;

/// Longest response body excerpt kept in a [`FetchError::Response`]
const ERROR_BODY_EXCERPT: usize = 200;

/// Performs one remote call for a parameter bundle
///
/// Implementations must be safe to call concurrently from several workers
/// with different bundles.
#[async_trait::async_trait]
pub trait EndpointClient: Send + Sync {
    /// Execute the call and return the decoded payload
    async fn execute(&self, params: &Params) -> std::result::Result<Value, FetchError>;
}

/// HTTP method used by an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMethod {
    /// Parameters in the query string
    Get,
    /// Default parameters in the query string, request parameters as a form body
    Post,
}

/// [`EndpointClient`] for one EIA endpoint over HTTP
///
/// Every request carries the default parameters (`api_key`, `out`). Transient
/// failures are retried per [`RetryConfig`]; successful payloads are stored in
/// the injected [`ResponseCache`], if any.
pub struct HttpEndpointClient {
    http: reqwest::Client,
    url: Url,
    method: RequestMethod,
    default_params: Params,
    request_timeout: Duration,
    retry: RetryConfig,
    cache: Option<Arc<ResponseCache>>,
}

impl HttpEndpointClient {
    /// Create a client for `endpoint` (e.g. `"series/"`) relative to the configured host
    ///
    /// # Errors
    ///
    /// Returns an error if the host or endpoint is not a valid URL or the HTTP
    /// client cannot be built.
    pub fn new(config: &Config, endpoint: &str, method: RequestMethod) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_http(http, config, endpoint, method)
    }

    /// Create a client sharing an existing `reqwest::Client` (and its connection pool)
    ///
    /// # Errors
    ///
    /// Returns an error if the host or endpoint is not a valid URL.
    pub fn with_http(
        http: reqwest::Client,
        config: &Config,
        endpoint: &str,
        method: RequestMethod,
    ) -> Result<Self> {
        let url = Url::parse(&config.host)?.join(endpoint)?;
        let default_params = Params::new()
            .with("api_key", &config.api_key)
            .with("out", &config.output);

        Ok(Self {
            http,
            url,
            method,
            default_params,
            request_timeout: config.request_timeout,
            retry: config.retry.clone(),
            cache: None,
        })
    }

    /// Attach a response cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Full endpoint URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP method used for requests
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    async fn send_once(&self, params: &Params) -> std::result::Result<Value, FetchError> {
        let request = match self.method {
            RequestMethod::Get => {
                let mut query = self.default_params.clone();
                query.extend(params);
                self.http.get(self.url.clone()).query(&query)
            }
            RequestMethod::Post => self
                .http
                .post(self.url.clone())
                .query(&self.default_params)
                .form(params),
        };

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body.chars().take(ERROR_BODY_EXCERPT).collect()
            };
            return Err(FetchError::Response {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.request_timeout)
        } else {
            FetchError::from(e)
        }
    }
}

#[async_trait::async_trait]
impl EndpointClient for HttpEndpointClient {
    async fn execute(&self, params: &Params) -> std::result::Result<Value, FetchError> {
        let cache_key = self.cache.as_ref().map(|cache| {
            let mut merged = self.default_params.clone();
            merged.extend(params);
            cache.key(self.url.as_str(), &merged)
        });

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(cached) = cache.get(key).await
        {
            return Ok(cached);
        }

        tracing::debug!(url = %self.url, params = params.len(), "Requesting endpoint");
        let value = fetch_with_retry(&self.retry, || self.send_once(params)).await?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, value.clone()).await;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for HttpEndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointClient")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> Config {
        let mut config = Config::new("TESTKEY");
        config.host = server.uri();
        config.retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        config
    }

    #[tokio::test]
    async fn test_get_sends_default_and_job_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/category/"))
            .and(query_param("api_key", "TESTKEY"))
            .and(query_param("out", "json"))
            .and(query_param("category_id", "371"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"category": {"category_id": 371}})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpEndpointClient::new(&test_config(&server), "category/", RequestMethod::Get).unwrap();
        let value = client
            .execute(&Params::new().with("category_id", 371))
            .await
            .unwrap();
        assert_eq!(value["category"]["category_id"], 371);
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/series/"))
            .and(query_param("api_key", "TESTKEY"))
            .and(body_string_contains("series_id=A%3BB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"series": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpEndpointClient::new(&test_config(&server), "series/", RequestMethod::Post).unwrap();
        let value = client
            .execute(&Params::new().with("series_id", "A;B"))
            .await
            .unwrap();
        assert_eq!(value, json!({"series": []}));
    }

    #[tokio::test]
    async fn test_client_error_is_response_failure_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid api_key"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpEndpointClient::new(&test_config(&server), "updates/", RequestMethod::Get).unwrap();
        let err = client.execute(&Params::new()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Response {
                status: 403,
                message: "invalid api_key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client =
            HttpEndpointClient::new(&test_config(&server), "updates/", RequestMethod::Get).unwrap();
        let err = client.execute(&Params::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Response { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client =
            HttpEndpointClient::new(&test_config(&server), "search/", RequestMethod::Get).unwrap();
        let err = client.execute(&Params::new()).await.unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"category": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(60),
            vec!["api_key".to_string()],
        ));
        let client =
            HttpEndpointClient::new(&test_config(&server), "category/", RequestMethod::Get)
                .unwrap()
                .with_cache(Arc::clone(&cache));

        let params = Params::new().with("category_id", 1);
        let first = client.execute(&params).await.unwrap();
        let second = client.execute(&params).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_does_not_keep_expired_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"category": {}})))
            .mount(&server)
            .await;

        let cache = Arc::new(ResponseCache::new(
            Duration::from_millis(100),
            vec!["api_key".to_string()],
        ));
        let client =
            HttpEndpointClient::new(&test_config(&server), "category/", RequestMethod::Get)
                .unwrap()
                .with_cache(Arc::clone(&cache));

        for id in 0..20 {
            client
                .execute(&Params::new().with("category_id", id))
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 20);
        tokio::time::sleep(Duration::from_millis(150)).await;

        for id in 100..105 {
            client
                .execute(&Params::new().with("category_id", id))
                .await
                .unwrap();
        }
        assert!(cache.len().await <= 5);
    }

    #[test]
    fn test_url_joins_host_and_endpoint() {
        let config = Config::new("KEY");
        let client =
            HttpEndpointClient::new(&config, "series/categories/", RequestMethod::Post).unwrap();
        assert_eq!(client.url().as_str(), "https://api.eia.gov/series/categories/");
        assert_eq!(client.method(), RequestMethod::Post);
    }
}
