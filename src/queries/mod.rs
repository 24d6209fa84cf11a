//! EIA query types, split into focused submodules:
//! - [`series`] - series data by id (chunked, batched)
//! - [`series_category`] - categories of series by id (chunked, batched)
//! - [`updates`] - recently updated series (probe + row pages, batched)
//! - [`search`] - series search (probe + result pages when fetching all)
//! - [`geoset`] - one geoset for a list of regions (single call)
//! - [`category`] - one category (single call)
//!
//! Batched types own a [`FetchEngine`]; single-call types never construct one.

mod category;
mod geoset;
mod search;
mod series;
mod series_category;
mod updates;


pub use category::Category;
pub use geoset::Geoset;
pub use search::{RowsPerPage, Search};
pub use series::Series;
pub use series_category::SeriesCategory;
pub use updates::{Updates, UpdatesRequest};

use std::sync::Arc;

use serde_json::Value;

use crate::cache::ResponseCache;
use crate::client::{EndpointClient, HttpEndpointClient, RequestMethod};
use crate::config::{Config, QueryConfig};
use crate::engine::FetchEngine;
use crate::error::{Error, Result};
use crate::types::{Outcome, Params};

/// Entry point for building EIA query types
///
/// Holds the validated configuration, one shared `reqwest::Client` and the
/// response cache, so every query type built from it shares connections and
/// cached responses.
///
/// # Example
///
/// ```no_run
/// use eia_fetch::{Config, EiaClient};
///
/// # async fn example() -> eia_fetch::Result<()> {
/// let eia = EiaClient::new(Config::new("MYAPIKEY"))?;
/// let series = eia.series()?;
/// let records = series
///     .query(&["PET.RWTC.D", "ELEC.GEN.ALL-US-99.A"])
///     .await?;
/// println!("fetched {} series", records.len());
/// series.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EiaClient {
    config: Arc<Config>,
    http: reqwest::Client,
    cache: Option<Arc<ResponseCache>>,
}

impl EiaClient {
    /// Validate the configuration and build the shared HTTP client and cache
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration or
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let cache = ResponseCache::from_config(&config.cache).map(Arc::new);

        tracing::debug!(
            host = %config.host,
            cached = cache.is_some(),
            worker_count = config.engine.worker_count,
            "EIA client configured"
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            cache,
        })
    }

    /// Replace the response cache (or share one between clients)
    #[must_use]
    pub fn with_cache(mut self, cache: Option<Arc<ResponseCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// The response cache, if caching is enabled
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// The configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Series data by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid engine configuration or
    /// [`Error::InvalidUrl`] if the endpoint URL cannot be built.
    ///
    /// # Panics
    ///
    /// Starts the engine's worker tasks, so it panics if called outside a
    /// Tokio runtime.
    pub fn series(&self) -> Result<Series> {
        Series::new(&self.config, self.endpoint(Series::ENDPOINT, RequestMethod::Post)?)
    }

    /// Series categories by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid engine configuration or
    /// [`Error::InvalidUrl`] if the endpoint URL cannot be built.
    ///
    /// # Panics
    ///
    /// Starts the engine's worker tasks, so it panics if called outside a
    /// Tokio runtime.
    pub fn series_category(&self) -> Result<SeriesCategory> {
        SeriesCategory::new(
            &self.config,
            self.endpoint(SeriesCategory::ENDPOINT, RequestMethod::Post)?,
        )
    }

    /// Recently updated series
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid engine configuration or
    /// [`Error::InvalidUrl`] if the endpoint URL cannot be built.
    ///
    /// # Panics
    ///
    /// Starts the engine's worker tasks, so it panics if called outside a
    /// Tokio runtime.
    pub fn updates(&self) -> Result<Updates> {
        Updates::new(&self.config, self.endpoint(Updates::ENDPOINT, RequestMethod::Get)?)
    }

    /// Series search
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid engine configuration or
    /// [`Error::InvalidUrl`] if the endpoint URL cannot be built.
    ///
    /// # Panics
    ///
    /// Starts the engine's worker tasks, so it panics if called outside a
    /// Tokio runtime.
    pub fn search(&self) -> Result<Search> {
        Search::new(&self.config, self.endpoint(Search::ENDPOINT, RequestMethod::Get)?)
    }

    /// Geosets
    pub fn geoset(&self) -> Result<Geoset> {
        Ok(Geoset::new(self.endpoint(Geoset::ENDPOINT, RequestMethod::Get)?))
    }

    /// Categories
    pub fn category(&self) -> Result<Category> {
        Ok(Category::new(self.endpoint(Category::ENDPOINT, RequestMethod::Get)?))
    }

    fn endpoint(&self, endpoint: &str, method: RequestMethod) -> Result<Arc<dyn EndpointClient>> {
        let mut client = HttpEndpointClient::with_http(self.http.clone(), &self.config, endpoint, method)?;
        if let Some(cache) = &self.cache {
            client = client.with_cache(Arc::clone(cache));
        }
        Ok(Arc::new(client))
    }
}

impl std::fmt::Debug for EiaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EiaClient")
            .field("host", &self.config.host)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// Endpoint client plus the engine that fans its jobs out
pub(crate) struct BatchedEndpoint {
    client: Arc<dyn EndpointClient>,
    engine: FetchEngine,
    query: QueryConfig,
}

impl BatchedEndpoint {
    pub(crate) fn new(config: &Config, client: Arc<dyn EndpointClient>) -> Result<Self> {
        let engine = FetchEngine::new(config.engine.clone(), Arc::clone(&client))?;
        Ok(Self {
            client,
            engine,
            query: config.query.clone(),
        })
    }

    pub(crate) fn query_config(&self) -> &QueryConfig {
        &self.query
    }

    /// One direct call, outside the engine (probes and single pages)
    pub(crate) async fn call(&self, params: &Params) -> Result<Value> {
        self.client.execute(params).await.map_err(Error::Request)
    }

    pub(crate) async fn run(&self, jobs: Vec<Params>) -> Result<Vec<Outcome>> {
        self.engine.run(jobs).await
    }

    pub(crate) async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

/// Text of an error the API reported inside a successful response, if any
pub(crate) fn api_error(payload: &Value) -> Option<&str> {
    payload
        .pointer("/data/error")
        .or_else(|| payload.get("error"))
        .and_then(Value::as_str)
}

/// Move a top-level field out of a payload
pub(crate) fn take_field(mut payload: Value, field: &str) -> Result<Value> {
    if let Some(value) = payload.get_mut(field) {
        return Ok(value.take());
    }
    Err(Error::UnexpectedPayload(match api_error(&payload) {
        Some(message) => format!("API error: {message}"),
        None => format!("response has no {field:?} field"),
    }))
}

/// Read a non-negative count at a JSON pointer
pub(crate) fn count_at(payload: &Value, pointer: &str) -> Result<usize> {
    payload
        .pointer(pointer)
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(|n| n as usize)
        .ok_or_else(|| {
            Error::UnexpectedPayload(match api_error(payload) {
                Some(message) => format!("API error: {message}"),
                None => format!("response has no count at {pointer}"),
            })
        })
}
