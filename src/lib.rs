//! # eia-fetch
//!
//! Concurrent client for the U.S. Energy Information Administration (EIA) open data API.
//!
//! ## Design Philosophy
//!
//! eia-fetch is designed to be:
//! - **Fan-out first** - One logical request (hundreds of series ids, every
//!   row of an updates feed) is split into many small API calls and run on a
//!   bounded worker pool
//! - **Order-preserving** - Results come back in request order, no matter
//!   which call finished first
//! - **Failure-tolerant** - A failed call is recorded, never dropped; the
//!   caller's reducer policy decides whether it is fatal
//! - **Sensible defaults** - Works with nothing but an API key
//!
//! ## Quick Start
//!
//! ```no_run
//! use eia_fetch::{Config, EiaClient, RowsPerPage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let eia = EiaClient::new(Config::new("MYAPIKEY"))?;
//!
//!     // Hundreds of ids become chunked POSTs run on the worker pool
//!     let series = eia.series()?;
//!     let table = series.query_table(&["PET.RWTC.D", "PET.RBRTE.D"]).await?;
//!     println!("{} data points", table.len());
//!
//!     // Every match of a search, fetched page by page
//!     let search = eia.search()?;
//!     let docs = search.query("name", "crude oil", RowsPerPage::All).await?;
//!     println!("{} matching series", docs.len());
//!
//!     series.shutdown().await;
//!     search.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// In-memory response cache
pub mod cache;
/// HTTP endpoint clients
pub mod client;
/// Configuration types
pub mod config;
/// Chunked concurrent fetch engine (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Request planning: id chunking, paging, search parameters
pub mod planner;
/// EIA query types
pub mod queries;
/// Outcome reducers and tables
pub mod reducer;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types: parameters, jobs, outcomes
pub mod types;

// Re-export commonly used types
pub use cache::ResponseCache;
pub use client::{EndpointClient, HttpEndpointClient, RequestMethod};
pub use config::{CacheBackend, CacheConfig, Config, EngineConfig, QueryConfig, RetryConfig};
pub use engine::{BatchHandle, EngineStats, FetchEngine};
pub use error::{Error, FetchError, PlannerError, Result};
pub use queries::{
    Category, EiaClient, Geoset, RowsPerPage, Search, Series, SeriesCategory, Updates,
    UpdatesRequest,
};
pub use reducer::{FailurePolicy, Table};
pub use types::{BatchId, Outcome, OutcomeStatus, Params};
