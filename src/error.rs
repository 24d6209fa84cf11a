//! Error types for eia-fetch
//!
//! This module provides the error handling for the library:
//! - [`Error`] - the crate-wide error returned by query and engine operations
//! - [`FetchError`] - the failure of a single job, recorded in its outcome
//! - [`PlannerError`] - a logical request that could not be turned into jobs

use std::time::Duration;
use thiserror::Error;

/// Result type alias for eia-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for eia-fetch
///
/// Per-job failures never surface here directly from the engine; they are
/// recorded as [`FetchError`]s in the outcome sequence and only become an
/// [`Error::Fetch`] when a reducer decides a failure is fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_count")
        key: Option<String>,
    },

    /// A logical request could not be translated into jobs
    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    /// A job failed and the reducer policy treats the failure as fatal
    #[error("job {index} failed: {source}")]
    Fetch {
        /// Sequence index of the failed job within its batch
        index: usize,
        /// The recorded failure
        source: FetchError,
    },

    /// A single, non-batched request failed
    #[error("request failed: {0}")]
    Request(FetchError),

    /// Network error while building or sending a request
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Host or endpoint could not be parsed as a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The remote service answered with a payload missing an expected field
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,
}

impl Error {
    /// Create a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of a single job
///
/// Cloneable so an outcome can be inspected by several reducers. The
/// [`kind`](FetchError::kind) string is stable and machine-readable; the
/// `Display` output is the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network or connection failure during the call
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote service returned a non-success status
    #[error("HTTP {status}: {message}")]
    Response {
        /// HTTP status code
        status: u16,
        /// Status text or response body excerpt
        message: String,
    },

    /// The response body could not be decoded
    #[error("malformed payload: {0}")]
    Decode(String),

    /// The per-job deadline elapsed before the call completed
    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    /// The job was still queued when the engine shut down
    #[error("job cancelled by engine shutdown")]
    Cancelled,

    /// The endpoint client panicked while executing the job
    #[error("endpoint client panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Response { .. } => "response",
            FetchError::Decode(_) => "decode",
            FetchError::Timeout(_) => "timeout",
            FetchError::Cancelled => "cancelled",
            FetchError::Panicked(_) => "panicked",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::Response {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            }
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Errors raised while translating a logical request into jobs
///
/// These are reported synchronously, before any batch is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Search term is not one the search endpoint understands
    #[error("invalid search term {0:?}: expected one of series_id, name, last_updated")]
    InvalidSearchTerm(String),

    /// A `last_updated` search needs a text query or exactly two dates
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// A date in a `last_updated` range could not be parsed
    #[error("invalid date {0:?}")]
    InvalidDate(String),

    /// Chunk or page size of zero
    #[error("{what} must be greater than zero")]
    ZeroPageSize {
        /// Which size was zero (e.g., "chunk_size")
        what: &'static str,
    },
}
