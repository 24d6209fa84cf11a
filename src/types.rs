//! Core types: parameter bundles, jobs and outcomes

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque parameter bundle passed verbatim to an endpoint client
///
/// Keys are kept sorted so two bundles with the same entries always produce
/// the same query string and cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Create an empty parameter bundle
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Insert a parameter only when a value is present
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Get a parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Merge `other` into `self`; entries in `other` win
    pub fn extend(&mut self, other: &Params) {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Identifier of one `submit` call on an engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work on the shared queue
///
/// Created by the engine at submission time and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Batch the job belongs to
    pub batch_id: BatchId,
    /// Position of the job in its batch's submission order
    pub sequence_index: usize,
    /// Parameters for the endpoint client
    pub params: Params,
}

/// Terminal state of a job
#[derive(Clone, Debug, PartialEq)]
pub enum OutcomeStatus {
    /// The endpoint client returned a decoded payload
    Success(Value),
    /// The endpoint client failed, timed out, panicked, or the job was cancelled
    Failure(FetchError),
}

/// Result of executing one job, tied back to it by sequence index
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// Sequence index of the job this outcome belongs to
    pub sequence_index: usize,
    /// Success payload or failure descriptor
    pub status: OutcomeStatus,
}

impl Outcome {
    /// Successful outcome
    pub fn success(sequence_index: usize, payload: Value) -> Self {
        Self {
            sequence_index,
            status: OutcomeStatus::Success(payload),
        }
    }

    /// Failed outcome
    pub fn failure(sequence_index: usize, error: FetchError) -> Self {
        Self {
            sequence_index,
            status: OutcomeStatus::Failure(error),
        }
    }

    /// Whether the job succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success(_))
    }

    /// Payload, if the job succeeded
    pub fn payload(&self) -> Option<&Value> {
        match &self.status {
            OutcomeStatus::Success(v) => Some(v),
            OutcomeStatus::Failure(_) => None,
        }
    }

    /// Error, if the job failed
    pub fn error(&self) -> Option<&FetchError> {
        match &self.status {
            OutcomeStatus::Success(_) => None,
            OutcomeStatus::Failure(e) => Some(e),
        }
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<Value, FetchError> {
        match self.status {
            OutcomeStatus::Success(v) => Ok(v),
            OutcomeStatus::Failure(e) => Err(e),
        }
    }
}
