//! Common test utilities for eia-fetch integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fake_api;

pub use config::*;
#[allow(unused_imports)]
pub use fake_api::*;
