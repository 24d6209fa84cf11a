//! Test configuration helpers for loading the EIA API key from .env

use eia_fetch::{Config, EiaClient};

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Load a live configuration from environment variables
///
/// Required environment variables:
/// - `EIA_API_KEY` - API key registered at eia.gov
///
/// Optional environment variables:
/// - `EIA_HOST` - API host (default: https://api.eia.gov)
/// - `EIA_WORKERS` - Worker count (default: 4)
pub fn load_live_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let api_key = std::env::var("EIA_API_KEY")
        .map_err(|_| ConfigError("EIA_API_KEY not set in environment".to_string()))?;

    let mut config = Config::new(api_key);
    if let Ok(host) = std::env::var("EIA_HOST") {
        config.host = host;
    }
    if let Some(workers) = std::env::var("EIA_WORKERS")
        .ok()
        .and_then(|w| w.parse().ok())
    {
        config.engine.worker_count = workers;
    }
    Ok(config)
}

/// Create an EiaClient against the live API
pub fn create_live_client() -> Result<EiaClient, ConfigError> {
    let config = load_live_config()?;
    EiaClient::new(config).map_err(|e| ConfigError(format!("Failed to create client: {}", e)))
}

/// Check if a live API key is available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("EIA_API_KEY").is_ok()
}

/// Skip test if no API key is available
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: EIA_API_KEY not found in .env");
            return;
        }
    };
}
