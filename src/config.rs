//! Environment-backed configuration
//!
//! Endpoints and API keys for the backend profile store, the purchase
//! ledger and the AI cloud functions. Loaded once at session init.

use crate::error::ConfigError;

/// Endpoints and credentials for the external collaborators.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend profile store
    pub backend_url: String,
    /// API key sent as a bearer token to the backend
    pub backend_api_key: String,
    /// Base URL of the purchase ledger service
    pub ledger_url: String,
    /// Public API key for the purchase ledger
    pub ledger_api_key: String,
    /// Base URL of the AI cloud-function endpoint
    pub ai_url: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Reads a `.env` file if one is present (dev convenience), then the
    /// process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            backend_url: require("WISHWELL_BACKEND_URL")?,
            backend_api_key: require("WISHWELL_BACKEND_API_KEY")?,
            ledger_url: require("WISHWELL_LEDGER_URL")?,
            ledger_api_key: require("WISHWELL_LEDGER_API_KEY")?,
            ai_url: require("WISHWELL_AI_URL")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
