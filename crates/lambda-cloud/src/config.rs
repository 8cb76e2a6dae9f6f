//! Client configuration.
//!
//! Credentials and endpoints are an explicit value handed to each component,
//! never process-wide state.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Environment variable for the API key.
pub const ENV_API_KEY: &str = "LAMBDA_API_KEY";

/// Environment variable overriding the API base URL.
pub const ENV_BASE_URL: &str = "LAMBDA_API_BASE_URL";

/// Default base URL for the Lambda Cloud API.
pub const DEFAULT_BASE_URL: &str = "https://cloud.lambda.ai/api/v1";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No API key was supplied.
    #[error("API key not provided. Use --api-key or set {ENV_API_KEY}")]
    MissingApiKey,

    /// Base URL is not an http(s) URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Connection settings for the Lambda Cloud API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token.
    pub api_key: String,
    /// API base URL without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Config {
    /// Create a configuration for the public API endpoint.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingApiKey`] if the key is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a configuration against a custom endpoint.
    ///
    /// # Errors
    /// Returns error if the key is blank or the URL is not http(s).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        Ok(Self {
            api_key,
            base_url,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Load configuration from `LAMBDA_API_KEY` and `LAMBDA_API_BASE_URL`.
    ///
    /// # Errors
    /// Returns error if the key is missing or the URL is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(ENV_API_KEY).unwrap_or_default();
        let base_url =
            std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        debug!(base_url = %base_url, "Loaded configuration from environment");
        Self::with_base_url(api_key, base_url)
    }

    /// Override the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
