//! Configuration for the matte client
//!
//! Everything except the API key comes from the `[matte]` config section; the
//! key is read from the environment by the caller and passed in explicitly.

use crate::error::{MatteResult, MatteServiceError};
use backdrop_core::config::MatteConfig;
use backdrop_core::retry::RetryConfig;
use std::env;
use std::fmt;
use std::time::Duration;

/// Primary API key variable
pub const API_KEY_ENV: &str = "REMOVE_BG_API_KEY";

/// Fallback API key variable
pub const API_KEY_ENV_FALLBACK: &str = "BACKDROP_API_KEY";

/// Non-blank API key from `REMOVE_BG_API_KEY`, else `BACKDROP_API_KEY`
pub fn api_key_from_env() -> Option<String> {
    [API_KEY_ENV, API_KEY_ENV_FALLBACK]
        .into_iter()
        .filter_map(|var| env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

/// Client configuration
#[derive(Clone)]
pub struct MatteClientConfig {
    /// Background-removal endpoint
    pub endpoint: String,
    /// Service API key
    pub api_key: Option<String>,
    /// Requested output size tier
    pub size: String,
    /// Foreground type hint
    pub type_hint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy
    pub retry: RetryConfig,
}

impl fmt::Debug for MatteClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatteClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("size", &self.size)
            .field("type_hint", &self.type_hint)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for MatteClientConfig {
    fn default() -> Self {
        Self::from(&MatteConfig::default())
    }
}

impl From<&MatteConfig> for MatteClientConfig {
    fn from(config: &MatteConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: None,
            size: config.size.clone(),
            type_hint: config.type_hint.clone(),
            timeout: config.timeout(),
            retry: config.retry_config(),
        }
    }
}

impl MatteClientConfig {
    /// Default configuration with the API key taken from the environment
    ///
    /// Reads `REMOVE_BG_API_KEY`, falling back to `BACKDROP_API_KEY`.
    pub fn from_env() -> MatteResult<Self> {
        Self::default().with_api_key_from_env()
    }

    /// Fill in the API key from the environment
    pub fn with_api_key_from_env(mut self) -> MatteResult<Self> {
        let key = api_key_from_env().ok_or_else(|| MatteServiceError::MissingApiKey(API_KEY_ENV.to_string()))?;
        self.api_key = Some(key);
        Ok(self)
    }

    /// Builder-style method to set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builder-style method to set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder-style method to set the size tier
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set retry config
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The API key, or an error when it was never provided
    pub fn api_key(&self) -> MatteResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MatteServiceError::MissingApiKey(API_KEY_ENV.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> MatteResult<()> {
        if self.endpoint.is_empty() {
            return Err(MatteServiceError::config("endpoint cannot be empty"));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(MatteServiceError::config("endpoint must start with http:// or https://"));
        }

        if self.timeout.is_zero() {
            return Err(MatteServiceError::config("timeout cannot be zero"));
        }

        self.retry
            .validate()
            .map_err(|e| MatteServiceError::config(e.message))?;

        self.api_key()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MatteClientConfig::default();
        assert!(config.endpoint.contains("remove.bg"));
        assert_eq!(config.size, "auto");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MatteClientConfig::default()
            .with_endpoint("http://127.0.0.1:9000/removebg")
            .with_api_key("test-key")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.endpoint, "http://127.0.0.1:9000/removebg");
        assert_eq!(config.api_key().unwrap(), "test-key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let missing_key = MatteClientConfig::default();
        assert!(matches!(missing_key.validate(), Err(MatteServiceError::MissingApiKey(_))));

        let bad_endpoint = MatteClientConfig::default().with_api_key("k").with_endpoint("ftp://x");
        assert!(matches!(bad_endpoint.validate(), Err(MatteServiceError::Config(_))));

        let blank_key = MatteClientConfig::default().with_api_key("   ");
        assert!(blank_key.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = MatteClientConfig::default().with_api_key("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
