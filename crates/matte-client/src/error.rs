//! Error types for the matte client

use backdrop_core::{Error, ErrorCode};
use thiserror::Error;

/// Result type alias for matte operations
pub type MatteResult<T> = Result<T, MatteServiceError>;

/// Matting service errors
#[derive(Error, Debug)]
pub enum MatteServiceError {
    /// HTTP 429 from the service
    #[error("Rate limited by matting service: {message}")]
    RateLimited {
        /// Message from the service, if any
        message: String,
    },

    /// API key rejected
    #[error("Matting service rejected credentials ({status}): {message}")]
    AuthFailed {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Any other non-success status
    #[error("Matting service error ({status}): {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Response body could not be understood
    #[error("Malformed matting response: {message}")]
    MalformedResponse {
        /// HTTP status code, when a response arrived
        status: Option<u16>,
        /// What was wrong with it
        message: String,
    },

    /// Well-formed success envelope without an image
    #[error("Matting service returned an empty payload")]
    EmptyPayload,

    /// Transport failure before a response arrived
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing API key
    #[error("Missing matting API key (set {0})")]
    MissingApiKey(String),

    /// Attempt budget spent on retryable failures
    #[error("retries_exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last error message
        last_error: String,
    },
}

impl MatteServiceError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            status,
            message: message.into(),
        }
    }

    /// Machine-readable reason
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthFailed { .. } => "auth_failed",
            Self::Upstream { .. } => "upstream_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::EmptyPayload => "empty_payload",
            Self::Network(_) => "network_error",
            Self::Config(_) => "config_error",
            Self::MissingApiKey(_) => "missing_api_key",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    /// HTTP status reported by the service, when known
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::AuthFailed { status, .. } | Self::Upstream { status, .. } => Some(*status),
            Self::MalformedResponse { status, .. } => *status,
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Only rate limiting and empty payloads are retried; everything else is
    /// terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::EmptyPayload)
    }

    fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::AuthFailed { .. } => ErrorCode::AuthFailed,
            Self::Upstream { .. } => ErrorCode::UpstreamError,
            Self::MalformedResponse { .. } | Self::EmptyPayload => ErrorCode::MalformedResponse,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::MissingApiKey(_) => ErrorCode::MissingSecret,
            Self::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
        }
    }
}

impl From<MatteServiceError> for Error {
    fn from(err: MatteServiceError) -> Self {
        let mut error = Error::new(err.code(), err.to_string()).with_context(format!("reason: {}", err.reason()));
        if let Some(status) = err.upstream_status() {
            error = error.with_upstream_status(status);
        }
        match &err {
            MatteServiceError::AuthFailed { .. } | MatteServiceError::MissingApiKey(_) => {
                error = error.with_suggestion("Check REMOVE_BG_API_KEY");
            }
            MatteServiceError::RetriesExhausted { .. } => {
                error = error.with_suggestion("The service is rate limiting; try again later");
            }
            _ => {}
        }
        error.with_source(err)
    }
}
