//! Structured error handling for pipeline failures
//!
//! Every terminal pipeline failure surfaces as one [`Error`] carrying:
//! - An [`ErrorCode`] for programmatic handling
//! - The [`ErrorKind`] the caller reports (validation, codec, matte service, timeout)
//! - The upstream HTTP status when the matting service supplied one
//! - Optional context and a recovery suggestion

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General (1xxx)
    /// Unexpected failure inside the pipeline
    Internal = 1001,
    /// The run exceeded its time budget
    Timeout = 1003,
    /// The caller cancelled the run
    Cancelled = 1004,

    // Filesystem (2xxx)
    /// Other filesystem failure
    IoError = 2000,
    /// A path does not exist
    FileNotFound = 2001,
    /// A path cannot be read or written
    PermissionDenied = 2002,

    // Configuration (3xxx)
    /// Invalid configuration
    ConfigError = 3000,
    /// An explicitly requested config file is missing
    ConfigNotFound = 3001,
    /// The config file is not valid TOML
    ConfigParseError = 3002,
    /// A config value is out of range
    InvalidConfigValue = 3004,
    /// The matting API key is not set
    MissingSecret = 3005,

    // Image codec and conversion (4xxx)
    /// Other image codec failure
    CodecError = 4000,
    /// Bytes could not be decoded as an image
    DecodeFailed = 4001,
    /// An image could not be encoded
    EncodeFailed = 4002,
    /// HEIF conversion failed
    FormatConversion = 4003,
    /// Layers of different sizes were combined
    GeometryMismatch = 4004,
    /// A width or height of zero
    InvalidDimensions = 4005,

    // External programs (5xxx)
    /// An external program could not be run
    ProcessError = 5000,
    /// An external program is not installed
    CommandNotFound = 5001,
    /// An external program exited with an error
    CommandFailed = 5002,

    // Upload validation (6xxx)
    /// The upload carried no bytes
    MissingFile = 6001,
    /// The upload exceeds the size limit
    FileTooLarge = 6002,
    /// The upload is not an accepted image type
    UnsupportedType = 6003,

    // Matting service (7xxx)
    /// The matting service kept answering 429
    RateLimited = 7001,
    /// The matting service rejected the API key
    AuthFailed = 7002,
    /// The matting service answered with an unexpected body
    MalformedResponse = 7003,
    /// Every attempt hit a retryable failure
    RetriesExhausted = 7004,
    /// The matting service could not be reached
    NetworkError = 7005,
    /// The matting service returned another error status
    UpstreamError = 7006,
}

impl ErrorCode {
    /// Numeric value, grouped by thousands
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Name of the thousands group
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            4 => "Codec",
            5 => "Process",
            6 => "Validation",
            7 => "MatteService",
            _ => "Unknown",
        }
    }

    /// Map the code onto the failure kind reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::Timeout => ErrorKind::Timeout,
            ErrorCode::Cancelled => ErrorKind::Cancelled,
            _ => match self.code() / 1000 {
                3 => ErrorKind::Config,
                4 => ErrorKind::Codec,
                6 => ErrorKind::Validation,
                7 => ErrorKind::MatteService,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Failure taxonomy surfaced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input: missing file, oversize, unsupported type. Never retried.
    Validation,
    /// Malformed image, decode/encode or conversion failure.
    Codec,
    /// Matting service failure (rate limit exhausted, auth, malformed response).
    MatteService,
    /// The run exceeded its wall-clock budget.
    Timeout,
    /// The caller cancelled the run.
    Cancelled,
    /// Invalid or missing configuration.
    Config,
    /// Programming error or unexpected environment failure.
    Internal,
}

impl ErrorKind {
    /// Stable identifier used in reports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Codec => "codec_error",
            ErrorKind::MatteService => "matte_service_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure, ready to report
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// HTTP status returned by an upstream service, when known
    pub upstream_status: Option<u16>,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(status) = self.upstream_status {
            write!(f, " (upstream status {status})")?;
        }
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {ctx}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            upstream_status: None,
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Failure kind derived from the code
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Attach the upstream HTTP status
    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Process exit code matching the failure kind
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => exit_codes::VALIDATION_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Codec => exit_codes::CODEC_ERROR,
            ErrorKind::MatteService => exit_codes::MATTE_SERVICE_ERROR,
            ErrorKind::Timeout => exit_codes::TIMEOUT,
            ErrorKind::Cancelled => exit_codes::CANCELLED,
            ErrorKind::Internal => exit_codes::FAILURE,
        }
    }

    /// Flatten into a serializable report, e.g. for `--json` output
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            upstream_status: self.upstream_status,
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    /// Unexpected internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// An explicitly requested config file is missing
    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("config file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create a backdrop.toml file or use --config to specify a path")
    }

    /// The API key variable `var` is unset
    pub fn missing_secret(var: &str) -> Self {
        Self::new(
            ErrorCode::MissingSecret,
            format!("Matting service API key is not set ({var})"),
        )
        .with_suggestion(format!("Export {var} or run with --local to skip the remote service"))
    }

    /// An external program could not be run
    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessError, message)
    }

    /// `cmd` is not on the PATH
    pub fn command_not_found(cmd: &str) -> Self {
        Self::new(
            ErrorCode::CommandNotFound,
            format!("{cmd} is not installed"),
        )
        .with_suggestion(format!("Install {cmd} or set pipeline.heif_converter to its full path"))
    }

    /// The upload carried no bytes
    pub fn missing_file() -> Self {
        Self::new(ErrorCode::MissingFile, "no file provided")
    }

    /// `size` bytes exceeds the `max` byte limit
    pub fn file_too_large(size: usize, max: usize) -> Self {
        Self::new(ErrorCode::FileTooLarge, "file too large")
            .with_context(format!("{size} bytes exceeds the {max} byte limit"))
            .with_suggestion("Export the photo at a lower resolution or quality")
    }

    /// The declared type is not an accepted image
    pub fn unsupported_type(mime: &str, filename: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedType,
            format!("unsupported file type: {mime}"),
        )
        .with_context(format!("file: {filename}"))
        .with_suggestion("Upload a JPEG, PNG, WebP, GIF or HEIC photo")
    }

    /// Other image codec failure
    pub fn codec(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CodecError, message)
    }

    /// Layers the pipeline itself produced do not line up
    pub fn geometry_mismatch(background: (u32, u32), foreground: (u32, u32)) -> Self {
        Self::new(
            ErrorCode::Internal,
            format!(
                "layer geometry mismatch: background {}x{}, foreground {}x{}",
                background.0, background.1, foreground.0, foreground.1
            ),
        )
        .with_context("compositing stage")
    }

    /// The run did not finish within `budget`
    pub fn timeout(budget: std::time::Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("processing exceeded the {}s budget", budget.as_secs()),
        )
    }

    /// The caller cancelled the run
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "processing cancelled")
    }
}

/// [`Error`] as plain data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Failure kind
    pub kind: ErrorKind,
    /// Error code
    pub code: ErrorCode,
    /// Code as displayed, e.g. `E6002`
    pub code_str: String,
    /// Name of the code group
    pub category: String,
    /// Human-readable message
    pub message: String,
    /// Upstream HTTP status, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Recovery suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Source error, rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit status per [`ErrorKind`]
pub mod exit_codes {
    /// Internal errors and anything unclassified
    pub const FAILURE: i32 = 1;
    /// Rejected input
    pub const VALIDATION_ERROR: i32 = 2;
    /// Bad or missing configuration
    pub const CONFIG_ERROR: i32 = 3;
    /// Image decode, encode or conversion failure
    pub const CODEC_ERROR: i32 = 4;
    /// Matting service failure
    pub const MATTE_SERVICE_ERROR: i32 = 5;
    /// Time budget exceeded, as `timeout(1)` reports it
    pub const TIMEOUT: i32 = 124;
    /// Interrupted by SIGINT
    pub const CANCELLED: i32 = 130;
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::Internal, format!("could not serialize result: {err}")).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("invalid TOML: {err}")).with_source(err)
    }
}

/// Decorate the error side of a [`Result`]
pub trait ResultExt<T> {
    /// Attach context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
    /// Attach a recovery suggestion to an error
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}
