//! Shared building blocks for the backdrop pipeline
//!
//! - [`error`]: one [`Error`] type for every stage, with a code, a reported
//!   [`ErrorKind`], the upstream HTTP status and a hint
//! - [`retry`]: backoff policy for the matting service
//! - [`config`]: `backdrop.toml` discovery, defaults and range checks
//! - [`validation`]: upload size and type gate
//! - [`process`]: running the HEIF converter
//!
//! # Example
//!
//! ```rust,no_run
//! use backdrop_core::config::Config;
//! use backdrop_core::validation::UploadValidator;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! let validator = UploadValidator::new(config.schema.pipeline.max_upload_bytes);
//!
//! let upload = validator.validate(1024, "image/jpeg", "portrait.jpg");
//! assert!(upload.is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod process;
pub mod retry;
pub mod validation;

pub use error::{Error, ErrorCode, ErrorKind, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema, MatteConfig, PipelineConfig};
    pub use crate::error::{exit_codes, Error, ErrorCode, ErrorKind, ErrorReport, Result, ResultExt};
    pub use crate::retry::{RetryConfig, RetryResult};
    pub use crate::validation::{AcceptedUpload, UploadValidator, Validator, Violation};
}
