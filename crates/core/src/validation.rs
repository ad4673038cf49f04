//! Upload and configuration validation
//!
//! [`UploadValidator`] gates uploads on size, MIME type and container
//! extension before any decoding. [`Validator`] checks config sections.
//!
//! # Example
//!
//! ```rust
//! use backdrop_core::validation::{UploadKind, UploadValidator};
//!
//! let validator = UploadValidator::new(10 * 1024 * 1024);
//!
//! let upload = validator.validate(2048, "application/octet-stream", "IMG_0042.HEIC").unwrap();
//! assert_eq!(upload.kind, UploadKind::HeifContainer);
//!
//! assert!(validator.validate(0, "image/png", "empty.png").is_err());
//! ```

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types decoded directly by the raster codec
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// MIME types of containers that need format normalization first
pub const CONTAINER_MIME_TYPES: &[&str] = &["image/heic", "image/heif", "image/heic-sequence"];

/// File extensions recognised as HEIF containers regardless of declared MIME
pub const CONTAINER_EXTENSIONS: &[&str] = &["heic", "heif"];

/// One configuration value that failed its check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted key, e.g. `pipeline.max_dimension`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collects every bad value in a config section so they are reported together.
#[derive(Debug, Default)]
#[must_use = "call finish() to get the outcome"]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    /// Start an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn reject(mut self, field: &str, message: String) -> Self {
        self.violations.push(Violation {
            field: field.to_string(),
            message,
        });
        self
    }

    /// Value must not be blank
    pub fn required(self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            return self.reject(field, "must not be empty".to_string());
        }
        self
    }

    /// Value must be one of `allowed`
    pub fn one_of(self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if allowed.contains(&value) {
            return self;
        }
        self.reject(field, format!("got {value:?}, expected one of {}", allowed.join(", ")))
    }

    /// Value must lie in `min..=max`
    pub fn range<T: PartialOrd + std::fmt::Display>(self, field: &str, value: T, min: T, max: T) -> Self {
        if value >= min && value <= max {
            return self;
        }
        self.reject(field, format!("got {value}, expected {min} to {max}"))
    }

    /// Arbitrary check; `check` returns the complaint, if any
    pub fn custom(self, field: &str, check: impl FnOnce() -> Option<String>) -> Self {
        match check() {
            Some(message) => self.reject(field, message),
            None => self,
        }
    }

    /// Violations collected so far
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// `Ok` when nothing was rejected, otherwise one
    /// [`ErrorCode::InvalidConfigValue`] listing every violation
    pub fn finish(self) -> Result<()> {
        if self.violations.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        Err(Error::new(ErrorCode::InvalidConfigValue, format!("invalid configuration: {}", listed.join("; ")))
            .with_suggestion("Fix the listed keys in backdrop.toml"))
    }
}

/// How an accepted upload enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// Decodable by the raster codec as-is
    Raster,
    /// HEIF/HEIC container; must be normalized to a standard raster first
    HeifContainer,
}

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    /// Normalized (lowercase) MIME type as declared by the caller
    pub mime_type: String,
    /// Routing decision
    pub kind: UploadKind,
}

impl AcceptedUpload {
    /// Whether the upload must go through format normalization
    pub fn needs_normalization(&self) -> bool {
        self.kind == UploadKind::HeifContainer
    }
}

/// Validates incoming uploads before any decoding happens.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_bytes: usize,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadValidator {
    /// Create a validator with the given byte limit
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Configured byte limit
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check size, then MIME type, then container extension.
    pub fn validate(&self, len: usize, mime_type: &str, filename: &str) -> Result<AcceptedUpload> {
        if len == 0 {
            return Err(Error::missing_file());
        }
        if len > self.max_bytes {
            return Err(Error::file_too_large(len, self.max_bytes));
        }

        let mime = mime_type.trim().to_ascii_lowercase();
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let is_container_ext = extension
            .as_deref()
            .is_some_and(|ext| CONTAINER_EXTENSIONS.contains(&ext));

        let kind = if CONTAINER_MIME_TYPES.contains(&mime.as_str()) || is_container_ext {
            UploadKind::HeifContainer
        } else if ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
            UploadKind::Raster
        } else {
            return Err(Error::unsupported_type(
                if mime.is_empty() { "unknown" } else { mime.as_str() },
                filename,
            ));
        };

        Ok(AcceptedUpload {
            mime_type: mime,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_accepts_jpeg() {
        let upload = UploadValidator::default()
            .validate(2 * MIB, "image/jpeg", "portrait.jpg")
            .unwrap();
        assert_eq!(upload.kind, UploadKind::Raster);
        assert!(!upload.needs_normalization());
    }

    #[test]
    fn test_rejects_empty_upload() {
        let err = UploadValidator::default()
            .validate(0, "image/png", "x.png")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingFile);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_rejects_oversize_upload() {
        let err = UploadValidator::default()
            .validate(10 * MIB + MIB / 2, "image/jpeg", "big.jpg")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FileTooLarge);
        assert_eq!(err.message, "file too large");
    }

    #[test]
    fn test_limit_is_inclusive() {
        assert!(UploadValidator::new(100).validate(100, "image/png", "a.png").is_ok());
    }

    #[test]
    fn test_rejects_unsupported_mime() {
        let err = UploadValidator::default()
            .validate(10, "application/pdf", "scan.pdf")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedType);
    }

    #[test]
    fn test_heic_by_extension_or_mime() {
        let validator = UploadValidator::default();

        let by_ext = validator.validate(10, "", "IMG_0001.HEIC").unwrap();
        assert!(by_ext.needs_normalization());

        let by_mime = validator.validate(10, "image/heif", "photo").unwrap();
        assert_eq!(by_mime.kind, UploadKind::HeifContainer);
    }

    #[test]
    fn test_mime_is_case_insensitive() {
        let upload = UploadValidator::default()
            .validate(10, " Image/PNG ", "a.png")
            .unwrap();
        assert_eq!(upload.mime_type, "image/png");
    }

    #[test]
    fn test_range_is_inclusive() {
        let validator = Validator::new()
            .range("pipeline.max_dimension", 1u32, 1, 10_000)
            .range("pipeline.max_dimension", 10_000u32, 1, 10_000);
        assert!(validator.violations().is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let err = Validator::new()
            .range("pipeline.max_dimension", 0u32, 1, 10_000)
            .one_of("matte.size", "huge", &["auto", "preview", "full"])
            .required("matte.type_hint", "  ")
            .finish()
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidConfigValue);
        assert!(err.message.contains("pipeline.max_dimension: got 0, expected 1 to 10000"));
        assert!(err.message.contains("matte.size: got \"huge\""));
        assert!(err.message.contains("matte.type_hint: must not be empty"));
    }

    #[test]
    fn test_custom_check() {
        let validator = Validator::new()
            .custom("pipeline.gamma", || None)
            .custom("pipeline.gamma", || Some("too dark".to_string()));
        assert_eq!(
            validator.violations(),
            &[Violation {
                field: "pipeline.gamma".to_string(),
                message: "too dark".to_string(),
            }]
        );
    }

    #[test]
    fn test_clean_section_passes() {
        let outcome = Validator::new()
            .required("matte.endpoint", "https://example.com")
            .range("pipeline.default_blur", 20.0f32, 0.0, 1000.0)
            .finish();
        assert!(outcome.is_ok());
    }
}
