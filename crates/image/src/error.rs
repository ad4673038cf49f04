//! Error types for the image crate.

use crate::ImageFormat;
use backdrop_core::{Error, ErrorCode};
use thiserror::Error;

/// Result type alias for image operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur during codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Unknown image format
    #[error("Unknown image format")]
    UnknownFormat,

    /// Format is recognised but cannot be decoded directly
    #[error("Unsupported format: {0:?}")]
    UnsupportedFormat(ImageFormat),

    /// Invalid image data
    #[error("Invalid image data: {0}")]
    InvalidData(String),

    /// Zero-sized or unreadable dimensions
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
    },

    /// Two layers that must line up do not
    #[error(
        "Geometry mismatch: background {}x{}, foreground {}x{}",
        background.0, background.1, foreground.0, foreground.1
    )]
    GeometryMismatch {
        /// Background (width, height)
        background: (u32, u32),
        /// Foreground (width, height)
        foreground: (u32, u32),
    },

    /// Malformed `data:` URI
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Base64 payload could not be decoded
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Container conversion to a standard raster failed
    #[error("Format conversion failed: {0}")]
    Conversion(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ProcessingError(#[from] image::ImageError),
}

impl CodecError {
    /// Error code used when surfacing this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            CodecError::UnknownFormat
            | CodecError::UnsupportedFormat(_)
            | CodecError::InvalidData(_)
            | CodecError::InvalidDataUri(_)
            | CodecError::Base64(_) => ErrorCode::DecodeFailed,
            CodecError::InvalidDimensions { .. } => ErrorCode::InvalidDimensions,
            CodecError::GeometryMismatch { .. } => ErrorCode::GeometryMismatch,
            CodecError::Conversion(_) => ErrorCode::FormatConversion,
            CodecError::IoError(_) => ErrorCode::IoError,
            CodecError::ProcessingError(e) => match e {
                image::ImageError::Encoding(_) => ErrorCode::EncodeFailed,
                _ => ErrorCode::DecodeFailed,
            },
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        let code = err.code();
        Error::new(code, err.to_string()).with_source(err)
    }
}
