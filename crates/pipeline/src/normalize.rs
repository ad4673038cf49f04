//! HEIF/HEIC normalization
//!
//! Container uploads are converted to PNG before anything else touches them.
//! Conversion runs once; any failure ends the run with a codec error.

use backdrop_core::process::run_command;
use backdrop_core::{Error, ErrorCode, Result};
use backdrop_image::{ImageFormat, RawImage};
use std::fs;
use tracing::debug;

/// Converts a container upload into a raster the codec can decode.
pub trait FormatNormalizer: Send + Sync {
    /// Convert `bytes` (the upload named `filename`) into a decodable raster
    fn normalize(&self, bytes: &[u8], filename: &str) -> Result<RawImage>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// [`FormatNormalizer`] that shells out to `heif-convert` (libheif).
#[derive(Debug, Clone)]
pub struct HeifConvertNormalizer {
    program: String,
}

impl Default for HeifConvertNormalizer {
    fn default() -> Self {
        Self::new("heif-convert")
    }
}

impl HeifConvertNormalizer {
    /// Use `program`, invoked as `program <input> <output.png>`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Converter program
    pub fn program(&self) -> &str {
        &self.program
    }

    fn conversion_error(&self, filename: &str, cause: Error) -> Error {
        let mut error = Error::new(
            ErrorCode::FormatConversion,
            format!("could not convert {filename} to PNG"),
        )
        .with_context(format!("{}: {}", self.program, cause.message));
        if let Some(suggestion) = cause.suggestion.clone() {
            error = error.with_suggestion(suggestion);
        }
        error.with_source(cause)
    }
}

impl FormatNormalizer for HeifConvertNormalizer {
    fn normalize(&self, bytes: &[u8], filename: &str) -> Result<RawImage> {
        let scratch = tempfile::tempdir().map_err(|e| self.conversion_error(filename, e.into()))?;
        let input = scratch.path().join("input.heic");
        let output = scratch.path().join("output.png");

        fs::write(&input, bytes).map_err(|e| self.conversion_error(filename, e.into()))?;

        run_command(&self.program, &[input.as_os_str(), output.as_os_str()])
            .and_then(|result| result.into_checked(&self.program))
            .map_err(|e| self.conversion_error(filename, e))?;

        let converted = fs::read(&output).map_err(|e| self.conversion_error(filename, e.into()))?;
        let image = RawImage::from_bytes(converted).map_err(|e| self.conversion_error(filename, e.into()))?;
        if image.format() == ImageFormat::Heic {
            return Err(self.conversion_error(
                filename,
                Error::codec(format!("{} produced another HEIF container", self.program)),
            ));
        }

        debug!(
            program = %self.program,
            input_bytes = bytes.len(),
            output_bytes = image.len(),
            "Normalized container upload"
        );
        Ok(image)
    }

    fn name(&self) -> &'static str {
        "heif-convert"
    }
}
