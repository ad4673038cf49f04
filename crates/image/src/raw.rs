//! Immutable encoded image buffers.

use crate::{detect_format, ImageFormat, Result};
use std::fmt;
use std::sync::Arc;

/// An encoded image plus its declared format.
///
/// The bytes are shared and never mutated; every codec operation returns a
/// new `RawImage`. Cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    data: Arc<[u8]>,
    format: ImageFormat,
}

impl RawImage {
    /// Wrap bytes with an explicit format
    pub fn new(data: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    /// Wrap bytes, sniffing the format from magic bytes
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data = data.into();
        let format = detect_format(&data)?;
        Ok(Self { data, format })
    }

    /// Encoded bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared format
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type of the declared format
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}
