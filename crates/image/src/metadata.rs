//! Image metadata extraction.

use crate::{detect_format, CodecError, Dimensions, ImageFormat, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// File size in bytes
    pub size_bytes: usize,
}

impl ImageMetadata {
    /// Pixel dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Calculate aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Check if image is landscape orientation.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Check if image is portrait orientation.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Read dimensions and format without decoding pixel data where possible.
///
/// JPEG, PNG and GIF headers are parsed directly; other decodable formats go
/// through the `image` crate's header reader. HEIF containers are rejected
/// because they must be normalized first.
pub fn decode_metadata(data: &[u8]) -> Result<ImageMetadata> {
    let format = detect_format(data)?;

    let header = match format {
        ImageFormat::Jpeg => extract_jpeg_dimensions(data),
        ImageFormat::Png => extract_png_dimensions(data),
        ImageFormat::Gif => extract_gif_dimensions(data),
        _ => None,
    };

    let (width, height) = match header {
        Some(dims) => dims,
        None => read_dimensions(data, format)?,
    };

    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }

    Ok(ImageMetadata {
        width,
        height,
        format,
        size_bytes: data.len(),
    })
}

/// Fall back to the `image` crate's header reader.
fn read_dimensions(data: &[u8], format: ImageFormat) -> Result<(u32, u32)> {
    let image_format = format
        .to_image_format()
        .ok_or(CodecError::UnsupportedFormat(format))?;

    let mut reader = image::io::Reader::new(Cursor::new(data));
    reader.set_format(image_format);
    Ok(reader.into_dimensions()?)
}

fn be16(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([bytes[0], bytes[1]])))
}

/// Walk JPEG segments up to the first start-of-frame and read its size.
fn extract_jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            pos += 1;
            continue;
        }
        match *data.get(pos + 1)? {
            // Fill byte
            0xFF => pos += 1,
            // SOF0..SOF15, minus DHT, JPG and DAC
            0xC0..=0xCF if !matches!(data[pos + 1], 0xC4 | 0xC8 | 0xCC) => {
                let height = be16(data, pos + 5)?;
                let width = be16(data, pos + 7)?;
                return Some((width, height));
            }
            // Markers without a length field
            0xD0..=0xD9 | 0x01 => pos += 2,
            _ => pos += 2 + be16(data, pos + 2)? as usize,
        }
    }
}

/// IHDR is always the first chunk: width and height at bytes 16..24.
fn extract_png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    let word = |at: usize| data.get(at..at + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
    Some((word(16)?, word(20)?))
}

/// Logical screen size follows the six-byte signature, little-endian.
fn extract_gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let screen = data.get(6..10)?;
    let width = u16::from_le_bytes([screen[0], screen[1]]);
    let height = u16::from_le_bytes([screen[2], screen[3]]);
    Some((width.into(), height.into()))
}
