//! Decoding and encoding between `RawImage` bytes and pixel buffers.

use crate::alpha::{has_alpha_channel, remove_alpha_channel};
use crate::{CodecError, ImageFormat, RawImage, Result};
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Background used when flattening transparency for formats without alpha.
pub const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Decode a raw buffer into pixels using its declared format.
pub fn decode_image(raw: &RawImage) -> Result<DynamicImage> {
    let format = raw
        .format()
        .to_image_format()
        .ok_or(CodecError::UnsupportedFormat(raw.format()))?;
    Ok(image::load_from_memory_with_format(raw.data(), format)?)
}

/// Encode pixels to bytes.
///
/// Formats without an alpha channel get transparent pixels flattened onto
/// [`FLATTEN_BACKGROUND`] first.
pub fn encode_image(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let output_format = match format {
        ImageFormat::Jpeg => ImageOutputFormat::Jpeg(quality.clamp(1, 100)),
        ImageFormat::Png => ImageOutputFormat::Png,
        ImageFormat::Gif => ImageOutputFormat::Gif,
        ImageFormat::WebP => ImageOutputFormat::WebP,
        _ => return Err(CodecError::UnsupportedFormat(format)),
    };

    if !format.supports_alpha() {
        let flattened = if has_alpha_channel(img) {
            remove_alpha_channel(img, FLATTEN_BACKGROUND)
        } else {
            img.clone()
        };
        DynamicImage::ImageRgb8(flattened.to_rgb8()).write_to(&mut buffer, output_format)?;
    } else {
        img.write_to(&mut buffer, output_format)?;
    }

    Ok(buffer.into_inner())
}

/// Encode pixels into a new `RawImage`.
pub fn encode_raw(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<RawImage> {
    Ok(RawImage::new(encode_image(img, format, quality)?, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_png_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40])));
        let raw = encode_raw(&img, ImageFormat::Png, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(raw.format(), ImageFormat::Png);

        let decoded = decode_image(&raw).unwrap();
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn test_jpeg_flattens_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let raw = encode_raw(&img, ImageFormat::Jpeg, DEFAULT_JPEG_QUALITY).unwrap();

        let decoded = decode_image(&raw).unwrap();
        assert!(!has_alpha_channel(&decoded));
        // Fully transparent pixels land on white
        assert!(decoded.to_rgb8().get_pixel(4, 4).0.iter().all(|&c| c > 240));
    }

    #[test]
    fn test_unsupported_output_format() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(1, 1));
        assert!(matches!(
            encode_image(&img, ImageFormat::Heic, 85),
            Err(CodecError::UnsupportedFormat(ImageFormat::Heic))
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let raw = RawImage::new(vec![0x89, 0x50, 0x4E, 0x47, 0, 0, 0, 0], ImageFormat::Png);
        assert!(decode_image(&raw).is_err());
    }
}
