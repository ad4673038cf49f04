//! Buffer-in/buffer-out codec operations over [`RawImage`].

use crate::alpha::{self, BlendMode};
use crate::encode::{decode_image, encode_raw, DEFAULT_JPEG_QUALITY};
use crate::metadata::{decode_metadata, ImageMetadata};
use crate::planner::Dimensions;
use crate::resize::{resize_image, ResizeMode};
use crate::{data_uri, tone, ImageFormat, RawImage, Result};
use image::imageops::FilterType;

/// Raster operations the pipeline relies on.
///
/// Every method takes its inputs by reference and returns a fresh buffer.
pub trait ImageCodec: Send + Sync {
    /// Read dimensions and format.
    fn decode_metadata(&self, buf: &RawImage) -> Result<ImageMetadata>;

    /// Resize into `target` using `mode`.
    fn resize(&self, buf: &RawImage, target: Dimensions, mode: ResizeMode) -> Result<RawImage>;

    /// Gaussian blur.
    fn blur(&self, buf: &RawImage, sigma: f32) -> Result<RawImage>;

    /// Brightness and saturation multipliers.
    fn modulate(&self, buf: &RawImage, brightness: f32, saturation: f32) -> Result<RawImage>;

    /// Gamma correction.
    fn gamma(&self, buf: &RawImage, value: f32) -> Result<RawImage>;

    /// Blend `foreground` over `background`; dimensions must match.
    fn composite_over(&self, background: &RawImage, foreground: &RawImage, mode: BlendMode) -> Result<RawImage>;

    /// Replace alpha with the product of alpha and the mask's luma.
    fn apply_alpha_mask(&self, buf: &RawImage, mask: &RawImage) -> Result<RawImage>;

    /// Binary greyscale mask at `threshold`.
    fn threshold_mask(&self, buf: &RawImage, threshold: u8) -> Result<RawImage>;

    /// Re-encode to `format`.
    fn convert(&self, buf: &RawImage, format: ImageFormat) -> Result<RawImage>;

    /// `data:<mime>;base64,<payload>`
    fn encode_data_uri(&self, buf: &RawImage) -> String {
        data_uri::encode_data_uri(buf)
    }
}

/// [`ImageCodec`] backed by the `image` crate.
///
/// Intermediate buffers are PNG so transparency survives every step.
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    quality: u8,
    filter: FilterType,
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            filter: FilterType::Lanczos3,
        }
    }
}

impl RasterCodec {
    /// Codec with default quality and Lanczos3 resampling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set JPEG quality (1-100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// JPEG quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn intermediate(&self, img: &image::DynamicImage) -> Result<RawImage> {
        encode_raw(img, ImageFormat::Png, self.quality)
    }
}

impl ImageCodec for RasterCodec {
    fn decode_metadata(&self, buf: &RawImage) -> Result<ImageMetadata> {
        decode_metadata(buf.data())
    }

    fn resize(&self, buf: &RawImage, target: Dimensions, mode: ResizeMode) -> Result<RawImage> {
        let img = decode_image(buf)?;
        self.intermediate(&resize_image(&img, target, mode, self.filter)?)
    }

    fn blur(&self, buf: &RawImage, sigma: f32) -> Result<RawImage> {
        self.intermediate(&tone::blur(&decode_image(buf)?, sigma)?)
    }

    fn modulate(&self, buf: &RawImage, brightness: f32, saturation: f32) -> Result<RawImage> {
        self.intermediate(&tone::modulate(&decode_image(buf)?, brightness, saturation)?)
    }

    fn gamma(&self, buf: &RawImage, value: f32) -> Result<RawImage> {
        self.intermediate(&tone::gamma(&decode_image(buf)?, value)?)
    }

    fn composite_over(&self, background: &RawImage, foreground: &RawImage, mode: BlendMode) -> Result<RawImage> {
        let bg = decode_image(background)?;
        let fg = decode_image(foreground)?;
        self.intermediate(&alpha::composite_over(&bg, &fg, mode)?)
    }

    fn apply_alpha_mask(&self, buf: &RawImage, mask: &RawImage) -> Result<RawImage> {
        let img = decode_image(buf)?;
        let mask = decode_image(mask)?;
        self.intermediate(&alpha::apply_alpha_mask(&img, &mask)?)
    }

    fn threshold_mask(&self, buf: &RawImage, threshold: u8) -> Result<RawImage> {
        self.intermediate(&alpha::threshold_mask(&decode_image(buf)?, threshold))
    }

    fn convert(&self, buf: &RawImage, format: ImageFormat) -> Result<RawImage> {
        if buf.format() == format {
            return Ok(buf.clone());
        }
        encode_raw(&decode_image(buf)?, format, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_uri::decode_data_uri;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    fn jpeg(width: u32, height: u32) -> RawImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([180, 90, 40])));
        encode_raw(&img, ImageFormat::Jpeg, 90).unwrap()
    }

    #[test]
    fn test_resize_inside_outputs_png() {
        let codec = RasterCodec::new().with_filter(FilterType::Triangle);
        let out = codec.resize(&jpeg(160, 120), Dimensions::square(80), ResizeMode::Inside).unwrap();
        assert_eq!(out.format(), ImageFormat::Png);
        assert_eq!(codec.decode_metadata(&out).unwrap().dimensions(), Dimensions::new(80, 60));
    }

    #[test]
    fn test_metadata_survives_data_uri() {
        let codec = RasterCodec::new();
        let raw = jpeg(37, 21);
        let back = decode_data_uri(&codec.encode_data_uri(&raw)).unwrap();
        assert_eq!(codec.decode_metadata(&back).unwrap().dimensions(), Dimensions::new(37, 21));
    }

    #[test]
    fn test_blur_and_tone_keep_geometry() {
        let codec = RasterCodec::new();
        let src = jpeg(30, 20);
        let out = codec.blur(&src, 3.0).unwrap();
        let out = codec.modulate(&out, 0.7, 1.3).unwrap();
        let out = codec.gamma(&out, 2.2).unwrap();
        assert_eq!(codec.decode_metadata(&out).unwrap().dimensions(), Dimensions::new(30, 20));
    }

    #[test]
    fn test_composite_checks_geometry() {
        let codec = RasterCodec::new();
        let bg = jpeg(10, 10);
        let fg = codec.convert(&jpeg(10, 9), ImageFormat::Png).unwrap();
        assert!(matches!(
            codec.composite_over(&bg, &fg, BlendMode::Over),
            Err(crate::CodecError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_local_matte_round_trip() {
        let codec = RasterCodec::new();
        let mut img = RgbaImage::from_pixel(4, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(3, 0, Rgba([255, 255, 255, 255]));
        let src = encode_raw(&DynamicImage::ImageRgba8(img), ImageFormat::Png, 85).unwrap();

        let mask = codec.threshold_mask(&src, 128).unwrap();
        let matte = codec.apply_alpha_mask(&src, &mask).unwrap();
        let pixels = decode_image(&matte).unwrap().to_rgba8();
        assert_eq!(pixels.get_pixel(0, 0)[3], 0);
        assert_eq!(pixels.get_pixel(3, 0)[3], 255);
    }

    #[test]
    fn test_convert_same_format_is_cheap() {
        let codec = RasterCodec::new();
        let raw = jpeg(4, 4);
        let same = codec.convert(&raw, ImageFormat::Jpeg).unwrap();
        assert!(std::ptr::eq(raw.data(), same.data()));
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(RasterCodec::new().with_quality(0).quality(), 1);
        assert_eq!(RasterCodec::new().with_quality(250).quality(), 100);
    }
}
