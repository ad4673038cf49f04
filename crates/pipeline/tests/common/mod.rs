//! Fakes and fixtures shared by the pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use backdrop_core::retry::RetryResult;
use backdrop_core::{Error, ErrorCode, Result};
use backdrop_image::{
    decode_data_uri, decode_metadata, encode_image, encode_raw, BlendMode, Dimensions, ImageCodec, ImageFormat,
    ImageMetadata, RasterCodec, RawImage, ResizeMode,
};
use backdrop_matte_client::{BackgroundRemover, Matte};
use backdrop_pipeline::FormatNormalizer;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// JPEG with a diagonal gradient
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });
    encode_image(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg, 85).unwrap()
}

/// Opaque PNG of one colour
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([30, 160, 90, 255]));
    encode_image(&DynamicImage::ImageRgba8(img), ImageFormat::Png, 85).unwrap()
}

/// Dimensions of the image inside a data URI
pub fn uri_dimensions(uri: &str) -> Dimensions {
    let raw = decode_data_uri(uri).unwrap();
    decode_metadata(raw.data()).unwrap().dimensions()
}

/// Remover that cuts out the centre of whatever it is given
#[derive(Default)]
pub struct FakeRemover {
    calls: AtomicU32,
    matte_size: Option<Dimensions>,
    delay: Option<Duration>,
}

impl FakeRemover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return mattes of a fixed size, like a service answering at a lower tier
    pub fn with_matte_size(mut self, size: Dimensions) -> Self {
        self.matte_size = Some(size);
        self
    }

    /// Take this long to answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackgroundRemover for FakeRemover {
    async fn remove_background(&self, image: &RawImage) -> Result<RetryResult<Matte>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let size = match self.matte_size {
            Some(size) => size,
            None => decode_metadata(image.data())?.dimensions(),
        };
        let (w, h) = (size.width, size.height);
        let matte = RgbaImage::from_fn(w, h, |x, y| {
            let inside = x >= w / 4 && x < w - w / 4 && y >= h / 4 && y < h - h / 4;
            if inside { Rgba([220, 40, 40, 255]) } else { Rgba([0, 0, 0, 0]) }
        });

        Ok(RetryResult {
            value: Matte::new(encode_raw(&DynamicImage::ImageRgba8(matte), ImageFormat::Png, 85)?),
            attempts: 1,
            total_backoff: Duration::ZERO,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Normalizer that always fails
#[derive(Default)]
pub struct FailingNormalizer {
    calls: AtomicU32,
}

impl FailingNormalizer {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FormatNormalizer for FailingNormalizer {
    fn normalize(&self, _bytes: &[u8], filename: &str) -> Result<RawImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::new(ErrorCode::FormatConversion, format!("could not convert {filename} to PNG"))
            .with_context("heif-convert exited with code 1"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Normalizer that "converts" to a fixed PNG
pub struct StaticNormalizer {
    pub output: Vec<u8>,
}

impl FormatNormalizer for StaticNormalizer {
    fn normalize(&self, _bytes: &[u8], _filename: &str) -> Result<RawImage> {
        Ok(RawImage::new(self.output.clone(), ImageFormat::Png))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Raster codec whose first metadata read fails
#[derive(Default)]
pub struct BlindFirstLook {
    inner: RasterCodec,
    looked: AtomicBool,
}

impl ImageCodec for BlindFirstLook {
    fn decode_metadata(&self, buf: &RawImage) -> backdrop_image::Result<ImageMetadata> {
        if !self.looked.swap(true, Ordering::SeqCst) {
            return Err(backdrop_image::CodecError::InvalidData("truncated header".into()));
        }
        self.inner.decode_metadata(buf)
    }

    fn resize(&self, buf: &RawImage, target: Dimensions, mode: ResizeMode) -> backdrop_image::Result<RawImage> {
        self.inner.resize(buf, target, mode)
    }

    fn blur(&self, buf: &RawImage, sigma: f32) -> backdrop_image::Result<RawImage> {
        self.inner.blur(buf, sigma)
    }

    fn modulate(&self, buf: &RawImage, brightness: f32, saturation: f32) -> backdrop_image::Result<RawImage> {
        self.inner.modulate(buf, brightness, saturation)
    }

    fn gamma(&self, buf: &RawImage, value: f32) -> backdrop_image::Result<RawImage> {
        self.inner.gamma(buf, value)
    }

    fn composite_over(
        &self,
        background: &RawImage,
        foreground: &RawImage,
        mode: BlendMode,
    ) -> backdrop_image::Result<RawImage> {
        self.inner.composite_over(background, foreground, mode)
    }

    fn apply_alpha_mask(&self, buf: &RawImage, mask: &RawImage) -> backdrop_image::Result<RawImage> {
        self.inner.apply_alpha_mask(buf, mask)
    }

    fn threshold_mask(&self, buf: &RawImage, threshold: u8) -> backdrop_image::Result<RawImage> {
        self.inner.threshold_mask(buf, threshold)
    }

    fn convert(&self, buf: &RawImage, format: ImageFormat) -> backdrop_image::Result<RawImage> {
        self.inner.convert(buf, format)
    }
}
