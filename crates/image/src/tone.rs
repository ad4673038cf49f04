//! Blur and colour adjustments for the backdrop plate.

use crate::alpha::has_alpha_channel;
use crate::{CodecError, Result};
use image::{DynamicImage, RgbImage, RgbaImage};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Rec. 709 luma weights.
const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Gaussian blur with standard deviation `sigma`.
pub fn blur(img: &DynamicImage, sigma: f32) -> Result<DynamicImage> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(CodecError::InvalidData(format!("blur sigma must be positive, got {sigma}")));
    }
    Ok(img.blur(sigma))
}

/// Scale brightness, then saturation around each pixel's luma.
///
/// A saturation of 1.0 leaves colour unchanged, 0.0 produces greyscale.
/// Alpha is preserved.
pub fn modulate(img: &DynamicImage, brightness: f32, saturation: f32) -> Result<DynamicImage> {
    for (name, value) in [("brightness", brightness), ("saturation", saturation)] {
        if !value.is_finite() || value < 0.0 {
            return Err(CodecError::InvalidData(format!("{name} must be non-negative, got {value}")));
        }
    }

    let adjust = |px: &mut [u8]| {
        let rgb = [
            f32::from(px[0]) * brightness,
            f32::from(px[1]) * brightness,
            f32::from(px[2]) * brightness,
        ];
        let luma = rgb[0] * LUMA_WEIGHTS[0] + rgb[1] * LUMA_WEIGHTS[1] + rgb[2] * LUMA_WEIGHTS[2];
        for (channel, value) in px.iter_mut().zip(rgb) {
            *channel = to_u8(luma + (value - luma) * saturation);
        }
    };

    Ok(map_pixels(img, adjust))
}

/// Apply gamma correction: `out = 255 * (in / 255)^(1 / gamma)`.
pub fn gamma(img: &DynamicImage, value: f32) -> Result<DynamicImage> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CodecError::InvalidData(format!("gamma must be positive, got {value}")));
    }

    let exponent = 1.0 / value;
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| to_u8(255.0 * (f32::from(v) / 255.0).powf(exponent)))
        .collect();

    Ok(map_pixels(img, |px: &mut [u8]| {
        for channel in px.iter_mut().take(3) {
            *channel = lut[usize::from(*channel)];
        }
    }))
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Run `f` over every pixel, keeping RGB images RGB and everything with
/// alpha as RGBA.
fn map_pixels<F>(img: &DynamicImage, f: F) -> DynamicImage
where
    F: Fn(&mut [u8]) + Sync + Send,
{
    if has_alpha_channel(img) {
        let mut buf: RgbaImage = img.to_rgba8();
        for_each_pixel(&mut buf, 4, &f);
        DynamicImage::ImageRgba8(buf)
    } else {
        let mut buf: RgbImage = img.to_rgb8();
        for_each_pixel(&mut buf, 3, &f);
        DynamicImage::ImageRgb8(buf)
    }
}

#[cfg(feature = "parallel")]
fn for_each_pixel<F>(data: &mut [u8], channels: usize, f: &F)
where
    F: Fn(&mut [u8]) + Sync + Send,
{
    data.par_chunks_mut(channels).for_each(f);
}

#[cfg(not(feature = "parallel"))]
fn for_each_pixel<F>(data: &mut [u8], channels: usize, f: &F)
where
    F: Fn(&mut [u8]) + Sync + Send,
{
    data.chunks_mut(channels).for_each(f);
}
