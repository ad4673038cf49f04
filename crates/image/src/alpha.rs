//! Alpha channel utilities: compositing, masking and flattening.

use crate::{CodecError, Result};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Rgba};
use serde::{Deserialize, Serialize};

/// How the foreground combines with the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Porter-Duff source-over
    #[default]
    Over,
}

/// Remove alpha channel from an image by compositing over a solid background
pub fn remove_alpha_channel(img: &DynamicImage, background_color: [u8; 3]) -> DynamicImage {
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();

    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in rgba_img.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;

        let alpha = f32::from(a) / 255.0;
        let inv_alpha = 1.0 - alpha;

        let blend = |fg: u8, bg: u8| (f32::from(fg) * alpha + f32::from(bg) * inv_alpha).round() as u8;

        output.put_pixel(
            x,
            y,
            Rgba([
                blend(r, background_color[0]),
                blend(g, background_color[1]),
                blend(b, background_color[2]),
                255,
            ]),
        );
    }

    DynamicImage::ImageRgba8(output)
}

/// Check if an image has an alpha channel
pub fn has_alpha_channel(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgba32F(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_)
    )
}

fn ensure_same_geometry(background: &DynamicImage, foreground: &DynamicImage) -> Result<()> {
    if background.dimensions() != foreground.dimensions() {
        return Err(CodecError::GeometryMismatch {
            background: background.dimensions(),
            foreground: foreground.dimensions(),
        });
    }
    Ok(())
}

/// Blend `foreground` onto `background`.
///
/// Both images must have identical dimensions; nothing is cropped or
/// stretched. Straight (non-premultiplied) alpha.
pub fn composite_over(
    background: &DynamicImage,
    foreground: &DynamicImage,
    mode: BlendMode,
) -> Result<DynamicImage> {
    ensure_same_geometry(background, foreground)?;

    let mut out = background.to_rgba8();
    let fg = foreground.to_rgba8();

    match mode {
        BlendMode::Over => {
            for (dst, src) in out.pixels_mut().zip(fg.pixels()) {
                *dst = over(*src, *dst);
            }
        }
    }

    Ok(DynamicImage::ImageRgba8(out))
}

fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let value = (f32::from(src[i]) * sa + f32::from(dst[i]) * da * (1.0 - sa)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([channel(0), channel(1), channel(2), (out_a * 255.0).round() as u8])
}

/// Multiply `img`'s alpha by the luma of `mask`.
///
/// White mask pixels keep the source, black ones make it transparent.
pub fn apply_alpha_mask(img: &DynamicImage, mask: &DynamicImage) -> Result<DynamicImage> {
    ensure_same_geometry(img, mask)?;

    let mut out = img.to_rgba8();
    let mask = mask.to_luma8();

    for (px, Luma([m])) in out.pixels_mut().zip(mask.pixels()) {
        px[3] = ((u16::from(px[3]) * u16::from(*m) + 127) / 255) as u8;
    }

    Ok(DynamicImage::ImageRgba8(out))
}

/// Binary greyscale mask: luma at or above `threshold` becomes white.
pub fn threshold_mask(img: &DynamicImage, threshold: u8) -> DynamicImage {
    let mut gray: GrayImage = img.to_luma8();
    for Luma([v]) in gray.pixels_mut() {
        *v = if *v >= threshold { 255 } else { 0 };
    }
    DynamicImage::ImageLuma8(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, RgbaImage};

    #[test]
    fn test_remove_alpha_white_background() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([0, 255, 0, 128]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 0]));
        img.put_pixel(1, 1, Rgba([255, 255, 0, 255]));

        let dynamic = DynamicImage::ImageRgba8(img);
        let result = remove_alpha_channel(&dynamic, [255, 255, 255]);

        let result_rgba = result.to_rgba8();

        assert_eq!(result_rgba.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        let pixel = result_rgba.get_pixel(0, 1);
        assert_eq!(pixel[3], 255);

        assert_eq!(result_rgba.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(result_rgba.get_pixel(1, 1), &Rgba([255, 255, 0, 255]));
    }

    #[test]
    fn test_has_alpha_channel() {
        let rgba_img = DynamicImage::ImageRgba8(RgbaImage::new(1, 1));
        assert!(has_alpha_channel(&rgba_img));

        let rgb_img = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        assert!(!has_alpha_channel(&rgb_img));
    }

    #[test]
    fn test_composite_over() {
        let bg = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, image::Rgb([0, 0, 200])));
        let mut fg = RgbaImage::new(2, 1);
        fg.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        fg.put_pixel(1, 0, Rgba([255, 0, 0, 0]));

        let out = composite_over(&bg, &DynamicImage::ImageRgba8(fg), BlendMode::Over)
            .unwrap()
            .to_rgba8();
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn test_composite_half_alpha() {
        let bg = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0])));
        let fg = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 128])));
        let out = composite_over(&bg, &fg, BlendMode::Over).unwrap().to_rgba8();
        let Rgba([r, _, _, a]) = *out.get_pixel(0, 0);
        assert_eq!(a, 255);
        assert!((99..=101).contains(&r));
    }

    #[test]
    fn test_composite_rejects_mismatched_geometry() {
        let bg = DynamicImage::ImageRgb8(RgbImage::new(800, 600));
        let fg = DynamicImage::ImageRgba8(RgbaImage::new(800, 599));
        let err = composite_over(&bg, &fg, BlendMode::Over).unwrap_err();
        assert!(matches!(
            err,
            CodecError::GeometryMismatch { background: (800, 600), foreground: (800, 599) }
        ));
    }

    #[test]
    fn test_apply_alpha_mask() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, image::Rgb([9, 9, 9])));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 0, Luma([0]));

        let out = apply_alpha_mask(&img, &DynamicImage::ImageLuma8(mask)).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 0)[3], 255);
        assert_eq!(out.get_pixel(1, 0)[3], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 9);
    }

    #[test]
    fn test_threshold_mask() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([127]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(2, 0, Luma([250]));

        let mask = threshold_mask(&DynamicImage::ImageLuma8(img), 128).to_luma8();
        assert_eq!(mask.as_raw(), &vec![0, 255, 255]);
    }
}
