//! Image resizing with the image crate.

use crate::planner::{fit_contain, fit_inside, Dimensions};
use crate::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// How a resize reconciles the source aspect ratio with the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Fit within the box without cropping or enlarging.
    Inside,
    /// Fit within the box, then centre on a transparent canvas of exactly
    /// the box size.
    Contain,
    /// Stretch to exactly the box, ignoring aspect ratio.
    Fill,
}

/// Resize pixels into `target` using `mode`.
pub fn resize_image(
    img: &DynamicImage,
    target: Dimensions,
    mode: ResizeMode,
    filter: FilterType,
) -> Result<DynamicImage> {
    let source = Dimensions::from(img.dimensions());

    match mode {
        ResizeMode::Inside => {
            let fitted = fit_inside(source, target)?;
            if fitted == source {
                return Ok(img.clone());
            }
            Ok(img.resize_exact(fitted.width, fitted.height, filter))
        }
        ResizeMode::Contain => {
            let fitted = fit_contain(source, target)?;
            let scaled = if fitted == source {
                img.to_rgba8()
            } else {
                img.resize_exact(fitted.width, fitted.height, filter).to_rgba8()
            };

            let mut canvas = RgbaImage::from_pixel(target.width, target.height, Rgba([0, 0, 0, 0]));
            let x = i64::from((target.width - fitted.width) / 2);
            let y = i64::from((target.height - fitted.height) / 2);
            imageops::replace(&mut canvas, &scaled, x, y);
            Ok(DynamicImage::ImageRgba8(canvas))
        }
        ResizeMode::Fill => {
            let target = target.ensure_positive()?;
            if source == target {
                return Ok(img.clone());
            }
            Ok(img.resize_exact(target.width, target.height, filter))
        }
    }
}
