//! Raster codec for the backdrop pipeline.
//!
//! This crate provides:
//! - Format detection from magic bytes
//! - Dimension planning with aspect-ratio preservation
//! - Resize (inside / contain / fill), blur, modulate and gamma
//! - Alpha compositing and masking
//! - Data URI encoding

#![warn(missing_docs)]

mod alpha;
mod codec;
mod data_uri;
mod detect;
mod encode;
mod error;
mod metadata;
pub mod planner;
mod raw;
mod resize;
mod tone;

pub use alpha::{
    apply_alpha_mask, composite_over, has_alpha_channel, remove_alpha_channel, threshold_mask, BlendMode,
};
pub use codec::{ImageCodec, RasterCodec};
pub use data_uri::{decode_data_uri, encode_data_uri};
pub use detect::{detect_format, ImageFormat};
pub use encode::{decode_image, encode_image, encode_raw, DEFAULT_JPEG_QUALITY};
pub use error::{CodecError, Result};
pub use metadata::{decode_metadata, ImageMetadata};
pub use planner::{fit_contain, fit_inside, plan, Dimensions};
pub use raw::RawImage;
pub use resize::{resize_image, ResizeMode};
pub use tone::{blur, gamma, modulate};

/// Resampling filters accepted by [`RasterCodec::with_filter`].
pub use image::imageops::FilterType;
