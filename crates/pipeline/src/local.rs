//! Offline matte from a greyscale threshold

use async_trait::async_trait;
use backdrop_core::retry::RetryResult;
use backdrop_core::{Error, Result};
use backdrop_image::{ImageCodec, RawImage};
use backdrop_matte_client::{BackgroundRemover, Matte};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// [`BackgroundRemover`] that keeps pixels whose luma reaches a threshold.
///
/// Crude next to a real matting model, but needs no network and never
/// retries.
#[derive(Clone)]
pub struct LocalThresholdRemover {
    codec: Arc<dyn ImageCodec>,
    threshold: u8,
}

impl LocalThresholdRemover {
    /// Remover using `codec` for the mask and alpha operations
    pub fn new(codec: Arc<dyn ImageCodec>, threshold: u8) -> Self {
        Self { codec, threshold }
    }

    /// Luma threshold
    pub fn threshold(&self) -> u8 {
        self.threshold
    }
}

#[async_trait]
impl BackgroundRemover for LocalThresholdRemover {
    async fn remove_background(&self, image: &RawImage) -> Result<RetryResult<Matte>> {
        let codec = Arc::clone(&self.codec);
        let image = image.clone();
        let threshold = self.threshold;

        let matte = tokio::task::spawn_blocking(move || -> Result<RawImage> {
            let mask = codec.threshold_mask(&image, threshold)?;
            Ok(codec.apply_alpha_mask(&image, &mask)?)
        })
        .await
        .map_err(|e| Error::internal(format!("local matte task failed: {e}")))??;

        debug!(threshold, bytes = matte.len(), "Local matte computed");
        Ok(RetryResult {
            value: Matte::new(matte),
            attempts: 1,
            total_backoff: Duration::ZERO,
        })
    }

    fn name(&self) -> &'static str {
        "local_threshold"
    }
}
