//! Inbound request and outbound result of a pipeline run

use crate::stage::Stage;
use backdrop_image::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One uploaded photo plus the caller's options.
#[derive(Clone)]
pub struct ProcessRequest {
    /// Uploaded bytes, untouched
    pub bytes: Arc<[u8]>,
    /// MIME type declared by the uploader
    pub mime_type: String,
    /// Original filename; its extension routes HEIF/HEIC uploads
    pub filename: String,
    /// Blur amount; the configured default applies when `None`
    pub blur_amount: Option<f32>,
}

impl fmt::Debug for ProcessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRequest")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .field("blur_amount", &self.blur_amount)
            .finish()
    }
}

impl ProcessRequest {
    /// Create a request with the default blur
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            filename: filename.into(),
            blur_amount: None,
        }
    }

    /// Builder-style method to set the blur amount
    #[must_use]
    pub fn with_blur(mut self, amount: f32) -> Self {
        self.blur_amount = Some(amount);
        self
    }
}

/// How long one stage took
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage that ran
    pub stage: Stage,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
}

/// Facts about a run that are not part of the images themselves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Correlates log lines of one run
    pub request_id: String,
    /// Remover that produced the matte
    pub matte_source: String,
    /// Matting attempts, including rate-limited ones
    pub matte_attempts: u32,
    /// Time spent backing off between matting attempts
    pub matte_backoff_ms: u64,
    /// The source was converted from HEIF/HEIC
    pub normalized: bool,
    /// Metadata was unreadable and the fallback target was used
    pub metadata_fallback: bool,
    /// Blur sigma actually applied to the backdrop
    pub blur_sigma: f32,
    /// Per-stage durations in execution order
    pub stage_timings: Vec<StageTiming>,
}

impl Diagnostics {
    /// Duration of one stage, if it ran
    pub fn stage_ms(&self, stage: Stage) -> Option<f64> {
        self.stage_timings
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.duration_ms)
    }

    /// Stages that ran, in order
    pub fn stages(&self) -> Vec<Stage> {
        self.stage_timings.iter().map(|t| t.stage).collect()
    }
}

/// The four artifacts of a successful run, as data URIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    /// Resized original
    pub original: String,
    /// Foreground with alpha, fitted to the original
    pub matte: String,
    /// Blurred and toned backdrop plate
    pub background: String,
    /// Matte over backdrop
    pub composite: String,
    /// Canonical dimensions shared by all four images
    pub dimensions: Dimensions,
    /// Attempts, timings and fallbacks of this run
    pub diagnostics: Diagnostics,
}

impl CompositeResult {
    /// The artifacts paired with a file stem, in a fixed order
    pub fn artifacts(&self) -> [(&'static str, &str); 4] {
        [
            ("original", self.original.as_str()),
            ("matte", self.matte.as_str()),
            ("background", self.background.as_str()),
            ("composite", self.composite.as_str()),
        ]
    }
}
