//! Configuration schema definitions
//!
//! Tunables for the pipeline and the matting service. The matting API key is
//! deliberately absent: secrets are supplied at construction time.

use crate::error::Result;
use crate::retry::RetryConfig;
use crate::validation::{Validator, DEFAULT_MAX_UPLOAD_BYTES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size tiers accepted by the matting service
pub const MATTE_SIZE_TIERS: &[&str] = &[
    "auto", "preview", "small", "regular", "medium", "hd", "full", "4k",
];

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    /// `[pipeline]` section
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// `[matte]` section
    #[serde(default)]
    pub matte: MatteConfig,

    /// `[logging]` section
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigSchema {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.matte.validate()
    }
}

/// How the blur amount supplied by the caller maps onto a blur sigma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurScale {
    /// Use the caller value as the sigma
    #[default]
    Raw,
    /// Halve the caller value (0-100 slider mapped to 0-50)
    Halved,
}

impl BlurScale {
    /// Apply the scale to a caller-supplied amount
    pub fn apply(self, amount: f32) -> f32 {
        match self {
            BlurScale::Raw => amount,
            BlurScale::Halved => amount / 2.0,
        }
    }
}

/// Output encoding for the backdrop plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackdropFormat {
    #[default]
    Png,
    Jpeg,
}

/// Where the matte comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatteSource {
    /// External background-removal service
    #[default]
    Remote,
    /// Greyscale-threshold mask computed locally; no network, no retries
    LocalThreshold,
}

/// Pipeline tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Longest edge of the canonical image
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Square target used when source metadata cannot be read
    #[serde(default = "default_max_dimension")]
    pub fallback_dimension: u32,

    /// Blur amount used when the caller supplies none
    #[serde(default = "default_blur")]
    pub default_blur: f32,

    /// How blur amounts map to a sigma
    #[serde(default)]
    pub blur_scale: BlurScale,

    /// Brightness multiplier applied to the backdrop plate
    #[serde(default = "default_brightness")]
    pub brightness: f32,

    /// Saturation multiplier applied to the backdrop plate
    #[serde(default = "default_saturation")]
    pub saturation: f32,

    /// Optional gamma correction for the backdrop plate
    #[serde(default)]
    pub gamma: Option<f32>,

    /// Encoding of the backdrop plate
    #[serde(default)]
    pub backdrop_format: BackdropFormat,

    /// Stretch the plate to the canonical box after styling
    #[serde(default)]
    pub backdrop_fill: bool,

    /// Wall-clock budget for a whole run
    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,

    /// Where mattes come from
    #[serde(default)]
    pub matte_source: MatteSource,

    /// Luma threshold for the local matte variant
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Program used to normalize HEIF/HEIC uploads
    #[serde(default = "default_heif_converter")]
    pub heif_converter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_dimension: default_max_dimension(),
            fallback_dimension: default_max_dimension(),
            default_blur: default_blur(),
            blur_scale: BlurScale::default(),
            brightness: default_brightness(),
            saturation: default_saturation(),
            gamma: None,
            backdrop_format: BackdropFormat::default(),
            backdrop_fill: false,
            overall_timeout_secs: default_overall_timeout_secs(),
            matte_source: MatteSource::default(),
            threshold: default_threshold(),
            heif_converter: default_heif_converter(),
        }
    }
}

impl PipelineConfig {
    /// Overall wall-clock budget
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        Validator::new()
            .range("pipeline.max_upload_bytes", self.max_upload_bytes, 1, 100 * 1024 * 1024)
            .range("pipeline.max_dimension", self.max_dimension, 1, 10_000)
            .range("pipeline.fallback_dimension", self.fallback_dimension, 1, self.max_dimension.max(1))
            .range("pipeline.default_blur", self.default_blur, 0.0, 1000.0)
            .range("pipeline.brightness", self.brightness, 0.0, 10.0)
            .range("pipeline.saturation", self.saturation, 0.0, 10.0)
            .custom("pipeline.gamma", || match self.gamma {
                Some(g) if !(1.0..=3.0).contains(&g) => {
                    Some(format!("got {g}, expected 1.0 to 3.0"))
                }
                _ => None,
            })
            .range("pipeline.overall_timeout_secs", self.overall_timeout_secs, 1, 3600)
            .required("pipeline.heif_converter", &self.heif_converter)
            .finish()
    }
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_max_dimension() -> u32 {
    800
}

fn default_blur() -> f32 {
    20.0
}

fn default_brightness() -> f32 {
    0.7
}

fn default_saturation() -> f32 {
    1.3
}

fn default_overall_timeout_secs() -> u64 {
    60
}

fn default_threshold() -> u8 {
    128
}

fn default_heif_converter() -> String {
    "heif-convert".to_string()
}

/// Matting service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatteConfig {
    /// Background-removal endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Requested output size tier
    #[serde(default = "default_size")]
    pub size: String,

    /// Foreground type hint (`auto`, `person`, `product`, ...)
    #[serde(default = "default_type_hint")]
    pub type_hint: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per matting call, the first included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff after the first retryable failure
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor between backoff delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for MatteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            size: default_size(),
            type_hint: default_type_hint(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl MatteConfig {
    /// Per-request HTTP timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy described by this section
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            ..RetryConfig::default()
        }
    }

    /// Validate endpoint, tier and retry policy
    pub fn validate(&self) -> Result<()> {
        Validator::new()
            .required("matte.endpoint", &self.endpoint)
            .custom("matte.endpoint", || {
                (!self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://"))
                    .then(|| "must start with http:// or https://".to_string())
            })
            .one_of("matte.size", &self.size, MATTE_SIZE_TIERS)
            .required("matte.type_hint", &self.type_hint)
            .range("matte.timeout_secs", self.timeout_secs, 1, 600)
            .range("matte.max_attempts", self.max_attempts, 1, 10)
            .finish()?;
        self.retry_config().validate()
    }
}

fn default_endpoint() -> String {
    "https://api.remove.bg/v1.0/removebg".to_string()
}

fn default_size() -> String {
    "auto".to_string()
}

fn default_type_hint() -> String {
    "auto".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
