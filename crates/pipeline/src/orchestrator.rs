//! Runs one upload through validate, resize, matte, style, composite, encode.

use crate::local::LocalThresholdRemover;
use crate::normalize::{FormatNormalizer, HeifConvertNormalizer};
use crate::request::{CompositeResult, Diagnostics, ProcessRequest, StageTiming};
use crate::stage::Stage;
use backdrop_core::config::{BackdropFormat, ConfigSchema, MatteSource, PipelineConfig};
use backdrop_core::validation::UploadValidator;
use backdrop_core::{Error, Result};
use backdrop_image::{
    detect_format, plan, BlendMode, CodecError, Dimensions, ImageCodec, ImageFormat, RasterCodec, RawImage,
    ResizeMode,
};
use backdrop_matte_client::config::API_KEY_ENV;
use backdrop_matte_client::{BackgroundRemover, MatteClient, MatteClientConfig};
use backdrop_telemetry::{metrics, Event, Timer};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Smallest blur sigma applied to the backdrop
pub const MIN_BLUR_SIGMA: f32 = 0.3;

/// Largest blur sigma applied to the backdrop
pub const MAX_BLUR_SIGMA: f32 = 100.0;

/// The image pipeline.
///
/// Holds only immutable, shared collaborators; one orchestrator serves any
/// number of concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    validator: UploadValidator,
    codec: Arc<dyn ImageCodec>,
    remover: Arc<dyn BackgroundRemover>,
    normalizer: Arc<dyn FormatNormalizer>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("remover", &self.remover.name())
            .field("normalizer", &self.normalizer.name())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Pipeline with the raster codec and the `heif-convert` normalizer
    pub fn new(config: PipelineConfig, remover: Arc<dyn BackgroundRemover>) -> Self {
        let normalizer = HeifConvertNormalizer::new(config.heif_converter.clone());
        Self {
            validator: UploadValidator::new(config.max_upload_bytes),
            config: Arc::new(config),
            codec: Arc::new(RasterCodec::new()),
            remover,
            normalizer: Arc::new(normalizer),
        }
    }

    /// Build from a loaded configuration.
    ///
    /// `api_key` is required when the matte source is the remote service and
    /// ignored otherwise.
    pub fn from_schema(schema: &ConfigSchema, api_key: Option<String>) -> Result<Self> {
        schema.validate()?;

        let codec: Arc<dyn ImageCodec> = Arc::new(RasterCodec::new());
        let remover: Arc<dyn BackgroundRemover> = match schema.pipeline.matte_source {
            MatteSource::Remote => {
                let key = api_key.ok_or_else(|| Error::missing_secret(API_KEY_ENV))?;
                let client_config = MatteClientConfig::from(&schema.matte).with_api_key(key);
                Arc::new(MatteClient::new(client_config)?)
            }
            MatteSource::LocalThreshold => Arc::new(LocalThresholdRemover::new(
                Arc::clone(&codec),
                schema.pipeline.threshold,
            )),
        };

        Ok(Self::new(schema.pipeline.clone(), remover).with_codec(codec))
    }

    /// Builder-style method to swap the codec
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Builder-style method to swap the matte source
    #[must_use]
    pub fn with_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Builder-style method to swap the HEIF/HEIC normalizer
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn FormatNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Blur sigma for a caller-supplied amount.
    ///
    /// Missing or non-finite amounts use `default_blur`; the result is scaled
    /// by `blur_scale` and clamped to [`MIN_BLUR_SIGMA`]..=[`MAX_BLUR_SIGMA`].
    pub fn effective_blur(&self, amount: Option<f32>) -> f32 {
        let amount = amount
            .filter(|a| a.is_finite())
            .unwrap_or(self.config.default_blur);
        self.config
            .blur_scale
            .apply(amount)
            .clamp(MIN_BLUR_SIGMA, MAX_BLUR_SIGMA)
    }

    /// Run the pipeline under the configured wall-clock budget
    pub async fn process_image(&self, request: ProcessRequest) -> Result<CompositeResult> {
        self.process_image_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run the pipeline, stopping early when `cancel` fires.
    ///
    /// The in-flight stage is dropped on cancellation or timeout; a matting
    /// request in progress is abandoned.
    #[instrument(skip_all, fields(filename = %request.filename, bytes = request.bytes.len()))]
    pub async fn process_image_with_cancel(
        &self,
        request: ProcessRequest,
        cancel: CancellationToken,
    ) -> Result<CompositeResult> {
        let budget = self.config.overall_timeout();
        let mut progress = Progress::new(Uuid::new_v4().to_string());

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled()),
            result = tokio::time::timeout(budget, self.run(&request, &cancel, &mut progress)) => {
                result.unwrap_or_else(|_| Err(Error::timeout(budget)))
            }
        };

        match outcome {
            Ok(result) => {
                metrics().increment("pipeline.runs.succeeded");
                Ok(result)
            }
            Err(err) => {
                progress.fail(&err);
                metrics().increment(&format!("pipeline.runs.failed.{}", err.kind()));
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<CompositeResult> {
        let mut diagnostics = Diagnostics {
            request_id: progress.request_id.clone(),
            matte_source: self.remover.name().to_string(),
            ..Diagnostics::default()
        };

        progress.enter(Stage::Validating, cancel)?;
        let upload = self
            .validator
            .validate(request.bytes.len(), &request.mime_type, &request.filename)?;
        let sniffed = detect_format(&request.bytes).ok();

        let source = if upload.needs_normalization() || sniffed == Some(ImageFormat::Heic) {
            progress.enter(Stage::Normalizing, cancel)?;
            diagnostics.normalized = true;
            let normalizer = Arc::clone(&self.normalizer);
            let bytes = Arc::clone(&request.bytes);
            let filename = request.filename.clone();
            blocking(move || normalizer.normalize(&bytes, &filename)).await?
        } else {
            let format = sniffed
                .or_else(|| ImageFormat::from_mime(&upload.mime_type))
                .ok_or(CodecError::UnknownFormat)?;
            RawImage::new(Arc::clone(&request.bytes), format)
        };

        progress.enter(Stage::Resizing, cancel)?;
        let codec = Arc::clone(&self.codec);
        let (max, fallback) = (self.config.max_dimension, self.config.fallback_dimension);
        let resized = blocking(move || resize_original(codec.as_ref(), &source, max, fallback)).await?;
        diagnostics.metadata_fallback = resized.used_fallback;
        let canonical = resized.dimensions;
        debug!(request_id = %progress.request_id, dimensions = %canonical, "Original resized");

        progress.enter(Stage::Matting, cancel)?;
        let outcome = self.remover.remove_background(&resized.image).await?;
        diagnostics.matte_attempts = outcome.attempts;
        diagnostics.matte_backoff_ms = u64::try_from(outcome.total_backoff.as_millis()).unwrap_or(u64::MAX);
        let matte = outcome.value.into_image();

        progress.enter(Stage::StylingBackground, cancel)?;
        let sigma = self.effective_blur(request.blur_amount);
        diagnostics.blur_sigma = sigma;
        let codec = Arc::clone(&self.codec);
        let config = Arc::clone(&self.config);
        let original = resized.image.clone();
        let background =
            blocking(move || style_backdrop(codec.as_ref(), &original, canonical, sigma, &config)).await?;

        progress.enter(Stage::Compositing, cancel)?;
        let codec = Arc::clone(&self.codec);
        let plate = background.clone();
        let (matte, composite) =
            blocking(move || composite_layers(codec.as_ref(), &plate, &matte, canonical)).await?;

        progress.enter(Stage::Encoding, cancel)?;
        let codec = Arc::clone(&self.codec);
        let backdrop_format = backdrop_image_format(self.config.backdrop_format);
        let layers = Layers {
            original: resized.image,
            matte,
            background,
            composite,
        };
        let [original, matte, background, composite] =
            blocking(move || encode_layers(codec.as_ref(), &layers, backdrop_format)).await?;

        progress.finish();
        diagnostics.stage_timings = progress.timings.clone();

        Event::new(
            "pipeline.completed",
            serde_json::json!({
                "request_id": diagnostics.request_id,
                "dimensions": canonical.to_string(),
                "matte_source": diagnostics.matte_source,
                "matte_attempts": diagnostics.matte_attempts,
                "normalized": diagnostics.normalized,
                "metadata_fallback": diagnostics.metadata_fallback,
            }),
        )
        .log();

        Ok(CompositeResult {
            original,
            matte,
            background,
            composite,
            dimensions: canonical,
            diagnostics,
        })
    }
}

/// Stage bookkeeping for one run
struct Progress {
    request_id: String,
    current: Stage,
    timer: Option<Timer>,
    timings: Vec<StageTiming>,
}

impl Progress {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            current: Stage::Validating,
            timer: None,
            timings: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage, cancel: &CancellationToken) -> Result<()> {
        self.close();
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        debug!(request_id = %self.request_id, stage = %stage, "Entering stage");
        self.current = stage;
        self.timer = Some(Timer::start(stage.metric_name()));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(timer) = self.timer.take() {
            let elapsed = timer.stop();
            self.timings.push(StageTiming {
                stage: self.current,
                duration_ms: elapsed.as_secs_f64() * 1000.0,
            });
        }
    }

    fn finish(&mut self) {
        self.close();
        self.current = Stage::Done;
        let total_ms: f64 = self.timings.iter().map(|t| t.duration_ms).sum();
        info!(request_id = %self.request_id, total_ms, "Pipeline run completed");
    }

    fn fail(&mut self, err: &Error) {
        self.close();
        warn!(
            request_id = %self.request_id,
            stage = %self.current,
            kind = %err.kind(),
            code = %err.code,
            error = %err.message,
            "Pipeline run failed"
        );
        self.current = Stage::Failed;
    }
}

/// Canonical original plus how its size was chosen
struct Resized {
    image: RawImage,
    dimensions: Dimensions,
    used_fallback: bool,
}

fn resize_original(codec: &dyn ImageCodec, source: &RawImage, max: u32, fallback: u32) -> Result<Resized> {
    let planned = codec
        .decode_metadata(source)
        .and_then(|meta| plan(meta.width, meta.height, max));

    // A plan already preserves the ratio, so it is applied exactly; the
    // fallback square is only a bound
    let (image, used_fallback) = match planned {
        Ok(target) => (codec.resize(source, target, ResizeMode::Fill)?, false),
        Err(e) => {
            let target = Dimensions::square(fallback);
            warn!(error = %e, fallback = %target, "Source metadata unreadable, using fallback target");
            (codec.resize(source, target, ResizeMode::Inside)?, true)
        }
    };

    // Later stages work from what the resize actually produced
    let dimensions = codec.decode_metadata(&image)?.dimensions();

    Ok(Resized {
        image,
        dimensions,
        used_fallback,
    })
}

fn style_backdrop(
    codec: &dyn ImageCodec,
    original: &RawImage,
    canonical: Dimensions,
    sigma: f32,
    config: &PipelineConfig,
) -> Result<RawImage> {
    let blurred = codec.blur(original, sigma)?;
    let mut plate = codec.modulate(&blurred, config.brightness, config.saturation)?;
    if let Some(gamma) = config.gamma {
        plate = codec.gamma(&plate, gamma)?;
    }
    if config.backdrop_fill {
        plate = codec.resize(&plate, canonical, ResizeMode::Fill)?;
    }
    Ok(plate)
}

/// Fit the matte to the canonical box and lay it over the plate.
///
/// Returns the fitted matte and the composite.
fn composite_layers(
    codec: &dyn ImageCodec,
    background: &RawImage,
    matte: &RawImage,
    canonical: Dimensions,
) -> Result<(RawImage, RawImage)> {
    let fitted = codec.resize(matte, canonical, ResizeMode::Contain)?;

    let bg = codec.decode_metadata(background)?.dimensions();
    let fg = codec.decode_metadata(&fitted)?.dimensions();
    if bg != fg {
        return Err(Error::geometry_mismatch(
            (bg.width, bg.height),
            (fg.width, fg.height),
        ));
    }

    let composite = codec.composite_over(background, &fitted, BlendMode::Over)?;
    Ok((fitted, composite))
}

struct Layers {
    original: RawImage,
    matte: RawImage,
    background: RawImage,
    composite: RawImage,
}

/// Encode every layer; one failure fails them all.
fn encode_layers(codec: &dyn ImageCodec, layers: &Layers, backdrop_format: ImageFormat) -> Result<[String; 4]> {
    let original = codec.convert(&layers.original, ImageFormat::Png)?;
    let matte = codec.convert(&layers.matte, ImageFormat::Png)?;
    let background = codec.convert(&layers.background, backdrop_format)?;
    let composite = codec.convert(&layers.composite, ImageFormat::Png)?;

    Ok([
        codec.encode_data_uri(&original),
        codec.encode_data_uri(&matte),
        codec.encode_data_uri(&background),
        codec.encode_data_uri(&composite),
    ])
}

fn backdrop_image_format(format: BackdropFormat) -> ImageFormat {
    match format {
        BackdropFormat::Png => ImageFormat::Png,
        BackdropFormat::Jpeg => ImageFormat::Jpeg,
    }
}

/// Run CPU-bound work off the async workers
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::internal(format!("pipeline task failed: {e}")))?
}
