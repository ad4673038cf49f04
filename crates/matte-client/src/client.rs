//! Background-removal client with rate-limit aware retry

use crate::config::MatteClientConfig;
use crate::error::{MatteResult, MatteServiceError};
use crate::transport::{HttpTransport, MatteRequest, MatteTransport, ResponseEnvelope, TransportResponse};
use async_trait::async_trait;
use backdrop_core::retry::RetryResult;
use backdrop_image::RawImage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Longest error body echoed into messages
const MAX_ERROR_BODY: usize = 200;

/// A foreground image with an alpha channel isolating the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matte {
    image: RawImage,
}

impl Matte {
    /// Wrap an already decoded matte
    pub fn new(image: RawImage) -> Self {
        Self { image }
    }

    /// Decode the base64 payload returned by the service
    pub fn from_base64(payload: &str) -> MatteResult<Self> {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| MatteServiceError::malformed(None, format!("result_b64 is not base64: {e}")))?;
        if bytes.is_empty() {
            return Err(MatteServiceError::EmptyPayload);
        }
        let image = RawImage::from_bytes(bytes)
            .map_err(|e| MatteServiceError::malformed(None, format!("result_b64 is not an image: {e}")))?;
        Ok(Self { image })
    }

    /// The matte image
    pub fn image(&self) -> &RawImage {
        &self.image
    }

    /// Consume into the matte image
    pub fn into_image(self) -> RawImage {
        self.image
    }
}

/// Anything that can produce a matte for an image.
///
/// The pipeline depends on this trait rather than on [`MatteClient`], so a
/// local threshold matte or a test double can stand in for the service.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Produce a matte for `image`
    async fn remove_background(&self, image: &RawImage) -> backdrop_core::Result<RetryResult<Matte>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Client for the external matting service
///
/// Retries HTTP 429 and empty payloads with exponential backoff from the
/// configured [`backdrop_core::retry::RetryConfig`]; every other failure is
/// returned immediately.
#[derive(Clone)]
pub struct MatteClient {
    transport: Arc<dyn MatteTransport>,
    config: Arc<MatteClientConfig>,
}

impl std::fmt::Debug for MatteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatteClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl MatteClient {
    /// Create a client over HTTP
    pub fn new(config: MatteClientConfig) -> MatteResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        })
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: MatteClientConfig, transport: Arc<dyn MatteTransport>) -> MatteResult<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config: Arc::new(config),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &MatteClientConfig {
        &self.config
    }

    /// Send `image` to the service, retrying rate limits.
    ///
    /// Returns the matte together with the number of attempts and the total
    /// time slept between them.
    #[instrument(skip(self, image), fields(bytes = image.len(), format = %image.format()))]
    pub async fn remove_background(&self, image: &RawImage) -> MatteResult<RetryResult<Matte>> {
        let retry = &self.config.retry;
        let request = MatteRequest::new(image, &self.config);
        let mut total_backoff = Duration::ZERO;
        let mut last_error: Option<MatteServiceError> = None;

        for attempt in 1..=retry.max_attempts {
            let request_id = Uuid::new_v4().to_string();
            let start = Instant::now();

            let result = match self.transport.send(&request, &request_id).await {
                Ok(response) => parse_response(response),
                Err(e) => Err(e),
            };
            let elapsed = start.elapsed();

            match result {
                Ok(matte) => {
                    info!(
                        request_id = %request_id,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        "Matte received"
                    );
                    return Ok(RetryResult {
                        value: matte,
                        attempts: attempt,
                        total_backoff,
                    });
                }
                Err(e) if e.is_retryable() => {
                    if attempt < retry.max_attempts {
                        let delay = retry.delay_for_attempt(attempt);
                        warn!(
                            request_id = %request_id,
                            attempt,
                            reason = e.reason(),
                            delay_ms = delay.as_millis(),
                            "Matting attempt failed, retrying after delay"
                        );
                        tokio::time::sleep(delay).await;
                        total_backoff += delay;
                    } else {
                        debug!(request_id = %request_id, attempt, reason = e.reason(), "Final attempt failed");
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        request_id = %request_id,
                        attempt,
                        reason = e.reason(),
                        status = ?e.upstream_status(),
                        "Matting failed, not retrying"
                    );
                    return Err(e);
                }
            }
        }

        Err(MatteServiceError::RetriesExhausted {
            attempts: retry.max_attempts,
            last_error: last_error.map_or_else(|| "Unknown error".to_string(), |e| e.to_string()),
        })
    }
}

#[async_trait]
impl BackgroundRemover for MatteClient {
    async fn remove_background(&self, image: &RawImage) -> backdrop_core::Result<RetryResult<Matte>> {
        Ok(MatteClient::remove_background(self, image).await?)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Classify one HTTP exchange.
fn parse_response(response: TransportResponse) -> MatteResult<Matte> {
    let TransportResponse { status, body } = response;

    match status {
        200..=299 => {
            let envelope: ResponseEnvelope = serde_json::from_str(&body)
                .map_err(|e| MatteServiceError::malformed(Some(status), format!("invalid JSON: {e}")))?;

            if let Some(payload) = envelope.data.and_then(|d| d.result_b64) {
                if !payload.trim().is_empty() {
                    return Matte::from_base64(&payload);
                }
            } else if let Some(first) = envelope.errors.as_ref().and_then(|errors| errors.first()) {
                return Err(MatteServiceError::Upstream {
                    status,
                    message: first.describe(),
                });
            }
            Err(MatteServiceError::EmptyPayload)
        }
        429 => Err(MatteServiceError::RateLimited {
            message: error_message(&body),
        }),
        401 | 403 => Err(MatteServiceError::AuthFailed {
            status,
            message: error_message(&body),
        }),
        _ => Err(MatteServiceError::Upstream {
            status,
            message: error_message(&body),
        }),
    }
}

/// Best-effort message from an error body
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(body) {
        if let Some(first) = envelope.errors.as_ref().and_then(|errors| errors.first()) {
            return first.describe();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}
