//! Wire format and HTTP transport for the matting service

use crate::config::MatteClientConfig;
use crate::error::{MatteResult, MatteServiceError};
use async_trait::async_trait;
use backdrop_image::RawImage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request correlation ID header
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// API key header
pub const API_KEY_HEADER: &str = "x-api-key";

/// JSON body sent to the service
#[derive(Debug, Clone, Serialize)]
pub struct MatteRequest {
    /// Base64-encoded source image
    pub image_file_b64: String,
    /// Output size tier
    pub size: String,
    /// Foreground type hint
    #[serde(rename = "type")]
    pub type_hint: String,
}

impl MatteRequest {
    /// Encode `image` once; the same body is reused across attempts
    pub fn new(image: &RawImage, config: &MatteClientConfig) -> Self {
        Self {
            image_file_b64: STANDARD.encode(image.data()),
            size: config.size.clone(),
            type_hint: config.type_hint.clone(),
        }
    }
}

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl TransportResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Success envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub data: Option<ResponseData>,
    #[serde(default)]
    pub errors: Option<Vec<UpstreamError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseData {
    #[serde(default)]
    pub result_b64: Option<String>,
}

/// One entry of the service's `errors` array
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamError {
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl UpstreamError {
    pub(crate) fn describe(&self) -> String {
        let mut out = self.title.clone();
        if let Some(detail) = &self.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(code) = &self.code {
            out.push_str(&format!(" [{code}]"));
        }
        out
    }
}

/// Sends one request to the matting service.
///
/// Implementations perform exactly one exchange; retry decisions belong to
/// [`crate::MatteClient`].
#[async_trait]
pub trait MatteTransport: Send + Sync {
    /// Perform a single request
    async fn send(&self, request: &MatteRequest, request_id: &str) -> MatteResult<TransportResponse>;
}

/// [`MatteTransport`] over `reqwest`
#[derive(Clone)]
pub struct HttpTransport {
    inner: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build an HTTP client from validated configuration
    pub fn new(config: &MatteClientConfig) -> MatteResult<Self> {
        let api_key = config.api_key()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("backdrop-matte-client/", env!("CARGO_PKG_VERSION"))),
        );
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| MatteServiceError::config("API key contains invalid header characters"))?;
        key.set_sensitive(true);
        default_headers.insert(API_KEY_HEADER, key);

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            inner,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl MatteTransport for HttpTransport {
    async fn send(&self, request: &MatteRequest, request_id: &str) -> MatteResult<TransportResponse> {
        let response = self
            .inner
            .post(&self.endpoint)
            .header(X_REQUEST_ID, request_id)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(request_id = %request_id, status, body_len = body.len(), "Matting response received");

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backdrop_image::ImageFormat;

    #[test]
    fn test_request_body_shape() {
        let config = MatteClientConfig::default().with_size("preview");
        let request = MatteRequest::new(&RawImage::new(vec![1u8, 2, 3], ImageFormat::Png), &config);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["image_file_b64"], "AQID");
        assert_eq!(json["size"], "preview");
        assert_eq!(json["type"], "auto");
    }

    #[test]
    fn test_upstream_error_description() {
        let err: UpstreamError =
            serde_json::from_str(r#"{"title":"Insufficient credits","detail":"top up","code":"insufficient_credits"}"#)
                .unwrap();
        assert_eq!(err.describe(), "Insufficient credits: top up [insufficient_credits]");
    }

    #[test]
    fn test_transport_requires_key() {
        assert!(matches!(
            HttpTransport::new(&MatteClientConfig::default()),
            Err(MatteServiceError::MissingApiKey(_))
        ));
    }
}
