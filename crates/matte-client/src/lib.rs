//! Client for the external background-removal (matting) service
//!
//! # Features
//!
//! - **Explicit configuration**: endpoint, size tier and retry policy come from
//!   the `[matte]` config section; the API key is passed in, never read here
//!   implicitly
//! - **Rate-limit aware retry**: HTTP 429 and empty payloads are retried with
//!   exponential backoff, everything else fails fast
//! - **Request correlation**: every attempt carries a fresh `X-Request-ID`
//! - **Pluggable transport**: tests swap [`HttpTransport`] for a scripted one
//!
//! # Example
//!
//! ```rust,no_run
//! use backdrop_image::RawImage;
//! use backdrop_matte_client::{MatteClient, MatteClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MatteClient::new(MatteClientConfig::from_env()?)?;
//!
//!     let image = RawImage::from_bytes(std::fs::read("portrait.png")?)?;
//!     let result = client.remove_background(&image).await?;
//!     println!("matte after {} attempt(s)", result.attempts);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::{BackgroundRemover, Matte, MatteClient};
pub use config::MatteClientConfig;
pub use error::{MatteResult, MatteServiceError};
pub use transport::{HttpTransport, MatteRequest, MatteTransport, TransportResponse};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::{BackgroundRemover, Matte, MatteClient};
    pub use crate::config::MatteClientConfig;
    pub use crate::error::{MatteResult, MatteServiceError};
}
