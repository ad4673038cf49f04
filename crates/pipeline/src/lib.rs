//! Portrait background-blur pipeline
//!
//! Takes one uploaded photo and produces four images, returned as data URIs:
//!
//! - the original, resized so its longer edge is at most `max_dimension`
//! - the foreground matte from the background-removal service
//! - the backdrop plate: the original blurred, darkened and saturated
//! - the matte composited over the backdrop plate
//!
//! Stages run strictly in order under one wall-clock budget. CPU-bound work
//! runs on the blocking pool; the matting call is the only network I/O.
//!
//! # Example
//!
//! ```rust,no_run
//! use backdrop_core::config::Config;
//! use backdrop_pipeline::{Orchestrator, ProcessRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let api_key = std::env::var("REMOVE_BG_API_KEY").ok();
//!     let pipeline = Orchestrator::from_schema(&config.schema, api_key)?;
//!
//!     let bytes = std::fs::read("portrait.jpg")?;
//!     let request = ProcessRequest::new(bytes, "image/jpeg", "portrait.jpg").with_blur(12.0);
//!     let result = pipeline.process_image(request).await?;
//!
//!     println!("{} after {} matting attempt(s)", result.dimensions, result.diagnostics.matte_attempts);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod local;
pub mod normalize;
pub mod orchestrator;
pub mod request;
pub mod stage;

pub use local::LocalThresholdRemover;
pub use normalize::{FormatNormalizer, HeifConvertNormalizer};
pub use orchestrator::{Orchestrator, MAX_BLUR_SIGMA, MIN_BLUR_SIGMA};
pub use request::{CompositeResult, Diagnostics, ProcessRequest, StageTiming};
pub use stage::Stage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::orchestrator::Orchestrator;
    pub use crate::request::{CompositeResult, ProcessRequest};
    pub use crate::stage::Stage;
    pub use backdrop_matte_client::BackgroundRemover;
}
