//! Configuration loading and schema definitions
//!
//! Pipeline and matting-service tunables shared by every crate.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
