//! Terminal helpers for the backdrop command line
//!
//! - Coloured status lines and error reports
//! - Spinners for the slow stages

#![warn(missing_docs)]

pub mod output;
pub mod progress;
