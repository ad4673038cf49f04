//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a pipeline run.
///
/// Runs move forward through the working stages in declaration order
/// (`Normalizing` only for HEIF/HEIC uploads) and end in `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Size and type checks on the upload
    Validating,
    /// HEIF/HEIC conversion to PNG
    Normalizing,
    /// Planning and producing the canonical original
    Resizing,
    /// Obtaining the foreground matte
    Matting,
    /// Blur and tone of the backdrop plate
    StylingBackground,
    /// Matte over plate
    Compositing,
    /// Data URI encoding of all four artifacts
    Encoding,
    /// Run succeeded
    Done,
    /// Run ended with an error
    Failed,
}

impl Stage {
    /// Stages that do work, in execution order
    pub const WORKING: [Stage; 7] = [
        Stage::Validating,
        Stage::Normalizing,
        Stage::Resizing,
        Stage::Matting,
        Stage::StylingBackground,
        Stage::Compositing,
        Stage::Encoding,
    ];

    /// Stable identifier used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Normalizing => "normalizing",
            Stage::Resizing => "resizing",
            Stage::Matting => "matting",
            Stage::StylingBackground => "styling_background",
            Stage::Compositing => "compositing",
            Stage::Encoding => "encoding",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Histogram name for this stage's duration
    pub fn metric_name(&self) -> String {
        format!("pipeline.stage.{}_ms", self.as_str())
    }

    /// Whether the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_stages_are_ordered() {
        let mut sorted = Stage::WORKING;
        sorted.sort();
        assert_eq!(sorted, Stage::WORKING);
        assert!(Stage::WORKING.iter().all(|s| !s.is_terminal()));
        assert!(Stage::Encoding < Stage::Done);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::StylingBackground.to_string(), "styling_background");
        assert_eq!(Stage::Matting.metric_name(), "pipeline.stage.matting_ms");
        assert_eq!(
            serde_json::to_string(&Stage::StylingBackground).unwrap(),
            "\"styling_background\""
        );
    }
}
