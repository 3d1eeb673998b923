//! Observable pipeline states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a run is. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum PipelineState {
    Idle,
    Uploading,
    Converting,
    UploadingImage,
    Extracting,
    Analyzing,
    Persisting,
    Done,
    Failed(String),
}

impl PipelineState {
    /// Status text shown on entering this state.
    pub fn status_text(&self) -> &str {
        match self {
            PipelineState::Idle => "",
            PipelineState::Uploading => "Uploading the file...",
            PipelineState::Converting => "Converting to image...",
            PipelineState::UploadingImage => "Uploading the image...",
            PipelineState::Extracting => "Reading resume text...",
            PipelineState::Analyzing => "Analyzing...",
            PipelineState::Persisting => "Saving analysis...",
            PipelineState::Done => "Analysis complete",
            PipelineState::Failed(reason) => reason,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Uploading => f.write_str("uploading"),
            PipelineState::Converting => f.write_str("converting"),
            PipelineState::UploadingImage => f.write_str("uploading image"),
            PipelineState::Extracting => f.write_str("extracting"),
            PipelineState::Analyzing => f.write_str("analyzing"),
            PipelineState::Persisting => f.write_str("persisting"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_texts() {
        assert_eq!(PipelineState::Uploading.status_text(), "Uploading the file...");
        assert_eq!(PipelineState::Extracting.status_text(), "Reading resume text...");
        assert_eq!(
            PipelineState::Failed("quota exceeded".into()).status_text(),
            "quota exceeded"
        );
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed(String::new()).is_terminal());
        assert!(!PipelineState::Persisting.is_terminal());
    }

    #[test]
    fn serialises_with_reason() {
        let v = serde_json::to_value(PipelineState::Failed("x".into())).unwrap();
        assert_eq!(v, serde_json::json!({"state": "Failed", "reason": "x"}));
        let v = serde_json::to_value(PipelineState::Done).unwrap();
        assert_eq!(v, serde_json::json!({"state": "Done"}));
    }
}
