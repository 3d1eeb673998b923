//! Feedback response shape and normalisation.
//!
//! AI backends answer the feedback call with either a plain string or a list
//! of content blocks (`[{ "text": "..." }, ...]`). Both normalise to one
//! string, which must then parse as JSON.

use crate::error::StageFailure;
use crate::pipeline::postprocess::clean_feedback;
use serde::{Deserialize, Serialize};

/// One block of a multi-part message. Only `text` is read; non-text
/// blocks (tool calls, images) carry none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Message content: a plain string or a sequence of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl FeedbackContent {
    /// The string itself, or the first block's text.
    ///
    /// `None` when there is no text to parse: an empty block list, a first
    /// block without `text`, or blank text.
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            FeedbackContent::Text(s) => Some(s),
            FeedbackContent::Blocks(blocks) => blocks.into_iter().next().and_then(|b| b.text),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub content: FeedbackContent,
}

/// Response of [`crate::capabilities::AiService::feedback`].
///
/// `success` defaults to `true` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<FeedbackMessage>,
}

fn default_success() -> bool {
    true
}

impl FeedbackResponse {
    /// A successful response with plain-string content.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_content(FeedbackContent::Text(content.into()))
    }

    /// A successful response with block content.
    pub fn blocks<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_content(FeedbackContent::Blocks(
            texts
                .into_iter()
                .map(|t| ContentBlock {
                    text: Some(t.into()),
                })
                .collect(),
        ))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
        }
    }

    fn with_content(content: FeedbackContent) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(FeedbackMessage { content }),
        }
    }

    /// Normalised content text.
    ///
    /// Fails with [`StageFailure::AnalysisFailed`] when the provider
    /// reported failure or sent no content; the message is the provider's
    /// error text when present.
    pub fn into_feedback_text(self) -> Result<String, StageFailure> {
        if !self.success {
            return Err(StageFailure::analysis(self.error));
        }
        match self.message.and_then(|m| m.content.into_text()) {
            Some(text) => Ok(text),
            None => Err(StageFailure::analysis(self.error)),
        }
    }
}

/// Parse normalised feedback text as JSON.
///
/// Outer code fences are stripped first.
pub fn parse_feedback(text: &str) -> Result<serde_json::Value, StageFailure> {
    serde_json::from_str(&clean_feedback(text)).map_err(StageFailure::MalformedFeedback)
}
