//! Error types for the resumind library.
//!
//! Failures fall into four groups, each with its own type:
//!
//! * [`RasterError`]: the rendering engine or a single rasterisation failed.
//!   `Clone` so the engine loader can hand the same failure to every caller
//!   that was waiting on one initialisation.
//! * [`CapabilityError`]: a collaborator (storage, AI, key-value store)
//!   could not complete a call.
//! * [`StageFailure`]: a pipeline stage failed. These are recovered by the
//!   orchestrator: the `Display` text is exactly the status shown to the user
//!   and the run ends in `Failed`.
//! * [`ResumindError`] / [`SubmitError`]: fatal errors returned as `Err` from
//!   entry points (bad input file, invalid configuration, busy surface).

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the rendering engine and the document rasteriser.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RasterError {
    /// The host cannot render: no pdfium build for this platform, or the
    /// library could not be located or bound.
    #[error("Rendering is not supported in this environment: {0}")]
    UnsupportedEnvironment(String),

    /// The bytes could not be parsed as a PDF (corrupt, wrong format, or
    /// encrypted without credentials).
    #[error("Document could not be read: {0}")]
    UnreadableDocument(String),

    #[error("Document has no pages")]
    NoPages,

    /// The first page has a degenerate size.
    #[error("Invalid viewport {width}x{height} pt at scale {scale}")]
    InvalidViewport { width: f32, height: f32, scale: f32 },

    #[error("Rendering page 1 failed: {0}")]
    RenderFailed(String),

    /// PNG encoding errored or produced no bytes.
    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Internal rendering error: {0}")]
    Internal(String),
}

/// A collaborator call failed.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The AI provider rejected or failed the request.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The collaborator returned nothing usable.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Why a pipeline run stopped.
///
/// `Display` is the user-visible status text for the failed stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("Error uploading file")]
    UploadFailed(#[source] CapabilityError),

    #[error("Error converting PDF")]
    ConversionFailed(#[source] RasterError),

    #[error("Error uploading image")]
    ImageUploadFailed(#[source] CapabilityError),

    /// OCR failed or returned empty text.
    #[error("Could not read resume text")]
    TextExtractionFailed(Option<CapabilityError>),

    /// Feedback failed; `message` is the provider's error text when it gave
    /// one, otherwise "AI analysis failed".
    #[error("{message}")]
    AnalysisFailed { message: String },

    /// The feedback content was not valid JSON.
    #[error("Could not parse AI feedback")]
    MalformedFeedback(#[source] serde_json::Error),

    #[error("Error saving analysis")]
    PersistFailed(#[source] CapabilityError),
}

impl StageFailure {
    pub const DEFAULT_ANALYSIS_MESSAGE: &'static str = "AI analysis failed";

    pub(crate) fn analysis(message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_ANALYSIS_MESSAGE.to_string());
        StageFailure::AnalysisFailed { message }
    }
}

/// A submitted form failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("No resume file selected")]
    MissingFile,
}

/// Errors returned by [`crate::Analyzer::submit`] before a run starts.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A run is already in flight on this surface.
    #[error("An analysis is already in progress")]
    Busy,

    #[error("Invalid submission: {0}")]
    Invalid(#[from] ValidationError),
}

/// Fatal errors returned by crate entry points.
#[derive(Debug, Error)]
pub enum ResumindError {
    // ── Input errors ──────────────────────────────────────────────────────
    #[error("Resume file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    #[error("'{path}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    Raster(#[from] RasterError),

    // ── Collaborator errors ───────────────────────────────────────────────
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No stored analysis under `resume:<id>`.
    #[error("No analysis found for id '{0}'")]
    RecordNotFound(String),

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
