//! # resumind
//!
//! Turn a submitted resume plus job context into structured, AI-generated
//! ATS feedback.
//!
//! ## Why render first?
//!
//! Resumes are designed documents: two columns, sidebars, icons, skill bars.
//! Text extraction straight from the PDF scrambles the reading order. This
//! crate renders page 1 at 4× into a PNG and lets a vision model read it as a
//! recruiter would, then asks a model for feedback against the job.
//!
//! ## Pipeline Overview
//!
//! ```text
//! resume.pdf + {company, title, description}
//!  │
//!  ├─ 1. Upload    store the original document
//!  ├─ 2. Convert   render page 1 via the shared pdfium engine (spawn_blocking)
//!  ├─ 3. Upload    store resume.png
//!  ├─ 4. OCR       vision model transcribes the image
//!  ├─ 5. Analyze   feedback call, JSON parsed from string or block content
//!  └─ 6. Persist   record stored under resume:<id>, route /resume/<id>
//! ```
//!
//! Every stage is fail-fast: the first error becomes the user-visible status
//! and nothing is persisted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resumind::{Analyzer, AnalyzerConfig, AnalysisRequest, FileArtifact, StatusLog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = AnalyzerConfig::builder().data_dir("./data").build()?;
//!     let analyzer = Analyzer::from_config(&config).await?;
//!
//!     let request = AnalysisRequest::default()
//!         .field("company-name", "Acme")
//!         .field("job-title", "Backend Engineer")
//!         .field("job-description", "Rust, Postgres, Kubernetes")
//!         .file(FileArtifact::pdf("cv.pdf", std::fs::read("cv.pdf")?));
//!
//!     let log = StatusLog::new();
//!     let report = analyzer.submit(request, &log).await?;
//!     println!("{}", report.status);
//!     if let Some(route) = report.route() {
//!         println!("→ {route}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resumind` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resumind = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{load_record, AnalysisRequest, Analyzer, RunOutcome, RunReport};
pub use capabilities::{AiService, FileKv, FsStorage, KvStore, LlmAnalyst, MemoryKv, Storage};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use engine::{acquire_engine, EngineCell, EngineOptions, RasterEngine};
pub use error::{
    CapabilityError, RasterError, ResumindError, StageFailure, SubmitError, ValidationError,
};
pub use id::new_id;
pub use model::{AnalysisContext, AnalysisRecord, FileArtifact, RasterImage, Route, StoredFile};
pub use pipeline::feedback::{ContentBlock, FeedbackContent, FeedbackMessage, FeedbackResponse};
pub use pipeline::input::load_document;
pub use pipeline::render::{PdfiumRasterizer, Rasterizer, Viewport, RENDER_SCALE};
pub use pipeline::state::PipelineState;
pub use progress::{NoopStatus, StatusEvent, StatusLog, StatusObserver, WatchStatus};
