//! Analysis orchestrator: the fail-fast state machine behind a submission.
//!
//! ## Flow
//!
//! ```text
//! Idle ─▶ Uploading ─▶ Converting ─▶ UploadingImage ─▶ Extracting ─▶ Analyzing ─▶ Persisting ─▶ Done
//!            │             │               │               │             │             │
//!            └─────────────┴───────────────┴───────┬───────┴─────────────┴─────────────┘
//!                                                  ▼
//!                                            Failed(reason)
//! ```
//!
//! Each stage awaits one collaborator call; the next never starts before the
//! previous succeeded. The first failure sets the status text, ends the run
//! and clears the busy flag. Nothing is persisted unless every stage before
//! `Persisting` succeeded.
//!
//! ## Why a data-carrying step enum?
//!
//! Every [`Step`] variant holds exactly the artifacts produced so far. The
//! `Analyzing` step cannot exist without an uploaded resume, an uploaded
//! image and extracted text, so no stage ever has to unwrap an `Option` that
//! an earlier stage was supposed to fill in. Observers see the data-free
//! [`PipelineState`] instead.

use crate::capabilities::{AiService, FileKv, FsStorage, KvStore, LlmAnalyst, Storage};
use crate::config::AnalyzerConfig;
use crate::error::{ResumindError, StageFailure, SubmitError};
use crate::id::new_id;
use crate::model::{AnalysisContext, AnalysisRecord, FileArtifact, RasterImage, Route, StoredFile};
use crate::pipeline::feedback::parse_feedback;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::state::PipelineState;
use crate::progress::StatusObserver;
use crate::prompts::feedback_instructions;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Status text set after the record is stored, before handing over the route.
pub const REDIRECT_STATUS: &str = "Analysis complete, redirecting...";

// ── Request / report ─────────────────────────────────────────────────────

/// A raw submission: form fields plus the selected file.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub fields: HashMap<String, String>,
    pub file: Option<FileArtifact>,
}

impl AnalysisRequest {
    pub fn new(fields: HashMap<String, String>, file: Option<FileArtifact>) -> Self {
        Self { fields, file }
    }

    /// Set one form field.
    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn file(mut self, file: FileArtifact) -> Self {
        self.file = Some(file);
        self
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed { record: AnalysisRecord, route: Route },
    /// `stage` is the state the run was in when it failed.
    Failed {
        stage: PipelineState,
        failure: StageFailure,
    },
}

/// Result of one run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Final status text.
    pub status: String,
    /// Every state entered, in order, ending in `Done` or `Failed`.
    pub history: Vec<PipelineState>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn record(&self) -> Option<&AnalysisRecord> {
        match &self.outcome {
            RunOutcome::Completed { record, .. } => Some(record),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn route(&self) -> Option<&Route> {
        match &self.outcome {
            RunOutcome::Completed { route, .. } => Some(route),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            RunOutcome::Completed { .. } => None,
            RunOutcome::Failed { failure, .. } => Some(failure),
        }
    }

    pub fn final_state(&self) -> Option<&PipelineState> {
        self.history.last()
    }
}

// ── Analyzer ─────────────────────────────────────────────────────────────

/// A submission surface: runs the pipeline, one run at a time.
pub struct Analyzer {
    storage: Arc<dyn Storage>,
    ai: Arc<dyn AiService>,
    kv: Arc<dyn KvStore>,
    rasterizer: Arc<dyn Rasterizer>,
    busy: AtomicBool,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(
        storage: Arc<dyn Storage>,
        ai: Arc<dyn AiService>,
        kv: Arc<dyn KvStore>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            storage,
            ai,
            kv,
            rasterizer,
            busy: AtomicBool::new(false),
        }
    }

    /// Wire the local collaborators described by `config`: files and records
    /// under `data_dir`, the configured LLM provider, and the shared PDFium
    /// engine.
    pub async fn from_config(config: &AnalyzerConfig) -> Result<Self, ResumindError> {
        let ai = LlmAnalyst::from_config(config).await?;
        let rasterizer =
            PdfiumRasterizer::new(config.engine_options()).with_scale(config.render_scale);
        Ok(Self::new(
            Arc::new(FsStorage::new(config.storage_dir())),
            Arc::new(ai),
            Arc::new(FileKv::new(config.kv_dir())),
            Arc::new(rasterizer),
        ))
    }

    /// Whether a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate a raw submission and run the pipeline on it.
    ///
    /// Returns `Err` only when the submission is rejected before a run
    /// starts. Stage failures are reported in the [`RunReport`].
    pub async fn submit(
        &self,
        request: AnalysisRequest,
        observer: &dyn StatusObserver,
    ) -> Result<RunReport, SubmitError> {
        let input = AnalysisContext::from_form(&request.fields, request.file)?;
        self.analyze(input, observer).await
    }

    /// Run the pipeline on an already validated context.
    pub async fn analyze(
        &self,
        input: AnalysisContext,
        observer: &dyn StatusObserver,
    ) -> Result<RunReport, SubmitError> {
        let _guard = BusyGuard::acquire(&self.busy, observer).ok_or(SubmitError::Busy)?;
        let run = Run {
            analyzer: self,
            input: &input,
            cx: RunContext::new(observer),
        };
        Ok(run.execute().await)
    }

    /// Load a stored analysis, as the result view for `/resume/<id>` does.
    pub async fn load_record(&self, id: &str) -> Result<AnalysisRecord, ResumindError> {
        load_record(self.kv.as_ref(), id).await
    }
}

/// Load the record stored under `resume:<id>`.
pub async fn load_record(kv: &dyn KvStore, id: &str) -> Result<AnalysisRecord, ResumindError> {
    let raw = kv
        .get(&AnalysisRecord::key_for(id))
        .await?
        .ok_or_else(|| ResumindError::RecordNotFound(id.to_string()))?;
    let record = serde_json::from_str(&raw).map_err(crate::error::CapabilityError::from)?;
    Ok(record)
}

/// Holds the busy flag for the duration of a run.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    observer: &'a dyn StatusObserver,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, observer: &'a dyn StatusObserver) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        observer.on_busy(true);
        Some(Self { flag, observer })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.observer.on_busy(false);
    }
}

// ── Run ──────────────────────────────────────────────────────────────────

/// Per-run bookkeeping: status text, state history, observer.
struct RunContext<'a> {
    observer: &'a dyn StatusObserver,
    status: String,
    history: Vec<PipelineState>,
}

impl<'a> RunContext<'a> {
    fn new(observer: &'a dyn StatusObserver) -> Self {
        Self {
            observer,
            status: String::new(),
            history: Vec::new(),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        self.observer.on_state(&state);
        self.set_status(state.status_text().to_string());
        self.history.push(state);
    }

    fn set_status(&mut self, text: String) {
        self.observer.on_status(&text);
        self.status = text;
    }
}

struct Run<'a> {
    analyzer: &'a Analyzer,
    input: &'a AnalysisContext,
    cx: RunContext<'a>,
}

impl Run<'_> {
    async fn execute(mut self) -> RunReport {
        let started = Instant::now();
        info!(
            "Analyzing '{}' for {} at {}",
            self.input.document.name, self.input.job_title, self.input.company_name
        );

        let mut step = Step::Uploading;
        self.cx.enter(step.state());

        loop {
            let stage = step.state();
            match step.advance(self.analyzer, self.input).await {
                Ok(Step::Done { record }) => {
                    self.cx.enter(PipelineState::Done);
                    self.cx.set_status(REDIRECT_STATUS.to_string());
                    info!("Analysis {} complete in {:?}", record.id, started.elapsed());
                    let route = record.route();
                    return self.finish(RunOutcome::Completed { record, route });
                }
                Ok(next) => {
                    info!("Stage: {}", next.state());
                    self.cx.enter(next.state());
                    step = next;
                }
                Err(failure) => {
                    warn!("Stage {} failed: {} ({:?})", stage, failure, failure);
                    self.cx.enter(PipelineState::Failed(failure.to_string()));
                    return self.finish(RunOutcome::Failed { stage, failure });
                }
            }
        }
    }

    fn finish(self, outcome: RunOutcome) -> RunReport {
        RunReport {
            outcome,
            status: self.cx.status,
            history: self.cx.history,
        }
    }
}

/// Where a run is, carrying everything produced so far.
enum Step {
    Uploading,
    Converting {
        resume: StoredFile,
    },
    UploadingImage {
        resume: StoredFile,
        image: RasterImage,
    },
    Extracting {
        resume: StoredFile,
        image: RasterImage,
        image_file: StoredFile,
    },
    Analyzing {
        resume: StoredFile,
        image_file: StoredFile,
        text: String,
    },
    Persisting {
        record: AnalysisRecord,
    },
    Done {
        record: AnalysisRecord,
    },
}

impl Step {
    fn state(&self) -> PipelineState {
        match self {
            Step::Uploading => PipelineState::Uploading,
            Step::Converting { .. } => PipelineState::Converting,
            Step::UploadingImage { .. } => PipelineState::UploadingImage,
            Step::Extracting { .. } => PipelineState::Extracting,
            Step::Analyzing { .. } => PipelineState::Analyzing,
            Step::Persisting { .. } => PipelineState::Persisting,
            Step::Done { .. } => PipelineState::Done,
        }
    }

    /// Perform this step's call and return the next step.
    async fn advance(self, deps: &Analyzer, input: &AnalysisContext) -> Result<Step, StageFailure> {
        match self {
            Step::Uploading => {
                let resume = deps
                    .storage
                    .upload(std::slice::from_ref(&input.document))
                    .await
                    .map_err(StageFailure::UploadFailed)?;
                debug!("Resume stored at {} ({} bytes)", resume.path, resume.size);
                Ok(Step::Converting { resume })
            }

            Step::Converting { resume } => {
                let image = deps
                    .rasterizer
                    .rasterize(&input.document.bytes)
                    .await
                    .map_err(StageFailure::ConversionFailed)?;
                debug!(
                    "Rendered {}x{} px, {} bytes",
                    image.width,
                    image.height,
                    image.artifact.len()
                );
                Ok(Step::UploadingImage { resume, image })
            }

            Step::UploadingImage { resume, image } => {
                let image_file = deps
                    .storage
                    .upload(std::slice::from_ref(&image.artifact))
                    .await
                    .map_err(StageFailure::ImageUploadFailed)?;
                debug!("Image stored at {}", image_file.path);
                Ok(Step::Extracting {
                    resume,
                    image,
                    image_file,
                })
            }

            Step::Extracting {
                resume,
                image,
                image_file,
            } => {
                let text = deps
                    .ai
                    .img2txt(&image.artifact)
                    .await
                    .map_err(|e| StageFailure::TextExtractionFailed(Some(e)))?;
                if text.trim().is_empty() {
                    return Err(StageFailure::TextExtractionFailed(None));
                }
                debug!("Extracted {} chars of resume text", text.len());
                Ok(Step::Analyzing {
                    resume,
                    image_file,
                    text,
                })
            }

            Step::Analyzing {
                resume,
                image_file,
                text,
            } => {
                let prompt = feedback_instructions(&input.job_title, &input.job_description, &text);
                let response = deps
                    .ai
                    .feedback(&resume.path, &prompt)
                    .await
                    .map_err(|e| {
                        warn!("Feedback call failed: {}", e);
                        StageFailure::analysis(None)
                    })?;
                let content = response.into_feedback_text()?;
                let feedback = parse_feedback(&content)?;

                let record = AnalysisRecord {
                    id: new_id(),
                    resume_path: resume.path,
                    image_path: image_file.path,
                    company_name: input.company_name.clone(),
                    job_title: input.job_title.clone(),
                    job_description: input.job_description.clone(),
                    feedback,
                };
                Ok(Step::Persisting { record })
            }

            Step::Persisting { record } => {
                let json = serde_json::to_string(&record)
                    .map_err(|e| StageFailure::PersistFailed(e.into()))?;
                deps.kv
                    .set(&record.key(), &json)
                    .await
                    .map_err(StageFailure::PersistFailed)?;
                debug!("Stored {} ({} bytes)", record.key(), json.len());
                Ok(Step::Done { record })
            }

            Step::Done { record } => Ok(Step::Done { record }),
        }
    }
}
