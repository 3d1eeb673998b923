//! Orchestrator tests against in-memory collaborators.
//!
//! No PDFium, network, or API keys needed: storage, rasterizer and AI are
//! fakes that record their calls, and records go to `MemoryKv`.

use async_trait::async_trait;
use resumind::model::{FIELD_COMPANY_NAME, FIELD_JOB_DESCRIPTION, FIELD_JOB_TITLE};
use resumind::{
    AiService, AnalysisRecord, AnalysisRequest, Analyzer, CapabilityError, FeedbackResponse,
    FileArtifact, KvStore, MemoryKv, NoopStatus, PipelineState, RasterError, RasterImage,
    Rasterizer, ResumindError, RunOutcome, StageFailure, StatusEvent, StatusLog, Storage,
    StoredFile, SubmitError, ValidationError, WatchStatus,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeStorage {
    fail_on: Option<&'static str>,
    uploads: Mutex<Vec<String>>,
}

impl FakeStorage {
    fn failing_on(name: &'static str) -> Self {
        Self {
            fail_on: Some(name),
            ..Default::default()
        }
    }

    fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn upload(&self, files: &[FileArtifact]) -> Result<StoredFile, CapabilityError> {
        let file = &files[0];
        if self.fail_on == Some(file.name.as_str()) {
            return Err(CapabilityError::Unavailable("storage offline".into()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(file.name.clone());
        Ok(StoredFile {
            path: format!("/store/{}-{}", uploads.len(), file.name),
            name: file.name.clone(),
            size: file.bytes.len() as u64,
        })
    }
}

struct FakeRasterizer {
    result: Result<(), RasterError>,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn ok() -> Self {
        Self {
            result: Ok(()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(err: RasterError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, _document: &[u8]) -> Result<RasterImage, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()?;
        Ok(RasterImage::new(b"\x89PNG fake".to_vec(), 2448, 3168))
    }
}

/// Blocks inside `rasterize` until released.
#[derive(Default)]
struct GatedRasterizer {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Rasterizer for GatedRasterizer {
    async fn rasterize(&self, _document: &[u8]) -> Result<RasterImage, RasterError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(RasterImage::new(b"\x89PNG".to_vec(), 10, 10))
    }
}

enum Feedback {
    Respond(FeedbackResponse),
    TransportError,
}

struct FakeAi {
    ocr: Result<String, ()>,
    feedback: Feedback,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeAi {
    fn responding(response: FeedbackResponse) -> Self {
        Self {
            ocr: Ok("Jane Doe\nRust engineer".into()),
            feedback: Feedback::Respond(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_ocr(mut self, ocr: Result<&str, ()>) -> Self {
        self.ocr = ocr.map(str::to_string);
        self
    }

    fn feedback_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiService for FakeAi {
    async fn img2txt(&self, image: &FileArtifact) -> Result<String, CapabilityError> {
        assert_eq!(image.name, "resume.png");
        assert_eq!(image.mime_type, "image/png");
        self.ocr
            .clone()
            .map_err(|_| CapabilityError::Provider("vision model unavailable".into()))
    }

    async fn feedback(
        &self,
        resume_path: &str,
        prompt: &str,
    ) -> Result<FeedbackResponse, CapabilityError> {
        self.calls
            .lock()
            .unwrap()
            .push((resume_path.to_string(), prompt.to_string()));
        match &self.feedback {
            Feedback::Respond(r) => Ok(r.clone()),
            Feedback::TransportError => Err(CapabilityError::Provider("connection reset".into())),
        }
    }
}

struct FailingKv;

#[async_trait]
impl KvStore for FailingKv {
    async fn set(&self, _key: &str, _value: &str) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("kv offline".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CapabilityError> {
        Ok(None)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    storage: Arc<FakeStorage>,
    ai: Arc<FakeAi>,
    kv: Arc<MemoryKv>,
    rasterizer: Arc<FakeRasterizer>,
    analyzer: Analyzer,
}

fn harness(storage: FakeStorage, ai: FakeAi, rasterizer: FakeRasterizer) -> Harness {
    let storage = Arc::new(storage);
    let ai = Arc::new(ai);
    let kv = Arc::new(MemoryKv::new());
    let rasterizer = Arc::new(rasterizer);
    let analyzer = Analyzer::new(storage.clone(), ai.clone(), kv.clone(), rasterizer.clone());
    Harness {
        storage,
        ai,
        kv,
        rasterizer,
        analyzer,
    }
}

fn happy(response: FeedbackResponse) -> Harness {
    harness(
        FakeStorage::default(),
        FakeAi::responding(response),
        FakeRasterizer::ok(),
    )
}

fn request() -> AnalysisRequest {
    AnalysisRequest::default()
        .field(FIELD_COMPANY_NAME, "Acme")
        .field(FIELD_JOB_TITLE, "Backend Engineer")
        .field(FIELD_JOB_DESCRIPTION, "Rust, Postgres, Kubernetes")
        .file(FileArtifact::pdf("cv.pdf", b"%PDF-1.7 fake".to_vec()))
}

const SCORE_80: &str = "{\"score\":80}";

// ── Successful runs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn string_content_is_parsed_and_persisted() {
    let h = happy(FeedbackResponse::text(SCORE_80));
    let log = StatusLog::new();

    let report = h.analyzer.submit(request(), &log).await.unwrap();

    let record = report.record().expect("run should complete").clone();
    assert_eq!(record.feedback, json!({"score": 80}));
    assert_eq!(record.company_name, "Acme");
    assert_eq!(record.job_title, "Backend Engineer");
    assert_eq!(record.job_description, "Rust, Postgres, Kubernetes");
    assert_eq!(record.resume_path, "/store/1-cv.pdf");
    assert_eq!(record.image_path, "/store/2-resume.png");
    assert_eq!(report.route().unwrap().to_string(), format!("/resume/{}", record.id));

    let stored = h.kv.get(&format!("resume:{}", record.id)).await.unwrap().unwrap();
    let stored: AnalysisRecord = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored, record);

    assert_eq!(report.status, "Analysis complete, redirecting...");
    assert_eq!(h.storage.uploaded(), vec!["cv.pdf", "resume.png"]);
    assert_eq!(h.rasterizer.calls(), 1);
    assert!(!h.analyzer.is_busy());
}

#[tokio::test]
async fn block_content_yields_identical_feedback() {
    let h = happy(FeedbackResponse::blocks([SCORE_80]));
    let report = h.analyzer.submit(request(), &NoopStatus).await.unwrap();
    assert_eq!(report.record().unwrap().feedback, json!({"score": 80}));
    assert_eq!(h.kv.len().await, 1);
}

#[tokio::test]
async fn statuses_and_states_follow_stage_order() {
    let h = happy(FeedbackResponse::text(SCORE_80));
    let log = StatusLog::new();

    let report = h.analyzer.submit(request(), &log).await.unwrap();

    let expected_states = vec![
        PipelineState::Uploading,
        PipelineState::Converting,
        PipelineState::UploadingImage,
        PipelineState::Extracting,
        PipelineState::Analyzing,
        PipelineState::Persisting,
        PipelineState::Done,
    ];
    assert_eq!(report.history, expected_states);
    assert_eq!(log.states(), expected_states);
    assert_eq!(
        log.statuses(),
        vec![
            "Uploading the file...",
            "Converting to image...",
            "Uploading the image...",
            "Reading resume text...",
            "Analyzing...",
            "Saving analysis...",
            "Analysis complete",
            "Analysis complete, redirecting...",
        ]
    );

    let events = log.events();
    assert_eq!(events.first(), Some(&StatusEvent::Busy(true)));
    assert_eq!(events.last(), Some(&StatusEvent::Busy(false)));
}

#[tokio::test]
async fn feedback_prompt_carries_job_and_resume_text() {
    let h = happy(FeedbackResponse::text(SCORE_80));
    h.analyzer.submit(request(), &NoopStatus).await.unwrap();

    let calls = h.ai.feedback_calls();
    assert_eq!(calls.len(), 1);
    let (resume_path, prompt) = &calls[0];
    assert_eq!(resume_path, "/store/1-cv.pdf");
    assert!(prompt.contains("Backend Engineer"));
    assert!(prompt.contains("Rust, Postgres, Kubernetes"));
    assert!(prompt.contains("Jane Doe\nRust engineer"));
}

#[tokio::test]
async fn sequential_runs_get_distinct_ids_and_keys() {
    let h = happy(FeedbackResponse::text(SCORE_80));

    let a = h.analyzer.submit(request(), &NoopStatus).await.unwrap();
    let b = h.analyzer.submit(request(), &NoopStatus).await.unwrap();

    let (a, b) = (a.record().unwrap(), b.record().unwrap());
    assert_ne!(a.id, b.id);
    assert_ne!(a.key(), b.key());
    assert_eq!(h.kv.keys().await.len(), 2);
}

#[tokio::test]
async fn stored_record_can_be_loaded_by_id() {
    let h = happy(FeedbackResponse::text(SCORE_80));
    let report = h.analyzer.submit(request(), &NoopStatus).await.unwrap();
    let record = report.record().unwrap();

    let loaded = h.analyzer.load_record(&record.id).await.unwrap();
    assert_eq!(&loaded, record);

    let err = h.analyzer.load_record("nope").await.unwrap_err();
    assert!(matches!(err, ResumindError::RecordNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn watch_observer_ends_idle_with_final_status() {
    let h = happy(FeedbackResponse::text(SCORE_80));
    let watch = WatchStatus::new();

    h.analyzer.submit(request(), &watch).await.unwrap();

    let snapshot = watch.current();
    assert_eq!(snapshot.state, PipelineState::Done);
    assert_eq!(snapshot.status, "Analysis complete, redirecting...");
    assert!(!snapshot.busy);
}

// ── Stage failures ───────────────────────────────────────────────────────────

async fn assert_failed(h: &Harness, status: &str, stage: PipelineState) -> StageFailure {
    let report = h.analyzer.submit(request(), &NoopStatus).await.unwrap();
    assert_eq!(report.status, status);
    assert_eq!(
        report.final_state(),
        Some(&PipelineState::Failed(status.to_string()))
    );
    assert!(h.kv.is_empty().await, "nothing may be persisted on failure");
    assert!(!h.analyzer.is_busy());
    match report.outcome {
        RunOutcome::Failed { stage: at, failure } => {
            assert_eq!(at, stage);
            failure
        }
        RunOutcome::Completed { .. } => panic!("run should fail"),
    }
}

#[tokio::test]
async fn provider_error_message_becomes_status() {
    let h = happy(FeedbackResponse::failure("quota exceeded"));
    let failure = assert_failed(&h, "quota exceeded", PipelineState::Analyzing).await;
    assert!(matches!(failure, StageFailure::AnalysisFailed { .. }));
}

#[tokio::test]
async fn feedback_transport_error_uses_generic_message() {
    let mut ai = FakeAi::responding(FeedbackResponse::text(SCORE_80));
    ai.feedback = Feedback::TransportError;
    let h = harness(FakeStorage::default(), ai, FakeRasterizer::ok());
    assert_failed(&h, "AI analysis failed", PipelineState::Analyzing).await;
}

#[tokio::test]
async fn textless_feedback_content_is_an_analysis_failure() {
    let tool_call: FeedbackResponse = serde_json::from_value(json!({
        "success": true,
        "message": {"content": [{"type": "tool_use"}]}
    }))
    .unwrap();
    for response in [tool_call, FeedbackResponse::text("")] {
        let h = happy(response);
        let failure = assert_failed(&h, "AI analysis failed", PipelineState::Analyzing).await;
        assert!(matches!(failure, StageFailure::AnalysisFailed { .. }));
    }
}

#[tokio::test]
async fn failed_original_upload_skips_rasterization() {
    let h = harness(
        FakeStorage::failing_on("cv.pdf"),
        FakeAi::responding(FeedbackResponse::text(SCORE_80)),
        FakeRasterizer::ok(),
    );
    let failure = assert_failed(&h, "Error uploading file", PipelineState::Uploading).await;
    assert!(matches!(failure, StageFailure::UploadFailed(_)));
    assert_eq!(h.rasterizer.calls(), 0);
    assert!(h.ai.feedback_calls().is_empty());
}

#[tokio::test]
async fn conversion_failure_stops_before_image_upload() {
    let h = harness(
        FakeStorage::default(),
        FakeAi::responding(FeedbackResponse::text(SCORE_80)),
        FakeRasterizer::failing(RasterError::NoPages),
    );
    let failure = assert_failed(&h, "Error converting PDF", PipelineState::Converting).await;
    assert!(matches!(
        failure,
        StageFailure::ConversionFailed(RasterError::NoPages)
    ));
    assert_eq!(h.storage.uploaded(), vec!["cv.pdf"]);
}

#[tokio::test]
async fn image_upload_failure() {
    let h = harness(
        FakeStorage::failing_on("resume.png"),
        FakeAi::responding(FeedbackResponse::text(SCORE_80)),
        FakeRasterizer::ok(),
    );
    assert_failed(&h, "Error uploading image", PipelineState::UploadingImage).await;
}

#[tokio::test]
async fn empty_or_failed_ocr_cannot_read_text() {
    for ocr in [Ok("   \n "), Err(())] {
        let h = harness(
            FakeStorage::default(),
            FakeAi::responding(FeedbackResponse::text(SCORE_80)).with_ocr(ocr),
            FakeRasterizer::ok(),
        );
        assert_failed(&h, "Could not read resume text", PipelineState::Extracting).await;
        assert!(h.ai.feedback_calls().is_empty());
    }
}

#[tokio::test]
async fn malformed_feedback_is_reported_not_persisted() {
    let h = happy(FeedbackResponse::text("Here is my review: great resume!"));
    let failure =
        assert_failed(&h, "Could not parse AI feedback", PipelineState::Analyzing).await;
    assert!(matches!(failure, StageFailure::MalformedFeedback(_)));
}

#[tokio::test]
async fn kv_failure_is_reported() {
    let analyzer = Analyzer::new(
        Arc::new(FakeStorage::default()),
        Arc::new(FakeAi::responding(FeedbackResponse::text(SCORE_80))),
        Arc::new(FailingKv),
        Arc::new(FakeRasterizer::ok()),
    );
    let report = analyzer.submit(request(), &NoopStatus).await.unwrap();
    assert_eq!(report.status, "Error saving analysis");
    assert!(matches!(
        report.outcome,
        RunOutcome::Failed {
            stage: PipelineState::Persisting,
            failure: StageFailure::PersistFailed(_),
        }
    ));
    assert!(!analyzer.is_busy());
}

// ── Submission guard ─────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_while_busy_is_rejected() {
    let gate = Arc::new(GatedRasterizer::default());
    let kv = Arc::new(MemoryKv::new());
    let analyzer = Analyzer::new(
        Arc::new(FakeStorage::default()),
        Arc::new(FakeAi::responding(FeedbackResponse::text(SCORE_80))),
        kv.clone(),
        gate.clone(),
    );

    let first = analyzer.submit(request(), &NoopStatus);
    let second = async {
        gate.entered.notified().await;
        assert!(analyzer.is_busy());
        let rejected = analyzer.submit(request(), &NoopStatus).await;
        gate.release.notify_one();
        rejected
    };

    let (first, second) = tokio::join!(first, second);

    assert!(matches!(second, Err(SubmitError::Busy)));
    assert!(first.unwrap().is_success());
    assert!(!analyzer.is_busy());
    assert_eq!(kv.len().await, 1);
}

#[tokio::test]
async fn invalid_submissions_never_start_a_run() {
    let h = happy(FeedbackResponse::text(SCORE_80));

    let mut missing_field = request();
    missing_field.fields.remove(FIELD_JOB_DESCRIPTION);
    let err = h.analyzer.submit(missing_field, &NoopStatus).await.unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Invalid(ValidationError::MissingField("job-description"))
    ));

    let mut no_file = request();
    no_file.file = None;
    let err = h.analyzer.submit(no_file, &NoopStatus).await.unwrap_err();
    assert!(matches!(err, SubmitError::Invalid(ValidationError::MissingFile)));

    assert!(h.storage.uploaded().is_empty());
    assert!(!h.analyzer.is_busy());
}
