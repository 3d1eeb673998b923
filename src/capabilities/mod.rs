//! Collaborators the pipeline calls through.
//!
//! The orchestrator only sees these traits. The crate ships local
//! implementations so the pipeline runs end to end from the CLI:
//!
//! | Trait        | Implementation                         |
//! |--------------|----------------------------------------|
//! | [`Storage`]  | [`FsStorage`]: files under a directory |
//! | [`AiService`]| [`LlmAnalyst`]: any `edgequake-llm` provider |
//! | [`KvStore`]  | [`FileKv`] (one JSON file per key), [`MemoryKv`] |
//!
//! Hosted backends plug in by implementing the same traits.

pub mod fs_storage;
pub mod kv;
pub mod llm;

pub use fs_storage::FsStorage;
pub use kv::{FileKv, MemoryKv};
pub use llm::LlmAnalyst;

use crate::error::CapabilityError;
use crate::model::{FileArtifact, StoredFile};
use crate::pipeline::feedback::FeedbackResponse;
use async_trait::async_trait;

/// File storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload files and return the stored location of the first one.
    async fn upload(&self, files: &[FileArtifact]) -> Result<StoredFile, CapabilityError>;
}

/// OCR and feedback generation.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Transcribe the text in an image.
    async fn img2txt(&self, image: &FileArtifact) -> Result<String, CapabilityError>;

    /// Request feedback on the resume stored at `resume_path`.
    ///
    /// A provider-side refusal is reported in the response
    /// (`success: false`), not as `Err`.
    async fn feedback(
        &self,
        resume_path: &str,
        prompt: &str,
    ) -> Result<FeedbackResponse, CapabilityError>;
}

/// String key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), CapabilityError>;

    /// `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CapabilityError>;
}
