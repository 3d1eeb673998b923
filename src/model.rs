//! Data carried through an analysis run.
//!
//! ```text
//! form fields + file ──▶ AnalysisContext ──▶ … ──▶ AnalysisRecord ──▶ Route
//!                        (immutable input)         (stored as resume:<id>)
//! ```

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Form field carrying the company name.
pub const FIELD_COMPANY_NAME: &str = "company-name";
/// Form field carrying the job title.
pub const FIELD_JOB_TITLE: &str = "job-title";
/// Form field carrying the job description.
pub const FIELD_JOB_DESCRIPTION: &str = "job-description";

/// Key prefix under which records are stored.
pub const RECORD_KEY_PREFIX: &str = "resume:";

/// An in-memory file: the submitted resume or the rendered page image.
#[derive(Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileArtifact {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// A PDF named `name`.
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Byte contents are elided; a resume is hundreds of kilobytes.
impl fmt::Debug for FileArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileArtifact")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    pub name: String,
    pub size: u64,
}

/// The first page of a document rendered to PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub artifact: FileArtifact,
    pub width: u32,
    pub height: u32,
}

impl RasterImage {
    pub const FILE_NAME: &'static str = "resume.png";
    pub const MIME_TYPE: &'static str = "image/png";

    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            artifact: FileArtifact::new(Self::FILE_NAME, Self::MIME_TYPE, png),
            width,
            height,
        }
    }
}

/// The validated input of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisContext {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub document: FileArtifact,
}

impl AnalysisContext {
    /// Build a context from submitted form fields and the selected file.
    ///
    /// All three text fields must be present and non-blank. Values are kept
    /// as submitted (no trimming).
    pub fn from_form(
        fields: &HashMap<String, String>,
        file: Option<FileArtifact>,
    ) -> Result<Self, ValidationError> {
        let field = |name: &'static str| -> Result<String, ValidationError> {
            fields
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or(ValidationError::MissingField(name))
        };

        let company_name = field(FIELD_COMPANY_NAME)?;
        let job_title = field(FIELD_JOB_TITLE)?;
        let job_description = field(FIELD_JOB_DESCRIPTION)?;
        let document = file.ok_or(ValidationError::MissingFile)?;

        Ok(Self {
            company_name,
            job_title,
            job_description,
            document,
        })
    }
}

/// The persisted result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub resume_path: String,
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub feedback: serde_json::Value,
}

impl AnalysisRecord {
    /// Storage key for a record id.
    pub fn key_for(id: &str) -> String {
        format!("{RECORD_KEY_PREFIX}{id}")
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.id)
    }

    /// Where the result view for this record lives.
    pub fn route(&self) -> Route {
        Route::resume(&self.id)
    }
}

/// A navigation target, e.g. `/resume/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(String);

impl Route {
    pub fn resume(id: &str) -> Self {
        Route(format!("/resume/{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
