//! Local file storage.

use super::Storage;
use crate::error::CapabilityError;
use crate::id::new_id;
use crate::model::{FileArtifact, StoredFile};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores uploads as `<root>/<uuid>-<name>`.
///
/// Every upload gets a fresh prefix, so two runs uploading `resume.png`
/// never overwrite each other.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn upload(&self, files: &[FileArtifact]) -> Result<StoredFile, CapabilityError> {
        if files.is_empty() {
            return Err(CapabilityError::Unavailable("no files to upload".into()));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let path = self
                .root
                .join(format!("{}-{}", new_id(), sanitize_file_name(&file.name)));
            tokio::fs::write(&path, &file.bytes).await?;
            debug!("Stored {} ({} bytes) at {}", file.name, file.len(), path.display());
            stored.push(StoredFile {
                path: path.to_string_lossy().into_owned(),
                name: file.name.clone(),
                size: file.len() as u64,
            });
        }

        Ok(stored.swap_remove(0))
    }
}

/// Keep the name's last path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "file".to_string(),
        _ => cleaned,
    }
}
