//! Input loading: read a resume from a local path or an HTTP(S) URL.
//!
//! The pipeline works on in-memory bytes (the original is uploaded as-is and
//! the rasteriser parses from a byte slice), so both sources end up as a
//! [`FileArtifact`]. The `%PDF` magic bytes are checked up front so callers
//! get a clear error instead of an "Error converting PDF" after the upload
//! already happened.

use crate::error::ResumindError;
use crate::model::FileArtifact;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a PDF from a path or URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<FileArtifact, ResumindError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<FileArtifact, ResumindError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ResumindError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ResumindError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    check_magic(&bytes, path)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.pdf".to_string());

    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(FileArtifact::pdf(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<FileArtifact, ResumindError> {
    info!("Downloading resume from: {}", url);

    let failed = |reason: String| ResumindError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ResumindError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    let name = filename_from_url(url);
    check_magic(&bytes, Path::new(&name))?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(FileArtifact::pdf(name, bytes.to_vec()))
}

fn check_magic(bytes: &[u8], path: &Path) -> Result<(), ResumindError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ResumindError::NotAPdf {
            path: PathBuf::from(path),
            magic,
        });
    }
    Ok(())
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "resume.pdf".to_string()
}
