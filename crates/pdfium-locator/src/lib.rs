//! # pdfium-locator
//!
//! Resolve the on-disk location of the [PDFium](https://pdfium.googlesource.com/pdfium/)
//! shared library that `pdfium-render` binds to.
//!
//! A [`Locator`] checks, in order:
//!
//! 1. an explicit path set with [`Locator::with_library_path`];
//! 2. the `PDFIUM_LIB_PATH` environment variable;
//! 3. the per-version cache directory (see [`default_cache_dir`]).
//!
//! [`Locator::find_local`] stops there and never touches the network.
//! [`Locator::download`] fetches the platform archive from
//! [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//! and unpacks the library into the cache directory.
//!
//! Every function here is blocking. Async callers should run them inside
//! `tokio::task::spawn_blocking`.
//!
//! ```rust,no_run
//! use pdfium_locator::Locator;
//!
//! let locator = Locator::new();
//! let library = match locator.find_local()? {
//!     Some(found) => found,
//!     None => locator.download(None)?,
//! };
//! println!("pdfium at {} ({})", library.path.display(), library.source);
//! # Ok::<(), pdfium_locator::LocatorError>(())
//! ```

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

/// Environment variable pointing at an existing pdfium library.
pub const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "PDFIUM_CACHE_DIR";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Progress callback: `(bytes_downloaded, total_bytes)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

#[derive(Error, Debug)]
pub enum LocatorError {
    /// No pdfium build is published for this OS/architecture.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// An explicitly configured library path does not exist.
    #[error("PDFium library not found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),
}

/// Where a resolved library came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibrarySource {
    Explicit,
    Environment,
    Cache,
    Download,
}

impl fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LibrarySource::Explicit => "explicit path",
            LibrarySource::Environment => LIB_PATH_ENV,
            LibrarySource::Cache => "local cache",
            LibrarySource::Download => "downloaded",
        };
        f.write_str(label)
    }
}

/// A library file that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLocation {
    pub path: PathBuf,
    pub source: LibrarySource,
}

/// Release asset for one OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Archive name in the GitHub release, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Path of the library inside the archive.
    pub member: &'static str,
    /// File name written to the cache directory.
    pub file_name: &'static str,
}

const MAC_LIB: (&str, &str) = ("lib/libpdfium.dylib", "libpdfium.dylib");
const LINUX_LIB: (&str, &str) = ("lib/libpdfium.so", "libpdfium.so");
const WINDOWS_LIB: (&str, &str) = ("bin/pdfium.dll", "pdfium.dll");

const PLATFORMS: &[(&str, &str, &str, (&str, &str))] = &[
    ("macos", "aarch64", "pdfium-mac-arm64.tgz", MAC_LIB),
    ("macos", "x86_64", "pdfium-mac-x64.tgz", MAC_LIB),
    ("linux", "x86_64", "pdfium-linux-x64.tgz", LINUX_LIB),
    ("linux", "aarch64", "pdfium-linux-arm64.tgz", LINUX_LIB),
    ("windows", "x86_64", "pdfium-win-x64.tgz", WINDOWS_LIB),
    ("windows", "aarch64", "pdfium-win-arm64.tgz", WINDOWS_LIB),
    ("windows", "x86", "pdfium-win-x86.tgz", WINDOWS_LIB),
];

/// Look up the release asset for an OS/architecture pair.
pub fn platform_for(os: &str, arch: &str) -> Result<Platform, LocatorError> {
    PLATFORMS
        .iter()
        .find(|(o, a, _, _)| *o == os && *a == arch)
        .map(|&(_, _, archive, (member, file_name))| Platform {
            archive,
            member,
            file_name,
        })
        .ok_or_else(|| LocatorError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

/// The release asset for the running host.
pub fn current_platform() -> Result<Platform, LocatorError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Per-version cache directory.
///
/// `$PDFIUM_CACHE_DIR/pdfium-{VERSION}` when the variable is set, otherwise
/// `{dirs::cache_dir}/resumind/pdfium-{VERSION}`.
pub fn default_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Ok(root) = std::env::var(CACHE_DIR_ENV) {
        if !root.is_empty() {
            return PathBuf::from(root).join(versioned);
        }
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("resumind")
        .join(versioned)
}

/// Resolves the pdfium library location.
#[derive(Debug, Clone)]
pub struct Locator {
    explicit: Option<PathBuf>,
    cache_dir: PathBuf,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new()
    }
}

impl Locator {
    pub fn new() -> Self {
        Self {
            explicit: None,
            cache_dir: default_cache_dir(),
        }
    }

    /// Use this library file instead of searching.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Find a library without network access.
    ///
    /// Returns `Ok(None)` when nothing is available locally. An explicit path
    /// that does not exist is an error; a stale `PDFIUM_LIB_PATH` is skipped.
    pub fn find_local(&self) -> Result<Option<LibraryLocation>, LocatorError> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                return Err(LocatorError::NotFound(path.clone()));
            }
            return Ok(Some(LibraryLocation {
                path: path.clone(),
                source: LibrarySource::Explicit,
            }));
        }

        if let Ok(env_path) = std::env::var(LIB_PATH_ENV) {
            let path = PathBuf::from(env_path);
            if path.exists() {
                return Ok(Some(LibraryLocation {
                    path,
                    source: LibrarySource::Environment,
                }));
            }
        }

        let cached = self.cache_dir.join(current_platform()?.file_name);
        Ok(cached.exists().then_some(LibraryLocation {
            path: cached,
            source: LibrarySource::Cache,
        }))
    }

    /// Download the platform archive and unpack the library into the cache.
    pub fn download(
        &self,
        on_progress: Option<DownloadProgress<'_>>,
    ) -> Result<LibraryLocation, LocatorError> {
        let platform = current_platform()?;
        let url = format!(
            "{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}",
            platform.archive
        );

        std::fs::create_dir_all(&self.cache_dir).map_err(LocatorError::CacheDir)?;

        let archive = fetch(&url, on_progress)?;
        let dest = self.cache_dir.join(platform.file_name);
        unpack_member(&archive, platform.member, &dest)?;

        Ok(LibraryLocation {
            path: dest,
            source: LibrarySource::Download,
        })
    }
}

fn fetch(url: &str, on_progress: Option<DownloadProgress<'_>>) -> Result<Vec<u8>, LocatorError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-locator/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| LocatorError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| LocatorError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(LocatorError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = [0u8; 64 * 1024];

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                body.extend_from_slice(&chunk[..n]);
                if let Some(cb) = on_progress {
                    cb(body.len() as u64, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LocatorError::Download(format!("read error: {e}"))),
        }
    }

    Ok(body)
}

/// Copy one member of a `.tgz` archive to `dest`.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), LocatorError> {
    let mut tarball = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let extract = |e: std::io::Error| LocatorError::Extract(e.to_string());

    for entry in tarball.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        let is_member = entry.path().map_err(extract)?.to_string_lossy() == member;
        if is_member {
            entry.unpack(dest).map_err(extract)?;
            return Ok(());
        }
    }

    Err(LocatorError::Extract(format!("'{member}' not found in archive")))
}
