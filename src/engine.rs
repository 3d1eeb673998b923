//! Process-wide PDFium engine, loaded lazily and exactly once.
//!
//! ## Why a singleton?
//!
//! Binding PDFium means locating a shared library, possibly downloading it,
//! and loading it into the process. Doing that once per document would cost
//! hundreds of milliseconds per run; doing it twice concurrently would load
//! the library twice. [`acquire_engine`] funnels every caller through one
//! [`EngineCell`], so concurrent callers during initialisation wait on the
//! same in-flight load and all of them observe the same outcome.
//!
//! ## Why cache failures?
//!
//! A host without a usable PDFium will not grow one mid-process. The first
//! outcome, success or failure, is kept for the lifetime of the process; a
//! failed run is resubmitted after fixing the environment and restarting.
//!
//! ## Why spawn_blocking?
//!
//! Library lookup, download and `dlopen` are blocking I/O. They run on the
//! blocking pool so Tokio worker threads keep serving other tasks.

use crate::error::RasterError;
use once_cell::sync::Lazy;
use pdfium_locator::{LibraryLocation, Locator, LocatorError};
use pdfium_render::prelude::*;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

// ── Coalescing cell ──────────────────────────────────────────────────────

/// A lazily initialised, shared `Arc<T>` whose initialisation runs at most
/// once, even under concurrent callers.
///
/// The outcome of the first initialisation (including an error) is returned
/// to every caller, then and later.
pub struct EngineCell<T> {
    cell: OnceCell<Result<Arc<T>, RasterError>>,
    inits: AtomicUsize,
}

impl<T> EngineCell<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            inits: AtomicUsize::new(0),
        }
    }

    /// Return the shared value, running `init` if no caller has yet.
    ///
    /// Callers arriving while `init` is in flight wait for it instead of
    /// starting their own.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>, RasterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RasterError>>,
    {
        self.cell
            .get_or_init(|| async {
                self.inits.fetch_add(1, Ordering::SeqCst);
                init().await.map(Arc::new)
            })
            .await
            .clone()
    }

    /// The cached outcome, if initialisation has finished.
    pub fn get(&self) -> Option<Result<Arc<T>, RasterError>> {
        self.cell.get().cloned()
    }

    /// How many initialisations have started. Never exceeds 1 once the
    /// first one completes.
    pub fn initializations(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

impl<T> Default for EngineCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Engine ───────────────────────────────────────────────────────────────

/// How the engine should find the PDFium library.
///
/// Only the options of the first [`acquire_engine`] call take effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Explicit library file, or a directory containing it.
    pub library_path: Option<PathBuf>,
    /// Cache directory for downloaded libraries.
    pub cache_dir: Option<PathBuf>,
    /// Download PDFium when no local copy is found.
    pub allow_download: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            library_path: None,
            cache_dir: None,
            allow_download: true,
        }
    }
}

impl EngineOptions {
    fn locator(&self) -> Locator {
        let mut locator = Locator::new();
        if let Some(path) = &self.library_path {
            locator = locator.with_library_path(path);
        }
        if let Some(dir) = &self.cache_dir {
            locator = locator.with_cache_dir(dir);
        }
        locator
    }
}

/// A bound PDFium instance shared by every rasterisation in the process.
pub struct RasterEngine {
    pdfium: Pdfium,
    /// `None` when the system library was used.
    library: Option<LibraryLocation>,
}

impl RasterEngine {
    pub fn pdfium(&self) -> &Pdfium {
        &self.pdfium
    }

    /// Where the bound library was found.
    pub fn library(&self) -> Option<&LibraryLocation> {
        self.library.as_ref()
    }

    /// Blocking load: local lookup, then system library, then download.
    fn load(options: &EngineOptions) -> Result<Self, RasterError> {
        let locator = options.locator();

        let local = match locator.find_local() {
            Ok(found) => found,
            Err(e @ LocatorError::NotFound(_)) => {
                return Err(RasterError::UnsupportedEnvironment(e.to_string()))
            }
            Err(e) => {
                warn!("PDFium lookup failed: {}", e);
                None
            }
        };

        if let Some(location) = local {
            let pdfium = bind_at(&location.path)?;
            info!("PDFium bound from {} ({})", location.path.display(), location.source);
            return Ok(Self {
                pdfium,
                library: Some(location),
            });
        }

        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                info!("PDFium bound from system library");
                return Ok(Self {
                    pdfium: Pdfium::new(bindings),
                    library: None,
                });
            }
            Err(e) => debug!("No system PDFium: {:?}", e),
        }

        if !options.allow_download {
            return Err(RasterError::UnsupportedEnvironment(
                "no PDFium library found and downloads are disabled".into(),
            ));
        }

        info!(
            "Downloading PDFium into {}",
            locator.cache_dir().display()
        );
        let location = locator
            .download(None)
            .map_err(|e| RasterError::UnsupportedEnvironment(e.to_string()))?;
        let pdfium = bind_at(&location.path)?;
        info!("PDFium bound from {} ({})", location.path.display(), location.source);
        Ok(Self {
            pdfium,
            library: Some(location),
        })
    }
}

impl fmt::Debug for RasterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterEngine")
            .field("library", &self.library)
            .finish()
    }
}

fn bind_at(path: &Path) -> Result<Pdfium, RasterError> {
    let file = if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    };
    Pdfium::bind_to_library(&file)
        .map(Pdfium::new)
        .map_err(|e| {
            RasterError::UnsupportedEnvironment(format!(
                "cannot bind PDFium at '{}': {:?}",
                file.display(),
                e
            ))
        })
}

static ENGINE: Lazy<EngineCell<RasterEngine>> = Lazy::new(EngineCell::new);

/// Get the process-wide engine, initialising it on first use.
///
/// Concurrent callers share one initialisation; every caller receives the
/// same `Arc` or the same error.
pub async fn acquire_engine(options: &EngineOptions) -> Result<Arc<RasterEngine>, RasterError> {
    ENGINE
        .get_or_init(|| {
            let options = options.clone();
            async move {
                tokio::task::spawn_blocking(move || RasterEngine::load(&options))
                    .await
                    .map_err(|e| RasterError::Internal(format!("Engine loader panicked: {}", e)))?
            }
        })
        .await
}
