//! Configuration for an analysis pipeline.
//!
//! Every knob lives in [`AnalyzerConfig`], built via
//! [`AnalyzerConfigBuilder`]. The config feeds three consumers:
//!
//! * the engine loader ([`AnalyzerConfig::engine_options`]),
//! * the rasteriser (`render_scale`),
//! * the local capabilities (`data_dir`, provider, prompts).
//!
//! # Design choice: builder over constructor
//! Most callers set one or two fields and rely on the defaults for the rest.

use crate::engine::EngineOptions;
use crate::error::ResumindError;
use crate::pipeline::render::RENDER_SCALE;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an [`crate::Analyzer`] and its local collaborators.
///
/// # Example
/// ```rust
/// use resumind::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .data_dir("/tmp/resumind")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 4.0);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Scale applied to the first page's point size. Range: 1–8. Default: 4.0.
    ///
    /// A US Letter page (612×792 pt) renders to 2448×3168 px at 4×, which keeps
    /// small resume fonts legible for OCR.
    pub render_scale: f32,

    /// Explicit path to the pdfium shared library (file or directory).
    pub pdfium_lib_path: Option<PathBuf>,

    /// Where a downloaded pdfium library is cached.
    /// If None, uses the platform cache directory.
    pub pdfium_cache_dir: Option<PathBuf>,

    /// Fetch pdfium when it cannot be found locally. Default: true.
    pub allow_library_download: bool,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 4096.
    pub max_tokens: usize,

    /// Custom OCR system prompt. If None, uses the built-in one.
    pub ocr_prompt: Option<String>,

    /// Custom feedback system prompt. If None, uses the built-in one.
    pub feedback_prompt: Option<String>,

    /// Root for local storage (`storage/`) and records (`kv/`). Default: `./resumind-data`.
    pub data_dir: PathBuf,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            render_scale: RENDER_SCALE,
            pdfium_lib_path: None,
            pdfium_cache_dir: None,
            allow_library_download: true,
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            ocr_prompt: None,
            feedback_prompt: None,
            data_dir: PathBuf::from("resumind-data"),
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("render_scale", &self.render_scale)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("pdfium_cache_dir", &self.pdfium_cache_dir)
            .field("allow_library_download", &self.allow_library_download)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("data_dir", &self.data_dir)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Options handed to the engine loader.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            library_path: self.pdfium_lib_path.clone(),
            cache_dir: self.pdfium_cache_dir.clone(),
            allow_download: self.allow_library_download,
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    pub fn kv_dir(&self) -> PathBuf {
        self.data_dir.join("kv")
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 8.0);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn pdfium_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_cache_dir = Some(path.into());
        self
    }

    pub fn allow_library_download(mut self, v: bool) -> Self {
        self.config.allow_library_download = v;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn ocr_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.ocr_prompt = Some(prompt.into());
        self
    }

    pub fn feedback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.feedback_prompt = Some(prompt.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, ResumindError> {
        let c = &self.config;
        if !(1.0..=8.0).contains(&c.render_scale) {
            return Err(ResumindError::InvalidConfig(format!(
                "Render scale must be 1–8, got {}",
                c.render_scale
            )));
        }
        if c.max_tokens == 0 {
            return Err(ResumindError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.data_dir.as_os_str().is_empty() {
            return Err(ResumindError::InvalidConfig(
                "data_dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
