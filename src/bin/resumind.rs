//! CLI binary for resumind.
//!
//! A thin shim over the library crate: maps flags to `AnalyzerConfig`, runs
//! one command, and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resumind::model::{FIELD_COMPANY_NAME, FIELD_JOB_DESCRIPTION, FIELD_JOB_TITLE};
use resumind::{
    acquire_engine, load_document, load_record, AnalysisRecord, AnalysisRequest, Analyzer,
    AnalyzerConfig, FileKv, NoopStatus, PdfiumRasterizer, PipelineState, Rasterizer, RunOutcome,
    StatusObserver,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &str, message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix.to_string());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── CLI status observer using indicatif ──────────────────────────────────────

/// Shows the current stage on a spinner and prints one line per finished
/// stage.
struct SpinnerStatus {
    bar: ProgressBar,
    /// Status text and start time of the stage in progress.
    current: Mutex<Option<(String, Instant)>>,
}

impl SpinnerStatus {
    fn new() -> Self {
        Self {
            bar: spinner("Analyzing", "Starting…"),
            current: Mutex::new(None),
        }
    }

    fn close_stage(&self, ok: bool) {
        let finished = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some((text, started)) = finished {
            let mark = if ok { green("✓") } else { red("✗") };
            self.bar.println(format!(
                "  {} {:<28} {}",
                mark,
                text.trim_end_matches("..."),
                dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
            ));
        }
    }
}

impl StatusObserver for SpinnerStatus {
    fn on_state(&self, state: &PipelineState) {
        match state {
            PipelineState::Done => {
                self.close_stage(true);
                self.bar.finish_and_clear();
            }
            PipelineState::Failed(_) => {
                self.close_stage(false);
                self.bar.finish_and_clear();
            }
            _ => self.close_stage(true),
        }
    }

    fn on_status(&self, text: &str) {
        if let Ok(mut current) = self.current.lock() {
            if current.is_none() {
                *current = Some((text.to_string(), Instant::now()));
            }
        }
        self.bar.set_message(text.to_string());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a resume against a job
  resumind analyze cv.pdf --company-name Acme --job-title "Backend Engineer" \
      --job-description "Rust, Postgres, Kubernetes"

  # Read the job description from a file, print the raw record as JSON
  resumind analyze cv.pdf --company-name Acme --job-title SRE \
      --job-description-file job.txt --json

  # Show a stored analysis
  resumind show 1b4e28ba-2fa1-41d2-883f-0016d3cca427

  # Render page 1 only (no API key needed)
  resumind render cv.pdf -o resume.png

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips the download
  PDFIUM_CACHE_DIR        Override the pdfium cache directory

DATA LAYOUT:
  <data-dir>/storage/     uploaded resumes and rendered images
  <data-dir>/kv/          analysis records (resume_<id>.json)
"#;

/// Analyze resumes against a job with vision and text LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "resumind",
    version,
    about = "Analyze resumes against a job description with AI feedback",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for stored files and analysis records.
    #[arg(long, global = true, env = "RESUMIND_DATA_DIR", default_value = "resumind-data")]
    data_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Render scale applied to the page size in points (1–8).
    #[arg(long, global = true, env = "RESUMIND_SCALE", default_value_t = 4.0)]
    scale: f32,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, global = true, env = "RESUMIND_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Never download pdfium; fail if no local copy is found.
    #[arg(long, global = true, env = "RESUMIND_NO_DOWNLOAD")]
    no_download: bool,

    /// Max LLM output tokens per call.
    #[arg(long, global = true, env = "RESUMIND_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "RESUMIND_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "RESUMIND_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "RESUMIND_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUMIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "RESUMIND_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline on a resume.
    Analyze(AnalyzeArgs),

    /// Print a stored analysis.
    Show {
        /// Analysis id (the <id> in /resume/<id>).
        id: String,

        /// Print the raw record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render page 1 of a resume to PNG.
    Render {
        /// Local PDF path or HTTP/HTTPS URL.
        input: String,

        /// Where to write the PNG.
        #[arg(short, long, default_value = "resume.png")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF path or HTTP/HTTPS URL.
    input: String,

    #[arg(long, env = "RESUMIND_COMPANY_NAME")]
    company_name: String,

    #[arg(long, env = "RESUMIND_JOB_TITLE")]
    job_title: String,

    #[arg(long, env = "RESUMIND_JOB_DESCRIPTION", conflicts_with = "job_description_file")]
    job_description: Option<String>,

    /// Read the job description from a text file.
    #[arg(long)]
    job_description_file: Option<PathBuf>,

    /// Print the stored record as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs stay quiet while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match &cli.command {
        Command::Analyze(args) => run_analyze(&cli, &config, args, show_progress).await,
        Command::Show { id, json } => run_show(&config, id, *json).await,
        Command::Render { input, output } => {
            run_render(&cli, &config, input, output, show_progress).await
        }
    }
}

/// Map CLI args to `AnalyzerConfig`.
fn build_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .data_dir(&cli.data_dir)
        .render_scale(cli.scale)
        .allow_library_download(!cli.no_download)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }

    builder.build().context("Invalid configuration")
}

/// Load the PDF engine up front so a first-run download gets its own spinner.
async fn warm_engine(config: &AnalyzerConfig, show_progress: bool) -> Result<()> {
    let bar = show_progress.then(|| spinner("PDF engine", "Loading…"));

    let engine = acquire_engine(&config.engine_options())
        .await
        .context("PDF engine unavailable")?;

    if let Some(bar) = bar {
        let source = engine
            .library()
            .map(|l| l.source.to_string())
            .unwrap_or_else(|| "system library".to_string());
        bar.finish_with_message(format!("ready ({source})"));
    }
    Ok(())
}

async fn run_analyze(
    cli: &Cli,
    config: &AnalyzerConfig,
    args: &AnalyzeArgs,
    show_progress: bool,
) -> Result<()> {
    let document = load_document(&args.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load resume from {}", args.input))?;

    let job_description = match (&args.job_description, &args.job_description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path))?,
        (None, None) => bail!("Provide --job-description or --job-description-file"),
    };

    let analyzer = Analyzer::from_config(config)
        .await
        .context("Failed to set up the analyzer")?;
    warm_engine(config, show_progress).await?;

    let request = AnalysisRequest::default()
        .field(FIELD_COMPANY_NAME, args.company_name.clone())
        .field(FIELD_JOB_TITLE, args.job_title.clone())
        .field(FIELD_JOB_DESCRIPTION, job_description)
        .file(document);

    let spinner_status;
    let noop = NoopStatus;
    let observer: &dyn StatusObserver = if show_progress {
        spinner_status = SpinnerStatus::new();
        &spinner_status
    } else {
        &noop
    };

    let started = Instant::now();
    let report = analyzer
        .submit(request, observer)
        .await
        .context("Submission rejected")?;

    match report.outcome {
        RunOutcome::Completed { record, route } => {
            if args.json {
                print_json(&record)?;
            } else {
                print_record(&record);
            }
            if !cli.quiet {
                eprintln!(
                    "{} {}  {}  →  {}",
                    green("✔"),
                    report.status,
                    dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
                    bold(route.as_str()),
                );
            }
            Ok(())
        }
        RunOutcome::Failed { stage, failure } => {
            eprintln!("{} {}", red("✘"), bold(&report.status));
            Err(anyhow::Error::new(failure).context(format!("Analysis failed while {stage}")))
        }
    }
}

async fn run_show(config: &AnalyzerConfig, id: &str, json: bool) -> Result<()> {
    let kv = FileKv::new(config.kv_dir());
    let record = load_record(&kv, id)
        .await
        .with_context(|| format!("Failed to load analysis {id}"))?;

    if json {
        print_json(&record)
    } else {
        print_record(&record);
        Ok(())
    }
}

async fn run_render(
    cli: &Cli,
    config: &AnalyzerConfig,
    input: &str,
    output: &Path,
    show_progress: bool,
) -> Result<()> {
    let document = load_document(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load resume from {input}"))?;

    warm_engine(config, show_progress).await?;

    let rasterizer =
        PdfiumRasterizer::new(config.engine_options()).with_scale(config.render_scale);
    let image = rasterizer
        .rasterize(&document.bytes)
        .await
        .context("Failed to render page 1")?;

    tokio::fs::write(output, &image.artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", output))?;

    if !cli.quiet {
        eprintln!(
            "{} {}x{} px  {}  →  {}",
            green("✔"),
            image.width,
            image.height,
            dim(&format!("{} bytes", image.artifact.len())),
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

fn print_json(record: &AnalysisRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
    println!("{json}");
    Ok(())
}

fn print_record(record: &AnalysisRecord) {
    println!("{}  {}", bold("Analysis"), record.id);
    println!("Company:      {}", record.company_name);
    println!("Job title:    {}", record.job_title);
    println!("Resume:       {}", record.resume_path);
    println!("Image:        {}", record.image_path);

    if let Some(score) = record.feedback.get("overallScore") {
        println!("Overall:      {}", cyan(&score.to_string()));
    }

    for (key, label) in [
        ("ATS", "ATS"),
        ("toneAndStyle", "Tone & style"),
        ("content", "Content"),
        ("structure", "Structure"),
        ("skills", "Skills"),
    ] {
        let Some(section) = record.feedback.get(key) else {
            continue;
        };
        let score = section
            .get("score")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("\n{} {}", bold(label), dim(&format!("({score})")));

        let tips = section.get("tips").and_then(|t| t.as_array());
        for tip in tips.into_iter().flatten() {
            let text = tip.get("tip").and_then(|t| t.as_str()).unwrap_or_default();
            let mark = match tip.get("type").and_then(|t| t.as_str()) {
                Some("good") => green("+"),
                _ => red("-"),
            };
            println!("  {} {}", mark, text);
        }
    }
}
