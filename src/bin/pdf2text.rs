//! CLI binary for pdf2text.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `TranscriptionConfig` and `AzureCredentials` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2text::config::DEFAULT_API_VERSION;
use pdf2text::pipeline::input;
use pdf2text::{
    inspect, AzureCredentials, ProgressCallback, RequestMode, Transcriber, TranscriptionConfig,
    TranscriptionProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar counting pages, with one log line per finished batch.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_transcription_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, batch: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&batch))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_transcription_start(&self, total_pages: usize, total_batches: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Transcribing {total_pages} pages in {total_batches} batch(es)…"
            ))
        ));
    }

    fn on_batch_start(&self, batch: usize, first_page: usize, last_page: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(batch, Instant::now());
        }
        self.bar.set_message(format!("pages {first_page}-{last_page}"));
    }

    fn on_batch_complete(&self, batch: usize, first_page: usize, last_page: usize, text_len: usize) {
        let secs = self.elapsed_secs(batch);
        self.bar.println(format!(
            "  {} Batch {:>3}  pages {:>3}-{:<3}  {:<8}  {}",
            green("✓"),
            batch,
            first_page,
            last_page,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc((last_page + 1 - first_page) as u64);
    }

    fn on_batch_error(&self, batch: usize, error: &str) {
        let secs = self.elapsed_secs(batch);
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} Batch {:>3}  {}  {}",
            red("✗"),
            batch,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_transcription_complete(&self, total_pages: usize, _text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages transcribed",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe to stdout
  pdf2text --model gpt-4o document.pdf

  # Transcribe to a file, four pages per batch, one request per batch
  pdf2text --model gpt-4o --batch-limit 4 --mode multi-image scan.pdf -o scan.txt

  # Input file holds base64 text instead of raw PDF bytes
  pdf2text --model gpt-4o --base64 payload.b64

  # Page count and sizes (no credentials needed)
  pdf2text --inspect-only document.pdf

  # JSON output with stats
  pdf2text --model gpt-4o --json document.pdf > transcript.json

ENVIRONMENT VARIABLES:
  AZURE_OPENAI_ENDPOINT     Endpoint base URL, e.g. https://my-res.openai.azure.com
  AZURE_OPENAI_API_KEY      API key sent in the `api-key` header
  AZURE_OPENAI_API_VERSION  api-version query parameter (default 2024-02-15-preview)
  AZURE_OPENAI_DEPLOYMENT   Deployment (model) name
  PDFIUM_LIB_PATH           Path to libpdfium, or the directory containing it
"#;

/// Transcribe PDF documents to text with a multimodal chat-completion model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2text",
    version,
    about = "Transcribe PDF documents to text with a multimodal chat-completion model",
    long_about = "Rasterise every page of a PDF, send the page images in batches to an \
Azure-OpenAI style chat-completion deployment, and print the transcribed text in page order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to transcribe (or base64 text with --base64).
    input: PathBuf,

    /// Write the transcript to this file instead of stdout.
    #[arg(short, long, env = "PDF2TEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Treat the input file as base64-encoded PDF text.
    #[arg(long)]
    base64: bool,

    /// Deployment (model) name.
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    model: Option<String>,

    /// Endpoint base URL.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    endpoint: Option<String>,

    /// API key.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// api-version query parameter.
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Render scale relative to 72 DPI (0.5–3.0).
    #[arg(long, env = "PDF2TEXT_SCALE", default_value_t = 1.6)]
    scale: f32,

    /// Pages per batch.
    #[arg(long, env = "PDF2TEXT_BATCH_LIMIT", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    batch_limit: u64,

    /// How a batch is sent: one request per page or one request per batch.
    #[arg(long, env = "PDF2TEXT_MODE", value_enum, default_value = "per-image")]
    mode: ModeArg,

    /// Batch requests in flight in multi-image mode.
    #[arg(short, long, env = "PDF2TEXT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2TEXT_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max output tokens per request (omitted from the request when unset).
    #[arg(long, env = "PDF2TEXT_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Attempts per request, including the first.
    #[arg(long, env = "PDF2TEXT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles each retry.
    #[arg(long, env = "PDF2TEXT_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "PDF2TEXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TEXT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "PDF2TEXT_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Output structured JSON (Transcript) instead of plain text.
    #[arg(long, env = "PDF2TEXT_JSON")]
    json: bool,

    /// Print page count and sizes only, no transcription.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PerImage,
    MultiImage,
}

impl From<ModeArg> for RequestMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::PerImage => RequestMode::PerImage,
            ModeArg::MultiImage => RequestMode::MultiImage,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let document = input::read_document(&cli.input, cli.base64)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&document, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:   {}", cli.input.display());
            println!("Pages:  {}", info.page_count);
            for (i, size) in info.pages.iter().enumerate() {
                println!(
                    "  {:>4}  {:.0} x {:.0} pt  →  {} x {} px at scale {}",
                    i + 1,
                    size.width,
                    size.height,
                    (size.width * cli.scale).floor().max(1.0),
                    (size.height * cli.scale).floor().max(1.0),
                    cli.scale
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as ProgressCallback)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let credentials = build_credentials(&cli)?;

    let transcriber =
        Transcriber::from_config(config, credentials).context("Failed to set up transcriber")?;

    // ── Run transcription ────────────────────────────────────────────────
    let transcript = match cli.output {
        Some(ref output_path) => transcriber
            .transcribe_to_file(&document, output_path)
            .await
            .context("Transcription failed")?,
        None => transcriber
            .transcribe(&document)
            .await
            .context("Transcription failed")?,
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&transcript).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(transcript.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !transcript.text.ends_with('\n') {
            handle.write_all(b"\n").context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet && !cli.json {
        let stats = &transcript.stats;
        eprintln!(
            "   {} pages  {} requests  {} tokens in  /  {} tokens out  {}ms total{}",
            transcript.page_count,
            stats.requests,
            dim(&stats.prompt_tokens.to_string()),
            dim(&stats.completion_tokens.to_string()),
            stats.total_duration_ms,
            cli.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

/// Map CLI args to `TranscriptionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<TranscriptionConfig> {
    let model = cli
        .model
        .clone()
        .context("No deployment given: pass --model or set AZURE_OPENAI_DEPLOYMENT")?;

    let mut builder = TranscriptionConfig::builder()
        .model(model)
        .scale(cli.scale)
        .batch_limit(usize::try_from(cli.batch_limit).context("--batch-limit is too large")?)
        .request_mode(cli.mode.into())
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_credentials(cli: &Cli) -> Result<AzureCredentials> {
    let endpoint = cli
        .endpoint
        .clone()
        .context("No endpoint given: pass --endpoint or set AZURE_OPENAI_ENDPOINT")?;
    let api_key = cli
        .api_key
        .clone()
        .context("No API key given: pass --api-key or set AZURE_OPENAI_API_KEY")?;
    Ok(AzureCredentials::new(endpoint, api_key, cli.api_version.clone()))
}
