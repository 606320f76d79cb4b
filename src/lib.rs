//! # pdf2text
//!
//! Transcribe PDF documents to plain text with a multimodal chat-completion
//! model.
//!
//! Each page is rasterised to a PNG, the images are grouped into batches,
//! and every batch is sent to an Azure-OpenAI style deployment with a fixed
//! system instruction. The model's replies are stitched back together in
//! page order. Scanned pages, tables and figures come through as text
//! because the model reads the page the way a person would.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (bytes or base64)
//!  │
//!  ├─ 1. Input   decode base64, check the %PDF header
//!  ├─ 2. Render  draw pages onto scoped canvases (pdfium, spawn_blocking)
//!  ├─ 3. Encode  PNG → data:image/png;base64 URL
//!  ├─ 4. Batch   contiguous groups of `batch_limit` pages
//!  ├─ 5. Infer   chat completions with retry/backoff, bounded concurrency
//!  └─ 6. Output  fragments joined in page order + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2text::{transcribe, AzureCredentials, TranscriptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // AZURE_OPENAI_ENDPOINT / AZURE_OPENAI_API_KEY / AZURE_OPENAI_API_VERSION
//!     let credentials = AzureCredentials::from_env()?;
//!     let config = TranscriptionConfig::builder().model("gpt-4o").build()?;
//!     let bytes = std::fs::read("document.pdf")?;
//!     let transcript = transcribe(&bytes, &config, credentials).await?;
//!     println!("{}", transcript.text);
//!     eprintln!("{} pages, {} requests", transcript.page_count, transcript.stats.requests);
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without pdfium or a network
//!
//! [`Transcriber::new`] takes its collaborators explicitly: any
//! [`pipeline::engine::DocumentEngine`], any
//! [`pipeline::canvas::CanvasProvider`] and any [`pipeline::llm::Transport`].
//! The integration tests use a fake engine and a scripted transport.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2text` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! pdf2text = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod stream;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AzureCredentials, RequestMode, TranscriptionConfig, TranscriptionConfigBuilder};
pub use error::{CanvasError, InferenceError, Pdf2TextError};
pub use output::{BatchTranscript, DocumentInfo, Transcript, TranscriptStats};
pub use pipeline::render::{PageImage, Rasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use retry::RetryPolicy;
pub use stream::{transcribe_stream, BatchStream};
pub use transcribe::{
    inspect, transcribe, transcribe_base64, transcribe_sync, transcribe_to_file, Transcriber,
};
