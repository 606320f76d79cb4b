//! Eager (whole-document) transcription entry points.
//!
//! [`Transcriber`] owns the three collaborators of a run: the rasteriser,
//! the inference client and the config. [`Transcriber::transcribe`] waits
//! for every batch and returns the assembled [`Transcript`]; use
//! [`Transcriber::transcribe_stream`] to receive batches as they finish.
//!
//! The free functions at the bottom build a production `Transcriber` (pdfium,
//! software canvas, reqwest) from a config and credentials.

use crate::config::{AzureCredentials, TranscriptionConfig};
use crate::error::Pdf2TextError;
use crate::output::{DocumentInfo, Transcript, TranscriptStats};
use crate::pipeline::batch::{self, Batch};
use crate::pipeline::canvas::SoftwareCanvasProvider;
use crate::pipeline::engine::PdfiumEngine;
use crate::pipeline::input;
use crate::pipeline::llm::{InferenceClient, ReqwestTransport};
use crate::pipeline::render::Rasterizer;
use crate::stream::{self, BatchStream};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Renders a PDF and transcribes its pages through a chat-completion model.
#[derive(Debug, Clone)]
pub struct Transcriber {
    rasterizer: Rasterizer,
    client: Arc<InferenceClient>,
    config: TranscriptionConfig,
}

/// Rendered, partitioned pages ready to send.
struct Plan {
    batches: Vec<Batch>,
    page_count: usize,
    render_duration_ms: u64,
}

impl Transcriber {
    pub fn new(rasterizer: Rasterizer, client: InferenceClient, config: TranscriptionConfig) -> Self {
        Self {
            rasterizer,
            client: Arc::new(client),
            config,
        }
    }

    /// Production wiring: pdfium (honouring `PDFIUM_LIB_PATH`), the software
    /// canvas, and a reqwest transport with the configured timeout.
    pub fn from_config(
        config: TranscriptionConfig,
        credentials: AzureCredentials,
    ) -> Result<Self, Pdf2TextError> {
        let rasterizer = Rasterizer::new(
            Arc::new(PdfiumEngine::from_env()),
            Arc::new(SoftwareCanvasProvider::default()),
        );
        let transport = ReqwestTransport::new(config.api_timeout_secs.map(Duration::from_secs))?;
        let client = InferenceClient::new(
            Arc::new(transport),
            credentials,
            &config.model,
            config.retry_policy(),
        )?;
        Ok(Self::new(rasterizer, client, config))
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    /// Transcribe raw PDF bytes.
    ///
    /// # Errors
    /// - [`Pdf2TextError::DocumentLoad`] / [`Pdf2TextError::Render`] from rendering
    /// - [`Pdf2TextError::EmptyDocument`] when the PDF has no pages (no request is sent)
    /// - [`Pdf2TextError::Inference`] for the first batch, in page order, that failed
    pub async fn transcribe(&self, document: &[u8]) -> Result<Transcript, Pdf2TextError> {
        let total_start = Instant::now();
        let plan = self.plan(document).await?;

        let llm_start = Instant::now();
        let mut stats = TranscriptStats {
            render_duration_ms: plan.render_duration_ms,
            ..TranscriptStats::default()
        };
        let mut fragments = Vec::with_capacity(plan.batches.len());

        let mut batches =
            stream::batch_stream(Arc::clone(&self.client), plan.batches, &self.config);
        while let Some(result) = batches.next().await {
            let batch = result?;
            stats.record(&batch);
            fragments.push(batch.text);
        }

        let text = fragments.join("\n\n").trim().to_string();
        stats.inference_duration_ms = llm_start.elapsed().as_millis() as u64;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Transcription complete: {} pages, {} batches, {} requests, {}ms total",
            plan.page_count, stats.batches, stats.requests, stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_transcription_complete(plan.page_count, text.len());
        }

        Ok(Transcript {
            text,
            page_count: plan.page_count,
            stats,
        })
    }

    /// Decode a base64 document, then [`Self::transcribe`] it.
    pub async fn transcribe_base64(&self, encoded: &str) -> Result<Transcript, Pdf2TextError> {
        let bytes = input::decode_base64_document(encoded)?;
        self.transcribe(&bytes).await
    }

    /// Transcribe and write the text to `output_path`.
    ///
    /// The text goes to a temporary file in the destination directory which
    /// is then renamed into place, so readers never see a partial file.
    pub async fn transcribe_to_file(
        &self,
        document: &[u8],
        output_path: impl AsRef<Path>,
    ) -> Result<Transcript, Pdf2TextError> {
        let transcript = self.transcribe(document).await?;
        write_atomically(output_path.as_ref(), &transcript.text).await?;
        Ok(transcript)
    }

    /// Render and partition `document`, then return the ordered batch stream.
    pub async fn transcribe_stream(&self, document: &[u8]) -> Result<BatchStream, Pdf2TextError> {
        let plan = self.plan(document).await?;
        Ok(stream::batch_stream(
            Arc::clone(&self.client),
            plan.batches,
            &self.config,
        ))
    }

    /// Page count and sizes. Sends no requests.
    pub async fn inspect(&self, document: &[u8]) -> Result<DocumentInfo, Pdf2TextError> {
        let rasterizer = self.rasterizer.clone();
        let document = document.to_vec();
        let password = self.config.password.clone();
        tokio::task::spawn_blocking(move || rasterizer.inspect(&document, password.as_deref()))
            .await
            .map_err(|e| Pdf2TextError::Internal(format!("Inspect task panicked: {}", e)))?
    }

    async fn plan(&self, document: &[u8]) -> Result<Plan, Pdf2TextError> {
        let render_start = Instant::now();
        let pages = self
            .rasterizer
            .render_pages(document.to_vec(), self.config.scale, self.config.password.clone())
            .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        if pages.is_empty() {
            return Err(Pdf2TextError::EmptyDocument);
        }
        let page_count = pages.len();
        info!("Rendered {} pages in {}ms", page_count, render_duration_ms);

        let batches = batch::partition(pages, self.config.batch_limit)?;
        debug!(
            "Planned {} batch(es) of up to {} page(s), {:?} mode",
            batches.len(),
            self.config.batch_limit,
            self.config.request_mode
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_transcription_start(page_count, batches.len());
        }

        Ok(Plan {
            batches,
            page_count,
            render_duration_ms,
        })
    }
}

async fn write_atomically(path: &Path, text: &str) -> Result<(), Pdf2TextError> {
    let write_err = |source: std::io::Error| Pdf2TextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;

    let path = path.to_path_buf();
    let text = text.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok::<_, std::io::Error>(())
    })
    .await
    .map_err(|e| Pdf2TextError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(write_err)
}

// ── Convenience functions ────────────────────────────────────────────────

/// Transcribe PDF bytes with the production pipeline.
///
/// # Example
/// ```rust,no_run
/// use pdf2text::{transcribe, AzureCredentials, TranscriptionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("invoice.pdf")?;
/// let config = TranscriptionConfig::builder().model("gpt-4o").build()?;
/// let transcript = transcribe(&bytes, &config, AzureCredentials::from_env()?).await?;
/// println!("{}", transcript.text);
/// # Ok(())
/// # }
/// ```
pub async fn transcribe(
    document: &[u8],
    config: &TranscriptionConfig,
    credentials: AzureCredentials,
) -> Result<Transcript, Pdf2TextError> {
    Transcriber::from_config(config.clone(), credentials)?
        .transcribe(document)
        .await
}

/// [`transcribe`] for a base64-encoded document.
pub async fn transcribe_base64(
    encoded: &str,
    config: &TranscriptionConfig,
    credentials: AzureCredentials,
) -> Result<Transcript, Pdf2TextError> {
    Transcriber::from_config(config.clone(), credentials)?
        .transcribe_base64(encoded)
        .await
}

/// [`transcribe`] and write the text to `output_path` atomically.
pub async fn transcribe_to_file(
    document: &[u8],
    output_path: impl AsRef<Path>,
    config: &TranscriptionConfig,
    credentials: AzureCredentials,
) -> Result<Transcript, Pdf2TextError> {
    Transcriber::from_config(config.clone(), credentials)?
        .transcribe_to_file(document, output_path)
        .await
}

/// Synchronous wrapper around [`transcribe`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn transcribe_sync(
    document: &[u8],
    config: &TranscriptionConfig,
    credentials: AzureCredentials,
) -> Result<Transcript, Pdf2TextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(document, config, credentials))
}

/// Page count and sizes via pdfium. Needs no credentials.
pub async fn inspect(document: &[u8], password: Option<&str>) -> Result<DocumentInfo, Pdf2TextError> {
    let rasterizer = Rasterizer::new(
        Arc::new(PdfiumEngine::from_env()),
        Arc::new(SoftwareCanvasProvider::default()),
    );
    let document = document.to_vec();
    let password = password.map(str::to_owned);
    tokio::task::spawn_blocking(move || rasterizer.inspect(&document, password.as_deref()))
        .await
        .map_err(|e| Pdf2TextError::Internal(format!("Inspect task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        write_atomically(&path, "hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();
        write_atomically(&path, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        // No stray temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn write_into_a_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_atomically(&blocker.join("out.txt"), "x").await.unwrap_err();
        assert!(matches!(err, Pdf2TextError::OutputWriteFailed { .. }), "{err:?}");
    }
}
