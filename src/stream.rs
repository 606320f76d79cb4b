//! Streaming transcription API: emit batches as they are answered.
//!
//! Large documents take minutes. A stream lets callers show partial text,
//! drive a progress bar, or append to a file while later batches are still
//! in flight.
//!
//! Batches are always yielded in document order. `MultiImage` mode uses
//! `buffered` rather than `buffer_unordered`, so a fast batch 3 waits behind
//! a slow batch 2. The stream ends after the first error.

use crate::config::{AzureCredentials, RequestMode, TranscriptionConfig};
use crate::error::{InferenceError, Pdf2TextError};
use crate::output::BatchTranscript;
use crate::pipeline::batch::Batch;
use crate::pipeline::llm::{Completion, InferenceClient, InferenceRequest};
use crate::progress::ProgressCallback;
use crate::transcribe::Transcriber;
use futures::future::{self, join_all};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed, ordered stream of batch results.
pub type BatchStream = Pin<Box<dyn Stream<Item = Result<BatchTranscript, Pdf2TextError>> + Send>>;

/// Render `document` and stream its batches as they are transcribed.
///
/// Rendering happens before this returns, so a malformed or empty document
/// is reported here rather than as a stream item.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdf2text::{transcribe_stream, AzureCredentials, TranscriptionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("document.pdf")?;
/// let config = TranscriptionConfig::builder().model("gpt-4o").build()?;
/// let mut batches = transcribe_stream(&bytes, &config, AzureCredentials::from_env()?).await?;
/// while let Some(batch) = batches.next().await {
///     let batch = batch?;
///     println!("pages {}-{}:\n{}", batch.first_page, batch.last_page, batch.text);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn transcribe_stream(
    document: &[u8],
    config: &TranscriptionConfig,
    credentials: AzureCredentials,
) -> Result<BatchStream, Pdf2TextError> {
    Transcriber::from_config(config.clone(), credentials)?
        .transcribe_stream(document)
        .await
}

/// Request settings shared by every batch future.
#[derive(Clone)]
struct RequestSettings {
    system_instruction: Arc<str>,
    temperature: f32,
    max_tokens: Option<usize>,
    mode: RequestMode,
    callback: Option<ProgressCallback>,
}

/// Build the ordered stream over already-partitioned batches.
pub(crate) fn batch_stream(
    client: Arc<InferenceClient>,
    batches: Vec<Batch>,
    config: &TranscriptionConfig,
) -> BatchStream {
    let settings = RequestSettings {
        system_instruction: Arc::from(config.system_instruction()),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        mode: config.request_mode,
        callback: config.progress_callback.clone(),
    };
    let callback = settings.callback.clone();

    let results: BatchStream = match config.request_mode {
        RequestMode::PerImage => {
            // One batch at a time; its pages go out together.
            let s = stream::iter(batches).then(move |batch| {
                let client = Arc::clone(&client);
                let settings = settings.clone();
                async move { run_batch(&client, batch, &settings).await }
            });
            Box::pin(s)
        }
        RequestMode::MultiImage => {
            let concurrency = config.concurrency.max(1);
            let s = stream::iter(batches.into_iter().map(move |batch| {
                let client = Arc::clone(&client);
                let settings = settings.clone();
                async move { run_batch(&client, batch, &settings).await }
            }))
            .buffered(concurrency);
            Box::pin(s)
        }
    };

    let s = results
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .inspect(move |item| {
            let Some(cb) = callback.as_ref() else {
                return;
            };
            match item {
                Ok(b) => cb.on_batch_complete(b.index + 1, b.first_page, b.last_page, b.text.len()),
                Err(e @ Pdf2TextError::Inference { batch, .. }) => {
                    cb.on_batch_error(*batch, &e.to_string())
                }
                Err(e) => cb.on_batch_error(0, &e.to_string()),
            }
        });

    Box::pin(s)
}

async fn run_batch(
    client: &InferenceClient,
    batch: Batch,
    settings: &RequestSettings,
) -> Result<BatchTranscript, Pdf2TextError> {
    let start = Instant::now();
    let (number, first_page, last_page) = (batch.number(), batch.first_page(), batch.last_page());
    if let Some(ref cb) = settings.callback {
        cb.on_batch_start(number, first_page, last_page);
    }
    debug!(
        "Batch {} (pages {}-{}): sending {:?} request(s)",
        number, first_page, last_page, settings.mode
    );

    let completions = match settings.mode {
        RequestMode::PerImage => {
            let requests: Vec<InferenceRequest> = batch
                .pages
                .iter()
                .map(|page| {
                    InferenceRequest::for_pages(
                        &settings.system_instruction,
                        settings.temperature,
                        settings.max_tokens,
                        std::iter::once(page),
                    )
                })
                .collect();
            // join_all keeps input order, so the first Err is the lowest page.
            join_all(requests.iter().map(|r| client.complete(r)))
                .await
                .into_iter()
                .collect::<Result<Vec<Completion>, InferenceError>>()
        }
        RequestMode::MultiImage => {
            let request = InferenceRequest::for_pages(
                &settings.system_instruction,
                settings.temperature,
                settings.max_tokens,
                &batch.pages,
            );
            client.complete(&request).await.map(|c| vec![c])
        }
    }
    .map_err(|source| Pdf2TextError::Inference {
        batch: number,
        first_page,
        last_page,
        source,
    })?;

    let text = completions
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Batch {} (pages {}-{}) done: {} chars in {}ms",
        number,
        first_page,
        last_page,
        text.len(),
        duration_ms
    );

    Ok(BatchTranscript {
        index: batch.index,
        first_page,
        last_page,
        text,
        requests: completions.len(),
        prompt_tokens: completions.iter().map(|c| c.prompt_tokens).sum(),
        completion_tokens: completions.iter().map(|c| c.completion_tokens).sum(),
        duration_ms,
    })
}
