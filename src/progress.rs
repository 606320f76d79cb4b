//! Progress-callback trait for per-batch transcription events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`] to be told
//! when rendering finishes and as each batch is sent and answered.
//!
//! # Example
//!
//! ```rust
//! use pdf2text::{TranscriptionConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl TranscriptionProgressCallback for PageCounter {
//!     fn on_batch_complete(&self, _batch: usize, first: usize, last: usize, _len: usize) {
//!         self.0.fetch_add(last - first + 1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = TranscriptionConfig::builder()
//!     .model("gpt-4o")
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through a document.
///
/// All methods have no-op defaults. Batch numbers are 1-indexed, as are page
/// numbers.
///
/// # Thread safety
///
/// In [`crate::config::RequestMode::MultiImage`] mode several batches are in
/// flight at once, so `on_batch_start` for batch 3 may fire before
/// `on_batch_complete` for batch 2. Completion events are still delivered in
/// batch order.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Rendering finished; `total_batches` requests groups are about to be sent.
    fn on_transcription_start(&self, total_pages: usize, total_batches: usize) {
        let _ = (total_pages, total_batches);
    }

    /// The batch covering `first_page..=last_page` is being sent.
    fn on_batch_start(&self, batch: usize, first_page: usize, last_page: usize) {
        let _ = (batch, first_page, last_page);
    }

    /// A batch was answered; `text_len` is the byte length of its text.
    fn on_batch_complete(&self, batch: usize, first_page: usize, last_page: usize, text_len: usize) {
        let _ = (batch, first_page, last_page, text_len);
    }

    /// A batch failed after retries. Transcription stops after this.
    fn on_batch_error(&self, batch: usize, error: &str) {
        let _ = (batch, error);
    }

    /// Every batch succeeded; `text_len` is the byte length of the transcript.
    fn on_transcription_complete(&self, total_pages: usize, text_len: usize) {
        let _ = (total_pages, text_len);
    }
}

/// Does nothing. Used when no callback is configured.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl TranscriptionProgressCallback for Recorder {
        fn on_transcription_start(&self, total_pages: usize, total_batches: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {total_pages}/{total_batches}"));
        }

        fn on_batch_error(&self, batch: usize, error: &str) {
            self.events.lock().unwrap().push(format!("error {batch}: {error}"));
        }
    }

    #[test]
    fn noop_accepts_every_event() {
        let cb = NoopProgressCallback;
        cb.on_transcription_start(3, 2);
        cb.on_batch_start(1, 1, 2);
        cb.on_batch_complete(1, 1, 2, 10);
        cb.on_batch_error(2, "boom");
        cb.on_transcription_complete(3, 10);
    }

    #[test]
    fn overridden_methods_are_dispatched_through_the_alias() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_transcription_start(5, 3);
        cb.on_batch_start(1, 1, 2);
        cb.on_batch_error(2, "HTTP 401");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start 5/3".to_string(), "error 2: HTTP 401".to_string()]
        );
    }
}
