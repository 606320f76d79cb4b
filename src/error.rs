//! Error types for the pdf2text library.
//!
//! Two layers reflect where a failure happens:
//!
//! * [`InferenceError`] — one call to the chat-completion endpoint failed
//!   (network, HTTP status, or an unreadable reply). Produced by
//!   [`crate::pipeline::llm::InferenceClient`].
//!
//! * [`Pdf2TextError`] — **Fatal** for the whole document. Every stage
//!   (decode, render, batching, inference) reports through this type, and an
//!   inference failure is wrapped with the batch and pages it belonged to.
//!
//! There is no partial-success value: a transcript is either complete or the
//! caller gets exactly one of these errors.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2text library.
#[derive(Debug, Error)]
pub enum Pdf2TextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The byte buffer is not a PDF the engine can open.
    #[error("Failed to load PDF document: {detail}")]
    DocumentLoad { detail: String },

    /// The document opened but contains no pages.
    #[error("PDF has zero pages after rendering")]
    EmptyDocument,

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Drawing surface or page draw failed for a specific page (1-indexed).
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    // ── Batching errors ───────────────────────────────────────────────────
    /// The batch planner was asked for groups of zero pages.
    #[error("Batch limit must be at least 1, got {limit}")]
    InvalidBatchLimit { limit: usize },

    // ── Inference errors ──────────────────────────────────────────────────
    /// An inference call for the given batch failed after any retries.
    #[error("Batch {batch} (pages {first_page}-{last_page}) failed: {source}")]
    Inference {
        /// 1-indexed batch number.
        batch: usize,
        first_page: usize,
        last_page: usize,
        #[source]
        source: InferenceError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required credential field was empty or unset.
    #[error("Missing credential '{name}'.\n{hint}")]
    MissingCredential { name: &'static str, hint: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory) or install\n\
libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TextError {
    /// HTTP status of the failed inference call, if this error carries one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Pdf2TextError::Inference {
                source: InferenceError::Http { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }
}

/// A failure of a single chat-completion call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// The request never produced an HTTP response (connect, TLS, timeout).
    #[error("transport error after {attempts} attempt(s): {detail}")]
    Transport { attempts: u32, detail: String },

    /// The endpoint answered with a non-success status.
    #[error("inference endpoint error {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP success, but the body is not the expected completion shape.
    #[error("unexpected inference response: {detail}")]
    Parse { detail: String },
}

/// Failure to create or resize an in-memory drawing surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanvasError {
    /// The requested surface area exceeds the provider's pixel budget.
    #[error("surface {width}x{height} px exceeds the {limit} px budget")]
    TooLarge { width: u32, height: u32, limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_display_includes_batch_and_status() {
        let e = Pdf2TextError::Inference {
            batch: 2,
            first_page: 3,
            last_page: 4,
            source: InferenceError::Http {
                status: 401,
                body: "invalid key".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Batch 2"), "got: {msg}");
        assert!(msg.contains("pages 3-4"), "got: {msg}");
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("invalid key"), "got: {msg}");
        assert_eq!(e.http_status(), Some(401));
    }

    #[test]
    fn http_status_absent_for_other_errors() {
        assert_eq!(Pdf2TextError::EmptyDocument.http_status(), None);
        let e = Pdf2TextError::Inference {
            batch: 1,
            first_page: 1,
            last_page: 1,
            source: InferenceError::Parse {
                detail: "no choices".into(),
            },
        };
        assert_eq!(e.http_status(), None);
    }

    #[test]
    fn render_display() {
        let e = Pdf2TextError::Render {
            page: 7,
            detail: "out of memory".into(),
        };
        assert!(e.to_string().contains("page 7"));
    }

    #[test]
    fn canvas_too_large_display() {
        let e = CanvasError::TooLarge {
            width: 10,
            height: 20,
            limit: 100,
        };
        assert_eq!(e.to_string(), "surface 10x20 px exceeds the 100 px budget");
    }
}
