//! Pipeline stages for PDF-to-text transcription.
//!
//! Each submodule implements one step and can be tested on its own; the
//! orchestrator in [`crate::transcribe`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ batch ──▶ llm
//! (base64)  (engine +  (PNG,      (groups   (chat completion,
//!            canvas)    data URL)  of K)     retry)
//! ```
//!
//! 1. [`input`]  — decode base64 input and check the `%PDF` header
//! 2. [`render`] — draw each page onto a scoped [`canvas`] surface through a
//!    [`engine::DocumentEngine`]; runs in `spawn_blocking`
//! 3. [`encode`] — PNG-encode surfaces and wrap them as data URLs
//! 4. [`batch`]  — split the ordered images into contiguous request groups
//! 5. [`llm`]    — build request bodies and send them over a [`llm::Transport`];
//!    the only stage with network I/O

pub mod batch;
pub mod canvas;
pub mod encode;
pub mod engine;
pub mod input;
pub mod llm;
pub mod render;
