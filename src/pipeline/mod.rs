//! Pipeline stages for form-to-JSON extraction.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and the model backend can be swapped without touching parsing.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ normalize ──▶ llm ──▶ response
//! (path/URL) (pdfium / OCR) (cleanup) (model) (fences + JSON)
//! ```
//!
//! 1. [`input`]    : load the user-supplied path or URL and detect PDF vs image
//! 2. [`pdf`]      : per-page text layer, rasterising blank pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]   : decode uploads, PNG-encode and base64-wrap for vision calls
//! 4. [`text`]     : combine PDF text and vision OCR into one document text
//! 5. [`normalize`]: collapse doubled newlines and trim
//! 6. [`llm`]      : the `ModelClient` capability; the only stage with model I/O
//! 7. [`response`] : strip code fences and parse the answer into an
//!    `ExtractionResult`

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod pdf;
pub mod response;
pub mod text;
