//! # form2json
//!
//! Turn a scanned form (PDF or image) into structured JSON with a language model.
//!
//! The text is read from the PDF text layer, or transcribed by a vision model
//! for images and scanned pages. It is cleaned, sent to the model with a
//! structuring prompt (and optionally a medical-term prompt), and the answer
//! is parsed into an [`ExtractionResult`]. Models wrap JSON in markdown fences,
//! add prose, or return nothing; the parser strips the fences and turns the
//! rest into a typed failure instead of an error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Text       pdfium text layer, vision OCR for scans and images
//!  ├─ 3. Normalize  collapse doubled newlines, trim
//!  ├─ 4. Prompt     structuring prompt / term-extraction prompt
//!  ├─ 5. Model      one call per prompt, no retries
//!  └─ 6. Parse      strip fences → JSON → Success | Failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use form2json::{extract_form, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ExtractionConfig::builder().extract_terms(true).build()?;
//!     let output = extract_form("intake_form.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.structured)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Parsing a response directly
//!
//! ```rust
//! use form2json::{extract_json, ExtractionResult, RawResponse, ResponseShape};
//! use serde_json::json;
//!
//! let raw = RawResponse::new("```json\n{\"Name\": \"John\"}\n```");
//! let result = extract_json(&raw, ResponseShape::KeyValue);
//! assert_eq!(result, ExtractionResult::Success(json!({"Name": "John"})));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `form2json` binary (clap + anyhow + dotenvy + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! form2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, FencePolicy};
pub use error::{ExtractionFailure, Form2JsonError};
pub use extract::{
    extract_form, extract_form_from_bytes, extract_form_sync, extract_terms, extract_text,
    save_json, structure_text, DEFAULT_OUTPUT_FILENAME, JSON_MIME_TYPE,
};
pub use output::{CategorizedTerms, DocumentText, ExtractionResult, ExtractionStats, FormExtraction};
pub use pipeline::input::InputKind;
pub use pipeline::llm::{resolve_client, LlmClient, ModelClient};
pub use pipeline::normalize::normalize;
pub use pipeline::response::{extract_json, strip_fences, RawResponse, ResponseParser, ResponseShape};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use prompts::{build_structuring_prompt, build_term_extraction_prompt};
