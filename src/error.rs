//! Error types for the form2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Form2JsonError`]: **Fatal**: the extraction cannot proceed at all
//!   (unreadable input, corrupt PDF, provider not configured, transport
//!   failure). Returned as `Err(Form2JsonError)` from the top-level
//!   `extract*` functions and never converted into a result value.
//!
//! * [`ExtractionFailure`]: **Recoverable**: the model answered, but with
//!   nothing usable (no text, or text that is not JSON). Stored inside
//!   [`crate::output::ExtractionResult::Failure`] and surfaced to the end
//!   user as `{"error": <message>}`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the form2json library.
///
/// Model-response failures use [`ExtractionFailure`] and are stored in
/// [`crate::output::ExtractionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Form2JsonError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input is neither a PDF nor a supported raster image.
    #[error("Unsupported input '{source_name}': expected a PDF, PNG, JPG or JPEG file")]
    UnsupportedFormat { source_name: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' is corrupt: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// pdfium-render returned an error while reading or rasterising a page.
    #[error("Failed to read page {page}: {detail}")]
    PageReadFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Image errors ──────────────────────────────────────────────────────
    /// The image bytes could not be decoded or re-encoded.
    #[error("Failed to decode image '{source_name}': {detail}")]
    ImageDecodeFailed { source_name: String, detail: String },

    /// Image text is needed but the configured model client cannot read images.
    #[error("The configured model client does not support image transcription (OCR)")]
    OcrUnavailable,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error (network, auth, quota, …).
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call exceeded the configured per-call timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a model response could not be turned into a JSON value.
///
/// The display text is the fixed, user-facing message. Parser diagnostics are
/// never part of it; they are only logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionFailure {
    /// The model returned no usable text.
    #[error("No response from the language model.")]
    EmptyResponse,

    /// Text was returned but is not valid JSON after fence stripping.
    #[error("Failed to parse response as JSON. Please check the extraction.")]
    ParseError,
}

impl ExtractionFailure {
    /// The fixed message shown to the end user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
