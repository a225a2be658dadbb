//! Progress-callback trait for extraction stage events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves from text extraction to the model calls.
//! The CLI uses this to drive its spinner; library users can forward the
//! events anywhere without the library knowing how.
//!
//! # Example
//!
//! ```rust
//! use form2json::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{}…", stage.label());
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A step of the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Reading text from the PDF or image.
    ExtractText,
    /// Asking the model for key/value JSON.
    Structure,
    /// Asking the model for the categorized term listing.
    ExtractTerms,
}

impl Stage {
    /// Human-readable description used by progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::ExtractText => "Extracting text",
            Stage::Structure => "Generating structured JSON",
            Stage::ExtractTerms => "Extracting medical terms",
        }
    }
}

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`     : the stage that finished
    /// * `elapsed_ms`: wall-clock time spent in the stage
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called before a scanned PDF page or an image is sent for OCR.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: pages in the document
    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
