//! PDF reading via pdfium: per-page text layer, rasterising pages that have none.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. All pdfium work runs
//! inside `tokio::task::spawn_blocking` so the runtime's worker threads never
//! stall on parsing or rendering.
//!
//! ## Scanned pages
//!
//! A scanned form is a PDF whose pages are just images: the text layer comes
//! back empty. When rendering is requested, such pages are rasterised (longest
//! edge capped at `max_pixels`) and handed back as images for the OCR stage.

use crate::error::Form2JsonError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// What one PDF page yielded.
#[derive(Debug)]
pub enum PdfPageContent {
    /// Text from the page's text layer, as pdfium reports it.
    Text(String),
    /// The page had no text layer and was rasterised for OCR.
    Scanned(DynamicImage),
    /// The page had no text layer and rendering was not requested.
    Empty,
}

/// Read every page of a PDF held in memory.
///
/// `render_scanned` is the longest-edge pixel cap for rasterising pages with
/// an empty text layer; `None` leaves such pages as [`PdfPageContent::Empty`].
pub async fn read_pages(
    bytes: Vec<u8>,
    source_name: &str,
    password: Option<&str>,
    render_scanned: Option<u32>,
) -> Result<Vec<PdfPageContent>, Form2JsonError> {
    let name = source_name.to_string();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        read_pages_blocking(&bytes, &name, password.as_deref(), render_scanned)
    })
    .await
    .map_err(|e| Form2JsonError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Join page texts in page order, one newline between pages, and trim.
pub fn join_page_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Blocking implementation of [`read_pages`].
fn read_pages_blocking(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
    render_scanned: Option<u32>,
) -> Result<Vec<PdfPageContent>, Form2JsonError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| map_load_error(e, source_name, password.is_some()))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = render_scanned.map(|px| {
        PdfRenderConfig::new()
            .set_target_width(px as i32)
            .set_maximum_height(px as i32)
    });

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| Form2JsonError::PageReadFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();

        if !text.trim().is_empty() {
            debug!("Page {}: {} chars of text", idx + 1, text.len());
            results.push(PdfPageContent::Text(text));
            continue;
        }

        let Some(ref cfg) = render_config else {
            debug!("Page {}: no text layer", idx + 1);
            results.push(PdfPageContent::Empty);
            continue;
        };

        let bitmap = page
            .render_with_config(cfg)
            .map_err(|e| Form2JsonError::PageReadFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Page {}: no text layer, rendered → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(PdfPageContent::Scanned(image));
    }

    Ok(results)
}

/// Bind to the pdfium shared library.
///
/// Discovery order:
/// 1. `PDFIUM_LIB_PATH` env var (explicit path to the library file)
/// 2. The current working directory
/// 3. System library search paths
fn bind_pdfium() -> Result<Pdfium, Form2JsonError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        debug!("Loading pdfium from PDFIUM_LIB_PATH={}", path);
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| Form2JsonError::PdfiumBindingFailed(format!("{path}: {e:?}")))?;
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Form2JsonError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Map a pdfium load error, telling encryption problems apart from corruption.
fn map_load_error(e: PdfiumError, source_name: &str, had_password: bool) -> Form2JsonError {
    let detail = format!("{:?}", e);
    if detail.to_lowercase().contains("password") {
        if had_password {
            Form2JsonError::WrongPassword {
                source_name: source_name.to_string(),
            }
        } else {
            Form2JsonError::PasswordRequired {
                source_name: source_name.to_string(),
            }
        }
    } else {
        Form2JsonError::CorruptPdf {
            source_name: source_name.to_string(),
            detail,
        }
    }
}
