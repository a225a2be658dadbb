//! Text extraction: PDF text layer or vision-model OCR, depending on the input.
//!
//! ```text
//! PDF   ──▶ pdfium text layer ──┬─▶ text pages ───────────────┐
//!                               └─▶ blank pages ─▶ render ─▶ OCR ─┼─▶ join("\n")
//! Image ──▶ decode ─▶ PNG ─▶ OCR ─────────────────────────────────┘
//! ```
//!
//! The model client is only resolved when a page actually needs OCR, so a
//! PDF with a text layer never requires a credential at this stage.

use crate::config::{ExtractionConfig, FencePolicy};
use crate::error::Form2JsonError;
use crate::output::DocumentText;
use crate::pipeline::encode::{decode_image, encode_image};
use crate::pipeline::input::{InputKind, LoadedInput};
use crate::pipeline::llm::{LazyClient, ModelClient};
use crate::pipeline::pdf::{self, PdfPageContent};
use crate::pipeline::response::strip_fences;
use image::DynamicImage;
use tracing::{debug, info, warn};

/// Extract the raw (not yet normalized) text of a loaded document.
pub async fn extract_raw_text(
    input: LoadedInput,
    config: &ExtractionConfig,
    client: &LazyClient<'_>,
) -> Result<DocumentText, Form2JsonError> {
    match input.kind {
        InputKind::Pdf => extract_pdf(input, config, client).await,
        InputKind::Image => extract_image(input, config, client).await,
    }
}

async fn extract_pdf(
    input: LoadedInput,
    config: &ExtractionConfig,
    client: &LazyClient<'_>,
) -> Result<DocumentText, Form2JsonError> {
    let render = config.ocr_fallback.then_some(config.max_rendered_pixels);
    let pages = pdf::read_pages(
        input.bytes,
        &input.name,
        config.password.as_deref(),
        render,
    )
    .await?;

    let total = pages.len();
    let mut texts = Vec::with_capacity(total);
    let mut ocr_pages = 0;
    let mut empty_pages = 0;

    for (idx, page) in pages.into_iter().enumerate() {
        match page {
            PdfPageContent::Text(t) => texts.push(t),
            PdfPageContent::Empty => {
                empty_pages += 1;
                texts.push(String::new());
            }
            PdfPageContent::Scanned(img) => {
                let client = client.get().await?;
                let text = ocr_image(&**client, &img, idx + 1, total, config).await?;
                texts.push(text);
                ocr_pages += 1;
            }
        }
    }

    if empty_pages > 0 {
        warn!(
            "{} of {} pages have no text layer and OCR fallback is disabled",
            empty_pages, total
        );
    }
    info!(
        "Extracted PDF text: {} pages ({} via OCR)",
        total, ocr_pages
    );

    Ok(DocumentText {
        kind: InputKind::Pdf,
        text: pdf::join_page_texts(texts.iter().map(String::as_str)),
        page_count: total,
        ocr_pages,
    })
}

async fn extract_image(
    input: LoadedInput,
    config: &ExtractionConfig,
    client: &LazyClient<'_>,
) -> Result<DocumentText, Form2JsonError> {
    let img = decode_image(&input.bytes, &input.name)?;
    let client = client.get().await?;
    let text = ocr_image(&**client, &img, 1, 1, config).await?;
    info!("Extracted image text: {} chars", text.len());

    Ok(DocumentText {
        kind: InputKind::Image,
        text,
        page_count: 1,
        ocr_pages: 1,
    })
}

/// Send one image through the client's vision OCR.
async fn ocr_image(
    client: &dyn ModelClient,
    img: &DynamicImage,
    page_num: usize,
    total_pages: usize,
    config: &ExtractionConfig,
) -> Result<String, Form2JsonError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_ocr_page(page_num, total_pages);
    }

    let data = encode_image(img).map_err(|e| Form2JsonError::ImageDecodeFailed {
        source_name: format!("page {page_num}"),
        detail: format!("PNG encoding failed: {e}"),
    })?;

    let raw = client.transcribe_image(data).await?;
    // Vision models sometimes fence their transcription despite the prompt.
    let text = strip_fences(raw.into_text().trim(), FencePolicy::Anchored);
    if text.is_empty() {
        warn!("Page {}: OCR returned no text", page_num);
    } else {
        debug!("Page {}: OCR returned {} chars", page_num, text.len());
    }
    Ok(text)
}
