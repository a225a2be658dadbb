//! End-to-end extraction entry points.
//!
//! ```text
//! input ──▶ extract text ──▶ normalize ──▶ structuring prompt ──▶ model ──▶ parse
//!                                     └──▶ term prompt ─────────▶ model ──▶ parse
//! ```
//!
//! Each stage runs to completion before the next one starts. A fatal
//! [`Form2JsonError`] stops the run; an unusable model answer does not, it
//! becomes an [`ExtractionResult::Failure`] in the returned value.

use crate::config::ExtractionConfig;
use crate::error::Form2JsonError;
use crate::output::{DocumentText, ExtractionResult, ExtractionStats, FormExtraction};
use crate::pipeline::input::{self, detect_kind, LoadedInput};
use crate::pipeline::llm::{LazyClient, ModelClient};
use crate::pipeline::normalize::normalize;
use crate::pipeline::response::{ResponseParser, ResponseShape};
use crate::pipeline::text;
use crate::progress::Stage;
use crate::prompts::{render_template, STRUCTURING_PROMPT, TERM_EXTRACTION_PROMPT};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// File name used when the caller saves without choosing one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "extracted_form.json";

/// Media type of saved output.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Extract and normalize the text of a PDF or image (path or URL).
///
/// A PDF with a text layer never touches the model; images and scanned pages
/// go through the configured client's OCR.
pub async fn extract_text(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentText, Form2JsonError> {
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let client = LazyClient::new(config);
    extract_loaded_text(loaded, config, &client).await
}

/// Ask the model to turn form text into key/value JSON.
pub async fn structure_text(
    text: &str,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Form2JsonError> {
    let template = config
        .structuring_prompt
        .as_deref()
        .unwrap_or(STRUCTURING_PROMPT);
    run_prompt(
        render_template(template, text),
        ResponseShape::KeyValue,
        client,
        config,
    )
    .await
}

/// Ask the model for the six-category term listing.
///
/// Read the result with [`ExtractionResult::categorized_terms`]; missing
/// categories come back empty.
pub async fn extract_terms(
    text: &str,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Form2JsonError> {
    let template = config
        .term_prompt
        .as_deref()
        .unwrap_or(TERM_EXTRACTION_PROMPT);
    run_prompt(
        render_template(template, text),
        ResponseShape::CategorizedTerms,
        client,
        config,
    )
    .await
}

/// Run the whole pipeline on a path or URL.
///
/// # Errors
/// Returns `Err(Form2JsonError)` only for fatal faults:
/// - the file cannot be read, downloaded or recognised
/// - the PDF is corrupt or locked, or an image cannot be decoded
/// - no model client could be resolved, or the model call itself failed
///
/// An empty or unparseable model answer is `Ok` with a failure inside.
pub async fn extract_form(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<FormExtraction, Form2JsonError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let loaded = input::load_input(input_str, config.download_timeout_secs).await?;
    run_form(loaded, config).await
}

/// Run the whole pipeline on a document already in memory.
///
/// `name` is used for error messages and, when the bytes carry no
/// recognisable signature, for detecting the kind from its extension.
pub async fn extract_form_from_bytes(
    bytes: Vec<u8>,
    name: &str,
    config: &ExtractionConfig,
) -> Result<FormExtraction, Form2JsonError> {
    let kind = detect_kind(&bytes, name).ok_or_else(|| Form2JsonError::UnsupportedFormat {
        source_name: name.to_string(),
    })?;
    let loaded = LoadedInput {
        name: name.to_string(),
        bytes,
        kind,
    };
    run_form(loaded, config).await
}

/// Synchronous wrapper around [`extract_form`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_form_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<FormExtraction, Form2JsonError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Form2JsonError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_form(input_str, config))
}

/// Write `value` as 4-space-indented JSON.
///
/// The file is written next to its destination and renamed into place, so a
/// failed write never leaves a truncated file behind. Passing an
/// [`ExtractionResult`] saves what the user sees: the parsed JSON, or the
/// `{"error": ...}` object.
pub fn save_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), Form2JsonError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| Form2JsonError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut tmp, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Saved {} to {}", JSON_MIME_TYPE, path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_form(
    loaded: LoadedInput,
    config: &ExtractionConfig,
) -> Result<FormExtraction, Form2JsonError> {
    let total_start = Instant::now();
    let client = LazyClient::new(config);

    let text_start = Instant::now();
    let document = extract_loaded_text(loaded, config, &client).await?;
    let text_duration_ms = text_start.elapsed().as_millis() as u64;

    let llm_start = Instant::now();
    let model = client.get().await?;

    let structured = staged(config, Stage::Structure, async {
        structure_text(&document.text, &**model, config).await
    })
    .await?;

    let terms = if config.extract_terms {
        Some(
            staged(config, Stage::ExtractTerms, async {
                extract_terms(&document.text, &**model, config).await
            })
            .await?,
        )
    } else {
        None
    };

    let stats = ExtractionStats {
        text_duration_ms,
        llm_duration_ms: llm_start.elapsed().as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction finished in {}ms (structured: {})",
        stats.total_duration_ms,
        if structured.is_success() { "ok" } else { "failed" }
    );

    Ok(FormExtraction {
        document,
        structured,
        terms,
        stats,
    })
}

async fn extract_loaded_text(
    loaded: LoadedInput,
    config: &ExtractionConfig,
    client: &LazyClient<'_>,
) -> Result<DocumentText, Form2JsonError> {
    staged(config, Stage::ExtractText, async {
        let mut doc = text::extract_raw_text(loaded, config, client).await?;
        doc.text = normalize(&doc.text);
        debug!("Normalized text: {} chars", doc.text.len());
        Ok(doc)
    })
    .await
}

async fn run_prompt(
    prompt: String,
    shape: ResponseShape,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, Form2JsonError> {
    debug!("Sending {:?} prompt ({} chars)", shape, prompt.len());
    let raw = client.generate(&prompt).await?;
    let result = ResponseParser::from_config(config).parse(&raw, shape);
    if let Some(failure) = result.failure() {
        info!("{:?} response rejected: {}", shape, failure);
    }
    Ok(result)
}

/// Wrap a stage future with the progress callback's start/complete events.
async fn staged<T, F>(config: &ExtractionConfig, stage: Stage, fut: F) -> Result<T, Form2JsonError>
where
    F: std::future::Future<Output = Result<T, Form2JsonError>>,
{
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    let start = Instant::now();
    let out = fut.await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, start.elapsed().as_millis() as u64);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::response::RawResponse;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl ModelClient for Echo {
        async fn generate(&self, _prompt: &str) -> Result<RawResponse, Form2JsonError> {
            Ok(RawResponse::new(self.0))
        }
    }

    #[test]
    fn save_json_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_OUTPUT_FILENAME);
        save_json(&json!({"Name": "John"}), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\n    \"Name\": \"John\"\n}\n");
    }

    #[test]
    fn save_json_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/form.json");
        save_json(&json!([1, 2]), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_failure_writes_error_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        let result = ExtractionResult::Failure(crate::ExtractionFailure::ParseError);
        save_json(&result, &path).unwrap();

        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            back["error"],
            "Failed to parse response as JSON. Please check the extraction."
        );
    }

    #[test]
    fn structure_text_parses_fenced_answer() {
        let client = Echo("```json\n{\"Name\": \"John\"}\n```");
        let config = ExtractionConfig::default();
        let result = tokio_test::block_on(structure_text("Name: John", &client, &config)).unwrap();
        assert_eq!(result, ExtractionResult::Success(json!({"Name": "John"})));
    }

    #[test]
    fn extract_terms_defaults_missing_categories() {
        let client = Echo(r#"{"Diseases": ["asthma"]}"#);
        let config = ExtractionConfig::default();
        let result = tokio_test::block_on(extract_terms("text", &client, &config)).unwrap();
        let terms = result.categorized_terms().unwrap();
        assert_eq!(terms.diseases, vec!["asthma".to_string()]);
        assert!(terms.chemicals.is_empty());
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let config = ExtractionConfig::default();
        let err = tokio_test::block_on(extract_form_from_bytes(
            b"hello".to_vec(),
            "notes.txt",
            &config,
        ))
        .unwrap_err();
        assert!(matches!(err, Form2JsonError::UnsupportedFormat { .. }));
    }
}
