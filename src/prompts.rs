//! Prompt templates for structuring and term extraction.
//!
//! Every prompt lives here so unit tests can inspect them without a model,
//! and so changing the wording touches exactly one file. Callers can override
//! the two text prompts via [`crate::config::ExtractionConfig`]; the
//! constants here are used only when no override is provided.

/// Placeholder substituted with the document text in prompt templates.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Default prompt for converting free form text into key/value JSON.
pub const STRUCTURING_PROMPT: &str = r#"The following text is extracted from a structured form. Convert it into a properly formatted JSON with relevant key-value pairs.

Text:
{text}

- Extract all key-value pairs correctly.
- Ensure fields like "Name", "Date of Birth", "Account Number", etc., are well-organized.
- Return **only** JSON format without additional text."#;

/// Default prompt for the six-category medical term breakdown.
pub const TERM_EXTRACTION_PROMPT: &str = r#"Extract the medical terms from the following text and group them into categories.

Text:
{text}

Return a JSON object with exactly these keys, each mapping to an array of strings:
"Diseases", "Medications", "Symptoms", "Medical Procedures", "Medical Devices", "Chemicals".

- Use an empty array when a category has no terms.
- Do not repeat a term within a category.
- Return **only** JSON format without additional text."#;

/// System prompt for transcribing a page image or photo into plain text.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are a meticulous OCR engine. Transcribe all text visible in the image exactly as written.

- Follow the natural reading order (top to bottom, left to right).
- Put each form field or line on its own line, keeping labels next to their values.
- Do NOT summarise, translate, correct or explain.
- Do NOT wrap the output in code fences.
- Output ONLY the transcribed text."#;

/// Build the structuring prompt for `text`.
pub fn build_structuring_prompt(text: &str) -> String {
    render_template(STRUCTURING_PROMPT, text)
}

/// Build the term-extraction prompt for `text`.
pub fn build_term_extraction_prompt(text: &str) -> String {
    render_template(TERM_EXTRACTION_PROMPT, text)
}

/// Embed `text` verbatim into `template`.
///
/// Templates without a `{text}` placeholder get the text appended after a
/// blank line, so user-supplied prompt files don't need to know the syntax.
pub fn render_template(template: &str, text: &str) -> String {
    if template.contains(TEXT_PLACEHOLDER) {
        template.replace(TEXT_PLACEHOLDER, text)
    } else {
        format!("{template}\n\n{text}")
    }
}
