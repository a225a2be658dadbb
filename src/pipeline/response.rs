//! Response normalisation: turn raw model text into a JSON value or a typed failure.
//!
//! Models asked for "JSON only" still answer with ` ```json ... ``` ` fences,
//! an empty body, or an apology in prose. This stage is the single place that
//! decides what counts as a usable answer:
//!
//! ```text
//! RawResponse ──▶ empty? ──▶ trim ──▶ strip fences ──▶ serde_json ──▶ ExtractionResult
//!                   │                                      │
//!                   └─▶ Failure(EmptyResponse)             └─▶ Failure(ParseError)
//! ```
//!
//! The parser's own error text never reaches the user; it is logged at debug
//! level for troubleshooting.

use crate::config::{ExtractionConfig, FencePolicy};
use crate::error::ExtractionFailure;
use crate::output::ExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Opaque text returned by a model call. `None` means the provider returned
/// no text payload at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    text: Option<String>,
}

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// A response without any text payload.
    pub fn missing() -> Self {
        Self { text: None }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Consume the response, returning its text (empty when missing).
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

impl From<String> for RawResponse {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for RawResponse {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Option<String>> for RawResponse {
    fn from(text: Option<String>) -> Self {
        Self { text }
    }
}

/// The JSON shape a prompt asked the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Free-form key/value object from the structuring prompt.
    KeyValue,
    /// Six-category term listing from the term-extraction prompt.
    CategorizedTerms,
}

/// Parses model responses according to a fence policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    fence_policy: FencePolicy,
    require_object: bool,
}

impl ResponseParser {
    pub fn new(fence_policy: FencePolicy) -> Self {
        Self {
            fence_policy,
            require_object: false,
        }
    }

    /// Treat key/value responses that are valid JSON but not an object as
    /// [`ExtractionFailure::ParseError`].
    pub fn require_object(mut self, v: bool) -> Self {
        self.require_object = v;
        self
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.fence_policy).require_object(config.require_object)
    }

    /// Normalise and parse one response.
    ///
    /// Pure apart from debug logging: the same input always yields the same
    /// result. Term listings are not checked against their six keys here;
    /// see [`crate::output::CategorizedTerms::from_value`] for the lenient
    /// consumer-side reading.
    pub fn parse(&self, raw: &RawResponse, shape: ResponseShape) -> ExtractionResult {
        let Some(text) = raw.text() else {
            debug!("Model response has no text payload");
            return ExtractionResult::Failure(ExtractionFailure::EmptyResponse);
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!("Model response is empty ({} raw bytes)", text.len());
            return ExtractionResult::Failure(ExtractionFailure::EmptyResponse);
        }

        let normalized = strip_fences(trimmed, self.fence_policy);

        match serde_json::from_str::<Value>(&normalized) {
            Ok(value) => {
                if self.require_object && shape == ResponseShape::KeyValue && !value.is_object()
                {
                    debug!(
                        "Rejecting {:?} response: expected a JSON object, got {}",
                        shape,
                        json_type_name(&value)
                    );
                    return ExtractionResult::Failure(ExtractionFailure::ParseError);
                }
                ExtractionResult::Success(value)
            }
            Err(e) => {
                debug!(
                    "Failed to parse {:?} response as JSON: {} (input: {:?})",
                    shape,
                    e,
                    preview(&normalized)
                );
                ExtractionResult::Failure(ExtractionFailure::ParseError)
            }
        }
    }
}

/// Parse a response with the default (anchored) fence policy.
pub fn extract_json(raw: &RawResponse, shape: ResponseShape) -> ExtractionResult {
    ResponseParser::default().parse(raw, shape)
}

// ── Fence stripping ──────────────────────────────────────────────────────────

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Rest of an opening fence line that holds only a language tag, e.g. the
/// `json` of ` ```json ` followed by a newline.
static RE_TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*[A-Za-z0-9_+.\-]*[ \t]*\r?\n").unwrap());

/// Remove markdown code-fence wrapping from already-trimmed text.
///
/// Text that does not start with a fence is returned unchanged.
pub fn strip_fences(text: &str, policy: FencePolicy) -> String {
    match policy {
        FencePolicy::Anchored => strip_anchored(text),
        FencePolicy::Legacy => strip_legacy(text),
    }
}

fn strip_anchored(text: &str) -> String {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text.to_string();
    };
    let body = strip_opening_tag(rest).trim_end();
    let body = body.strip_suffix(FENCE).unwrap_or(body);
    body.trim().to_string()
}

/// Drop the language tag after an opening fence.
///
/// A tag alone on the opening line is dropped whatever it says. When the
/// payload starts on the fence line itself (` ```json{"a":1}``` `), only a
/// literal `json` tag is dropped, since any other word may be the payload.
fn strip_opening_tag(rest: &str) -> &str {
    if let Some(m) = RE_TAG_LINE.find(rest) {
        return &rest[m.end()..];
    }
    match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    }
}

fn strip_legacy(text: &str) -> String {
    if text.starts_with(JSON_FENCE) {
        text.replace(JSON_FENCE, "")
            .replace(FENCE, "")
            .trim()
            .to_string()
    } else {
        text.to_string()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(s: &str) -> String {
    const MAX: usize = 120;
    if s.chars().count() > MAX {
        let head: String = s.chars().take(MAX).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: &str) -> ExtractionResult {
        extract_json(&RawResponse::new(raw), ResponseShape::KeyValue)
    }

    #[test]
    fn missing_payload_is_empty_response() {
        let r = extract_json(&RawResponse::missing(), ResponseShape::KeyValue);
        assert_eq!(r, ExtractionResult::Failure(ExtractionFailure::EmptyResponse));
    }

    #[test]
    fn empty_and_blank_text_is_empty_response() {
        for raw in ["", "   ", "\n\t\n"] {
            assert_eq!(
                parse(raw),
                ExtractionResult::Failure(ExtractionFailure::EmptyResponse),
                "raw = {raw:?}"
            );
        }
    }

    #[test]
    fn prose_is_parse_error() {
        assert_eq!(
            parse("not json at all"),
            ExtractionResult::Failure(ExtractionFailure::ParseError)
        );
        assert_eq!(
            parse("Sorry, I cannot help."),
            ExtractionResult::Failure(ExtractionFailure::ParseError)
        );
    }

    #[test]
    fn unfenced_json_matches_direct_parse() {
        let inputs = [
            r#"{"Name":"John"}"#,
            "  [1, 2, 3]  ",
            "42",
            "\"text\"",
            "null",
            r#"{"nested":{"a":[true,false]}}"#,
        ];
        for raw in inputs {
            let direct: Value = serde_json::from_str(raw).unwrap();
            assert_eq!(parse(raw), ExtractionResult::Success(direct), "raw = {raw:?}");
        }
    }

    #[test]
    fn tagged_fence_is_stripped() {
        let raw = "```json\n{\"Name\":\"John\",\"DOB\":\"1990-01-01\"}\n```";
        assert_eq!(
            parse(raw),
            ExtractionResult::Success(json!({"Name": "John", "DOB": "1990-01-01"}))
        );
    }

    #[test]
    fn bare_fence_is_stripped() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(parse(raw), ExtractionResult::Success(json!({"a": 1})));
    }

    #[test]
    fn fence_with_surrounding_whitespace() {
        let raw = "\n\n  ```JSON  \n  {\"a\": 1}  \n```  \n";
        assert_eq!(parse(raw), ExtractionResult::Success(json!({"a": 1})));
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(
            parse("```json{\"a\":1}```"),
            ExtractionResult::Success(json!({"a": 1}))
        );
    }

    #[test]
    fn single_line_fence_keeps_payload_glued_to_tag() {
        assert_eq!(parse("```json1```"), ExtractionResult::Success(json!(1)));
        assert_eq!(parse("```jsontrue```"), ExtractionResult::Success(json!(true)));
        assert_eq!(parse("```json\"x\"```"), ExtractionResult::Success(json!("x")));
        assert_eq!(parse("```JSON[1]```"), ExtractionResult::Success(json!([1])));
    }

    #[test]
    fn single_line_fence_without_tag() {
        assert_eq!(parse("``` 42```"), ExtractionResult::Success(json!(42)));
        assert_eq!(parse("```null```"), ExtractionResult::Success(Value::Null));
        assert_eq!(parse("```json 42 ```"), ExtractionResult::Success(json!(42)));
    }

    #[test]
    fn any_value_survives_fence_wrapping() {
        let values = [
            json!({"Name": "John"}),
            json!([1, "two", null]),
            json!(1),
            json!(true),
            json!("x"),
            json!(null),
        ];
        for v in values {
            let j = v.to_string();
            for raw in [format!("```json\n{j}\n```"), format!("```json{j}```")] {
                assert_eq!(parse(&raw), ExtractionResult::Success(v.clone()), "raw = {raw:?}");
            }
        }
    }

    #[test]
    fn other_tag_line_is_dropped() {
        let raw = "```javascript\n{\"a\": 1}\n```";
        assert_eq!(parse(raw), ExtractionResult::Success(json!({"a": 1})));
    }

    #[test]
    fn fenced_empty_body_is_parse_error() {
        assert_eq!(
            parse("```json\n```"),
            ExtractionResult::Failure(ExtractionFailure::ParseError)
        );
    }

    #[test]
    fn anchored_preserves_backticks_inside_strings() {
        let raw = "```json\n{\"snippet\": \"a```b\"}\n```";
        assert_eq!(parse(raw), ExtractionResult::Success(json!({"snippet": "a```b"})));
    }

    #[test]
    fn legacy_removes_every_fence_marker() {
        let raw = "```json\n{\"snippet\": \"a```b\"}\n```";
        let r = ResponseParser::new(FencePolicy::Legacy)
            .parse(&RawResponse::new(raw), ResponseShape::KeyValue);
        assert_eq!(r, ExtractionResult::Success(json!({"snippet": "ab"})));
    }

    #[test]
    fn legacy_ignores_bare_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        let r = ResponseParser::new(FencePolicy::Legacy)
            .parse(&RawResponse::new(raw), ResponseShape::KeyValue);
        assert_eq!(r, ExtractionResult::Failure(ExtractionFailure::ParseError));
    }

    #[test]
    fn no_fence_is_noop_for_both_policies() {
        let text = r#"{"a": "b"}"#;
        assert_eq!(strip_fences(text, FencePolicy::Anchored), text);
        assert_eq!(strip_fences(text, FencePolicy::Legacy), text);
    }

    #[test]
    fn non_object_accepted_by_default() {
        assert_eq!(parse("[1,2]"), ExtractionResult::Success(json!([1, 2])));
    }

    #[test]
    fn require_object_rejects_arrays_and_scalars() {
        let parser = ResponseParser::default().require_object(true);
        for raw in ["[1,2]", "\"x\"", "3", "null"] {
            assert_eq!(
                parser.parse(&RawResponse::new(raw), ResponseShape::KeyValue),
                ExtractionResult::Failure(ExtractionFailure::ParseError),
                "raw = {raw:?}"
            );
        }
        assert!(parser
            .parse(&RawResponse::new("{}"), ResponseShape::KeyValue)
            .is_success());
    }

    #[test]
    fn require_object_does_not_apply_to_terms() {
        let parser = ResponseParser::default().require_object(true);
        let r = parser.parse(&RawResponse::new("[]"), ResponseShape::CategorizedTerms);
        assert!(r.is_success());
    }

    #[test]
    fn partial_term_listing_is_accepted() {
        let r = extract_json(
            &RawResponse::new(r#"{"Diseases":["flu"],"Medications":[]}"#),
            ResponseShape::CategorizedTerms,
        );
        assert_eq!(
            r,
            ExtractionResult::Success(json!({"Diseases": ["flu"], "Medications": []}))
        );
    }

    #[test]
    fn success_round_trips_through_serialisation() {
        let raw = "```json\n{\"a\": [1, 2.5, \"x\", null, {\"b\": false}]}\n```";
        let ExtractionResult::Success(v) = parse(raw) else {
            panic!("expected success");
        };
        let back: Value = serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn parse_is_deterministic() {
        let raw = RawResponse::new("```json\n{\"k\": 1}\n```");
        assert_eq!(
            extract_json(&raw, ResponseShape::KeyValue),
            extract_json(&raw, ResponseShape::KeyValue)
        );
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parser_detail_goes_to_debug_log_only() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || parse("not json at all"));

        let logged = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("DEBUG"), "log = {logged}");
        assert!(logged.contains("expected ident"), "log = {logged}");

        let shown = result.to_display_value().to_string();
        assert!(!shown.contains("expected ident"), "shown = {shown}");
        assert!(!shown.contains("line 1"), "shown = {shown}");
        assert_eq!(result.failure(), Some(ExtractionFailure::ParseError));
    }

    #[test]
    fn raw_response_conversions() {
        assert_eq!(RawResponse::from(None).text(), None);
        assert_eq!(RawResponse::from("x").text(), Some("x"));
        assert_eq!(RawResponse::missing().into_text(), "");
    }
}
