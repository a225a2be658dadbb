//! Output types: extraction outcomes, categorized terms, and run statistics.

use crate::error::ExtractionFailure;
use crate::pipeline::input::InputKind;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

/// The outcome of turning one model response into JSON.
///
/// Exactly one variant holds. Failures are not errors in the Rust sense: they
/// are values the caller shows to the user, rendered as `{"error": <message>}`
/// by [`ExtractionResult::to_display_value`] and by `Serialize`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Success(Value),
    Failure(ExtractionFailure),
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    /// The parsed value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ExtractionResult::Success(v) => Some(v),
            ExtractionResult::Failure(_) => None,
        }
    }

    /// The failure kind, if any.
    pub fn failure(&self) -> Option<ExtractionFailure> {
        match self {
            ExtractionResult::Success(_) => None,
            ExtractionResult::Failure(f) => Some(*f),
        }
    }

    /// The value shown to the user: the parsed JSON, or `{"error": <message>}`.
    pub fn to_display_value(&self) -> Value {
        match self {
            ExtractionResult::Success(v) => v.clone(),
            ExtractionResult::Failure(f) => json!({ "error": f.message() }),
        }
    }

    /// Consumer-side view of a term-extraction result.
    ///
    /// Returns `None` for failures. Successful values are read leniently,
    /// see [`CategorizedTerms::from_value`].
    pub fn categorized_terms(&self) -> Option<CategorizedTerms> {
        self.value().map(CategorizedTerms::from_value)
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExtractionResult::Success(v) => v.serialize(serializer),
            ExtractionResult::Failure(f) => json!({ "error": f.message() }).serialize(serializer),
        }
    }
}

/// Medical terms grouped into the six fixed categories.
///
/// Field names serialise to the exact keys the term-extraction prompt asks
/// for. Missing keys deserialise as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedTerms {
    #[serde(rename = "Diseases", default)]
    pub diseases: Vec<String>,
    #[serde(rename = "Medications", default)]
    pub medications: Vec<String>,
    #[serde(rename = "Symptoms", default)]
    pub symptoms: Vec<String>,
    #[serde(rename = "Medical Procedures", default)]
    pub medical_procedures: Vec<String>,
    #[serde(rename = "Medical Devices", default)]
    pub medical_devices: Vec<String>,
    #[serde(rename = "Chemicals", default)]
    pub chemicals: Vec<String>,
}

impl CategorizedTerms {
    /// Category keys, in display order.
    pub const CATEGORIES: [&'static str; 6] = [
        "Diseases",
        "Medications",
        "Symptoms",
        "Medical Procedures",
        "Medical Devices",
        "Chemicals",
    ];

    /// Read terms from any JSON value without failing.
    ///
    /// A missing key, a non-array value, or a non-object root yields empty
    /// lists; non-string array items are skipped.
    pub fn from_value(value: &Value) -> Self {
        let read = |key: &str| -> Vec<String> {
            let Some(items) = value.get(key).and_then(Value::as_array) else {
                return Vec::new();
            };
            items
                .iter()
                .filter_map(|item| match item.as_str() {
                    Some(s) => Some(s.to_string()),
                    None => {
                        debug!("Skipping non-string term in '{}': {}", key, item);
                        None
                    }
                })
                .collect()
        };

        Self {
            diseases: read("Diseases"),
            medications: read("Medications"),
            symptoms: read("Symptoms"),
            medical_procedures: read("Medical Procedures"),
            medical_devices: read("Medical Devices"),
            chemicals: read("Chemicals"),
        }
    }

    /// Terms for a category key, or `None` for an unknown key.
    pub fn get(&self, category: &str) -> Option<&[String]> {
        match category {
            "Diseases" => Some(&self.diseases),
            "Medications" => Some(&self.medications),
            "Symptoms" => Some(&self.symptoms),
            "Medical Procedures" => Some(&self.medical_procedures),
            "Medical Devices" => Some(&self.medical_devices),
            "Chemicals" => Some(&self.chemicals),
            _ => None,
        }
    }

    /// Total number of terms across all categories.
    pub fn total(&self) -> usize {
        Self::CATEGORIES
            .iter()
            .filter_map(|c| self.get(c))
            .map(<[String]>::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Cleaned text read from one input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub kind: InputKind,
    /// Normalized text, see [`crate::pipeline::normalize::normalize`].
    pub text: String,
    /// Pages in the document (1 for images).
    pub page_count: usize,
    /// Pages whose text came from OCR rather than a PDF text layer.
    pub ocr_pages: usize,
}

/// Timing for one end-to-end extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub text_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced by [`crate::extract_form`].
#[derive(Debug, Clone, Serialize)]
pub struct FormExtraction {
    pub document: DocumentText,
    /// Key/value JSON for the form.
    pub structured: ExtractionResult,
    /// Categorized terms, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<ExtractionResult>,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_displays_as_error_object() {
        let r = ExtractionResult::Failure(ExtractionFailure::EmptyResponse);
        assert_eq!(
            r.to_display_value(),
            json!({"error": "No response from the language model."})
        );
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            r.to_display_value()
        );
    }

    #[test]
    fn success_serialises_as_plain_value() {
        let v = json!({"Name": "John"});
        let r = ExtractionResult::Success(v.clone());
        assert_eq!(serde_json::to_value(&r).unwrap(), v);
        assert!(r.is_success());
        assert!(r.failure().is_none());
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let terms = CategorizedTerms::from_value(&json!({
            "Diseases": ["flu"],
            "Medications": []
        }));
        assert_eq!(terms.diseases, vec!["flu"]);
        assert!(terms.medications.is_empty());
        assert!(terms.symptoms.is_empty());
        assert!(terms.medical_procedures.is_empty());
        assert!(terms.medical_devices.is_empty());
        assert!(terms.chemicals.is_empty());
        assert_eq!(terms.total(), 1);
    }

    #[test]
    fn wrong_types_are_tolerated() {
        let terms = CategorizedTerms::from_value(&json!({
            "Symptoms": "cough",
            "Chemicals": ["ethanol", 42, null, "benzene"]
        }));
        assert!(terms.symptoms.is_empty());
        assert_eq!(terms.chemicals, vec!["ethanol", "benzene"]);
    }

    #[test]
    fn non_object_root_yields_empty_terms() {
        assert!(CategorizedTerms::from_value(&json!(["flu"])).is_empty());
        assert!(CategorizedTerms::from_value(&json!(7)).is_empty());
    }

    #[test]
    fn serialises_with_display_keys() {
        let terms = CategorizedTerms {
            medical_devices: vec!["stent".into()],
            ..Default::default()
        };
        let v = serde_json::to_value(&terms).unwrap();
        assert_eq!(v["Medical Devices"], json!(["stent"]));
        assert_eq!(v.as_object().unwrap().len(), 6);
    }

    #[test]
    fn deserialise_fills_missing_fields() {
        let terms: CategorizedTerms =
            serde_json::from_str(r#"{"Diseases":["flu"],"Medications":[]}"#).unwrap();
        assert_eq!(terms.diseases, vec!["flu"]);
        assert!(terms.chemicals.is_empty());
    }

    #[test]
    fn categorized_terms_from_failure_is_none() {
        let r = ExtractionResult::Failure(ExtractionFailure::ParseError);
        assert!(r.categorized_terms().is_none());
    }

    #[test]
    fn unknown_category_is_none() {
        assert!(CategorizedTerms::default().get("Allergies").is_none());
    }
}
