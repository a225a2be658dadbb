//! Configuration types for form extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is request-scoped: callers
//! build one per extraction and pass it explicitly, and the model client it
//! may carry is an ordinary value rather than process-wide state.

use crate::error::Form2JsonError;
use crate::pipeline::llm::ModelClient;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one form extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use form2json::{ExtractionConfig, FencePolicy};
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.0-flash")
///     .fence_policy(FencePolicy::Anchored)
///     .extract_terms(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-nano".
    /// If None, uses the default model of the resolved provider.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `client`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed model client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. Default: None (wait for the transport).
    pub api_timeout_secs: Option<u64>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom structuring prompt. `{text}` is replaced with the document text.
    pub structuring_prompt: Option<String>,

    /// Custom term-extraction prompt. `{text}` is replaced with the document text.
    pub term_prompt: Option<String>,

    /// How markdown code fences are removed from model responses.
    /// Default: [`FencePolicy::Anchored`].
    pub fence_policy: FencePolicy,

    /// Reject key/value responses that parse but are not JSON objects. Default: false.
    pub require_object: bool,

    /// Also run the categorized term extraction in [`crate::extract_form`]. Default: false.
    pub extract_terms: bool,

    /// OCR PDF pages that have no text layer through the vision model. Default: true.
    pub ocr_fallback: bool,

    /// Longest edge in pixels when rasterising scanned pages for OCR. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage/page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            client: None,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: None,
            password: None,
            structuring_prompt: None,
            term_prompt: None,
            fence_policy: FencePolicy::default(),
            require_object: false,
            extract_terms: false,
            ocr_fallback: true,
            max_rendered_pixels: 2000,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("fence_policy", &self.fence_policy)
            .field("require_object", &self.require_object)
            .field("extract_terms", &self.extract_terms)
            .field("ocr_fallback", &self.ocr_fallback)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn structuring_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.structuring_prompt = Some(prompt.into());
        self
    }

    pub fn term_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.term_prompt = Some(prompt.into());
        self
    }

    pub fn fence_policy(mut self, policy: FencePolicy) -> Self {
        self.config.fence_policy = policy;
        self
    }

    pub fn require_object(mut self, v: bool) -> Self {
        self.config.require_object = v;
        self
    }

    pub fn extract_terms(mut self, v: bool) -> Self {
        self.config.extract_terms = v;
        self
    }

    pub fn ocr_fallback(mut self, v: bool) -> Self {
        self.config.ocr_fallback = v;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Form2JsonError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Form2JsonError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(Form2JsonError::InvalidConfig(
                "api_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        for (name, prompt) in [
            ("structuring_prompt", &c.structuring_prompt),
            ("term_prompt", &c.term_prompt),
        ] {
            if prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(Form2JsonError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How markdown code fences are removed from a model response before parsing.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `Anchored` | Drop an opening fence line at the start and a closing fence at the end only (default) |
/// | `Legacy` | When the response starts with a `json`-tagged fence, delete every fence marker anywhere |
///
/// `Legacy` corrupts payloads whose string values contain three backticks;
/// it exists for byte-compatible output with older deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FencePolicy {
    #[default]
    Anchored,
    Legacy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.fence_policy, FencePolicy::Anchored);
        assert!(!c.require_object);
        assert!(c.ocr_fallback);
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ExtractionConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        let err = ExtractionConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn builder_rejects_blank_prompt_override() {
        let err = ExtractionConfig::builder()
            .term_prompt("   ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("term_prompt"));
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
