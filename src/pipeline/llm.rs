//! Model invocation: the `ModelClient` capability and its edgequake-llm implementation.
//!
//! The rest of the pipeline only sees [`ModelClient`]: text in, raw text out.
//! That keeps prompt building and response parsing testable with a stub, and
//! lets callers construct the client once and pass it explicitly.
//!
//! There is no retry here. A transport, auth or quota failure is returned as
//! a fatal [`Form2JsonError`]; an empty answer is returned as-is and becomes
//! [`crate::ExtractionFailure::EmptyResponse`] in the parser.

use crate::config::ExtractionConfig;
use crate::error::Form2JsonError;
use crate::pipeline::response::RawResponse;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::debug;

/// A remote generation capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a prompt and return the model's raw text.
    async fn generate(&self, prompt: &str) -> Result<RawResponse, Form2JsonError>;

    /// Transcribe the text visible in an image.
    ///
    /// Clients without vision support keep the default, which reports
    /// [`Form2JsonError::OcrUnavailable`].
    async fn transcribe_image(&self, _image: ImageData) -> Result<RawResponse, Form2JsonError> {
        Err(Form2JsonError::OcrUnavailable)
    }
}

/// [`ModelClient`] backed by an edgequake-llm provider.
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Option<Duration>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: config.api_timeout_secs.map(Duration::from_secs),
        }
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<RawResponse, Form2JsonError> {
        let start = Instant::now();
        let call = self.provider.chat(messages, Some(&self.options));

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Form2JsonError::ApiTimeout {
                    secs: limit.as_secs(),
                })?,
            None => call.await,
        };

        let response = result.map_err(|e| Form2JsonError::LlmApiError {
            message: e.to_string(),
        })?;

        debug!(
            "LLM call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(RawResponse::new(response.content))
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<RawResponse, Form2JsonError> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    /// The system message carries the OCR instructions; the user turn holds
    /// only the image, since the picture is the whole input.
    async fn transcribe_image(&self, image: ImageData) -> Result<RawResponse, Form2JsonError> {
        let messages = [
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image]),
        ];
        self.chat(&messages).await
    }
}

/// A model client resolved on first use.
///
/// Credentials are not checked up front: a missing API key surfaces at the
/// first call that needs the model, and work that never calls the model
/// (text-layer PDFs with `--text-only`) never needs one.
pub struct LazyClient<'a> {
    config: &'a ExtractionConfig,
    cell: OnceCell<Arc<dyn ModelClient>>,
}

impl<'a> LazyClient<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Resolve the client (once) and return it.
    pub async fn get(&self) -> Result<&Arc<dyn ModelClient>, Form2JsonError> {
        self.cell
            .get_or_try_init(|| async { resolve_client(self.config) })
            .await
    }
}

/// Default model per provider when `--model` is not given.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some(DEFAULT_GEMINI_MODEL),
        "openai" => Some("gpt-4.1-nano"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        _ => None,
    }
}

/// Default model for the Gemini provider.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`): used as-is (tests, custom
///    middleware, non-LLM backends).
/// 2. **Named provider** (`config.provider_name`): created through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
/// 3. **Environment pair** (`FORM2JSON_PROVIDER` + `FORM2JSON_MODEL`).
/// 4. **Gemini key**: `GEMINI_API_KEY` set selects Gemini.
/// 5. **Auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn ModelClient>, Form2JsonError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmClient::new(provider, config)))
}

fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Form2JsonError> {
    if let Some(ref name) = config.provider_name {
        let model = match config.model.as_deref().or_else(|| default_model(name)) {
            Some(m) => m,
            None => {
                return Err(Form2JsonError::ProviderNotConfigured {
                    provider: name.clone(),
                    hint: format!("No default model is known for '{name}'. Pass --model."),
                })
            }
        };
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("FORM2JSON_PROVIDER"),
        std::env::var("FORM2JSON_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Form2JsonError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY (a .env file works too).\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Form2JsonError> {
    debug!("Creating LLM provider '{}' with model '{}'", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Form2JsonError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TextOnly;

    #[async_trait]
    impl ModelClient for TextOnly {
        async fn generate(&self, prompt: &str) -> Result<RawResponse, Form2JsonError> {
            Ok(RawResponse::new(prompt.len().to_string()))
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn default_transcribe_reports_ocr_unavailable() {
        let image = ImageData::new("AAAA".to_string(), "image/png");
        let err = tokio_test::block_on(TextOnly.transcribe_image(image)).unwrap_err();
        assert!(matches!(err, Form2JsonError::OcrUnavailable));
    }

    #[test]
    fn stub_generate_is_callable_through_dyn() {
        let client: Arc<dyn ModelClient> = Arc::new(TextOnly);
        let raw = tokio_test::block_on(client.generate("abc")).unwrap();
        assert_eq!(raw.text(), Some("3"));
    }
}
