//! CLI binary for form2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use form2json::{
    extract_form, extract_text, save_json, ExtractionConfig, ExtractionProgressCallback,
    FencePolicy, FormExtraction, ProgressCallback, Stage, DEFAULT_OUTPUT_FILENAME,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the pipeline stages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<28} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        self.bar.set_message(format!("OCR page {page_num}/{total_pages}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structured JSON on stdout
  form2json intake_form.pdf

  # Also extract medical terms, and save the structured JSON
  form2json --terms --save scan.png

  # Write to a specific file
  form2json intake_form.pdf -o patient.json

  # Only read the text (no API key needed for PDFs with a text layer)
  form2json --text-only intake_form.pdf

  # Use a specific provider and model
  form2json --provider openai --model gpt-4.1-mini form.jpg

  # Reproduce the old fence handling
  form2json --legacy-fences form.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (selects Gemini when set)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  FORM2JSON_PROVIDER      Provider (gemini, openai, anthropic, ollama, …)
  FORM2JSON_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides --verbose / --quiet

A .env file in the working directory is loaded at startup.
"#;

/// Extract structured JSON from scanned forms using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "form2json",
    version,
    about = "Extract structured JSON from scanned forms (PDF, PNG, JPG) using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PNG/JPG file path or HTTP/HTTPS URL.
    input: String,

    /// Also extract medical terms in six categories.
    #[arg(long, env = "FORM2JSON_TERMS")]
    terms: bool,

    /// Include the extracted text in the output.
    #[arg(long, env = "FORM2JSON_SHOW_TEXT")]
    show_text: bool,

    /// Print the extracted text only; no structuring call.
    #[arg(long, env = "FORM2JSON_TEXT_ONLY")]
    text_only: bool,

    /// Save the structured JSON to extracted_form.json.
    #[arg(long, env = "FORM2JSON_SAVE")]
    save: bool,

    /// Save the structured JSON to this file.
    #[arg(short, long, env = "FORM2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-nano).
    #[arg(long, env = "FORM2JSON_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "FORM2JSON_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FORM2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "FORM2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds (no timeout when unset).
    #[arg(long, env = "FORM2JSON_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FORM2JSON_PASSWORD")]
    password: Option<String>,

    /// Remove every code-fence marker instead of only the outer fence.
    #[arg(long, env = "FORM2JSON_LEGACY_FENCES")]
    legacy_fences: bool,

    /// Treat a structured answer that is not a JSON object as a parse error.
    #[arg(long, env = "FORM2JSON_REQUIRE_OBJECT")]
    require_object: bool,

    /// Do not OCR PDF pages that have no text layer.
    #[arg(long, env = "FORM2JSON_NO_OCR_FALLBACK")]
    no_ocr_fallback: bool,

    /// Longest edge in pixels when rasterising scanned pages.
    #[arg(long, env = "FORM2JSON_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FORM2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FORM2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "FORM2JSON_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "FORM2JSON_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before clap reads `env = ...` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives stage feedback, so INFO logs are only shown without it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ExtractionProgressCallback>),
    )?;

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let document = extract_text(&cli.input, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let document = document.context("Text extraction failed")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", document.text).context("Failed to write to stdout")?;
        return Ok(());
    }

    // ── Full extraction ──────────────────────────────────────────────────
    let output = extract_form(&cli.input, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = output.context("Extraction failed")?;

    let rendered = render_output(&cli, &output);
    println!(
        "{}",
        serde_json::to_string_pretty(&rendered).context("Failed to serialise output")?
    );

    let save_path = cli
        .output
        .clone()
        .or_else(|| cli.save.then(|| PathBuf::from(DEFAULT_OUTPUT_FILENAME)));
    if let Some(ref path) = save_path {
        save_json(&output.structured, path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    if !cli.quiet {
        print_summary(&output, save_path.as_deref());
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .extract_terms(cli.terms)
        .require_object(cli.require_object)
        .ocr_fallback(!cli.no_ocr_fallback)
        .max_rendered_pixels(cli.max_pixels)
        .download_timeout_secs(cli.download_timeout);

    if cli.legacy_fences {
        builder = builder.fence_policy(FencePolicy::Legacy);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// The JSON printed on stdout.
///
/// Just the structured value by default; an object with one key per section
/// when the text or the terms were asked for too.
fn render_output(cli: &Cli, output: &FormExtraction) -> Value {
    let structured = output.structured.to_display_value();
    if !cli.show_text && output.terms.is_none() {
        return structured;
    }

    let mut sections = serde_json::Map::new();
    if cli.show_text {
        sections.insert("extracted_text".into(), json!(output.document.text));
    }
    sections.insert("structured".into(), structured);
    if let Some(ref terms) = output.terms {
        let terms_value = match terms.categorized_terms() {
            Some(t) => json!(t),
            None => terms.to_display_value(),
        };
        sections.insert("terms".into(), terms_value);
    }
    Value::Object(sections)
}

fn print_summary(output: &FormExtraction, saved: Option<&std::path::Path>) {
    let doc = &output.document;
    eprintln!(
        "{} {:?}  {} pages ({} via OCR)  {} chars  {}ms",
        if output.structured.is_success() {
            green("✔")
        } else {
            yellow("⚠")
        },
        doc.kind,
        doc.page_count,
        doc.ocr_pages,
        doc.text.len(),
        output.stats.total_duration_ms,
    );
    if let Some(failure) = output.structured.failure() {
        eprintln!("   {}", yellow(&failure.message()));
    }
    if let Some(path) = saved {
        eprintln!("   saved  →  {}", bold(&path.display().to_string()));
    }
}
