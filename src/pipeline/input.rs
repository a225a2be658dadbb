//! Input resolution: load a user-supplied path or URL into memory and classify it.
//!
//! Both backends work from bytes (pdfium loads from a byte slice, the image
//! decoder reads from memory), so URL inputs are downloaded straight into a
//! buffer and no temporary file is needed. The kind is decided from magic
//! bytes first and the file extension second, so a misnamed upload still
//! reaches the right extractor.

use crate::error::Form2JsonError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which extraction backend a document needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Multi-page PDF, with or without a text layer.
    Pdf,
    /// Raster image (PNG, JPG, JPEG).
    Image,
}

/// A document loaded into memory.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// File name or URL, used in error messages.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: InputKind,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input string (path or URL) and detect its kind.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, Form2JsonError> {
    let (name, bytes) = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        (input.to_string(), read_local(input).await?)
    };

    let kind = detect_kind(&bytes, &name).ok_or_else(|| Form2JsonError::UnsupportedFormat {
        source_name: name.clone(),
    })?;
    debug!("Loaded {} ({} bytes) as {:?}", name, bytes.len(), kind);

    Ok(LoadedInput { name, bytes, kind })
}

/// Classify a document from its leading bytes, falling back to the extension.
pub fn detect_kind(bytes: &[u8], name: &str) -> Option<InputKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(InputKind::Pdf);
    }
    if matches!(
        image::guess_format(bytes),
        Ok(image::ImageFormat::Png | image::ImageFormat::Jpeg)
    ) {
        return Some(InputKind::Image);
    }

    let ext = Path::new(name.split(['?', '#']).next().unwrap_or(name))
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;
    match ext.as_str() {
        "pdf" => Some(InputKind::Pdf),
        "png" | "jpg" | "jpeg" => Some(InputKind::Image),
        _ => None,
    }
}

/// Read a local file, mapping the common failure modes to typed errors.
async fn read_local(path_str: &str) -> Result<Vec<u8>, Form2JsonError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Form2JsonError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Form2JsonError::FileNotFound { path })
        }
        Err(e) => Err(Form2JsonError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Download a URL into memory, returning a display name and the body.
async fn download_url(url: &str, timeout_secs: u64) -> Result<(String, Vec<u8>), Form2JsonError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Form2JsonError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Form2JsonError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Form2JsonError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Form2JsonError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Form2JsonError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok((extract_filename(url), bytes.to_vec()))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/form.pdf"));
        assert!(is_url("http://example.com/form.png"));
        assert!(!is_url("/tmp/form.pdf"));
        assert!(!is_url("form.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn detect_by_magic_bytes() {
        assert_eq!(detect_kind(b"%PDF-1.7\n", "upload"), Some(InputKind::Pdf));
        assert_eq!(detect_kind(PNG_MAGIC, "upload"), Some(InputKind::Image));
        assert_eq!(detect_kind(JPEG_MAGIC, "upload"), Some(InputKind::Image));
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        assert_eq!(detect_kind(b"%PDF-1.4", "scan.png"), Some(InputKind::Pdf));
    }

    #[test]
    fn detect_by_extension_fallback() {
        assert_eq!(detect_kind(b"", "form.PDF"), Some(InputKind::Pdf));
        assert_eq!(detect_kind(b"", "photo.JPEG"), Some(InputKind::Image));
        assert_eq!(
            detect_kind(b"", "https://host/scan.jpg?sig=abc"),
            Some(InputKind::Image)
        );
    }

    #[test]
    fn unknown_kind() {
        assert_eq!(detect_kind(b"PK\x03\x04", "form.docx"), None);
        assert_eq!(detect_kind(b"hello", "README"), None);
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://host/a/b/form.pdf"), "form.pdf");
        assert_eq!(extract_filename("https://host/download"), "https://host/download");
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = load_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Form2JsonError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unsupported_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain text").unwrap();

        let err = load_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, Form2JsonError::UnsupportedFormat { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn local_pdf_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.bin");
        std::fs::write(&path, b"%PDF-1.7\n%fake").unwrap();

        let loaded = load_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(loaded.kind, InputKind::Pdf);
        assert_eq!(loaded.bytes.len(), 14);
    }
}
