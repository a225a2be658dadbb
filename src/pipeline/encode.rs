//! Image decoding and encoding for vision OCR.
//!
//! Uploaded photos arrive as PNG or JPEG; rasterised PDF pages arrive as
//! `DynamicImage`. Both leave this module the same way: a lossless PNG,
//! base64-wrapped in `ImageData` for the multimodal request body. PNG keeps
//! small print crisp where JPEG artefacts would hurt OCR accuracy.

use crate::error::Form2JsonError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode an uploaded image file.
pub fn decode_image(bytes: &[u8], source_name: &str) -> Result<DynamicImage, Form2JsonError> {
    let img = image::load_from_memory(bytes).map_err(|e| Form2JsonError::ImageDecodeFailed {
        source_name: source_name.to_string(),
        detail: e.to_string(),
    })?;
    debug!(
        "Decoded {} → {}x{} px",
        source_name,
        img.width(),
        img.height()
    );
    Ok(img)
}

/// Encode an image as a base64 PNG ready for the vision API.
///
/// `detail: "high"` asks tiling models for the full tile budget; with `low`
/// the form is squeezed into one small tile and field values become unreadable.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let data = encode_image(&red_square()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn decode_round_trips_png_bytes() {
        let mut png = Vec::new();
        red_square()
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let img = decode_image(&png, "square.png").expect("decode should succeed");
        assert_eq!((img.width(), img.height()), (10, 10));
    }

    #[test]
    fn decode_garbage_is_typed_error() {
        let err = decode_image(b"\x89PNG\r\n\x1a\nnot really", "broken.png").unwrap_err();
        match err {
            Form2JsonError::ImageDecodeFailed { source_name, .. } => {
                assert_eq!(source_name, "broken.png")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
