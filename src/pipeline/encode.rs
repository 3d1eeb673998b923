//! PNG encoding of the rendered page, plus base64 wrapping for vision calls.
//!
//! PNG is lossless; text crispness matters more than file size for OCR.

use crate::error::RasterError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
///
/// Fails with [`RasterError::EncodingFailed`] if the encoder errors or
/// produces no data.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RasterError::EncodingFailed(e.to_string()))?;

    if buf.is_empty() {
        return Err(RasterError::EncodingFailed("encoder produced no data".into()));
    }

    debug!("Encoded {}x{} page → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Wrap PNG bytes for a vision request.
///
/// `detail: "high"` asks GPT-4-class models for the full tile budget so
/// small resume fonts stay readable.
pub fn to_image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), "image/png").with_detail("high")
}
