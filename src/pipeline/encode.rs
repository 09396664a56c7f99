//! Picture encoding for the embedded image mode: `DynamicImage` → PNG →
//! base64 data URI.
//!
//! PNG keeps figures lossless; the data URI is what docling writes for
//! embedded pictures (`![Image](data:image/png;base64,…)`).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as base64 PNG.
pub fn encode_png(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} picture → {} bytes base64", img.width(), img.height(), b64.len());
    Ok(b64)
}

/// `data:image/png;base64,…` URI for an image.
pub fn image_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    Ok(format!("data:image/png;base64,{}", encode_png(img)?))
}
