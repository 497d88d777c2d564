//! Image encoding: rasterised page → PNG bytes for the OCR engine.
//!
//! PNG is lossless; JPEG artefacts around glyph edges measurably hurt
//! recognition on rendered text. The bytes are piped straight into the
//! engine process, so no temporary image file is ever written.

use crate::pipeline::render::PageImage;
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_page(page: &PageImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    page.image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded page {} → {} bytes PNG", page.page, buf.len());
    Ok(buf)
}
