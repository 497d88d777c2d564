//! PDF rasterisation: render every page to an RGB bitmap via pdfium.
//!
//! Pages are rendered at a fixed [`RENDER_SCALE`] (2× linear, 4× area) so
//! small print is large enough for the recogniser. Rendering is
//! all-or-nothing: if the buffer does not parse or any page fails, the
//! caller gets a [`RenderError`] and no partial page list.
//!
//! The PDF is loaded straight from the caller's byte slice; nothing touches
//! the disk.

use crate::config::RENDER_SCALE;
use crate::error::{EngineInitError, RenderError};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable naming a directory that contains libpdfium.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// One rasterised page. Produced by a [`Rasterizer`], consumed by the OCR
/// stage, then dropped.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page: usize,
    pub image: RgbImage,
}

impl PageImage {
    pub fn new(page: usize, image: RgbImage) -> Self {
        Self { page, image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Turns a PDF byte buffer into ordered page images.
pub trait Rasterizer: Send + Sync {
    /// Render every page, in page order. Either all pages or an error.
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RenderError>;
}

/// [`Rasterizer`] backed by the pdfium library.
///
/// pdfium keeps thread-local state, so a fresh binding is made for each
/// document. [`PdfiumRasterizer::new`] binds once up front so a missing
/// library is reported at start-up rather than as a per-file failure.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Locate pdfium via `PDFIUM_LIB_PATH`, falling back to the system library.
    pub fn new() -> Result<Self, EngineInitError> {
        let dir = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
        Self::with_library_dir(dir)
    }

    /// Use libpdfium from `dir` (or the system library when `None`).
    pub fn with_library_dir(dir: Option<PathBuf>) -> Result<Self, EngineInitError> {
        let rasterizer = Self { library_dir: dir };
        rasterizer
            .bind()
            .map_err(|e| EngineInitError::PdfiumUnavailable(format!("{:?}", e)))?;
        info!(
            "pdfium bound ({})",
            rasterizer
                .library_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library".to_string())
        );
        Ok(rasterizer)
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match &self.library_dir {
            // A direct path to the library file is accepted too.
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .or_else(|_| Pdfium::bind_to_library(dir))?
            }
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        let pdfium = self.bind().map_err(|e| RenderError::Backend {
            detail: format!("{:?}", e),
        })?;
        render_document(&pdfium, pdf)
    }
}

/// Render all pages of `pdf` with an already-bound pdfium instance.
fn render_document(pdfium: &Pdfium, pdf: &[u8]) -> Result<Vec<PageImage>, RenderError> {
    let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            RenderError::PasswordProtected
        } else {
            RenderError::InvalidPdf { detail: err_str }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(RenderError::NoPages);
    }
    debug!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);

    let mut results = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError::PageFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        results.push(PageImage::new(page_num, image));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_image_reports_dimensions() {
        let img = PageImage::new(1, RgbImage::new(20, 10));
        assert_eq!(img.dimensions(), (20, 10));
        assert_eq!(img.page, 1);
    }
}
