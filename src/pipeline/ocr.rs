//! OCR stage: page images → per-page text.
//!
//! The engine is an opaque collaborator behind [`OcrEngine`]: it takes one
//! page image and returns [`Detection`]s in its own order. This stage only
//! decides how detections become page text and what happens when the engine
//! fails.
//!
//! ## Failure policy
//!
//! An engine error on one page is logged and swallowed: that page's text is
//! empty and the next page is processed. Whether a file with no readable
//! text at all is a failure is the orchestrator's call, not this stage's.

use crate::config::RecognizerLanguages;
use crate::error::EngineError;
use crate::output::ExtractedDocument;
use crate::pipeline::render::PageImage;
use crate::progress::ProgressStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Axis-aligned region in page-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        BoundingBox {
            left,
            top,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }
}

/// One engine result unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub text: String,
    /// 0.0 – 1.0
    pub confidence: f32,
}

/// A text recogniser.
///
/// Engines are expensive to build, so one instance is constructed per
/// process and shared read-only (`Arc<dyn OcrEngine>`) across files and
/// sessions.
pub trait OcrEngine: Send + Sync {
    /// Engine identifier, e.g. `"tesseract"`.
    fn name(&self) -> &'static str;

    /// Recognise text on one page.
    ///
    /// With `paragraph` set, nearby words are merged into paragraph-sized
    /// detections instead of one detection per word.
    fn recognize(
        &self,
        page: &PageImage,
        languages: &RecognizerLanguages,
        paragraph: bool,
    ) -> Result<Vec<Detection>, EngineError>;
}

/// Concatenate detection texts in engine order, separated by single spaces,
/// and trim the result.
pub fn page_text(detections: &[Detection]) -> String {
    let mut text = String::new();
    for d in detections {
        text.push_str(&d.text);
        text.push(' ');
    }
    text.trim().to_string()
}

/// Run OCR over every page, in order.
///
/// `on_page` is invoked after each page with `pages done / total` and a
/// status; it is purely observational. Page images are dropped as soon as
/// they have been recognised.
pub fn recognize_document<F>(
    engine: &dyn OcrEngine,
    pages: Vec<PageImage>,
    languages: &RecognizerLanguages,
    paragraph: bool,
    mut on_page: F,
) -> ExtractedDocument
where
    F: FnMut(f32, ProgressStatus),
{
    let total = pages.len();
    let mut doc = ExtractedDocument::new();

    for (idx, page) in pages.into_iter().enumerate() {
        let page_num = idx + 1;
        let status = match engine.recognize(&page, languages, paragraph) {
            Ok(detections) => {
                let text = page_text(&detections);
                debug!(
                    "Page {}/{}: {} detections, {} chars",
                    page_num,
                    total,
                    detections.len(),
                    text.len()
                );
                doc.push(text);
                ProgressStatus::PageRecognized {
                    page: page_num,
                    total,
                }
            }
            Err(e) => {
                warn!("{}; page text left empty", e);
                doc.push(String::new());
                ProgressStatus::PageFailed {
                    page: page_num,
                    total,
                }
            }
        };
        on_page(page_num as f32 / total as f32, status);
    }

    doc
}
