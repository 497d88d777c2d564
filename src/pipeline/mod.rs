//! Pipeline stages for PDF-to-DOCX OCR.
//!
//! Each submodule implements one transformation step and is independently
//! testable. The OCR engine and the rasterizer sit behind traits so the
//! batch orchestrator never depends on pdfium or tesseract directly.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ tesseract ──▶ ocr ──▶ assemble
//! (pdfium)   (PNG)      (TSV words)   (text)  (DOCX)
//! ```
//!
//! 1. [`render`]    rasterise every page at 2× scale
//! 2. [`encode`]    PNG-encode a page for the engine's stdin
//! 3. [`tesseract`] run the engine, group words into paragraphs
//! 4. [`ocr`]       per-page text, page failures swallowed
//! 5. [`assemble`]  title, page headings and text into a DOCX container

pub mod assemble;
pub mod encode;
pub mod ocr;
pub mod render;
pub mod tesseract;
