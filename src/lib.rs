//! # edgequake-ocr2docx
//!
//! Batch OCR for scanned PDFs: every page is rasterised, read by an OCR
//! engine (English + German by default) and the text is written to one Word
//! document per input file. Results accumulate in a session store and can
//! be downloaded one by one or bundled into a single ZIP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Render    rasterise pages via pdfium at 2× scale
//!  ├─ 2. OCR       tesseract per page, progress per page
//!  ├─ 3. Assemble  title + "Page N" heading + text → DOCX
//!  └─ 4. Store     {stem}_OCR.docx in the session ResultStore
//!                   └─ archive: bundle the store into one ZIP
//! ```
//!
//! A failing file never aborts the batch: it is recorded on its
//! [`FileOutcome`] and the next file is processed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2docx::{
//!     BatchConfig, BatchOrchestrator, InputFile, PdfiumRasterizer, ResultStore,
//!     TesseractConfig, TesseractEngine,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default();
//!     let engine = TesseractEngine::new(TesseractConfig::default(), &config.languages)?;
//!     let rasterizer = PdfiumRasterizer::new()?;
//!     let orchestrator = BatchOrchestrator::new(Arc::new(engine), Arc::new(rasterizer), config);
//!
//!     let mut store = ResultStore::new();
//!     let files = vec![InputFile::new("scan.pdf", std::fs::read("scan.pdf")?)];
//!     let summary = orchestrator.process(&files, &mut store);
//!     eprintln!("{}/{} stored", summary.success_count, summary.total_files);
//!
//!     if edgequake_ocr2docx::should_offer_archive(&store) {
//!         std::fs::write("results.zip", edgequake_ocr2docx::bundle_store(&store)?)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2docx` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{bundle, bundle_store, should_offer_archive};
pub use batch::BatchOrchestrator;
pub use config::{
    AssemblyOptions, BatchConfig, BatchConfigBuilder, BlankPagePolicy, Language,
    RecognizerLanguages,
};
pub use error::{
    ArchiveError, AssemblyError, EngineError, EngineInitError, FileError, OcrError, RenderError,
};
pub use output::{BatchSummary, ExtractedDocument, FileOutcome, FileStage, InputFile, PageText};
pub use pipeline::assemble::assemble_document;
pub use pipeline::ocr::{BoundingBox, Detection, OcrEngine};
pub use pipeline::render::{PageImage, PdfiumRasterizer, Rasterizer};
pub use pipeline::tesseract::{TesseractConfig, TesseractEngine};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent, ProgressStatus};
pub use store::{ResultStore, StoredResult};
pub use stream::{progress_channel, spawn_batch, ProgressStream};
