//! Error types for the edgequake-ocr2docx library.
//!
//! Failures are scoped to the unit of work they abort:
//!
//! * [`EngineError`] — **page**: the OCR engine failed on one page image.
//!   Swallowed by the OCR stage; the page simply contributes no text.
//!
//! * [`RenderError`], [`AssemblyError`] and [`FileError::EmptyResult`] —
//!   **file**: the file is skipped, the rest of the batch carries on. The
//!   orchestrator folds them into a [`FileError`] stored on the file's
//!   [`crate::output::FileOutcome`].
//!
//! * [`ArchiveError`] — **batch**: bundling the session's outputs failed.
//!   Outputs already in the [`crate::store::ResultStore`] stay valid.
//!
//! * [`EngineInitError`] — **process**: the OCR engine or the pdfium library
//!   could not be brought up. Nothing can be processed without them.
//!
//! [`OcrError`] is the top-level fatal error returned by fallible entry
//! points (configuration, engine construction, archiving).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr2docx library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::FileOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The OCR engine or the PDF renderer could not be initialised.
    #[error(transparent)]
    EngineInit(#[from] EngineInitError),

    /// Bundling the result store into an archive failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Process-level failure to construct a shared engine.
#[derive(Debug, Error)]
pub enum EngineInitError {
    /// The tesseract executable could not be run.
    #[error("Tesseract binary '{binary}' is not usable: {detail}\nInstall tesseract or pass --tesseract <PATH>.")]
    BinaryUnavailable { binary: String, detail: String },

    /// A declared recognizer language has no trained data installed.
    #[error("Tesseract language data '{code}' is not installed.\nInstall the '{code}' traineddata or set --tessdata <DIR>.")]
    LanguageMissing { code: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium or pass --pdfium-lib.\n"
    )]
    PdfiumUnavailable(String),
}

/// Rasterising a PDF failed. All-or-nothing: no partial page list survives.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The buffer could not be parsed as a PDF.
    #[error("not a valid PDF: {detail}")]
    InvalidPdf { detail: String },

    /// The PDF is encrypted and needs a password.
    #[error("PDF is password protected")]
    PasswordProtected,

    /// The PDF parsed but contains no pages.
    #[error("PDF contains no pages")]
    NoPages,

    /// The rendering backend could not be reached for this document.
    #[error("renderer unavailable: {detail}")]
    Backend { detail: String },

    /// A single page failed to render; the whole file is rejected.
    #[error("rasterisation failed for page {page}: {detail}")]
    PageFailed { page: usize, detail: String },
}

/// The OCR engine failed on one page image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("OCR engine failed on page {page}: {detail}")]
pub struct EngineError {
    pub page: usize,
    pub detail: String,
}

/// Serialising the output document failed.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Text contains a character that cannot appear in an XML document.
    #[error("page {page} contains a character not allowed in XML (U+{codepoint:04X})")]
    InvalidCharacter { page: usize, codepoint: u32 },

    /// Writing a part of the document container failed.
    #[error("failed to write document part '{part}': {source}")]
    Container {
        part: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// I/O error while streaming a part into the container.
    #[error("failed to write document part '{part}': {source}")]
    Io {
        part: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bundling outputs into an archive failed. The archive is discarded as a unit.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// There was nothing to bundle.
    #[error("no outputs to archive")]
    Empty,

    /// Writing one entry failed.
    #[error("failed to write archive entry '{name}': {detail}")]
    EntryWrite { name: String, detail: String },

    /// Finalising the central directory failed.
    #[error("failed to finalise archive: {0}")]
    Finish(#[source] zip::result::ZipError),
}

/// A non-fatal error for a single file.
///
/// Stored on [`crate::output::FileOutcome`]. The batch continues with the
/// next file. `Display` is the human-readable per-file failure indicator.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileError {
    /// Rasterisation failed.
    #[error("{name}: rendering failed: {detail}")]
    Render { name: String, detail: String },

    /// OCR ran on every page but no text was recognised.
    #[error("{name}: no text could be extracted from {pages} page(s)")]
    EmptyResult { name: String, pages: usize },

    /// The output document could not be written.
    #[error("{name}: document assembly failed: {detail}")]
    Assembly { name: String, detail: String },
}

impl FileError {
    /// Short machine-readable code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            FileError::Render { .. } => "render_failed",
            FileError::EmptyResult { .. } => "empty_result",
            FileError::Assembly { .. } => "assembly_failed",
        }
    }

    pub(crate) fn render(name: &str, err: &RenderError) -> Self {
        FileError::Render {
            name: name.to_string(),
            detail: err.to_string(),
        }
    }

    pub(crate) fn assembly(name: &str, err: &AssemblyError) -> Self {
        FileError::Assembly {
            name: name.to_string(),
            detail: err.to_string(),
        }
    }
}
