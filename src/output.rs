//! Data model flowing between pipeline stages, plus the batch summary
//! records handed to the presentation layer.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// MIME type of assembled output documents.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type of bundled archives.
pub const ZIP_MIME: &str = "application/zip";

/// File extension of assembled output documents.
pub const OUTPUT_EXTENSION: &str = "docx";

/// One uploaded PDF: its original filename and raw bytes.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Filename without directory and final extension (`report.pdf` → `report`).
    pub fn stem(&self) -> String {
        file_stem(&self.name)
    }
}

/// Filename stem used for display names and output keys.
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Store key for the output derived from an original filename:
/// `{stem}_OCR.{ext}`.
pub fn output_name(original: &str, extension: &str) -> String {
    format!("{}_OCR.{}", file_stem(original), extension)
}

/// Recognised text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page: usize,
    /// Trimmed, space-joined detection text. Empty when nothing was read.
    pub text: String,
}

impl PageText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Ordered page texts of one source file.
///
/// Page numbers are always contiguous from 1, blank pages included, because
/// the only way to add a page is [`ExtractedDocument::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pages: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-page texts in page order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self::new();
        for t in texts {
            doc.push(t);
        }
        doc
    }

    /// Append the next page; its number is assigned here.
    pub fn push(&mut self, text: impl Into<String>) {
        let page = self.pages.len() + 1;
        self.pages.push(PageText {
            page,
            text: text.into(),
        });
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when no page produced any text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(PageText::is_empty)
    }

    /// Number of pages that produced text.
    pub fn pages_with_text(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_empty()).count()
    }

    /// Whole-document text with a `--- Page N ---` marker before every page.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for p in &self.pages {
            out.push_str(&format!("--- Page {} ---\n", p.page));
            out.push_str(&p.text);
            out.push_str("\n\n");
        }
        out
    }

    /// First `limit` characters of [`Self::plain_text`], with `...` appended
    /// when truncated.
    pub fn preview(&self, limit: usize) -> String {
        truncate_preview(&self.plain_text(), limit)
    }
}

pub(crate) fn truncate_preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Lifecycle of one file inside a batch.
///
/// ```text
/// Pending → Rasterizing → Recognizing → Assembling → Stored
///     └──────────┴─────────────┴─────────────┴──────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Pending,
    Rasterizing,
    Recognizing,
    Assembling,
    Stored,
    Failed,
}

impl FileStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStage::Stored | FileStage::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: FileStage) -> bool {
        use FileStage::*;
        match (self, next) {
            (Pending, Rasterizing)
            | (Rasterizing, Recognizing)
            | (Recognizing, Assembling)
            | (Assembling, Stored) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Final record of one file's trip through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    /// 0-indexed position in the batch.
    pub index: usize,
    /// Original filename.
    pub name: String,
    /// Terminal stage: [`FileStage::Stored`] or [`FileStage::Failed`].
    pub stage: FileStage,
    /// Store key when stored.
    pub output_key: Option<String>,
    /// Pages rasterised (0 when rendering failed).
    pub pages: usize,
    /// Pages that produced text.
    pub pages_with_text: usize,
    /// Failure reason when failed.
    pub error: Option<FileError>,
    /// Text preview of the stored result.
    pub preview: Option<String>,
    /// Wall-clock time spent on this file.
    pub duration_ms: u64,
}

impl FileOutcome {
    pub fn is_stored(&self) -> bool {
        self.stage == FileStage::Stored
    }
}

/// Result of [`crate::batch::BatchOrchestrator::process_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success_count: usize,
    pub total_files: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn failed_count(&self) -> usize {
        self.total_files - self.success_count
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileError> {
        self.outcomes.iter().filter_map(|o| o.error.as_ref())
    }
}
