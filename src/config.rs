//! Configuration types for batch PDF OCR.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Engine construction parameters (tesseract binary,
//! pdfium location) live with the engines themselves since those are built
//! once per process and shared across batches.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear scale applied when rasterising a PDF page (4× the pixel area).
pub const RENDER_SCALE: f32 = 2.0;

/// Default number of characters shown by [`crate::output::ExtractedDocument::preview`].
pub const DEFAULT_PREVIEW_CHARS: usize = 2000;

/// Configuration for a batch run.
///
/// # Example
/// ```rust
/// use edgequake_ocr2docx::{BatchConfig, BlankPagePolicy};
///
/// let config = BatchConfig::builder()
///     .blank_pages(BlankPagePolicy::Marker)
///     .page_label("Seite")
///     .build()
///     .unwrap();
/// assert_eq!(config.assembly.page_label, "Seite");
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Languages handed to the recognizer. Default: English + German.
    pub languages: RecognizerLanguages,

    /// Merge nearby detections into paragraph-sized spans. Default: true.
    pub paragraph: bool,

    /// Layout of the assembled document.
    pub assembly: AssemblyOptions,

    /// Characters kept by text previews. Default: 2000.
    pub preview_chars: usize,

    /// Receives batch, file, stage and page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            languages: RecognizerLanguages::default(),
            paragraph: true,
            assembly: AssemblyOptions::default(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("languages", &self.languages)
            .field("paragraph", &self.paragraph)
            .field("assembly", &self.assembly)
            .field("preview_chars", &self.preview_chars)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn languages(mut self, languages: RecognizerLanguages) -> Self {
        self.config.languages = languages;
        self
    }

    pub fn paragraph(mut self, v: bool) -> Self {
        self.config.paragraph = v;
        self
    }

    pub fn blank_pages(mut self, policy: BlankPagePolicy) -> Self {
        self.config.assembly.blank_pages = policy;
        self
    }

    pub fn title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.assembly.title_prefix = prefix.into();
        self
    }

    pub fn page_label(mut self, label: impl Into<String>) -> Self {
        self.config.assembly.page_label = label.into();
        self
    }

    pub fn preview_chars(mut self, n: usize) -> Self {
        self.config.preview_chars = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, OcrError> {
        let c = &self.config;
        if c.languages.is_empty() {
            return Err(OcrError::InvalidConfig(
                "At least one recognizer language is required".into(),
            ));
        }
        if c.assembly.page_label.trim().is_empty() {
            return Err(OcrError::InvalidConfig("Page label must not be empty".into()));
        }
        for (field, value) in [
            ("Title prefix", &c.assembly.title_prefix),
            ("Page label", &c.assembly.page_label),
        ] {
            if let Some(ch) = value.chars().find(|ch| ch.is_control()) {
                return Err(OcrError::InvalidConfig(format!(
                    "{field} contains control character U+{:04X}",
                    ch as u32
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// A recognizer language. Only the declared English/German pair is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    German,
}

impl Language {
    /// Tesseract traineddata code.
    pub fn tesseract_code(self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::German => "deu",
        }
    }

    /// ISO 639-1 code.
    pub fn iso_code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
        }
    }
}

/// Ordered, de-duplicated set of recognizer languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerLanguages(Vec<Language>);

impl Default for RecognizerLanguages {
    fn default() -> Self {
        Self(vec![Language::English, Language::German])
    }
}

impl RecognizerLanguages {
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Self {
        let mut out = Vec::new();
        for lang in languages {
            if !out.contains(&lang) {
                out.push(lang);
            }
        }
        Self(out)
    }

    pub fn as_slice(&self) -> &[Language] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `eng+deu` style argument for `tesseract -l`.
    pub fn tesseract_arg(&self) -> String {
        self.0
            .iter()
            .map(|l| l.tesseract_code())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// What the assembler does with pages whose OCR text is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankPagePolicy {
    /// Blank pages get no subsection at all. (default)
    #[default]
    Omit,
    /// Blank pages keep their heading followed by an empty paragraph, so
    /// page numbers stay reconstructable from the document.
    Marker,
}

/// Text and layout choices for the assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Prepended to the display name in the title. Default: `"OCR Result: "`.
    pub title_prefix: String,
    /// Word preceding the page ordinal in page headings. Default: `"Page"`.
    pub page_label: String,
    /// Default: [`BlankPagePolicy::Omit`].
    pub blank_pages: BlankPagePolicy,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            title_prefix: "OCR Result: ".to_string(),
            page_label: "Page".to_string(),
            blank_pages: BlankPagePolicy::default(),
        }
    }
}

impl AssemblyOptions {
    /// Render the heading for the given page number (1-indexed).
    pub fn page_heading(&self, page: usize) -> String {
        format!("{} {}", self.page_label, page)
    }
}
