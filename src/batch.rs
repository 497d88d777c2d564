//! Batch orchestration: drive uploaded files through render → OCR →
//! assemble and register the survivors in the session store.
//!
//! Files run one after another on the calling thread. A failure in any
//! stage ends that file only; the batch always visits every file. Stage
//! changes go through [`FileStage::can_transition_to`], so a file can never
//! be reported stored after it failed or skip a stage on the way.

use crate::config::{BatchConfig, RecognizerLanguages};
use crate::error::FileError;
use crate::output::{
    output_name, truncate_preview, BatchSummary, FileOutcome, FileStage, InputFile,
    OUTPUT_EXTENSION,
};
use crate::pipeline::assemble::assemble_document;
use crate::pipeline::ocr::{recognize_document, OcrEngine};
use crate::pipeline::render::Rasterizer;
use crate::progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
use crate::store::{ResultStore, StoredResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs batches against one shared engine and rasterizer.
///
/// Cheap to clone: the engine and rasterizer are reference counted and
/// shared across every batch and session that uses them.
#[derive(Clone)]
pub struct BatchOrchestrator {
    engine: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn Rasterizer>,
        config: BatchConfig,
    ) -> Self {
        Self {
            engine,
            rasterizer,
            config,
        }
    }

    /// Replace the configured progress callback.
    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// [`Self::process_batch`] with the configured languages.
    pub fn process(&self, files: &[InputFile], store: &mut ResultStore) -> BatchSummary {
        self.process_batch(files, &self.config.languages, store)
    }

    /// Process every file in order, adding each success to `store`.
    ///
    /// Never fails as a whole: per-file failures are recorded on the
    /// returned outcomes. A key that is already in the store is
    /// overwritten.
    pub fn process_batch(
        &self,
        files: &[InputFile],
        languages: &RecognizerLanguages,
        store: &mut ResultStore,
    ) -> BatchSummary {
        let cb = self.callback();
        let total_files = files.len();
        info!(
            "Starting batch: {} file(s), engine={}, languages={}",
            total_files,
            self.engine.name(),
            languages.tesseract_arg()
        );
        cb.on_batch_start(total_files);

        let outcomes: Vec<FileOutcome> = files
            .iter()
            .enumerate()
            .map(|(index, file)| self.process_file(index, file, languages, store))
            .collect();

        let summary = BatchSummary {
            success_count: outcomes.iter().filter(|o| o.is_stored()).count(),
            total_files,
            outcomes,
        };

        info!(
            "Batch complete: {}/{} file(s) stored, store holds {}",
            summary.success_count,
            summary.total_files,
            store.len()
        );
        cb.on_batch_complete(&summary);
        summary
    }

    /// Run one file through every stage.
    ///
    /// `index` is the file's position in its batch and is only used to
    /// label progress events and the outcome.
    pub fn process_file(
        &self,
        index: usize,
        file: &InputFile,
        languages: &RecognizerLanguages,
        store: &mut ResultStore,
    ) -> FileOutcome {
        let cb = self.callback();
        let mut run = FileRun::new(index, &file.name, cb);
        info!("[{}] {} ({} bytes)", index + 1, file.name, file.bytes.len());
        cb.on_file_start(index, &file.name);

        // ── Step 1: Rasterise ────────────────────────────────────────────
        run.advance(FileStage::Rasterizing);
        let pages = match self.rasterizer.rasterize(&file.bytes) {
            Ok(pages) => pages,
            Err(e) => return run.fail(FileError::render(&file.name, &e)),
        };
        run.pages = pages.len();
        debug!("{}: rasterised {} page(s)", file.name, run.pages);

        // ── Step 2: OCR every page ───────────────────────────────────────
        run.advance(FileStage::Recognizing);
        let doc = recognize_document(
            self.engine.as_ref(),
            pages,
            languages,
            self.config.paragraph,
            |fraction, status| cb.on_page_progress(index, fraction, status),
        );
        run.pages_with_text = doc.pages_with_text();
        if doc.is_blank() {
            return run.fail(FileError::EmptyResult {
                name: file.name.clone(),
                pages: doc.page_count(),
            });
        }

        // ── Step 3: Assemble ─────────────────────────────────────────────
        run.advance(FileStage::Assembling);
        let bytes = match assemble_document(&doc, &file.stem(), &self.config.assembly) {
            Ok(bytes) => bytes,
            Err(e) => return run.fail(FileError::assembly(&file.name, &e)),
        };

        // ── Step 4: Register ─────────────────────────────────────────────
        let key = output_name(&file.name, OUTPUT_EXTENSION);
        let text = doc.plain_text();
        let preview = truncate_preview(&text, self.config.preview_chars);
        let size = bytes.len();
        if let Some(previous) = store.put(key.clone(), StoredResult::new(&file.name, bytes, text)) {
            warn!(
                "{}: replaced earlier result from '{}' under '{}'",
                file.name, previous.original_name, key
            );
        }
        run.advance(FileStage::Stored);
        cb.on_file_stored(index, &file.name, &key);
        info!(
            "{} → {} ({}/{} pages with text, {} bytes)",
            file.name, key, run.pages_with_text, run.pages, size
        );

        run.finish(Some(key), Some(preview), None)
    }

    fn callback(&self) -> &dyn BatchProgressCallback {
        match self.config.progress_callback.as_deref() {
            Some(cb) => cb,
            None => &NoopProgressCallback,
        }
    }
}

/// Bookkeeping for one file while it moves through the stages.
struct FileRun<'a> {
    index: usize,
    name: &'a str,
    stage: FileStage,
    pages: usize,
    pages_with_text: usize,
    started: Instant,
    cb: &'a dyn BatchProgressCallback,
}

impl<'a> FileRun<'a> {
    fn new(index: usize, name: &'a str, cb: &'a dyn BatchProgressCallback) -> Self {
        Self {
            index,
            name,
            stage: FileStage::Pending,
            pages: 0,
            pages_with_text: 0,
            started: Instant::now(),
            cb,
        }
    }

    /// Move to `next` if legal, notifying the callback.
    fn advance(&mut self, next: FileStage) -> bool {
        if !self.stage.can_transition_to(next) {
            warn!(
                "{}: illegal stage transition {:?} → {:?} ignored",
                self.name, self.stage, next
            );
            return false;
        }
        self.stage = next;
        self.cb.on_stage(self.index, self.name, next);
        true
    }

    fn fail(mut self, error: FileError) -> FileOutcome {
        warn!("Skipping {} at {:?}: {}", self.name, self.stage, error);
        self.advance(FileStage::Failed);
        self.cb.on_file_failed(self.index, self.name, &error);
        self.finish(None, None, Some(error))
    }

    fn finish(
        self,
        output_key: Option<String>,
        preview: Option<String>,
        error: Option<FileError>,
    ) -> FileOutcome {
        FileOutcome {
            index: self.index,
            name: self.name.to_string(),
            stage: self.stage,
            output_key,
            pages: self.pages,
            pages_with_text: self.pages_with_text,
            error,
            preview,
            duration_ms: millis(self.started.elapsed()),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, RenderError};
    use crate::pipeline::ocr::{BoundingBox, Detection};
    use crate::pipeline::render::PageImage;
    use image::RgbImage;
    use std::sync::Mutex;

    /// Treats the input bytes as UTF-8, one page per `|`-separated segment.
    /// Input starting with `!` fails to render.
    struct TextRasterizer;

    impl Rasterizer for TextRasterizer {
        fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RenderError> {
            let s = std::str::from_utf8(pdf).map_err(|e| RenderError::InvalidPdf {
                detail: e.to_string(),
            })?;
            if s.starts_with('!') {
                return Err(RenderError::InvalidPdf {
                    detail: "bad header".into(),
                });
            }
            Ok(s
                .split('|')
                .enumerate()
                .map(|(i, _)| PageImage::new(i + 1, RgbImage::new(1, 1)))
                .collect())
        }
    }

    /// Reads page texts back from a shared script keyed by page number.
    struct EchoEngine {
        texts: Vec<&'static str>,
    }

    impl OcrEngine for EchoEngine {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn recognize(
            &self,
            page: &PageImage,
            _languages: &RecognizerLanguages,
            _paragraph: bool,
        ) -> Result<Vec<Detection>, EngineError> {
            let text = self.texts.get(page.page - 1).copied().unwrap_or("");
            if text.is_empty() {
                return Ok(vec![]);
            }
            Ok(vec![Detection {
                bbox: BoundingBox {
                    left: 0,
                    top: 0,
                    width: 1,
                    height: 1,
                },
                text: text.to_string(),
                confidence: 1.0,
            }])
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(usize, FileStage)>>);

    impl BatchProgressCallback for Recorder {
        fn on_stage(&self, index: usize, _name: &str, stage: FileStage) {
            self.0.lock().unwrap().push((index, stage));
        }
    }

    fn orchestrator(texts: Vec<&'static str>) -> BatchOrchestrator {
        BatchOrchestrator::new(
            Arc::new(EchoEngine { texts }),
            Arc::new(TextRasterizer),
            BatchConfig::default(),
        )
    }

    #[test]
    fn stored_file_walks_every_stage() {
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(vec!["hello"]).with_progress_callback(recorder.clone());
        let mut store = ResultStore::new();

        let summary = orch.process(&[InputFile::new("a.pdf", "p1")], &mut store);

        assert_eq!(summary.success_count, 1);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                (0, FileStage::Rasterizing),
                (0, FileStage::Recognizing),
                (0, FileStage::Assembling),
                (0, FileStage::Stored),
            ]
        );
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.output_key.as_deref(), Some("a_OCR.docx"));
        assert!(outcome.preview.as_deref().unwrap().contains("hello"));
        assert!(store.contains("a_OCR.docx"));
    }

    #[test]
    fn render_failure_stops_at_rasterizing() {
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(vec!["x"]).with_progress_callback(recorder.clone());
        let mut store = ResultStore::new();

        let summary = orch.process(&[InputFile::new("bad.pdf", "!junk")], &mut store);

        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.stage, FileStage::Failed);
        assert_eq!(outcome.error.as_ref().map(FileError::code), Some("render_failed"));
        assert_eq!(outcome.pages, 0);
        assert!(store.is_empty());
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![(0, FileStage::Rasterizing), (0, FileStage::Failed)]
        );
    }

    #[test]
    fn blank_document_is_empty_result() {
        let orch = orchestrator(vec!["", ""]);
        let mut store = ResultStore::new();

        let summary = orch.process(&[InputFile::new("blank.pdf", "p1|p2")], &mut store);

        let outcome = &summary.outcomes[0];
        assert_eq!(
            outcome.error,
            Some(FileError::EmptyResult {
                name: "blank.pdf".into(),
                pages: 2
            })
        );
        assert_eq!(outcome.pages, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn illegal_transition_is_refused() {
        let noop = NoopProgressCallback;
        let mut run = FileRun::new(0, "x.pdf", &noop);
        assert!(!run.advance(FileStage::Stored));
        assert_eq!(run.stage, FileStage::Pending);
        assert!(run.advance(FileStage::Rasterizing));
    }

    #[test]
    fn durations_saturate_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u64::MAX);
        assert_eq!(millis(Duration::from_micros(999)), 0);
    }
}
