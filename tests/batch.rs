//! Batch pipeline tests with an in-memory rasterizer and engine.
//!
//! No pdfium or tesseract needed. A "PDF" here is the header
//! `%FAKE-PDF\n` followed by page texts separated by form feeds. The
//! rasterizer writes each page's text into the pixels of its image and the
//! engine reads it back, so page identity survives the trip exactly the way
//! a real page image would carry its glyphs.

use edgequake_ocr2docx::{
    bundle, bundle_store, spawn_batch, ArchiveError, BatchConfig, BatchOrchestrator, BlankPagePolicy, BoundingBox,
    Detection, EngineError, FileError, FileStage, InputFile, OcrEngine, PageImage,
    ProgressEvent, ProgressStatus, Rasterizer, RecognizerLanguages, RenderError, ResultStore,
};
use edgequake_ocr2docx::stream::join_batch;
use futures::StreamExt;
use image::{Rgb, RgbImage};
use std::io::{Cursor, Read};
use std::sync::Arc;
use zip::ZipArchive;

const HEADER: &str = "%FAKE-PDF\n";
/// Page text that makes the engine fail on that page.
const ENGINE_FAILURE: &str = "#ERR";

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeRasterizer;

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        let body = pdf
            .strip_prefix(HEADER.as_bytes())
            .ok_or_else(|| RenderError::InvalidPdf {
                detail: "missing header".into(),
            })?;
        let body = std::str::from_utf8(body).map_err(|e| RenderError::InvalidPdf {
            detail: e.to_string(),
        })?;
        if body.is_empty() {
            return Err(RenderError::NoPages);
        }
        Ok(body
            .split('\x0c')
            .enumerate()
            .map(|(i, text)| PageImage::new(i + 1, text_image(text)))
            .collect())
    }
}

fn text_image(text: &str) -> RgbImage {
    let bytes = text.as_bytes();
    let mut img = RgbImage::new(bytes.len() as u32 + 1, 1);
    for (x, b) in bytes.iter().enumerate() {
        img.put_pixel(x as u32, 0, Rgb([*b, 0, 0]));
    }
    img
}

fn image_text(img: &RgbImage) -> String {
    let bytes: Vec<u8> = img
        .pixels()
        .map(|p| p.0[0])
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8(bytes).unwrap()
}

/// One detection per whitespace-separated word.
struct FakeEngine;

impl OcrEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn recognize(
        &self,
        page: &PageImage,
        _languages: &RecognizerLanguages,
        _paragraph: bool,
    ) -> Result<Vec<Detection>, EngineError> {
        let text = image_text(&page.image);
        if text == ENGINE_FAILURE {
            return Err(EngineError {
                page: page.page,
                detail: "simulated crash".into(),
            });
        }
        Ok(text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| Detection {
                bbox: BoundingBox {
                    left: i as u32 * 10,
                    top: 0,
                    width: 10,
                    height: 10,
                },
                text: word.to_string(),
                confidence: 0.9,
            })
            .collect())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pdf(name: &str, pages: &[&str]) -> InputFile {
    InputFile::new(name, format!("{HEADER}{}", pages.join("\x0c")))
}

fn broken(name: &str) -> InputFile {
    InputFile::new(name, b"this is not a pdf".to_vec())
}

fn orchestrator(config: BatchConfig) -> BatchOrchestrator {
    BatchOrchestrator::new(Arc::new(FakeEngine), Arc::new(FakeRasterizer), config)
}

fn document_xml(docx: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).expect("docx is a zip");
    let mut part = archive.by_name("word/document.xml").expect("document part");
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn heading_count(xml: &str) -> usize {
    xml.matches(r#"<w:pStyle w:val="Heading1"/>"#).count()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn mixed_batch_of_five_stores_three() {
    let files = vec![
        pdf("a.pdf", &["alpha"]),
        broken("b.pdf"),
        pdf("c.pdf", &["gamma", "delta"]),
        broken("d.pdf"),
        pdf("e.pdf", &["epsilon"]),
    ];
    let mut store = ResultStore::new();

    let summary = orchestrator(BatchConfig::default()).process(&files, &mut store);

    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.total_files, 5);
    assert_eq!(summary.failed_count(), 2);
    assert_eq!(store.len(), 3);
    assert_eq!(store.list(), vec!["a_OCR.docx", "c_OCR.docx", "e_OCR.docx"]);

    let failed: Vec<&str> = summary
        .outcomes
        .iter()
        .filter(|o| o.stage == FileStage::Failed)
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(failed, vec!["b.pdf", "d.pdf"]);
    assert!(summary.failures().all(|e| e.code() == "render_failed"));
}

#[test]
fn unparsable_file_leaves_earlier_results_untouched() {
    let orch = orchestrator(BatchConfig::default());
    let mut store = ResultStore::new();
    orch.process(&[pdf("keep.pdf", &["kept"])], &mut store);
    let before = store.get("keep_OCR.docx").unwrap().bytes.clone();

    let summary = orch.process(&[broken("keep.pdf")], &mut store);

    assert_eq!(summary.success_count, 0);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("keep_OCR.docx").unwrap().bytes, before);
}

#[test]
fn same_name_twice_keeps_the_later_result() {
    let files = vec![
        pdf("report.pdf", &["first version"]),
        pdf("report.pdf", &["second version"]),
    ];
    let mut store = ResultStore::new();

    let summary = orchestrator(BatchConfig::default()).process(&files, &mut store);

    assert_eq!(summary.success_count, 2);
    assert_eq!(store.len(), 1);
    let xml = document_xml(&store.get("report_OCR.docx").unwrap().bytes);
    assert!(xml.contains("second version"));
    assert!(!xml.contains("first version"));
}

#[test]
fn n_pages_in_order() {
    let pages = ["Ahorn", "Birke", "Chorus", "Dattel", "Eibe", "Fichte"];
    let mut store = ResultStore::new();

    let summary = orchestrator(BatchConfig::default()).process(&[pdf("six.pdf", &pages)], &mut store);

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.pages, 6);
    assert_eq!(outcome.pages_with_text, 6);

    let xml = document_xml(&store.get("six_OCR.docx").unwrap().bytes);
    let positions: Vec<usize> = pages.iter().map(|p| xml.find(p).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    for n in 1..=6 {
        assert!(xml.contains(&format!(">Page {n}<")));
    }
}

#[test]
fn blank_middle_page_gets_no_section() {
    let mut store = ResultStore::new();
    orchestrator(BatchConfig::default()).process(&[pdf("scan.pdf", &["front", "", "back"])], &mut store);

    let xml = document_xml(&store.get("scan_OCR.docx").unwrap().bytes);
    assert_eq!(heading_count(&xml), 2);
    assert!(xml.contains(">Page 1<"));
    assert!(!xml.contains(">Page 2<"));
    assert!(xml.contains(">Page 3<"));
}

#[test]
fn blank_middle_page_marked_when_configured() {
    let config = BatchConfig::builder()
        .blank_pages(BlankPagePolicy::Marker)
        .page_label("Seite")
        .title_prefix("OCR-Ergebnis: ")
        .build()
        .unwrap();
    let mut store = ResultStore::new();
    orchestrator(config).process(&[pdf("scan.pdf", &["vorne", "", "hinten"])], &mut store);

    let xml = document_xml(&store.get("scan_OCR.docx").unwrap().bytes);
    assert_eq!(heading_count(&xml), 3);
    assert!(xml.contains(">Seite 2<"));
    assert!(xml.contains(">OCR-Ergebnis: scan<"));
}

#[test]
fn no_text_anywhere_is_an_empty_result() {
    let files = vec![pdf("blank.pdf", &["", "   "]), pdf("crash.pdf", &[ENGINE_FAILURE])];
    let mut store = ResultStore::new();

    let summary = orchestrator(BatchConfig::default()).process(&files, &mut store);

    assert_eq!(summary.success_count, 0);
    assert!(store.is_empty());
    assert_eq!(
        summary.outcomes[0].error,
        Some(FileError::EmptyResult {
            name: "blank.pdf".into(),
            pages: 2
        })
    );
    assert_eq!(
        summary.outcomes[1].error.as_ref().map(FileError::code),
        Some("empty_result")
    );
}

#[test]
fn engine_failure_on_one_page_is_not_fatal() {
    let mut store = ResultStore::new();
    let summary = orchestrator(BatchConfig::default())
        .process(&[pdf("flaky.pdf", &["good", ENGINE_FAILURE, "also good"])], &mut store);

    let outcome = &summary.outcomes[0];
    assert!(outcome.is_stored());
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.pages_with_text, 2);
    let text = &store.get("flaky_OCR.docx").unwrap().extracted_text;
    assert!(text.contains("--- Page 2 ---\n\n"));
}

#[test]
fn zero_page_pdf_fails_rendering() {
    let mut store = ResultStore::new();
    let summary = orchestrator(BatchConfig::default()).process(&[pdf("empty.pdf", &[])], &mut store);
    assert_eq!(
        summary.outcomes[0].error.as_ref().map(FileError::code),
        Some("render_failed")
    );
}

#[test]
fn identical_input_gives_identical_bytes() {
    let orch = orchestrator(BatchConfig::default());
    let file = pdf("brief.pdf", &["Sehr geehrte Damen und Herren", "", "Mit freundlichen Grüßen"]);

    let mut first = ResultStore::new();
    let mut second = ResultStore::new();
    orch.process(std::slice::from_ref(&file), &mut first);
    orch.process(std::slice::from_ref(&file), &mut second);

    assert_eq!(
        first.get("brief_OCR.docx").unwrap().bytes,
        second.get("brief_OCR.docx").unwrap().bytes
    );
}

#[test]
fn archive_round_trips_the_store() {
    let files = vec![pdf("a.pdf", &["alpha"]), pdf("b.pdf", &["beta"]), pdf("c.pdf", &["gamma"])];
    let mut store = ResultStore::new();
    orchestrator(BatchConfig::default()).process(&files, &mut store);

    let snapshot = store.snapshot();
    let zip = bundle_store(&store).unwrap();

    let mut archive = ZipArchive::new(Cursor::new(zip)).unwrap();
    let mut unpacked = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        unpacked.push((entry.name().to_string(), bytes));
    }
    assert_eq!(unpacked, snapshot);
}

#[test]
fn failed_archive_leaves_store_downloadable() {
    let files = vec![pdf("a.pdf", &["alpha"]), pdf("b.pdf", &["beta"])];
    let mut store = ResultStore::new();
    orchestrator(BatchConfig::default()).process(&files, &mut store);
    let before = store.snapshot();

    // Listing every entry twice makes the second `a_OCR.docx` collide.
    let entries = || store.iter().map(|(k, v)| (k, v.bytes.as_slice()));
    let err = bundle(entries().chain(entries())).unwrap_err();
    assert!(
        matches!(err, ArchiveError::EntryWrite { ref name, .. } if name == "a_OCR.docx"),
        "unexpected error: {err:?}"
    );

    assert_eq!(store.len(), 2);
    assert_eq!(store.snapshot(), before);
    let docx = &store.get("b_OCR.docx").unwrap().bytes;
    assert!(document_xml(docx).contains("beta"));

    let zip = bundle_store(&store).unwrap();
    assert_eq!(ZipArchive::new(Cursor::new(zip)).unwrap().len(), 2);
}

#[test]
fn preview_is_capped() {
    let config = BatchConfig::builder().preview_chars(12).build().unwrap();
    let mut store = ResultStore::new();
    let summary = orchestrator(config).process(&[pdf("long.pdf", &["lorem ipsum dolor sit amet"])], &mut store);

    let preview = summary.outcomes[0].preview.as_deref().unwrap();
    assert_eq!(preview, "--- Page 1 -...");
}

#[tokio::test]
async fn progress_stream_reports_the_whole_batch() {
    let files = vec![pdf("a.pdf", &["one", "two"]), broken("b.pdf")];
    let (events, handle) = spawn_batch(
        orchestrator(BatchConfig::default()),
        files,
        RecognizerLanguages::default(),
        ResultStore::new(),
    );

    let events: Vec<ProgressEvent> = events.collect().await;
    let (summary, store) = join_batch(handle).await.unwrap();

    assert_eq!(summary.success_count, 1);
    assert_eq!(store.len(), 1);

    assert_eq!(events.first(), Some(&ProgressEvent::BatchStarted { total_files: 2 }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::BatchCompleted {
            success_count: 1,
            total_files: 2
        })
    );

    let pages: Vec<(f32, ProgressStatus)> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::PageProgress {
                index: 0,
                fraction,
                status,
            } => Some((*fraction, *status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        pages,
        vec![
            (0.5, ProgressStatus::PageRecognized { page: 1, total: 2 }),
            (1.0, ProgressStatus::PageRecognized { page: 2, total: 2 }),
        ]
    );

    assert!(events.contains(&ProgressEvent::FileStored {
        index: 0,
        name: "a.pdf".into(),
        key: "a_OCR.docx".into(),
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::FileFailed { index: 1, .. }
    )));
}

#[test]
fn spawn_batch_hands_the_store_back() {
    tokio_test::block_on(async {
        let mut store = ResultStore::new();
        orchestrator(BatchConfig::default()).process(&[pdf("old.pdf", &["old"])], &mut store);

        let (events, handle) = spawn_batch(
            orchestrator(BatchConfig::default()),
            vec![pdf("new.pdf", &["new"])],
            RecognizerLanguages::default(),
            store,
        );
        drop(events);
        let (_, store) = join_batch(handle).await.unwrap();
        assert_eq!(store.list(), vec!["old_OCR.docx", "new_OCR.docx"]);
    });
}
