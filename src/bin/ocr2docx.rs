//! CLI binary for edgequake-ocr2docx.
//!
//! A thin shim over the library crate: reads PDFs from disk, runs one batch
//! against a fresh session store, writes each `{stem}_OCR.docx` into the
//! output directory and optionally bundles them into one ZIP.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2docx::output::ZIP_MIME;
use edgequake_ocr2docx::stream::join_batch;
use edgequake_ocr2docx::{
    bundle_store, should_offer_archive, spawn_batch, BatchConfig, BatchOrchestrator,
    BatchSummary, BlankPagePolicy, FileStage, InputFile, PdfiumRasterizer, ProgressEvent,
    ProgressStatus, ProgressStream, ResultStore, TesseractConfig, TesseractEngine,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal progress, fed from the batch's event stream ─────────────────────

/// Renders one bar over the files of the batch; the message line follows
/// the current file's stage and page.
struct CliProgress {
    bar: ProgressBar,
    file_started: Option<Instant>,
    current: String,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            file_started: None,
            current: String::new(),
        }
    }

    fn elapsed(&self) -> String {
        let secs = self
            .file_started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total_files } => {
                self.bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.cyan} {prefix:.bold}  \
                         [{bar:42.green/238}] {pos:>3}/{len} files  \
                         ⏱ {elapsed_precise}  {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  ")
                    .tick_strings(TICKS),
                );
                self.bar.set_length(*total_files as u64);
                self.bar.set_prefix("OCR");
                self.bar.println(format!(
                    "{} {}",
                    cyan("◆"),
                    bold(&format!("Processing {total_files} file(s)…"))
                ));
            }
            ProgressEvent::FileStarted { name, .. } => {
                self.file_started = Some(Instant::now());
                self.current = name.clone();
                self.bar.set_message(name.clone());
            }
            ProgressEvent::StageChanged { stage, .. } => {
                let label = match stage {
                    FileStage::Rasterizing => "rendering",
                    FileStage::Recognizing => "recognising",
                    FileStage::Assembling => "assembling",
                    _ => return,
                };
                self.bar.set_message(format!("{}  {}", self.current, dim(label)));
            }
            ProgressEvent::PageProgress { status, .. } => {
                let (page, total, mark) = match status {
                    ProgressStatus::PageRecognized { page, total } => (page, total, ""),
                    ProgressStatus::PageFailed { page, total } => (page, total, " ✗"),
                };
                self.bar
                    .set_message(format!("{}  page {page}/{total}{mark}", self.current));
            }
            ProgressEvent::FileStored { name, key, .. } => {
                self.bar.println(format!(
                    "  {} {:<32}  → {}  {}",
                    green("✓"),
                    name,
                    key,
                    self.elapsed()
                ));
                self.bar.inc(1);
            }
            ProgressEvent::FileFailed { error, .. } => {
                self.bar.println(format!(
                    "  {} {}  {}",
                    red("✗"),
                    red(&error.to_string()),
                    self.elapsed()
                ));
                self.bar.inc(1);
            }
            ProgressEvent::BatchCompleted { .. } => {
                self.bar.finish_and_clear();
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR one scan into ./scan_OCR.docx
  ocr2docx scan.pdf

  # Several files into a directory, plus one ZIP of all results
  ocr2docx -o out/ --archive out/results.zip a.pdf b.pdf c.pdf

  # Keep a heading for blank pages, German labels
  ocr2docx --blank-pages marker --page-label Seite --title-prefix "OCR-Ergebnis: " brief.pdf

  # Machine-readable summary
  ocr2docx --json --no-progress *.pdf > summary.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory containing libpdfium (default: system library)
  TESSERACT_BIN     Tesseract executable (default: tesseract on PATH)
  TESSDATA_PREFIX   Directory containing eng/deu traineddata
  OCR2DOCX_PAGE_TIMEOUT  Seconds per page before tesseract is killed (default: 120)
  RUST_LOG          Overrides the log filter

SETUP:
  Tesseract with the English and German language data must be installed,
  e.g. `apt install tesseract-ocr tesseract-ocr-eng tesseract-ocr-deu`.
"#;

/// OCR scanned PDFs (English + German) into Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2docx",
    version,
    about = "OCR scanned PDFs (English + German) into Word documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to process, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the `{name}_OCR.docx` outputs.
    #[arg(short, long, env = "OCR2DOCX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also write a ZIP of all outputs here (only when more than one file succeeds).
    #[arg(long, env = "OCR2DOCX_ARCHIVE")]
    archive: Option<PathBuf>,

    /// What to do with pages where no text was recognised.
    #[arg(long, env = "OCR2DOCX_BLANK_PAGES", value_enum, default_value = "omit")]
    blank_pages: BlankPagesArg,

    /// Text placed before the file name in the document title.
    #[arg(long, env = "OCR2DOCX_TITLE_PREFIX")]
    title_prefix: Option<String>,

    /// Word used in page headings ("Page 3").
    #[arg(long, env = "OCR2DOCX_PAGE_LABEL")]
    page_label: Option<String>,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_BIN")]
    tesseract: Option<PathBuf>,

    /// Tesseract language data directory.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata: Option<PathBuf>,

    /// Tesseract page segmentation mode.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// Seconds a single page may spend in tesseract before it is killed.
    #[arg(long, env = "OCR2DOCX_PAGE_TIMEOUT", value_parser = clap::value_parser!(u64).range(1..))]
    page_timeout: Option<u64>,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, env = "OCR2DOCX_JSON")]
    json: bool,

    /// Print a text preview of every stored result on stdout.
    #[arg(long)]
    preview: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BlankPagesArg {
    Omit,
    Marker,
}

impl From<BlankPagesArg> for BlankPagePolicy {
    fn from(v: BlankPagesArg) -> Self {
        match v {
            BlankPagesArg::Omit => BlankPagePolicy::Omit,
            BlankPagesArg::Marker => BlankPagePolicy::Marker,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-file feedback, so library INFO logs
    // are muted while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and engines ─────────────────────────────────────────
    let config = build_config(&cli)?;
    let languages = config.languages.clone();

    let tesseract = TesseractConfig {
        binary_path: cli.tesseract.clone(),
        tessdata_path: cli.tessdata.clone(),
        psm: cli.psm,
        oem: None,
        page_timeout_secs: cli.page_timeout,
    };
    let engine = tokio::task::block_in_place(|| TesseractEngine::new(tesseract, &languages))
        .context("Failed to start the OCR engine")?;
    let rasterizer =
        tokio::task::block_in_place(|| PdfiumRasterizer::with_library_dir(cli.pdfium_lib.clone()))
            .context("Failed to load the PDF renderer")?;
    let orchestrator = BatchOrchestrator::new(Arc::new(engine), Arc::new(rasterizer), config);

    // ── Read inputs ──────────────────────────────────────────────────────
    let mut files = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(InputFile::new(display_name(path), bytes));
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let (events, handle) = spawn_batch(orchestrator, files, languages, ResultStore::new());
    drain_progress(events, show_progress).await;
    let (summary, store) = join_batch(handle).await.context("Batch failed")?;

    // ── Write outputs ────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;
    let mut written = Vec::with_capacity(store.len());
    for (key, result) in store.iter() {
        let path = cli.output_dir.join(key);
        write_atomic(&path, &result.bytes)?;
        written.push(path);
    }

    if let Some(ref archive_path) = cli.archive {
        if should_offer_archive(&store) {
            let zip = bundle_store(&store).context("Failed to build archive")?;
            write_atomic(archive_path, &zip)?;
            if !cli.quiet {
                eprintln!(
                    "{} {} ({}, {} entries)",
                    cyan("▣"),
                    bold(&archive_path.display().to_string()),
                    ZIP_MIME,
                    store.len()
                );
            }
        } else if !cli.quiet {
            eprintln!(
                "{} fewer than two outputs; no archive written",
                dim("note:")
            );
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    }
    if cli.preview {
        print_previews(&summary)?;
    }
    if !cli.quiet {
        print_summary(&summary, &written, show_progress);
    }

    if summary.success_count == 0 {
        anyhow::bail!(
            "No file could be converted ({} attempted)",
            summary.total_files
        );
    }
    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder().blank_pages(cli.blank_pages.clone().into());
    if let Some(ref prefix) = cli.title_prefix {
        builder = builder.title_prefix(prefix.clone());
    }
    if let Some(ref label) = cli.page_label {
        builder = builder.page_label(label.clone());
    }
    builder.build().context("Invalid configuration")
}

/// Consume the event stream until the batch ends, rendering it when asked.
async fn drain_progress(mut events: ProgressStream, show: bool) {
    let mut progress = show.then(CliProgress::new);
    while let Some(event) = events.next().await {
        if let Some(ref mut p) = progress {
            p.handle(&event);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write via a temp file in the target directory, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move output into {}", path.display()))?;
    Ok(())
}

fn print_previews(summary: &BatchSummary) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for outcome in summary.outcomes.iter().filter(|o| o.is_stored()) {
        let key = outcome.output_key.as_deref().unwrap_or(&outcome.name);
        writeln!(out, "==> {key} <==").context("Failed to write to stdout")?;
        writeln!(out, "{}", outcome.preview.as_deref().unwrap_or_default())
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, written: &[PathBuf], show_progress: bool) {
    if !show_progress {
        for outcome in &summary.outcomes {
            match &outcome.error {
                None => eprintln!("  {} {}", green("✓"), outcome.name),
                Some(e) => eprintln!("  {} {}", red("✗"), e),
            }
        }
    }

    let failed = summary.failed_count();
    let mark = if failed == 0 {
        green("✔")
    } else if summary.success_count == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{} {}/{} files converted{}",
        mark,
        bold(&summary.success_count.to_string()),
        summary.total_files,
        if failed > 0 {
            format!("  ({} failed)", red(&failed.to_string()))
        } else {
            String::new()
        }
    );
    for path in written {
        eprintln!("   {}", dim(&path.display().to_string()));
    }
}
