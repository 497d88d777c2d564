//! [`OcrEngine`] backed by the `tesseract` command-line tool.
//!
//! Each page is PNG-encoded and piped through the process's stdin; the TSV
//! report on stdout carries one row per word with its box, confidence and
//! its block/paragraph/line position. With paragraph grouping on, words are
//! merged per `(block, paragraph)` so each detection is a paragraph-sized
//! span, matching what the assembler wants to emit.
//!
//! Construction probes the binary and its installed language data once; a
//! missing binary or a missing declared language is an [`EngineInitError`].

use crate::config::RecognizerLanguages;
use crate::error::{EngineError, EngineInitError};
use crate::pipeline::encode::encode_page;
use crate::pipeline::ocr::{BoundingBox, Detection, OcrEngine};
use crate::pipeline::render::PageImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread::ScopedJoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Fully automatic page segmentation without OSD.
const DEFAULT_PSM: u8 = 3;
/// LSTM engine only.
const DEFAULT_OEM: u8 = 1;
/// TSV level of word rows.
const WORD_LEVEL: u32 = 5;
/// Per-page wall-clock limit for one tesseract run.
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 120;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^tesseract\s+v?(\d+(?:\.\d+)*[\w.-]*)").expect("static regex")
});

/// Construction parameters for [`TesseractEngine`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Executable to run. Default: `tesseract` on `PATH`.
    pub binary_path: Option<PathBuf>,
    /// Exported as `TESSDATA_PREFIX` when set.
    pub tessdata_path: Option<PathBuf>,
    /// Page segmentation mode (0–13). Default: 3.
    pub psm: Option<u8>,
    /// OCR engine mode (0–3). Default: 1.
    pub oem: Option<u8>,
    /// Seconds one page may take before the process is killed and the page
    /// fails. Default: 120.
    pub page_timeout_secs: Option<u64>,
}

impl TesseractConfig {
    fn binary(&self) -> PathBuf {
        self.binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.binary());
        if let Some(ref tessdata) = self.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }
        cmd
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs.unwrap_or(DEFAULT_PAGE_TIMEOUT_SECS))
    }
}

/// Tesseract CLI wrapper. Cheap to share: holds only configuration.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
    installed_languages: Vec<String>,
}

impl TesseractEngine {
    /// Probe the binary and check every language in `languages` is installed.
    pub fn new(
        config: TesseractConfig,
        languages: &RecognizerLanguages,
    ) -> Result<Self, EngineInitError> {
        let version = probe_version(&config)?;
        let installed_languages = probe_languages(&config)?;

        for lang in languages.as_slice() {
            let code = lang.tesseract_code();
            if !installed_languages.iter().any(|l| l == code) {
                return Err(EngineInitError::LanguageMissing {
                    code: code.to_string(),
                });
            }
        }

        info!(
            "tesseract {} ready ({} languages installed, using {})",
            version,
            installed_languages.len(),
            languages.tesseract_arg()
        );

        Ok(Self {
            config,
            version,
            installed_languages,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn installed_languages(&self) -> &[String] {
        &self.installed_languages
    }

    fn run(&self, png: Vec<u8>, languages: &RecognizerLanguages) -> io::Result<Option<Output>> {
        let mut cmd = self.config.command();
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(languages.tesseract_arg())
            .arg("--psm")
            .arg(self.config.psm.unwrap_or(DEFAULT_PSM).to_string())
            .arg("--oem")
            .arg(self.config.oem.unwrap_or(DEFAULT_OEM).to_string())
            .arg("tsv");
        run_with_deadline(cmd, png, self.config.page_timeout())
    }
}

/// Run `cmd` with `input` on stdin, collecting stdout and stderr.
///
/// Returns `Ok(None)` when the process is still running after `timeout`; it
/// has been killed and reaped by then.
fn run_with_deadline(
    mut cmd: Command,
    input: Vec<u8>,
    timeout: Duration,
) -> io::Result<Option<Output>> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    let missing = |pipe: &str| io::Error::other(format!("{pipe} not captured"));
    let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    // Each pipe gets its own thread so a full pipe never blocks the others
    // and the main thread stays free to watch the clock.
    std::thread::scope(|s| {
        let writer = s.spawn(move || stdin.write_all(&input));
        let out = s.spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });
        let err = s.spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
            }
        };

        let output = Output {
            status,
            stdout: joined(out, "stdout reader")?,
            stderr: joined(err, "stderr reader")?,
        };
        match joined(writer, "stdin writer") {
            Ok(()) => Ok(Some(output)),
            // The process may exit before consuming all input; its exit
            // status is the more useful error then.
            Err(_) if !output.status.success() => Ok(Some(output)),
            Err(e) => Err(e),
        }
    })
}

fn joined<T>(handle: ScopedJoinHandle<'_, io::Result<T>>, what: &str) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::other(format!("{what} thread panicked")))?
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(
        &self,
        page: &PageImage,
        languages: &RecognizerLanguages,
        paragraph: bool,
    ) -> Result<Vec<Detection>, EngineError> {
        let start = Instant::now();
        let engine_err = |detail: String| EngineError {
            page: page.page,
            detail,
        };

        let png = encode_page(page).map_err(|e| engine_err(format!("PNG encoding failed: {e}")))?;
        let output = self
            .run(png, languages)
            .map_err(|e| engine_err(format!("failed to run tesseract: {e}")))?
            .ok_or_else(|| {
                engine_err(format!(
                    "tesseract did not finish within {}s",
                    self.config.page_timeout().as_secs()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(engine_err(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let words = parse_tsv_words(&tsv);
        let detections = if paragraph {
            group_paragraphs(&words)
        } else {
            words.into_iter().map(TsvWord::into_detection).collect()
        };

        debug!(
            "tesseract page {}: {} detections in {}ms",
            page.page,
            detections.len(),
            start.elapsed().as_millis()
        );
        Ok(detections)
    }
}

/// A word row of tesseract's TSV report.
#[derive(Debug, Clone, PartialEq)]
struct TsvWord {
    block: u32,
    paragraph: u32,
    bbox: BoundingBox,
    confidence: f32,
    text: String,
}

impl TsvWord {
    fn into_detection(self) -> Detection {
        Detection {
            bbox: self.bbox,
            text: self.text,
            confidence: self.confidence,
        }
    }
}

/// Parse word rows, skipping the header, structural rows, empty words and
/// rows tesseract marks with confidence -1.
///
/// Columns: level page_num block_num par_num line_num word_num left top
/// width height conf text
fn parse_tsv_words(tsv: &str) -> Vec<TsvWord> {
    let mut words = Vec::new();

    for line in tsv.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let Ok(level) = cols[0].parse::<u32>() else {
            continue;
        };
        let text = cols[11].trim();
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        if level != WORD_LEVEL || text.is_empty() || conf < 0.0 {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        words.push(TsvWord {
            block: num(2),
            paragraph: num(3),
            bbox: BoundingBox {
                left: num(6),
                top: num(7),
                width: num(8),
                height: num(9),
            },
            confidence: (conf / 100.0).clamp(0.0, 1.0),
            text: text.to_string(),
        });
    }

    words
}

/// Merge words sharing `(block, paragraph)` into one detection, in order of
/// first appearance. The box is the union, confidence the mean.
fn group_paragraphs(words: &[TsvWord]) -> Vec<Detection> {
    let mut groups: Vec<((u32, u32), Vec<&TsvWord>)> = Vec::new();
    for w in words {
        let key = (w.block, w.paragraph);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(w),
            None => groups.push((key, vec![w])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(_, members)| {
            let first = members.first()?;
            let bbox = members
                .iter()
                .skip(1)
                .fold(first.bbox, |acc, w| acc.union(&w.bbox));
            let confidence =
                members.iter().map(|w| w.confidence).sum::<f32>() / members.len() as f32;
            let text = members
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Some(Detection {
                bbox,
                text,
                confidence,
            })
        })
        .collect()
}

fn probe_version(config: &TesseractConfig) -> Result<String, EngineInitError> {
    let binary = config.binary().display().to_string();
    let output = config
        .command()
        .arg("--version")
        .output()
        .map_err(|e| EngineInitError::BinaryUnavailable {
            binary: binary.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(EngineInitError::BinaryUnavailable {
            binary,
            detail: format!("--version exited with {}", output.status),
        });
    }

    // Older releases print the banner on stderr.
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_version(&combined).unwrap_or_else(|| "unknown".to_string()))
}

fn parse_version(banner: &str) -> Option<String> {
    VERSION_RE
        .captures(banner)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn probe_languages(config: &TesseractConfig) -> Result<Vec<String>, EngineInitError> {
    let output = config
        .command()
        .arg("--list-langs")
        .output()
        .map_err(|e| EngineInitError::BinaryUnavailable {
            binary: config.binary().display().to_string(),
            detail: e.to_string(),
        })?;

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_language_list(&combined))
}

/// Languages listed after the `List of available languages …:` header.
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|l| !l.contains("List of available languages"))
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(':'))
        .map(str::to_string)
        .collect()
}
