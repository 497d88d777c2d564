//! Progress-callback trait for batch, file and page events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to observe a
//! batch while it runs. Events are observational only: nothing a callback
//! does changes the outcome of the batch.
//!
//! The library never produces user-facing text here. Statuses are the
//! structured [`ProgressStatus`] codes; localisation belongs to whoever
//! renders them. [`crate::stream::progress_channel`] turns the callback into
//! an async stream of [`ProgressEvent`]s.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2docx::{BatchConfig, BatchProgressCallback, ProgressStatus};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl BatchProgressCallback for PageCounter {
//!     fn on_page_progress(&self, _file: usize, fraction: f32, status: ProgressStatus) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{:.0}% {:?}", fraction * 100.0, status);
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::FileError;
use crate::output::{BatchSummary, FileStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Structured status attached to a page progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Page `page` of `total` was recognised.
    PageRecognized { page: usize, total: usize },
    /// The engine failed on page `page`; its text is empty.
    PageFailed { page: usize, total: usize },
}

/// Called by the batch orchestrator as it works through files.
///
/// All methods have no-op defaults so callers only override what they need.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file leaves `Pending`.
    ///
    /// * `index` — 0-indexed position in the batch
    fn on_file_start(&self, index: usize, name: &str) {
        let _ = (index, name);
    }

    /// Called on every stage transition, terminal ones included.
    fn on_stage(&self, index: usize, name: &str, stage: FileStage) {
        let _ = (index, name, stage);
    }

    /// Called after each page of a file has been through OCR.
    ///
    /// * `fraction` — pages completed / total pages, in `(0, 1]`
    fn on_page_progress(&self, index: usize, fraction: f32, status: ProgressStatus) {
        let _ = (index, fraction, status);
    }

    /// Called when a file's output has been registered in the store.
    fn on_file_stored(&self, index: usize, name: &str, key: &str) {
        let _ = (index, name, key);
    }

    /// Called when a file is skipped.
    fn on_file_failed(&self, index: usize, name: &str, error: &FileError) {
        let _ = (index, name, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

/// Owned form of every callback, for channels and serialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    BatchStarted {
        total_files: usize,
    },
    FileStarted {
        index: usize,
        name: String,
    },
    StageChanged {
        index: usize,
        name: String,
        stage: FileStage,
    },
    PageProgress {
        index: usize,
        fraction: f32,
        status: ProgressStatus,
    },
    FileStored {
        index: usize,
        name: String,
        key: String,
    },
    FileFailed {
        index: usize,
        name: String,
        error: FileError,
    },
    BatchCompleted {
        success_count: usize,
        total_files: usize,
    },
}
