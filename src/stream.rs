//! Progress as an async stream.
//!
//! The core pipeline is blocking: rendering and OCR calls run to completion
//! on the calling thread. Presentation layers are usually async. This module
//! bridges the two: [`progress_channel`] hands out a callback that forwards
//! every event into a Tokio channel and the matching [`ProgressStream`], and
//! [`spawn_batch`] runs a whole batch on the blocking pool while the caller
//! consumes the stream.
//!
//! The stream ends once every clone of the callback has been dropped, which
//! for [`spawn_batch`] is when the batch finishes.

use crate::batch::BatchOrchestrator;
use crate::config::RecognizerLanguages;
use crate::error::{FileError, OcrError};
use crate::output::{BatchSummary, FileStage, InputFile};
use crate::progress::{BatchProgressCallback, ProgressCallback, ProgressEvent, ProgressStatus};
use crate::store::ResultStore;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Callback that forwards every event into an unbounded channel.
///
/// Send errors (receiver dropped) are ignored: progress is observational.
struct ChannelProgressCallback {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelProgressCallback {
    fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("progress receiver dropped; event discarded");
        }
    }
}

impl BatchProgressCallback for ChannelProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.send(ProgressEvent::BatchStarted { total_files });
    }

    fn on_file_start(&self, index: usize, name: &str) {
        self.send(ProgressEvent::FileStarted {
            index,
            name: name.to_string(),
        });
    }

    fn on_stage(&self, index: usize, name: &str, stage: FileStage) {
        self.send(ProgressEvent::StageChanged {
            index,
            name: name.to_string(),
            stage,
        });
    }

    fn on_page_progress(&self, index: usize, fraction: f32, status: ProgressStatus) {
        self.send(ProgressEvent::PageProgress {
            index,
            fraction,
            status,
        });
    }

    fn on_file_stored(&self, index: usize, name: &str, key: &str) {
        self.send(ProgressEvent::FileStored {
            index,
            name: name.to_string(),
            key: key.to_string(),
        });
    }

    fn on_file_failed(&self, index: usize, name: &str, error: &FileError) {
        self.send(ProgressEvent::FileFailed {
            index,
            name: name.to_string(),
            error: error.clone(),
        });
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.send(ProgressEvent::BatchCompleted {
            success_count: summary.success_count,
            total_files: summary.total_files,
        });
    }
}

/// Create a callback/stream pair.
pub fn progress_channel() -> (ProgressCallback, ProgressStream) {
    let (tx, rx) = unbounded_channel();
    let cb: ProgressCallback = Arc::new(ChannelProgressCallback { tx });
    (cb, Box::pin(UnboundedReceiverStream::new(rx)))
}

/// Run a batch on Tokio's blocking pool, streaming its progress.
///
/// The orchestrator's configured callback is replaced by the channel
/// callback. The session store is moved in and handed back with the summary
/// so the caller keeps ownership across batches.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_batch(
    orchestrator: BatchOrchestrator,
    files: Vec<InputFile>,
    languages: RecognizerLanguages,
    mut store: ResultStore,
) -> (
    ProgressStream,
    JoinHandle<Result<(BatchSummary, ResultStore), OcrError>>,
) {
    let (cb, events) = progress_channel();
    let orchestrator = orchestrator.with_progress_callback(cb);

    let handle = tokio::task::spawn_blocking(move || {
        let summary = orchestrator.process_batch(&files, &languages, &mut store);
        Ok((summary, store))
    });

    (events, handle)
}

/// Await a [`spawn_batch`] handle, mapping a panicked task to [`OcrError`].
pub async fn join_batch(
    handle: JoinHandle<Result<(BatchSummary, ResultStore), OcrError>>,
) -> Result<(BatchSummary, ResultStore), OcrError> {
    handle
        .await
        .map_err(|e| OcrError::Internal(format!("Batch task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn channel_forwards_events_and_closes() {
        let (cb, events) = progress_channel();
        cb.on_batch_start(1);
        cb.on_stage(0, "a.pdf", FileStage::Rasterizing);
        drop(cb);

        let collected: Vec<ProgressEvent> = events.collect().await;
        assert_eq!(
            collected,
            vec![
                ProgressEvent::BatchStarted { total_files: 1 },
                ProgressEvent::StageChanged {
                    index: 0,
                    name: "a.pdf".into(),
                    stage: FileStage::Rasterizing,
                },
            ]
        );
    }

    #[test]
    fn send_after_receiver_dropped_is_silent() {
        let (cb, events) = progress_channel();
        drop(events);
        cb.on_batch_start(3);
    }
}
