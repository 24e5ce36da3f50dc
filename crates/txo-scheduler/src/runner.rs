//! `JobRunner`: executes one task end-to-end (spec §4.4).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tokio::sync::watch;
use tracing::{error, info, warn};
use txo_models::TaskId;
use txo_store::TaskStore;
use txo_transcriber::{TranscribeOptions, Transcriber, TranscriberError};

use crate::metrics::{TASKS_COMPLETED_TOTAL, TASKS_FAILED_TOTAL};

/// Runs a single task to completion against a shared `TaskStore`. Holds no
/// state of its own; every transition goes through the store's mutex so
/// concurrent runners for other tasks never observe a torn record.
pub struct JobRunner<T: Transcriber> {
    store: Arc<TaskStore>,
    transcriber: Arc<T>,
    transcriptions_dir: PathBuf,
}

impl<T: Transcriber> JobRunner<T> {
    pub fn new(store: Arc<TaskStore>, transcriber: Arc<T>, transcriptions_dir: PathBuf) -> Self {
        Self {
            store,
            transcriber,
            transcriptions_dir,
        }
    }

    /// Executes `task_id`. No-ops (with a log line) if the task is no longer
    /// `pending` by the time this runner claims it — e.g. it was canceled
    /// while still queued.
    pub async fn run(&self, task_id: TaskId, cancel: watch::Receiver<bool>) {
        let record = match self.store.update(&task_id, |task| task.start()).await {
            Ok(record) => record,
            Err(err) => {
                info!(%task_id, %err, "task no longer pending, skipping run");
                return;
            }
        };

        let output_path = self
            .transcriptions_dir
            .join(format!("{task_id}_transcricao_{}.txt", Utc::now().format("%Y%m%d_%H%M%S")));
        let options = TranscribeOptions::from(&record.options);
        let audio_path = PathBuf::from(&record.source_path);

        info!(%task_id, output = %output_path.display(), "running task");
        let result = self
            .transcriber
            .transcribe(&audio_path, &options, &output_path, cancel)
            .await;

        match result {
            Ok(()) => {
                if let Err(err) = self
                    .store
                    .update(&task_id, |task| {
                        task.complete(output_path.to_string_lossy().into_owned())
                    })
                    .await
                {
                    error!(%task_id, %err, "failed to persist completion");
                } else {
                    counter!(TASKS_COMPLETED_TOTAL).increment(1);
                }
            }
            Err(err) => {
                // Best-effort cleanup of any partial artifact the
                // Transcriber left behind before failing.
                let _ = tokio::fs::remove_file(&output_path).await;

                let message = redact(&err);
                if let Err(store_err) = self.store.update(&task_id, |task| task.fail(message.clone())).await {
                    error!(%task_id, %store_err, "failed to persist failure");
                } else {
                    counter!(TASKS_FAILED_TOTAL).increment(1);
                }
                warn!(%task_id, %err, "task failed");
            }
        }
    }
}

/// Strips filesystem/backend internals from a `TranscriberError` before it
/// is written into a `TaskRecord` that's served back to HTTP clients.
/// Cancellation is reported as the literal string `"canceled"` per spec §4.4
/// step 5.
fn redact(err: &TranscriberError) -> String {
    match err {
        TranscriberError::Cancelled => "canceled".to_string(),
        TranscriberError::Timeout => "transcription timed out".to_string(),
        TranscriberError::Backend(_) => "transcription backend error".to_string(),
        TranscriberError::Io(_) => "internal error".to_string(),
    }
}
