//! `Ingestor`: uploads in, tasks admitted (spec §4.6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use txo_media::MediaExtractor;
use txo_models::{TaskId, TaskOptions, TaskRecord, Variant};
use txo_scheduler::Scheduler;
use txo_store::TaskStore;
use txo_transcriber::Transcriber;

use crate::error::{IngestError, IngestResult};
use crate::source::{stream_to_file, ByteSource};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "m4a", "flac", "aac"];
pub const DEFAULT_MAX_AUDIO_BYTES: u64 = 104_857_600;
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 524_288_000;

/// Per-file outcome of a batch ingest, used to build the one-entry-per-file
/// summary spec §4.6 requires.
pub struct BatchItemOutcome {
    pub filename: String,
    pub result: IngestResult<Vec<TaskRecord>>,
}

pub struct Ingestor<T: Transcriber> {
    store: Arc<TaskStore>,
    scheduler: Arc<Scheduler<T>>,
    extractor: Arc<MediaExtractor>,
    audios_dir: PathBuf,
    videos_tmp_dir: PathBuf,
    max_audio_bytes: u64,
    max_video_bytes: u64,
}

impl<T: Transcriber> Ingestor<T> {
    pub fn new(
        store: Arc<TaskStore>,
        scheduler: Arc<Scheduler<T>>,
        extractor: Arc<MediaExtractor>,
        audios_dir: PathBuf,
        videos_tmp_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            scheduler,
            extractor,
            audios_dir,
            videos_tmp_dir,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
        }
    }

    pub fn with_limits(mut self, max_audio_bytes: u64, max_video_bytes: u64) -> Self {
        self.max_audio_bytes = max_audio_bytes;
        self.max_video_bytes = max_video_bytes;
        self
    }

    fn extension_of(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
    }

    /// Ingest a single audio upload: validate, stream to disk, create one
    /// task, admit it.
    pub async fn ingest_audio(
        &self,
        filename: &str,
        options: TaskOptions,
        source: &mut impl ByteSource,
    ) -> IngestResult<TaskRecord> {
        self.ingest_audio_inner(filename, options, source, None).await
    }

    async fn ingest_audio_inner(
        &self,
        filename: &str,
        options: TaskOptions,
        source: &mut impl ByteSource,
        batch_id: Option<&str>,
    ) -> IngestResult<TaskRecord> {
        let ext = Self::extension_of(filename);
        if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            return Err(IngestError::UnsupportedExtension(ext));
        }

        let task_id = TaskId::generate();
        let dest_path = self.audios_dir.join(format!("{task_id}_{filename}"));
        stream_to_file(source, &dest_path, self.max_audio_bytes).await?;

        let mut record = TaskRecord::new(task_id.clone(), filename, dest_path.to_string_lossy(), options);
        record.batch_id = batch_id.map(str::to_string);
        self.store.create(record.clone()).await?;
        self.scheduler.admit(task_id).await?;
        info!(task_id = %record.task_id, "ingested audio upload");
        Ok(record)
    }

    /// Ingest a single video upload: validate, stream to a temp path,
    /// extract canonical audio, fan out into four sibling tasks that share
    /// the extracted artifact (spec §3 invariant 6).
    pub async fn ingest_video(
        &self,
        filename: &str,
        options: TaskOptions,
        source: &mut impl ByteSource,
    ) -> IngestResult<Vec<TaskRecord>> {
        let ext = Self::extension_of(filename);
        if !MediaExtractor::is_supported_extension(Path::new(filename)) {
            return Err(IngestError::UnsupportedExtension(ext));
        }

        let base_id = TaskId::generate();
        let tmp_video_path = self.videos_tmp_dir.join(format!("{base_id}_{filename}"));
        stream_to_file(source, &tmp_video_path, self.max_video_bytes).await?;

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let audio_path = self.audios_dir.join(format!("{base_id}_{stem}.wav"));

        let (_never_cancel_tx, never_cancel_rx) = watch::channel(false);
        let extraction = self
            .extractor
            .extract(&tmp_video_path, &audio_path, never_cancel_rx)
            .await;

        if let Err(err) = extraction {
            let _ = tokio::fs::remove_file(&tmp_video_path).await;
            return Err(err.into());
        }

        if let Err(err) = tokio::fs::remove_file(&tmp_video_path).await {
            warn!(path = %tmp_video_path.display(), %err, "failed to remove temporary video after extraction");
        }

        let batch_id = base_id.as_str().to_string();
        let audio_path_str = audio_path.to_string_lossy().into_owned();
        let records: Vec<TaskRecord> = Variant::ALL
            .iter()
            .map(|&variant| {
                TaskRecord::new_variant(
                    base_id.with_variant(variant),
                    filename,
                    audio_path_str.clone(),
                    &options,
                    variant,
                    batch_id.clone(),
                )
            })
            .collect();

        self.store.create_many(records.clone()).await?;
        for record in &records {
            self.scheduler.admit(record.task_id.clone()).await?;
        }

        info!(base_id = %batch_id, "ingested video upload, fanned out into 4 tasks");
        Ok(records)
    }

    /// Multi-file audio batch: each file is validated and ingested
    /// independently; one file's failure does not stop the rest, and all
    /// resulting tasks share a single `batch_id` (spec §4.6). Returns the
    /// generated `batch_id` alongside each file's outcome so callers can
    /// report it even when every file in the batch failed.
    pub async fn ingest_audio_batch<S: ByteSource>(
        &self,
        files: Vec<(String, TaskOptions, S)>,
    ) -> (String, Vec<BatchItemOutcome>) {
        let batch_id = TaskId::generate().into_string();
        let mut outcomes = Vec::with_capacity(files.len());

        for (filename, options, mut source) in files {
            let result = self
                .ingest_audio_inner(&filename, options, &mut source, Some(&batch_id))
                .await
                .map(|record| vec![record]);
            outcomes.push(BatchItemOutcome { filename, result });
        }

        (batch_id, outcomes)
    }
}
