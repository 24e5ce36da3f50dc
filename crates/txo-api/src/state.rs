//! Application state: the concrete wiring of every subsystem crate behind
//! one `Clone`-able handle the router hands to each request.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use txo_media::MediaExtractor;
use txo_scheduler::{Scheduler, SchedulerConfig};
use txo_store::TaskStore;
use txo_transcriber::{HttpTranscriber, NoopTranscriber, TranscribeOptions, Transcriber, TranscriberResult};

use crate::config::ApiConfig;

/// Picks one concrete `Transcriber` at startup based on `ApiConfig`, so the
/// rest of the crate (and axum's `State` extractor) deals with a single
/// non-generic type instead of threading a type parameter through routes.
pub enum AnyTranscriber {
    Noop(NoopTranscriber),
    Http(HttpTranscriber),
}

impl AnyTranscriber {
    pub fn from_config(config: &ApiConfig) -> Self {
        match config.transcriber_backend.as_str() {
            "http" => {
                let base_url = config
                    .transcriber_base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:9000".to_string());
                AnyTranscriber::Http(HttpTranscriber::new(base_url))
            }
            _ => AnyTranscriber::Noop(NoopTranscriber::new()),
        }
    }
}

impl Transcriber for AnyTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        output_path: &Path,
        cancel: watch::Receiver<bool>,
    ) -> TranscriberResult<()> {
        match self {
            AnyTranscriber::Noop(t) => t.transcribe(audio_path, options, output_path, cancel).await,
            AnyTranscriber::Http(t) => t.transcribe(audio_path, options, output_path, cancel).await,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<TaskStore>,
    pub scheduler: Arc<Scheduler<AnyTranscriber>>,
    pub ingestor: Arc<txo_ingest::Ingestor<AnyTranscriber>>,
    pub extractor: Arc<MediaExtractor>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(TaskStore::load(config.transcriptions_dir.join("tasks.json")).await);
        let extractor = Arc::new(MediaExtractor::new(config.extractor_timeout())?);
        let transcriber = Arc::new(AnyTranscriber::from_config(&config));

        let scheduler_config = SchedulerConfig {
            max_concurrent_tasks: config.max_concurrent_tasks,
            queue_depth: config.queue_depth,
            task_timeout: config.task_timeout(),
        };
        let scheduler = Scheduler::new(
            scheduler_config,
            Arc::clone(&store),
            Arc::clone(&transcriber),
            config.transcriptions_dir.clone(),
        );

        let ingestor = Arc::new(
            txo_ingest::Ingestor::new(
                Arc::clone(&store),
                Arc::clone(&scheduler),
                Arc::clone(&extractor),
                config.audios_dir.clone(),
                config.videos_tmp_dir.clone(),
            )
            .with_limits(config.max_audio_bytes, config.max_video_bytes),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            scheduler,
            ingestor,
            extractor,
        })
    }
}
