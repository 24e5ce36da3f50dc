//! A placeholder `Transcriber` that writes a deterministic stub transcript
//! without calling out to any real speech-recognition backend. Used for
//! local development and integration tests where no ML service is running.
//!
//! Demonstrates the model-cache semantics spec §4.3 allows implementations
//! to have: a cache keyed by `(model, force_cpu)` is maintained, but the
//! orchestrator never observes or depends on it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{TranscriberError, TranscriberResult};
use crate::options::TranscribeOptions;
use crate::transcriber::Transcriber;

#[derive(Default)]
pub struct NoopTranscriber {
    loaded: Mutex<HashSet<(String, bool)>>,
}

impl NoopTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_loaded(&self, model: &str, force_cpu: bool) {
        let key = (model.to_string(), force_cpu);
        let mut loaded = self.loaded.lock().expect("model cache lock poisoned");
        if loaded.insert(key) {
            debug!(model, force_cpu, "loading model (stub)");
        }
    }
}

impl Transcriber for NoopTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        output_path: &Path,
        cancel: watch::Receiver<bool>,
    ) -> TranscriberResult<()> {
        if *cancel.borrow() {
            return Err(TranscriberError::Cancelled);
        }

        self.ensure_loaded(&options.model, options.force_cpu);

        let body = format!(
            "[stub transcript for {}]\ntimestamps={} diarization={} model={}\n",
            audio_path.display(),
            options.timestamps,
            options.diarization,
            options.model,
        );

        tokio::fs::write(output_path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn writes_stub_file_and_caches_model() {
        let dir = tempfile::tempdir().unwrap();
        let output: PathBuf = dir.path().join("out.txt");
        let transcriber = NoopTranscriber::new();
        let (_tx, rx) = watch::channel(false);
        let options = TranscribeOptions {
            timestamps: true,
            diarization: false,
            model: "default".into(),
            force_cpu: false,
        };

        transcriber
            .transcribe(Path::new("/audios/a.wav"), &options, &output, rx)
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&output).await.unwrap();
        assert!(content.contains("timestamps=true"));
        assert_eq!(transcriber.loaded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn honors_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let transcriber = NoopTranscriber::new();
        let (_tx, rx) = watch::channel(true);
        let options = TranscribeOptions {
            timestamps: false,
            diarization: false,
            model: "default".into(),
            force_cpu: false,
        };

        let err = transcriber
            .transcribe(Path::new("/audios/a.wav"), &options, &output, rx)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriberError::Cancelled));
        assert!(!output.exists());
    }
}
