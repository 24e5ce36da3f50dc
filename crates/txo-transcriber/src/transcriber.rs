//! The `Transcriber` capability trait and an HTTP-backed implementation.
//!
//! Kept generic rather than `dyn`-dispatched: the orchestrator is generic
//! over one concrete `Transcriber` chosen at startup, so no object-safety
//! or `async-trait` shim is needed for the one call site that uses it.

use std::path::Path;

use tokio::sync::watch;

use crate::error::{TranscriberError, TranscriberResult};
use crate::options::TranscribeOptions;

/// Opaque consumer of `(audio_path, options)` that writes a text file to
/// `output_path` and returns (spec §4.3). The orchestrator does not
/// implement this; it only calls it through one of JobRunner's slots.
pub trait Transcriber: Send + Sync + 'static {
    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        output_path: &Path,
        cancel: watch::Receiver<bool>,
    ) -> impl std::future::Future<Output = TranscriberResult<()>> + Send;
}

/// Calls a remote transcription service over HTTP, grounded on the same
/// `reqwest`-based client shape used for the ML-service integration this
/// orchestrator's teacher used for a different external model call.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriber {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(serde::Serialize)]
struct TranscribeRequest<'a> {
    audio_path: &'a str,
    timestamps: bool,
    diarization: bool,
    model: &'a str,
    force_cpu: bool,
}

#[derive(serde::Deserialize)]
struct TranscribeResponse {
    text: String,
}

impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        output_path: &Path,
        mut cancel: watch::Receiver<bool>,
    ) -> TranscriberResult<()> {
        if *cancel.borrow() {
            return Err(TranscriberError::Cancelled);
        }

        let audio_path_str = audio_path.to_string_lossy();
        let request = TranscribeRequest {
            audio_path: &audio_path_str,
            timestamps: options.timestamps,
            diarization: options.diarization,
            model: &options.model,
            force_cpu: options.force_cpu,
        };

        let send = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .json(&request)
            .send();

        let response = tokio::select! {
            result = send => result.map_err(|e| TranscriberError::Backend(e.to_string()))?,
            _ = wait_for_cancel(&mut cancel) => return Err(TranscriberError::Cancelled),
        };

        if !response.status().is_success() {
            return Err(TranscriberError::Backend(format!(
                "backend returned status {}",
                response.status()
            )));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscriberError::Backend(e.to_string()))?;

        if *cancel.borrow() {
            return Err(TranscriberError::Cancelled);
        }

        tokio::fs::write(output_path, body.text).await?;
        Ok(())
    }
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
