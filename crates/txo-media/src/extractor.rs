//! `MediaExtractor`: video-in, canonical-audio-out (spec §4.2).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extensions accepted as video input. Anything else is rejected before a
/// process is ever spawned.
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "3gp", "mpg", "mpeg"];

pub struct MediaExtractor {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl MediaExtractor {
    /// Resolves `ffmpeg` on `PATH` at construction time so a missing binary
    /// fails fast at startup rather than on the first extraction.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let ffmpeg_path = FfmpegCommand::resolve()?;
        Ok(Self { ffmpeg_path, timeout })
    }

    /// Builds an extractor against an explicit `ffmpeg` path, skipping PATH
    /// resolution. Used where the caller already knows the binary location
    /// (or, in tests, never actually invokes it).
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg_path, timeout }
    }

    /// The resolved `ffmpeg` binary this extractor invokes, exposed for
    /// readiness probes.
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn is_supported_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Extract 16kHz mono WAV audio from `video_path` into `output_path`.
    /// Never deletes `video_path`; that is the ingestor's responsibility.
    pub async fn extract(
        &self,
        video_path: &Path,
        output_path: &Path,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()> {
        if !Self::is_supported_extension(video_path) {
            let ext = video_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(MediaError::UnsupportedFormat(ext));
        }

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = FfmpegCommand::new(&self.ffmpeg_path, video_path, output_path);
        let runner = FfmpegRunner::new(self.timeout);

        info!(input = %video_path.display(), output = %output_path.display(), "extracting audio");
        let result = runner.run(&command, cancel).await;

        if result.is_err() {
            // Best-effort cleanup of a partial file ffmpeg may have created.
            let _ = tokio::fs::remove_file(output_path).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_extensions() {
        assert!(MediaExtractor::is_supported_extension(Path::new("clip.MP4")));
        assert!(MediaExtractor::is_supported_extension(Path::new("clip.mkv")));
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(!MediaExtractor::is_supported_extension(Path::new("clip.txt")));
        assert!(!MediaExtractor::is_supported_extension(Path::new("clip")));
    }
}
