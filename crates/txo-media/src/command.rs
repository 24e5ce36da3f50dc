//! FFmpeg invocation: command construction and a cancel/timeout-aware runner.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Grace period between SIGTERM and SIGKILL when a decode must be aborted
/// (spec §4.2: "signaled to terminate, then force-killed after a grace
/// period").
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Builds the fixed `ffmpeg` invocation that extracts canonical 16kHz mono
/// PCM WAV audio from an input video, discarding any video stream.
pub struct FfmpegCommand {
    ffmpeg_path: PathBuf,
    input: PathBuf,
    output: PathBuf,
}

impl FfmpegCommand {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            input: input.into(),
            output: output.into(),
        }
    }

    /// Resolve `ffmpeg` on `PATH` up front so a missing binary is reported as
    /// `FfmpegNotFound` rather than surfacing as an opaque spawn error.
    pub fn resolve() -> MediaResult<PathBuf> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
    }

    fn build(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(&self.input)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg("-progress")
            .arg("pipe:2")
            .arg(&self.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    pub fn spawn(&self) -> MediaResult<Child> {
        Ok(self.build().spawn()?)
    }
}

/// Runs an `FfmpegCommand` to completion, honoring a wall-clock timeout and
/// an external cancellation signal. Mirrors the shape of a worker-pool job
/// runner: spawn, race completion against timeout/cancel, reap the child.
pub struct FfmpegRunner {
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(
        &self,
        command: &FfmpegCommand,
        mut cancel: watch::Receiver<bool>,
    ) -> MediaResult<()> {
        let mut child = command.spawn()?;
        let stderr = child.stderr.take();

        let progress_task = stderr.map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(progress) = parse_progress_line(&line) {
                        debug!(progress, "ffmpeg progress");
                    }
                }
            })
        });

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status.map_err(MediaError::Io)?),
            _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            _ = wait_for_cancel(&mut cancel) => Outcome::Cancelled,
        };

        if let Some(task) = progress_task {
            task.abort();
        }

        match outcome {
            Outcome::Exited(status) if status.success() => Ok(()),
            Outcome::Exited(status) => {
                terminate(&mut child).await;
                Err(MediaError::decoder_error(
                    format!("ffmpeg exited with status {status}"),
                    status.code(),
                ))
            }
            Outcome::TimedOut => {
                terminate(&mut child).await;
                Err(MediaError::DecoderTimeout(self.timeout.as_secs()))
            }
            Outcome::Cancelled => {
                terminate(&mut child).await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

enum Outcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped: treat as "never cancels" by parking forever,
            // the outer select! will resolve via another branch instead.
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM the child, wait up to `KILL_GRACE_PERIOD`, then SIGKILL if it's
/// still alive.
#[cfg(unix)]
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        let reaped = tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await;
        if reaped.is_err() {
            warn!(pid, "ffmpeg ignored SIGTERM, sending SIGKILL");
            let _ = child.kill().await;
        }
    } else {
        let _ = child.kill().await;
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) {
    let _ = child.kill().await;
}

/// Parses an `out_time_ms=123456` style line from ffmpeg's `-progress`
/// stream into whole seconds, for log context only.
fn parse_progress_line(line: &str) -> Option<u64> {
    let value = line.strip_prefix("out_time_ms=")?;
    value.trim().parse::<u64>().ok().map(|ms| ms / 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_parses_microseconds_to_seconds() {
        assert_eq!(parse_progress_line("out_time_ms=2500000"), Some(2));
        assert_eq!(parse_progress_line("frame=120"), None);
    }

    #[test]
    fn command_builds_expected_args() {
        let cmd = FfmpegCommand::new("/usr/bin/ffmpeg", "/in/video.mp4", "/out/audio.wav");
        let built = cmd.build();
        let args: Vec<String> = built
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"pcm_s16le".to_string()));
        assert!(args.contains(&"16000".to_string()));
    }
}
