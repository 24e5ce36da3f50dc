//! Error taxonomy for the Transcriber capability (spec §4.3).

use thiserror::Error;

pub type TranscriberResult<T> = Result<T, TranscriberError>;

#[derive(Debug, Error)]
pub enum TranscriberError {
    #[error("transcription was canceled")]
    Cancelled,

    #[error("transcription backend request failed: {0}")]
    Backend(String),

    #[error("transcription backend timed out")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
