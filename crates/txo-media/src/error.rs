//! Error taxonomy for media extraction (spec §4.2, §7 "Extraction").

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("upload exceeds the configured size cap")]
    TooLarge,

    #[error("decoder exited with a non-zero status: {message}")]
    DecoderError { message: String, exit_code: Option<i32> },

    #[error("decoder timed out after {0}s")]
    DecoderTimeout(u64),

    #[error("extraction was canceled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn decoder_error(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::DecoderError {
            message: message.into(),
            exit_code,
        }
    }
}
