//! Error taxonomy for the Ingestor (spec §4.6).

use thiserror::Error;

use txo_media::MediaError;
use txo_scheduler::SchedulerError;
use txo_store::StoreError;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("upload exceeds the configured size cap")]
    TooLarge,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media extraction error: {0}")]
    Media(#[from] MediaError),

    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}
