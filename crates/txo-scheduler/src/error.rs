//! Error taxonomy for the Scheduler and JobRunner (spec §4.4, §4.5).

use thiserror::Error;
use txo_models::TaskId;
use txo_store::StoreError;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("admission queue is full")]
    QueueFull,

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task store error: {0}")]
    Store(#[from] StoreError),
}
