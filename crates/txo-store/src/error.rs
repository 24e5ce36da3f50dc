//! Error taxonomy for `TaskStore` (spec §4.1).

use thiserror::Error;
use txo_models::{IllegalTransition, TaskId};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} already exists")]
    AlreadyExists(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("illegal state transition: {0}")]
    IllegalTransition(#[from] IllegalTransition),

    #[error("failed to persist task store: {0}")]
    Persist(#[source] std::io::Error),
}
