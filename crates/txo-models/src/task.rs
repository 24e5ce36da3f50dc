//! The central entity: one `TaskRecord` per transcription unit.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::TaskOptions;
use crate::status::TaskStatus;
use crate::task_id::{TaskId, Variant};

/// Attempted an illegal status transition (spec §3 invariant 1).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal transition from {from} to {to} for task {task_id}")]
pub struct IllegalTransition {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One transcription unit: a task id, its source audio, its options, and its
/// lifecycle state. See spec §3 for the full invariant set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub filename: String,
    pub source_path: String,
    pub status: TaskStatus,
    pub options: TaskOptions,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl TaskRecord {
    /// Create a new, `pending` standalone task.
    pub fn new(
        task_id: TaskId,
        filename: impl Into<String>,
        source_path: impl Into<String>,
        options: TaskOptions,
    ) -> Self {
        Self {
            task_id,
            filename: filename.into(),
            source_path: source_path.into(),
            status: TaskStatus::Pending,
            options,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output_path: None,
            error: None,
            variant: None,
            batch_id: None,
        }
    }

    /// Create a video fan-out sibling: same source audio, shared `batch_id`,
    /// options pinned to the variant's `{timestamps, diarization}` pair.
    pub fn new_variant(
        task_id: TaskId,
        filename: impl Into<String>,
        source_path: impl Into<String>,
        base_options: &TaskOptions,
        variant: Variant,
        batch_id: impl Into<String>,
    ) -> Self {
        let (timestamps, diarization) = variant.options();
        let mut record = Self::new(
            task_id,
            filename,
            source_path,
            base_options.with_flags(timestamps, diarization),
        );
        record.variant = Some(variant);
        record.batch_id = Some(batch_id.into());
        record
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), IllegalTransition> {
        if !self.status.can_transition_to(to) {
            return Err(IllegalTransition {
                task_id: self.task_id.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending -> processing`.
    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        self.transition(TaskStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `processing -> completed`, recording where the output was written.
    pub fn complete(&mut self, output_path: impl Into<String>) -> Result<(), IllegalTransition> {
        self.transition(TaskStatus::Completed)?;
        self.output_path = Some(output_path.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `processing -> failed` (or `pending -> failed` for cancellation of a
    /// not-yet-started task; see spec §4.5).
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), IllegalTransition> {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Failed;
        } else {
            self.transition(TaskStatus::Failed)?;
        }
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
