//! Metric names the scheduler and job runner emit (spec §B: counts of tasks
//! by status, an active-slot gauge, a queue-depth gauge). Shared across this
//! crate rather than the HTTP layer, since these are emitted wherever a task
//! actually transitions, not at the request boundary.

pub const TASKS_ADMITTED_TOTAL: &str = "txo_tasks_admitted_total";
pub const TASKS_COMPLETED_TOTAL: &str = "txo_tasks_completed_total";
pub const TASKS_FAILED_TOTAL: &str = "txo_tasks_failed_total";
pub const ACTIVE_SLOTS: &str = "txo_scheduler_active_slots";
pub const QUEUE_DEPTH: &str = "txo_scheduler_queue_depth";
