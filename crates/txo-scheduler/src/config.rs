//! Scheduler configuration (spec §4.5).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Global concurrency ceiling: number of JobRunners allowed to execute
    /// simultaneously.
    pub max_concurrent_tasks: usize,
    /// Depth of the bounded admission queue. Enqueue past this depth fails
    /// with `queue_full`.
    pub queue_depth: usize,
    /// Wall-clock ceiling for a single task's Transcriber invocation.
    pub task_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let max_concurrent_tasks = 3;
        Self {
            max_concurrent_tasks,
            queue_depth: max_concurrent_tasks * 16,
            task_timeout: Duration::from_secs(600),
        }
    }
}

impl SchedulerConfig {
    /// Builds configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let max_concurrent_tasks = std::env::var("MAX_CONCURRENT_TASKS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        let queue_depth = std::env::var("SCHEDULER_QUEUE_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(max_concurrent_tasks * 16);
        let task_timeout = Duration::from_secs(
            std::env::var("TASK_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        );

        Self {
            max_concurrent_tasks,
            queue_depth,
            task_timeout,
        }
    }
}
