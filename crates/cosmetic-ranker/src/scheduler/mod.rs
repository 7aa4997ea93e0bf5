//! Bounded-concurrency task execution and connection pooling.

pub mod executor;
pub mod pool;
pub mod stats;
pub mod task;

#[cfg(test)]
mod tests;

use std::time::Duration;

pub use executor::{SchedulerError, TaskScheduler};
pub use pool::{
    ConnectionFactory, ConnectionPool, PoolConfig, PoolError, PoolStats, PooledConnection,
};
pub use stats::{ConcurrencyStats, TaskMetric};
pub use task::{TaskId, TaskPriority, TaskRecord, TaskState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Global cap on tasks running at once.
    pub max_concurrent_tasks: usize,
    /// Size of the metrics ring and of the finished-record set.
    pub metrics_capacity: usize,
    /// Pause before a worker retries a task it put back because the cap was reached.
    pub requeue_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 100,
            metrics_capacity: 1000,
            requeue_backoff: Duration::from_millis(5),
        }
    }
}

impl SchedulerConfig {
    pub fn workers_for(&self, priority: TaskPriority) -> usize {
        let max = self.max_concurrent_tasks;
        match priority {
            TaskPriority::Critical => (max / 10).max(2),
            TaskPriority::High => (max / 20).max(2),
            TaskPriority::Normal => (max / 50).max(1),
            TaskPriority::Low => 1,
        }
    }
}
