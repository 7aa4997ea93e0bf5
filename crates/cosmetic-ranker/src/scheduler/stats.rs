use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use super::task::{TaskId, TaskPriority};

/// Timing for one finished task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetric {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub queue_ms: f64,
    pub execution_ms: f64,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConcurrencyStats {
    pub running: bool,
    pub max_concurrent_tasks: usize,
    pub workers: BTreeMap<TaskPriority, usize>,
    pub total_submitted: u64,
    pub active: usize,
    pub queued: BTreeMap<TaskPriority, usize>,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub average_execution_ms: f64,
    pub average_queue_ms: f64,
    pub peak_concurrency: usize,
    pub metrics_samples: usize,
}

/// Bounded ring of recent task metrics.
#[derive(Debug)]
pub(crate) struct MetricsRing {
    capacity: usize,
    samples: VecDeque<TaskMetric>,
}

impl MetricsRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity.clamp(1, 1024)),
        }
    }

    pub(crate) fn record(&mut self, metric: TaskMetric) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(metric);
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn average_execution_ms(&self) -> f64 {
        self.average(|metric| metric.execution_ms)
    }

    pub(crate) fn average_queue_ms(&self) -> f64 {
        self.average(|metric| metric.queue_ms)
    }

    fn average(&self, field: impl Fn(&TaskMetric) -> f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(field).sum::<f64>() / self.samples.len() as f64
    }
}
