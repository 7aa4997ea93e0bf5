use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::scheduler::{
    ConnectionFactory, PoolError, SchedulerConfig, TaskId, TaskScheduler, TaskState,
};

pub(super) fn started(max_concurrent_tasks: usize) -> TaskScheduler {
    let scheduler = TaskScheduler::new(SchedulerConfig {
        max_concurrent_tasks,
        ..SchedulerConfig::default()
    });
    scheduler.start();
    scheduler
}

/// Yields until `id` reaches `state`, failing the test after a generous bound.
pub(super) async fn wait_for_state(scheduler: &TaskScheduler, id: TaskId, state: TaskState) {
    for _ in 0..500 {
        if scheduler.record(id).map(|record| record.state) == Some(state.clone()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("{id} never reached {state:?}");
}

pub(super) struct TestConnection {
    pub(super) serial: u64,
    pub(super) healthy: bool,
}

#[derive(Default)]
pub(super) struct CountingFactory {
    pub(super) opened: AtomicU64,
    pub(super) refuse: AtomicBool,
}

#[async_trait]
impl ConnectionFactory for CountingFactory {
    type Connection = TestConnection;

    async fn connect(&self) -> Result<TestConnection, PoolError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PoolError::Connect("connection refused".to_string()));
        }
        let serial = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TestConnection {
            serial,
            healthy: true,
        })
    }

    async fn is_valid(&self, connection: &mut TestConnection) -> bool {
        connection.healthy
    }
}
