#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use clock_core::models::{Container, Task};
use clock_core::EventHub;
use clock_dispatcher::{ContainerScheduler, RunCoordinator};
use clock_testing_utils::{ContainerBuilder, FakeExecutor, InMemoryStore, TaskBuilder};
use clock_worker::TaskExecutionService;

pub struct Harness {
    pub store: InMemoryStore,
    pub fake: Arc<FakeExecutor>,
    pub events: EventHub,
    pub coordinator: RunCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_executor(FakeExecutor::new())
    }

    pub fn with_executor(fake: FakeExecutor) -> Self {
        let store = InMemoryStore::new();
        let fake = Arc::new(fake);
        let events = EventHub::default();
        let service = TaskExecutionService::new(
            fake.clone(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            events.clone(),
        );
        let coordinator = RunCoordinator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(service),
        );
        Self {
            store,
            fake,
            events,
            coordinator,
        }
    }

    pub fn scheduler(&self) -> Arc<ContainerScheduler> {
        Arc::new(ContainerScheduler::new(
            Arc::new(self.store.clone()),
            self.coordinator.clone(),
        ))
    }

    pub fn container(&self, builder: ContainerBuilder) -> Container {
        self.store.insert_container(builder.with_id(0).build())
    }

    pub fn task(&self, cid: i64, name: &str) -> Task {
        self.store.insert_task(
            TaskBuilder::new()
                .with_id(0)
                .with_cid(cid)
                .with_name(name)
                .build(),
        )
    }

    pub fn edge(&self, from: &Task, to: &Task) {
        self.store.insert_relation(from.cid, from.tid, to.tid);
    }

    /// 等待任务出现在运行列表中
    pub async fn wait_running(&self, tid: i64) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            if self
                .coordinator
                .list_running()
                .await
                .iter()
                .any(|r| r.tid == tid)
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// 菱形依赖 A -> B, A -> C, B -> D, C -> D
pub fn diamond(harness: &Harness, cid: i64) -> [Task; 4] {
    let a = harness.task(cid, "A");
    let b = harness.task(cid, "B");
    let c = harness.task(cid, "C");
    let d = harness.task(cid, "D");
    harness.edge(&a, &b);
    harness.edge(&a, &c);
    harness.edge(&b, &d);
    harness.edge(&c, &d);
    [a, b, c, d]
}
