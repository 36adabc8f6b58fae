mod common;

use std::sync::Arc;
use std::time::Duration;

use clock_core::models::{
    Container, ContainerQuery, LogFilter, NodePosition, Pagination, Relation, Task, TaskStatus,
};
use clock_core::SchedulerError;
use clock_dispatcher::{ContainerService, CounterService, LogService, RelationService, TaskService};
use clock_testing_utils::{ContainerBuilder, FakeOutcome, TaskBuilder};

use common::Harness;

fn container_service(harness: &Harness, delete_wait: Duration) -> ContainerService {
    ContainerService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        harness.scheduler(),
        delete_wait,
    )
}

fn task_service(harness: &Harness) -> TaskService {
    TaskService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        harness.coordinator.clone(),
    )
}

fn relation_service(harness: &Harness) -> RelationService {
    RelationService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
    )
}

#[tokio::test]
async fn test_container_save_validates_cron_before_persisting() {
    let harness = Harness::new();
    let service = container_service(&harness, Duration::from_secs(1));

    let result = service.save(&Container::new("broken", "61 * * * *")).await;
    assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));
    let page = service.list(&ContainerQuery::default()).await.unwrap();
    assert_eq!(page.page.total, 0);
}

#[tokio::test]
async fn test_container_save_creates_updates_and_schedules() {
    let harness = Harness::new();
    let service = container_service(&harness, Duration::from_secs(1));

    let created = service
        .save(&Container::new("nightly", "0 2 * * *"))
        .await
        .unwrap();
    assert!(created.cid > 0);
    assert!(created.entry_id > 0);

    let mut edited = created.clone();
    edited.expression = "30 3 * * 1-5".to_string();
    edited.disable = true;
    let saved = service.save(&edited).await.unwrap();
    assert_eq!(saved.expression, "30 3 * * 1-5");
    assert_eq!(saved.entry_id, -1);

    let mut missing = created.clone();
    missing.cid = 999;
    assert!(matches!(
        service.save(&missing).await,
        Err(SchedulerError::ContainerNotFound { id: 999 })
    ));

    let listed = service
        .list(&ContainerQuery {
            page: Pagination::new(10, 1),
            name: Some("night".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.page.total, 1);
}

#[tokio::test]
async fn test_container_delete_cascades() {
    let harness = Harness::new();
    let service = container_service(&harness, Duration::from_secs(1));
    let container = service
        .save(&Container::new("etl", "*/5 * * * *"))
        .await
        .unwrap();
    let a = harness.task(container.cid, "A");
    let b = harness.task(container.cid, "B");
    harness.edge(&a, &b);
    let other = harness.container(ContainerBuilder::new());
    let kept = harness.task(other.cid, "kept");

    service.delete(container.cid).await.unwrap();

    assert!(harness.store.container(container.cid).is_none());
    assert!(harness.store.task(a.tid).is_none());
    assert!(harness.store.task(b.tid).is_none());
    assert!(harness.store.all_relations().is_empty());
    assert!(harness.store.task(kept.tid).is_some());
}

#[tokio::test]
async fn test_container_delete_waits_for_active_run() {
    let harness = Harness::new();
    let scheduler = harness.scheduler();
    let service = ContainerService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
        scheduler.clone(),
        Duration::from_millis(100),
    );
    let container = service
        .save(&Container::new("busy", "*/5 * * * *"))
        .await
        .unwrap();
    let a = harness.task(container.cid, "A");
    harness
        .fake
        .set_outcome(a.tid, FakeOutcome::success().with_delay(Duration::from_secs(1)));

    service.run(container.cid).await.unwrap();
    assert!(harness.wait_running(a.tid).await);

    assert!(matches!(
        service.delete(container.cid).await,
        Err(SchedulerError::ContainerBusy { .. })
    ));
    // 删除失败后定时器恢复
    assert!(scheduler.entry_id_of(container.cid).await.is_some());
    assert!(harness.store.container(container.cid).is_some());
}

#[tokio::test]
async fn test_task_save_rules() {
    let harness = Harness::new();
    let service = task_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let other = harness.container(ContainerBuilder::new());

    assert!(matches!(
        service.save(&Task::new(404, "orphan", "true")).await,
        Err(SchedulerError::ContainerNotFound { id: 404 })
    ));

    let created = service
        .save(&Task::new(container.cid, "extract", "echo 1"))
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Pending);

    let mut moved = created.clone();
    moved.cid = other.cid;
    assert!(matches!(
        service.save(&moved).await,
        Err(SchedulerError::InvalidTaskParams(_))
    ));

    let mut edited = created.clone();
    edited.command = "echo 2".to_string();
    assert_eq!(service.save(&edited).await.unwrap().command, "echo 2");
}

#[tokio::test]
async fn test_task_delete_removes_touching_relations() {
    let harness = Harness::new();
    let service = task_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");
    let b = harness.task(container.cid, "B");
    let c = harness.task(container.cid, "C");
    harness.edge(&a, &b);
    harness.edge(&b, &c);
    harness.edge(&a, &c);

    service.delete(b.tid).await.unwrap();

    let remaining = harness.store.all_relations();
    assert_eq!(remaining.len(), 1);
    assert_eq!((remaining[0].tid, remaining[0].next_tid), (a.tid, c.tid));
    assert!(matches!(
        service.delete(b.tid).await,
        Err(SchedulerError::TaskNotFound { .. })
    ));
}

#[tokio::test]
async fn test_task_run_and_cancel() {
    let harness = Harness::new();
    let service = task_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");
    harness
        .fake
        .set_outcome(a.tid, FakeOutcome::success().with_delay(Duration::from_secs(10)));

    let run_id = service.run(a.tid).await.unwrap();
    assert!(harness.wait_running(a.tid).await);
    assert_eq!(service.running().await[0].run_id, run_id);

    assert_eq!(service.cancel(a.tid).await.unwrap(), run_id);
    let service = &service;
    let finished = clock_testing_utils::TestEnv::wait_for(
        move || async move { service.running().await.is_empty() },
        Duration::from_secs(3),
    )
    .await;
    assert!(finished);
    assert_eq!(harness.store.task(a.tid).unwrap().status, TaskStatus::Failure);
}

#[tokio::test]
async fn test_relation_cycle_rejected_and_store_unchanged() {
    let harness = Harness::new();
    let service = relation_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");
    let b = harness.task(container.cid, "B");
    let c = harness.task(container.cid, "C");

    service
        .create(&Relation::new(container.cid, a.tid, b.tid))
        .await
        .unwrap();
    service
        .create(&Relation::new(container.cid, b.tid, c.tid))
        .await
        .unwrap();
    let before = harness.store.all_relations();

    for _ in 0..2 {
        let result = service
            .create(&Relation::new(container.cid, c.tid, a.tid))
            .await;
        match result {
            Err(SchedulerError::CycleDetected { tids }) => {
                assert_eq!(tids, vec![c.tid, a.tid, b.tid]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(harness.store.all_relations(), before);
    }

    assert!(matches!(
        service
            .create(&Relation::new(container.cid, a.tid, a.tid))
            .await,
        Err(SchedulerError::CycleDetected { .. })
    ));
    assert!(matches!(
        service
            .create(&Relation::new(container.cid, a.tid, b.tid))
            .await,
        Err(SchedulerError::InvalidRelation(_))
    ));
}

#[tokio::test]
async fn test_relation_must_stay_within_container() {
    let harness = Harness::new();
    let service = relation_service(&harness);
    let first = harness.container(ContainerBuilder::new());
    let second = harness.container(ContainerBuilder::new());
    let a = harness.task(first.cid, "A");
    let b = harness.task(second.cid, "B");

    assert!(matches!(
        service.create(&Relation::new(first.cid, a.tid, b.tid)).await,
        Err(SchedulerError::InvalidRelation(_))
    ));
    assert!(matches!(
        service.create(&Relation::new(first.cid, a.tid, 404)).await,
        Err(SchedulerError::TaskNotFound { id: 404 })
    ));
    assert!(harness.store.all_relations().is_empty());
}

#[tokio::test]
async fn test_relation_graph_round_trip() {
    let harness = Harness::new();
    let service = relation_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");
    let b = harness.store.insert_task(
        TaskBuilder::new()
            .with_id(0)
            .with_cid(container.cid)
            .with_name("B")
            .with_status(TaskStatus::Failure)
            .build(),
    );

    let created = service
        .create(&Relation::new(container.cid, a.tid, b.tid))
        .await
        .unwrap();
    let graph = service.graph(container.cid).await.unwrap();

    assert_eq!(graph.nodes.len(), 2);
    let node_b = graph.nodes.iter().find(|n| n.id == b.tid).unwrap();
    assert_eq!(node_b.status, TaskStatus::Failure);

    assert_eq!(graph.links.len(), 1);
    let link = &graph.links[0];
    assert_eq!(link.id, created.rid);
    assert_eq!(
        (link.cid, link.tid, link.next_tid),
        (container.cid, a.tid, b.tid)
    );

    service.delete(created.rid).await.unwrap();
    assert!(service.graph(container.cid).await.unwrap().links.is_empty());
}

#[tokio::test]
async fn test_update_nodes_skips_unknown_tasks() {
    let harness = Harness::new();
    let service = relation_service(&harness);
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");

    let updated = service
        .update_nodes(&[
            NodePosition {
                id: a.tid,
                x: 120,
                y: 48,
            },
            NodePosition { id: 999, x: 1, y: 1 },
        ])
        .await
        .unwrap();

    assert_eq!(updated, 1);
    let task = harness.store.task(a.tid).unwrap();
    assert_eq!((task.point_x, task.point_y), (120, 48));
}

#[tokio::test]
async fn test_counters() {
    let harness = Harness::new();
    let container = harness.container(ContainerBuilder::new());
    harness.task(container.cid, "A");
    harness.store.insert_task(
        TaskBuilder::new()
            .with_id(0)
            .with_cid(container.cid)
            .with_status(TaskStatus::Failure)
            .build(),
    );

    let service = CounterService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.store.clone()),
    );
    let counters = service.counters().await.unwrap();
    let count = |title: &str| {
        counters
            .iter()
            .find(|c| c.title == title)
            .map(|c| c.count)
            .unwrap()
    };

    assert_eq!(count("容器总数"), 1);
    assert_eq!(count("任务总数"), 2);
    assert_eq!(count("当前等待"), 1);
    assert_eq!(count("正在运行"), 0);
    assert_eq!(count("运行失败"), 1);
}

#[tokio::test]
async fn test_log_service_delete_requires_condition() {
    let harness = Harness::new();
    let container = harness.container(ContainerBuilder::new());
    let a = harness.task(container.cid, "A");
    harness
        .coordinator
        .start_run(container.cid)
        .await
        .unwrap()
        .handle
        .await
        .unwrap();

    let service = LogService::new(Arc::new(harness.store.clone()));
    assert_eq!(service.delete(&LogFilter::default()).await.unwrap(), 0);

    let page = service
        .list(&clock_core::models::LogQuery {
            tid: Some(a.tid),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.page.total, 1);

    let removed = service
        .delete(&LogFilter {
            tid: Some(a.tid),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(removed, 1);
}
