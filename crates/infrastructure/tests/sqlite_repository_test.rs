use chrono::{Duration, TimeZone, Utc};
use clock_core::models::{
    Container, ContainerQuery, LogFilter, LogQuery, Pagination, Relation, RunId, Task, TaskLog,
    TaskQuery, TaskStatus,
};
use clock_core::SchedulerError;
use clock_infrastructure::{DatabaseManager, Repositories};

async fn setup() -> (DatabaseManager, Repositories) {
    let manager = DatabaseManager::new_in_memory().await.unwrap();
    let repos = manager.repositories();
    (manager, repos)
}

#[tokio::test]
async fn test_container_crud() {
    let (_db, repos) = setup().await;

    let created = repos
        .containers
        .create(&Container::new("nightly", "0 2 * * *"))
        .await
        .unwrap();
    assert!(created.cid > 0);
    assert!(created.blocking);
    assert_eq!(created.entry_id, -1);

    let mut updated = created.clone();
    updated.name = "nightly-etl".to_string();
    updated.disable = true;
    repos.containers.update(&updated).await.unwrap();
    repos
        .containers
        .update_status(created.cid, TaskStatus::Start)
        .await
        .unwrap();
    repos.containers.update_entry_id(created.cid, 3).await.unwrap();

    let fetched = repos.containers.get_by_id(created.cid).await.unwrap().unwrap();
    assert_eq!(fetched.name, "nightly-etl");
    assert!(fetched.disable);
    assert_eq!(fetched.status, TaskStatus::Start);
    assert_eq!(fetched.entry_id, 3);

    repos.containers.delete(created.cid).await.unwrap();
    assert!(repos.containers.get_by_id(created.cid).await.unwrap().is_none());
    assert!(matches!(
        repos.containers.delete(created.cid).await,
        Err(SchedulerError::ContainerNotFound { .. })
    ));
}

#[tokio::test]
async fn test_container_list_pagination_and_name_filter() {
    let (_db, repos) = setup().await;
    for i in 0..12 {
        repos
            .containers
            .create(&Container::new(format!("job-{i}"), "* * * * *"))
            .await
            .unwrap();
    }
    repos
        .containers
        .create(&Container::new("backup_100%", "* * * * *"))
        .await
        .unwrap();

    let (page, total) = repos
        .containers
        .list(&ContainerQuery {
            page: Pagination::new(5, 3),
            name: None,
        })
        .await
        .unwrap();
    assert_eq!(total, 13);
    assert_eq!(page.len(), 3);

    let (page, total) = repos
        .containers
        .list(&ContainerQuery {
            page: Pagination::default(),
            name: Some("100%".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].name, "backup_100%");
}

#[tokio::test]
async fn test_task_crud_and_status() {
    let (_db, repos) = setup().await;

    let mut task = Task::new(1, "extract", "echo extract");
    task.status = TaskStatus::Success;
    let created = repos.tasks.create(&task).await.unwrap();
    // 新建任务总是 PENDING
    assert_eq!(created.status, TaskStatus::Pending);

    repos
        .tasks
        .update_status(created.tid, TaskStatus::Failure)
        .await
        .unwrap();
    repos.tasks.update_coordinates(created.tid, 40, 80).await.unwrap();

    let mut edited = repos.tasks.get_by_id(created.tid).await.unwrap().unwrap();
    assert_eq!(edited.status, TaskStatus::Failure);
    assert_eq!((edited.point_x, edited.point_y), (40, 80));

    edited.command = "echo changed".to_string();
    edited.status = TaskStatus::Success;
    repos.tasks.update(&edited).await.unwrap();
    let fetched = repos.tasks.get_by_id(created.tid).await.unwrap().unwrap();
    assert_eq!(fetched.command, "echo changed");
    // 定义更新不修改状态
    assert_eq!(fetched.status, TaskStatus::Failure);

    repos.tasks.reset_status_by_cid(1).await.unwrap();
    let fetched = repos.tasks.get_by_id(created.tid).await.unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Pending);

    assert!(matches!(
        repos.tasks.update_status(999, TaskStatus::Start).await,
        Err(SchedulerError::TaskNotFound { id: 999 })
    ));
}

#[tokio::test]
async fn test_task_list_by_container_and_counts() {
    let (_db, repos) = setup().await;
    for cid in [1, 1, 2] {
        repos
            .tasks
            .create(&Task::new(cid, format!("task-{cid}"), "true"))
            .await
            .unwrap();
    }

    let (tasks, total) = repos
        .tasks
        .list(&TaskQuery {
            cid: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(tasks.iter().all(|t| t.cid == 1));

    let first = repos.tasks.get_by_cid(1).await.unwrap()[0].tid;
    repos
        .tasks
        .update_status(first, TaskStatus::Success)
        .await
        .unwrap();

    let counts = repos.tasks.status_counts().await.unwrap();
    let pending = counts
        .iter()
        .find(|(s, _)| *s == TaskStatus::Pending)
        .map(|(_, c)| *c);
    assert_eq!(pending, Some(2));

    assert_eq!(repos.tasks.delete_by_cid(1).await.unwrap(), 2);
    assert!(repos.tasks.get_by_cid(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relation_unique_and_cascade() {
    let (_db, repos) = setup().await;

    let created = repos.relations.create(&Relation::new(1, 10, 11)).await.unwrap();
    repos.relations.create(&Relation::new(1, 11, 12)).await.unwrap();
    repos.relations.create(&Relation::new(2, 20, 21)).await.unwrap();

    let duplicate = repos.relations.create(&Relation::new(1, 10, 11)).await;
    assert!(matches!(duplicate, Err(SchedulerError::InvalidRelation(_))));

    let found = repos.relations.find(10, 11).await.unwrap().unwrap();
    assert_eq!(found.rid, created.rid);
    assert_eq!(repos.relations.get_by_cid(1).await.unwrap().len(), 2);

    // 任务 11 同时是起点和终点
    assert_eq!(repos.relations.delete_by_task(11).await.unwrap(), 2);
    assert!(repos.relations.get_by_cid(1).await.unwrap().is_empty());

    assert_eq!(repos.relations.delete_by_cid(2).await.unwrap(), 1);
    assert!(matches!(
        repos.relations.delete(created.rid).await,
        Err(SchedulerError::RelationNotFound { .. })
    ));
}

fn log_at(tid: i64, cid: i64, ts: i64) -> TaskLog {
    let mut task = Task::new(cid, "t", "true");
    task.tid = tid;
    let mut log = TaskLog::for_task(&task, &RunId::generate());
    log.std_out = format!("out-{ts}");
    log.update_at = Utc.timestamp_opt(ts, 0).unwrap();
    log
}

#[tokio::test]
async fn test_log_query_range_and_order() {
    let (_db, repos) = setup().await;
    let base = 1_700_000_000;
    for (i, tid) in [1, 1, 2, 1].into_iter().enumerate() {
        repos
            .logs
            .create(&log_at(tid, 9, base + i as i64 * 60))
            .await
            .unwrap();
    }

    let (logs, total) = repos
        .logs
        .list(&LogQuery {
            tid: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 3);
    // 最新的在前
    assert_eq!(logs[0].std_out, format!("out-{}", base + 180));
    assert!(logs[0].run_id.is_some());

    // 开区间：边界上的记录不包含在内
    let (logs, total) = repos
        .logs
        .list(&LogQuery {
            left_ts: Some(base),
            right_ts: Some(base + 180),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_log_delete_filters() {
    let (_db, repos) = setup().await;
    let now = Utc::now();
    for tid in [1, 2, 3] {
        let mut log = log_at(tid, tid * 10, now.timestamp());
        log.update_at = now - Duration::seconds(tid);
        repos.logs.create(&log).await.unwrap();
    }

    // 没有条件时不删除
    assert_eq!(repos.logs.delete(&LogFilter::default()).await.unwrap(), 0);

    let removed = repos
        .logs
        .delete(&LogFilter {
            cid: Some(20),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert_eq!(repos.logs.delete(&LogFilter::all()).await.unwrap(), 2);
    let (_, total) = repos.logs.list(&LogQuery::default()).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_log_out_of_range_timestamp_keeps_logs() {
    let (_db, repos) = setup().await;
    for tid in [1, 2, 3] {
        repos
            .logs
            .create(&log_at(tid, 10, 1_700_000_000 + tid))
            .await
            .unwrap();
    }

    let result = repos
        .logs
        .delete(&LogFilter {
            left_ts: Some(i64::MAX),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidQuery(_))));

    let result = repos
        .logs
        .list(&LogQuery {
            right_ts: Some(i64::MIN),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidQuery(_))));

    let (_, total) = repos.logs.list(&LogQuery::default()).await.unwrap();
    assert_eq!(total, 3);
}
