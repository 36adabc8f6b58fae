#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use clock_core::config::ExecutorConfig;
use clock_core::models::{RunId, Task, TaskStatus};
use clock_core::traits::{ExecutionFailure, TaskExecutor};
use clock_core::{EventHub, StreamEventKind};
use clock_testing_utils::{InMemoryStore, StoreEvent, TaskBuilder};
use clock_worker::{ShellExecutor, TaskExecutionService};
use tokio_util::sync::CancellationToken;

fn shell() -> ShellExecutor {
    ShellExecutor::new(&ExecutorConfig {
        kill_grace_seconds: 1,
        max_output_bytes: 64 * 1024,
    })
}

fn service(store: &InMemoryStore, events: EventHub) -> TaskExecutionService {
    let runner = Arc::new(shell().with_events(events.clone()));
    TaskExecutionService::new(
        runner,
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        events,
    )
}

fn stored(store: &InMemoryStore, builder: TaskBuilder) -> Task {
    store.insert_task(builder.with_id(0).build())
}

#[tokio::test]
async fn test_success_writes_log_before_terminal_status() {
    let store = InMemoryStore::new();
    let events = EventHub::new(64);
    let mut rx = events.subscribe();
    let task = stored(&store, TaskBuilder::new().with_command("echo hello"));
    let run_id = RunId::generate();

    let execution = service(&store, events)
        .execute(&task, &run_id, CancellationToken::new())
        .await;

    assert_eq!(execution.status, TaskStatus::Success);
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Success);

    let logs = store.logs_for(task.tid);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].std_out, "hello");
    assert_eq!(logs[0].run_id.as_deref(), Some(run_id.as_str()));

    assert_eq!(
        store.journal(),
        vec![
            StoreEvent::TaskStatus(task.tid, TaskStatus::Start),
            StoreEvent::LogWritten(task.tid),
            StoreEvent::TaskStatus(task.tid, TaskStatus::Success),
        ]
    );

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            StreamEventKind::TaskStart,
            StreamEventKind::Stdout,
            StreamEventKind::TaskEnd
        ]
    );
}

#[tokio::test]
async fn test_non_zero_exit_is_failure() {
    let store = InMemoryStore::new();
    let task = stored(
        &store,
        TaskBuilder::new().with_command("ls /definitely/not/here"),
    );

    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;

    assert_eq!(execution.status, TaskStatus::Failure);
    assert!(matches!(
        execution.failure,
        Some(ExecutionFailure::ProcessFailure { exit_code: Some(code) }) if code != 0
    ));
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Failure);
    assert!(!store.logs_for(task.tid)[0].std_err.is_empty());
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let store = InMemoryStore::new();
    let task = stored(
        &store,
        TaskBuilder::new()
            .with_name("sleeper")
            .with_command("sleep 5")
            .with_timeout(1),
    );

    let started = Instant::now();
    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(execution.failure, Some(ExecutionFailure::Timeout));
    let log = &store.logs_for(task.tid)[0];
    assert!(log.is_timeout());
    assert!(log.std_err.contains("task sleeper timeout after 1s"));
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Failure);
}

#[tokio::test]
async fn test_cancel_running_process() {
    let store = InMemoryStore::new();
    let task = stored(&store, TaskBuilder::new().with_command("sleep 10"));
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), token)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(execution.is_cancelled());
    assert!(store.logs_for(task.tid)[0].is_cancelled());
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Failure);
}

#[tokio::test]
async fn test_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let store = InMemoryStore::new();
    let task = stored(
        &store,
        TaskBuilder::new()
            .with_command("pwd")
            .with_directory(expected.to_str().unwrap()),
    );

    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;

    assert!(execution.is_success());
    assert_eq!(execution.log.std_out, expected.to_str().unwrap());
}

#[tokio::test]
async fn test_log_disabled_skips_persistence() {
    let store = InMemoryStore::new();
    let task = stored(
        &store,
        TaskBuilder::new()
            .with_command("echo quiet")
            .with_log_enable(false),
    );

    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;

    assert!(execution.is_success());
    assert!(store.all_logs().is_empty());
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Success);
}

#[tokio::test]
async fn test_empty_command_records_failure() {
    let store = InMemoryStore::new();
    let task = stored(&store, TaskBuilder::new().with_command("   "));

    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;

    assert_eq!(execution.failure, Some(ExecutionFailure::EmptyCommand));
    assert_eq!(
        store.logs_for(task.tid)[0].std_err,
        "command cannot be empty"
    );
}

#[tokio::test]
async fn test_timeout_escalates_when_sigterm_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("stubborn.sh");
    std::fs::write(&script, "trap '' TERM\nwhile :; do sleep 0.1; done\n").unwrap();

    let store = InMemoryStore::new();
    let task = stored(
        &store,
        TaskBuilder::new()
            .with_name("stubborn")
            .with_command(&format!("sh {}", script.display()))
            .with_timeout(1),
    );

    let started = Instant::now();
    let execution = service(&store, EventHub::default())
        .execute(&task, &RunId::generate(), CancellationToken::new())
        .await;
    let elapsed = started.elapsed();

    // 超时 1 秒，再经过 1 秒宽限期后强制结束
    assert!(elapsed >= Duration::from_millis(1900), "elapsed={elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed={elapsed:?}");
    assert_eq!(execution.failure, Some(ExecutionFailure::Timeout));
    assert!(store.logs_for(task.tid)[0].is_timeout());
    assert_eq!(store.task(task.tid).unwrap().status, TaskStatus::Failure);
}
