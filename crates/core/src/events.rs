//! 实时事件流
//!
//! 执行器在任务开始、结束以及每读到一行输出时发布事件，
//! HTTP 层通过 SSE 把事件推送给前端。订阅者跟不上时会丢失事件
//! （`broadcast` 的 `Lagged` 语义），不会阻塞执行器。

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{RunId, Task, TaskStatus};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    TaskStart,
    TaskEnd,
    Stdout,
    Stderr,
    Meta,
}

/// 推送给订阅者的事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    pub id: i64,
    /// 毫秒时间戳
    pub ts: i64,
    pub kind: StreamEventKind,
    #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<i64>,
    #[serde(rename = "taskName", skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(rename = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl StreamEvent {
    fn for_task(kind: StreamEventKind, task: &Task, run_id: &RunId) -> Self {
        Self {
            id: 0,
            ts: Utc::now().timestamp_millis(),
            kind,
            run_id: Some(run_id.to_string()),
            tid: Some(task.tid),
            cid: Some(task.cid),
            task_name: Some(task.name.clone()),
            status: None,
            duration_ms: None,
            msg: None,
        }
    }

    pub fn task_start(task: &Task, run_id: &RunId) -> Self {
        Self::for_task(StreamEventKind::TaskStart, task, run_id)
    }

    pub fn task_end(task: &Task, run_id: &RunId, status: TaskStatus, duration_ms: i64) -> Self {
        Self {
            status: Some(status),
            duration_ms: Some(duration_ms),
            ..Self::for_task(StreamEventKind::TaskEnd, task, run_id)
        }
    }

    pub fn output(kind: StreamEventKind, task: &Task, run_id: &RunId, line: &str) -> Self {
        Self {
            msg: Some(line.to_string()),
            ..Self::for_task(kind, task, run_id)
        }
    }

    pub fn meta(msg: impl Into<String>) -> Self {
        Self {
            id: 0,
            ts: Utc::now().timestamp_millis(),
            kind: StreamEventKind::Meta,
            run_id: None,
            tid: None,
            cid: None,
            task_name: None,
            status: None,
            duration_ms: None,
            msg: Some(msg.into()),
        }
    }
}

/// 事件广播中心
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<StreamEvent>,
    next_id: Arc<AtomicI64>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            next_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// 发布事件并分配单调递增的ID，没有订阅者时事件被丢弃
    pub fn publish(&self, mut event: StreamEvent) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        event.id = id;
        let _ = self.sender.send(event);
        id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1000)
    }
}
