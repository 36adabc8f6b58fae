use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RunId, Task};

/// 超时标记，写入 `std_err`
pub const TIMEOUT_MARKER: &str = "[timeout]";
/// 取消标记，写入 `std_err`
pub const CANCEL_MARKER: &str = "[cancelled]";

/// 任务执行日志
///
/// 每次任务执行对应一条记录，写入后不再修改。
/// `run_id` 标识产生该日志的运行实例。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskLog {
    pub lid: String,
    pub tid: i64,
    pub cid: i64,
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
    pub std_out: String,
    pub std_err: String,
    pub update_at: DateTime<Utc>,
}

impl TaskLog {
    pub fn for_task(task: &Task, run_id: &RunId) -> Self {
        Self {
            lid: uuid::Uuid::new_v4().simple().to_string(),
            tid: task.tid,
            cid: task.cid,
            run_id: Some(run_id.to_string()),
            std_out: String::new(),
            std_err: String::new(),
            update_at: Utc::now(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.std_err.contains(TIMEOUT_MARKER)
    }

    pub fn is_cancelled(&self) -> bool {
        self.std_err.contains(CANCEL_MARKER)
    }
}
