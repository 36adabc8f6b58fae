use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 运行实例ID
///
/// 每次容器触发或手动执行任务都会生成新的ID，对外是不透明字符串。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(id[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 正在执行的任务（返回给前端）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunningTaskInfo {
    pub tid: i64,
    pub cid: i64,
    #[serde(rename = "runId")]
    pub run_id: RunId,
    #[serde(rename = "taskName")]
    pub task_name: String,
    #[serde(rename = "startAt")]
    pub start_at: DateTime<Utc>,
}

/// 单个任务在一次运行中的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunState {
    /// 执行成功
    Succeeded,
    /// 执行失败（含超时、取消）
    Failed,
    /// 禁用任务，直接放行
    PassThrough,
    /// 前置任务失败或运行被取消，未被调度
    Skipped,
}

impl TaskRunState {
    /// 后继任务是否可以继续调度
    pub fn unblocks_successors(&self) -> bool {
        matches!(self, TaskRunState::Succeeded | TaskRunState::PassThrough)
    }
}

/// 运行实例结束后的汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(rename = "runId")]
    pub run_id: RunId,
    pub cid: i64,
    pub layers: Vec<Vec<i64>>,
    pub states: BTreeMap<i64, TaskRunState>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn state_of(&self, tid: i64) -> Option<TaskRunState> {
        self.states.get(&tid).copied()
    }

    /// 所有可达任务均成功或直通
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.states.values().all(|s| s.unblocks_successors())
    }

    pub fn count(&self, state: TaskRunState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}
