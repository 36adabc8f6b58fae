//! 任务执行器接口定义
//!
//! 执行器负责运行单个任务并返回结果，它永远不会返回错误：
//! 所有失败（启动失败、非零退出、超时、取消）都被折叠进 [`TaskExecution`]，
//! 由调用方决定后继任务是否调度。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::models::{RunId, Task, TaskLog, TaskStatus};

/// 任务执行失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// 命令为空
    EmptyCommand,
    /// 进程启动失败
    Spawn(String),
    /// 进程以非零状态退出
    ProcessFailure { exit_code: Option<i32> },
    /// 执行超时
    Timeout,
    /// 被用户取消
    Cancelled,
    /// 状态或日志持久化失败
    Storage(String),
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionFailure::EmptyCommand => write!(f, "command cannot be empty"),
            ExecutionFailure::Spawn(msg) => write!(f, "failed to start process: {msg}"),
            ExecutionFailure::ProcessFailure { exit_code: Some(code) } => {
                write!(f, "process exited with status {code}")
            }
            ExecutionFailure::ProcessFailure { exit_code: None } => {
                write!(f, "process terminated by signal")
            }
            ExecutionFailure::Timeout => write!(f, "task timeout"),
            ExecutionFailure::Cancelled => write!(f, "task cancelled by user"),
            ExecutionFailure::Storage(msg) => write!(f, "storage failure: {msg}"),
        }
    }
}

/// 单次任务执行结果
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub status: TaskStatus,
    pub failure: Option<ExecutionFailure>,
    pub log: TaskLog,
    pub duration_ms: i64,
}

impl TaskExecution {
    pub fn succeeded(log: TaskLog, duration_ms: i64) -> Self {
        Self {
            status: TaskStatus::Success,
            failure: None,
            log,
            duration_ms,
        }
    }

    pub fn failed(log: TaskLog, failure: ExecutionFailure, duration_ms: i64) -> Self {
        Self {
            status: TaskStatus::Failure,
            failure: Some(failure),
            log,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, Some(ExecutionFailure::Cancelled))
    }
}

/// 任务执行器接口
///
/// `cancel` 被触发时，实现必须尽快终止正在运行的进程并返回
/// [`ExecutionFailure::Cancelled`]。
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// 执行任务，直到完成、超时或被取消
    async fn execute(&self, task: &Task, run_id: &RunId, cancel: CancellationToken)
        -> TaskExecution;

    /// 执行器名称
    fn name(&self) -> &str;
}
