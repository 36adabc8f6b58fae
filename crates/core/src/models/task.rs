use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务定义
///
/// 任务归属于唯一的容器（`cid`），`status` 只由任务执行器按
/// `PENDING -> START -> {SUCCESS, FAILURE}` 的状态机修改。
///
/// # 字段说明
///
/// - `tid`: 任务ID，0 表示尚未持久化
/// - `cid`: 所属容器ID
/// - `command`: 要执行的命令，按空白切分为程序和参数
/// - `directory`: 工作目录，为空时继承进程当前目录
/// - `disable`: 禁用的任务在 DAG 中作为直通节点，不会真正执行
/// - `timeout`: 超时时间（秒），0 表示不限制
/// - `log_enable`: 是否持久化执行日志
/// - `point_x` / `point_y`: 前端画布坐标，与调度无关
///
/// # 使用示例
///
/// ```rust
/// use clock_core::models::{Task, TaskStatus};
///
/// let task = Task::new(1, "备份数据库", "pg_dump -f /tmp/db.sql");
/// assert_eq!(task.status, TaskStatus::Pending);
/// assert!(task.timeout_duration().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default)]
    pub tid: i64,
    pub cid: i64,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub timeout: i64,
    #[serde(default = "Utc::now")]
    pub update_at: DateTime<Utc>,
    #[serde(default)]
    pub log_enable: bool,
    #[serde(default)]
    pub point_x: i64,
    #[serde(default)]
    pub point_y: i64,
}

impl Task {
    /// 创建新任务
    pub fn new(cid: i64, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            tid: 0, // 将由数据库生成
            cid,
            command: command.into(),
            name: name.into(),
            directory: String::new(),
            disable: false,
            status: TaskStatus::Pending,
            timeout: 0,
            update_at: Utc::now(),
            log_enable: true,
            point_x: 0,
            point_y: 0,
        }
    }

    /// 超时时长，0 或负数表示不限制
    pub fn timeout_duration(&self) -> Option<Duration> {
        if self.timeout > 0 {
            Some(Duration::from_secs(self.timeout as u64))
        } else {
            None
        }
    }

    pub fn is_new(&self) -> bool {
        self.tid <= 0
    }
}

/// 任务状态
///
/// 容器也复用该状态表示最近一次运行的结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Start => "START",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "START" => Ok(TaskStatus::Start),
            "SUCCESS" => Ok(TaskStatus::Success),
            "FAILURE" => Ok(TaskStatus::Failure),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse::<TaskStatus>().map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_round_trip_text() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Start,
            TaskStatus::Success,
            TaskStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("RUNNING".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_status_serde() {
        let json = serde_json::to_string(&TaskStatus::Start).unwrap();
        assert_eq!(json, "\"START\"");
        assert!(TaskStatus::Failure.is_terminal());
        assert!(!TaskStatus::Start.is_terminal());
    }

    #[test]
    fn test_task_deserialize_with_defaults() {
        let task: Task = serde_json::from_str(r#"{"cid": 3, "name": "a", "command": "echo a"}"#)
            .unwrap();
        assert!(task.is_new());
        assert_eq!(task.cid, 3);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.timeout_duration().is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let mut task = Task::new(1, "t", "sleep 1");
        task.timeout = 5;
        assert_eq!(task.timeout_duration(), Some(Duration::from_secs(5)));
        task.timeout = -1;
        assert!(task.timeout_duration().is_none());
    }
}
