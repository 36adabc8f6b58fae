use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// 任务容器
///
/// 按 `expression`（cron 表达式）触发，拥有一组任务和它们之间的依赖关系。
/// `blocking = true` 时，若上一次运行尚未结束，新的触发会被直接跳过。
/// `entry_id` 为调度器分配的定时器ID，禁用时为 -1。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    #[serde(default)]
    pub cid: i64,
    #[serde(default = "default_entry_id")]
    pub entry_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub disable: bool,
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    #[serde(default = "Utc::now")]
    pub update_at: DateTime<Utc>,
}

fn default_entry_id() -> i64 {
    -1
}

fn default_blocking() -> bool {
    true
}

impl Container {
    /// 创建新容器，默认启用阻塞模式
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            cid: 0, // 将由数据库生成
            entry_id: -1,
            name: name.into(),
            expression: expression.into(),
            status: TaskStatus::Pending,
            disable: false,
            blocking: true,
            update_at: Utc::now(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.cid <= 0
    }

    pub fn is_schedulable(&self) -> bool {
        !self.disable
    }
}
