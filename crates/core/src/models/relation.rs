use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Link;

/// 任务依赖关系（DAG 的一条边）
///
/// `tid -> next_tid`：`next_tid` 必须等待 `tid` 成功后才能被调度。
/// 两端任务必须属于同一个容器 `cid`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    #[serde(default)]
    pub rid: i64,
    pub cid: i64,
    pub tid: i64,
    pub next_tid: i64,
    #[serde(default = "Utc::now")]
    pub update_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(cid: i64, tid: i64, next_tid: i64) -> Self {
        Self {
            rid: 0,
            cid,
            tid,
            next_tid,
            update_at: Utc::now(),
        }
    }

    pub fn to_link(&self) -> Link {
        Link {
            id: self.rid,
            name: String::new(),
            cid: self.cid,
            tid: self.tid,
            next_tid: self.next_tid,
        }
    }
}
