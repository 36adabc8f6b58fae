use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

const DEFAULT_PAGE_COUNT: i64 = 10;
const MAX_PAGE_COUNT: i64 = 10_000;

/// 分页参数，`index` 从 1 开始
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default = "default_index")]
    pub index: i64,
}

fn default_count() -> i64 {
    DEFAULT_PAGE_COUNT
}

fn default_index() -> i64 {
    1
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_COUNT,
            index: 1,
        }
    }
}

impl Pagination {
    pub fn new(count: i64, index: i64) -> Self {
        Self { count, index }.normalized()
    }

    /// 修正非法的分页参数
    pub fn normalized(self) -> Self {
        let count = if self.count < 1 {
            DEFAULT_PAGE_COUNT
        } else {
            self.count.min(MAX_PAGE_COUNT)
        };
        let index = self.index.max(1);
        Self { count, index }
    }

    pub fn limit(&self) -> i64 {
        self.normalized().count
    }

    pub fn offset(&self) -> i64 {
        let page = self.normalized();
        (page.index - 1) * page.count
    }

    pub fn with_total(&self, total: i64) -> PageInfo {
        let page = self.normalized();
        PageInfo {
            count: page.count,
            index: page.index,
            total,
        }
    }
}

/// 分页结果中的页信息
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    pub count: i64,
    pub index: i64,
    pub total: i64,
}

/// 列表查询结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub page: PageInfo,
}

impl<T> ListResult<T> {
    pub fn new(items: Vec<T>, page: &Pagination, total: i64) -> Self {
        Self {
            items,
            page: page.with_total(total),
        }
    }
}

/// 容器查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerQuery {
    #[serde(flatten)]
    pub page: Pagination,
    pub name: Option<String>,
}

/// 任务查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(flatten)]
    pub page: Pagination,
    pub cid: Option<i64>,
    pub name: Option<String>,
}

/// 日志查询参数，时间范围为开区间 (left_ts, right_ts)，单位秒
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(flatten)]
    pub page: Pagination,
    pub tid: Option<i64>,
    pub cid: Option<i64>,
    pub left_ts: Option<i64>,
    pub right_ts: Option<i64>,
}

/// 日志删除条件
///
/// 没有任何条件且 `all` 不为 true 时不会删除任何记录。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub tid: Option<i64>,
    pub cid: Option<i64>,
    pub left_ts: Option<i64>,
    pub right_ts: Option<i64>,
    #[serde(default)]
    pub all: bool,
}

impl LogFilter {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    pub fn has_condition(&self) -> bool {
        self.tid.is_some() || self.cid.is_some() || self.left_ts.is_some() || self.right_ts.is_some()
    }

    pub fn left_time(&self) -> Option<DateTime<Utc>> {
        self.left_ts.and_then(timestamp_to_utc)
    }

    pub fn right_time(&self) -> Option<DateTime<Utc>> {
        self.right_ts.and_then(timestamp_to_utc)
    }

    /// 时间戳必须能转换为合法时间，否则拒绝整个查询
    pub fn validate(&self) -> SchedulerResult<()> {
        for (name, ts) in [("left_ts", self.left_ts), ("right_ts", self.right_ts)] {
            if let Some(ts) = ts {
                if timestamp_to_utc(ts).is_none() {
                    return Err(SchedulerError::InvalidQuery(format!(
                        "{name} 超出时间范围: {ts}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl LogQuery {
    pub fn filter(&self) -> LogFilter {
        LogFilter {
            tid: self.tid,
            cid: self.cid,
            left_ts: self.left_ts,
            right_ts: self.right_ts,
            all: false,
        }
    }
}

fn timestamp_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
