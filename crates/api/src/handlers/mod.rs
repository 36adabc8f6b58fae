pub mod containers;
pub mod health;
pub mod logs;
pub mod relations;
pub mod stream;
pub mod tasks;

use serde::{Deserialize, Serialize};

use clock_core::models::{Pagination, RunId};

/// 列表接口的通用查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub count: Option<i64>,
    pub index: Option<i64>,
    pub name: Option<String>,
    pub cid: Option<i64>,
}

impl ListParams {
    pub fn page(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.count.unwrap_or(defaults.count),
            self.index.unwrap_or(defaults.index),
        )
    }

    pub fn name_filter(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}

/// 启动运行后返回的数据
#[derive(Debug, Serialize, Deserialize)]
pub struct RunStarted {
    #[serde(rename = "runId")]
    pub run_id: RunId,
}
