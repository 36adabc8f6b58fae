use std::sync::Arc;

use clock_core::models::{ListResult, LogFilter, LogQuery, TaskLog};
use clock_core::traits::TaskLogRepository;
use clock_core::SchedulerResult;
use tracing::info;

/// 执行日志服务
pub struct LogService {
    logs: Arc<dyn TaskLogRepository>,
}

impl LogService {
    pub fn new(logs: Arc<dyn TaskLogRepository>) -> Self {
        Self { logs }
    }

    pub async fn list(&self, query: &LogQuery) -> SchedulerResult<ListResult<TaskLog>> {
        query.filter().validate()?;
        let (items, total) = self.logs.list(query).await?;
        Ok(ListResult::new(items, &query.page, total))
    }

    /// 按条件删除日志，没有条件且未指定 `all` 时不删除
    pub async fn delete(&self, filter: &LogFilter) -> SchedulerResult<u64> {
        filter.validate()?;
        let removed = self.logs.delete(filter).await?;
        if removed > 0 {
            info!("删除执行日志: 数量={}, 条件={:?}", removed, filter);
        }
        Ok(removed)
    }
}
