use axum::extract::{Query, State};
use clock_core::models::{ListResult, LogFilter, LogQuery, Pagination, TaskLog};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

/// 日志查询参数，时间戳单位为秒
#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub count: Option<i64>,
    pub index: Option<i64>,
    pub tid: Option<i64>,
    pub cid: Option<i64>,
    pub left_ts: Option<i64>,
    pub right_ts: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsDeleted {
    pub deleted: u64,
}

/// 分页查询日志，最新的在前
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> ApiResult<ApiResponse<ListResult<TaskLog>>> {
    let defaults = Pagination::default();
    let query = LogQuery {
        page: Pagination::new(
            params.count.unwrap_or(defaults.count),
            params.index.unwrap_or(defaults.index),
        ),
        tid: params.tid,
        cid: params.cid,
        left_ts: params.left_ts,
        right_ts: params.right_ts,
    };
    Ok(success(state.logs.list(&query).await?))
}

/// 按条件删除日志，没有任何条件时不删除
pub async fn delete_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> ApiResult<ApiResponse<LogsDeleted>> {
    let deleted = state.logs.delete(&filter).await?;
    Ok(success(LogsDeleted { deleted }))
}
