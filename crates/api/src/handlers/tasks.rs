use axum::{
    extract::{Path, Query, State},
    Json,
};
use clock_core::models::{ListResult, RunId, RunningTaskInfo, Task, TaskCounter, TaskQuery};
use serde::Deserialize;

use super::{ListParams, RunStarted};
use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

/// 任务运行参数
#[derive(Debug, Deserialize)]
pub struct RunTaskParams {
    pub tid: i64,
}

/// 取消任务请求
#[derive(Debug, Deserialize)]
pub struct CancelTaskRequest {
    pub tid: i64,
}

/// 取消运行实例请求
#[derive(Debug, Deserialize)]
pub struct CancelRunRequest {
    #[serde(rename = "runId")]
    pub run_id: String,
}

/// 获取任务列表
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<ApiResponse<ListResult<Task>>> {
    let query = TaskQuery {
        page: params.page(),
        cid: params.cid,
        name: params.name_filter(),
    };
    Ok(success(state.tasks.list(&query).await?))
}

/// 获取单个任务
pub async fn get_task(
    State(state): State<AppState>,
    Path(tid): Path<i64>,
) -> ApiResult<ApiResponse<Task>> {
    Ok(success(state.tasks.get(tid).await?))
}

/// 新建或更新任务
pub async fn save_task(
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> ApiResult<ApiResponse<Task>> {
    Ok(success(state.tasks.save(&task).await?))
}

/// 删除任务及相关依赖边
pub async fn delete_task(
    State(state): State<AppState>,
    Path(tid): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.tasks.delete(tid).await?;
    Ok(ApiResponse::success_empty())
}

/// 单独运行任务
pub async fn run_task(
    State(state): State<AppState>,
    Query(params): Query<RunTaskParams>,
) -> ApiResult<ApiResponse<RunStarted>> {
    let run_id = state.tasks.run(params.tid).await?;
    Ok(success(RunStarted { run_id }))
}

/// 取消正在执行的任务，任务未在运行时视为空操作
pub async fn cancel_task(
    State(state): State<AppState>,
    Json(request): Json<CancelTaskRequest>,
) -> ApiResult<ApiResponse<RunStarted>> {
    match state.tasks.cancel(request.tid).await {
        Ok(run_id) => Ok(success(RunStarted { run_id })),
        Err(e) if e.is_noop() => Ok(ApiResponse::noop(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// 取消运行实例，运行实例不存在时视为空操作
pub async fn cancel_run(
    State(state): State<AppState>,
    Json(request): Json<CancelRunRequest>,
) -> ApiResult<ApiResponse<()>> {
    match state.tasks.cancel_run(&RunId::from(request.run_id)).await {
        Ok(()) => Ok(ApiResponse::success_empty()),
        Err(e) if e.is_noop() => Ok(ApiResponse::noop(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// 正在执行的任务
pub async fn list_running(State(state): State<AppState>) -> ApiResponse<Vec<RunningTaskInfo>> {
    success(state.tasks.running().await)
}

/// 任务状态计数
pub async fn task_counters(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<TaskCounter>>> {
    Ok(success(state.counters.counters().await?))
}
