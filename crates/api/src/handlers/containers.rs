use axum::{
    extract::{Path, Query, State},
    Json,
};
use clock_core::models::{Container, ContainerQuery, ListResult};
use serde::Deserialize;

use super::{ListParams, RunStarted};
use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

/// 容器运行参数
#[derive(Debug, Deserialize)]
pub struct RunContainerParams {
    pub cid: i64,
}

/// 获取容器列表
pub async fn list_containers(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<ApiResponse<ListResult<Container>>> {
    let query = ContainerQuery {
        page: params.page(),
        name: params.name_filter(),
    };
    Ok(success(state.containers.list(&query).await?))
}

/// 获取单个容器
pub async fn get_container(
    State(state): State<AppState>,
    Path(cid): Path<i64>,
) -> ApiResult<ApiResponse<Container>> {
    Ok(success(state.containers.get(cid).await?))
}

/// 新建或更新容器
pub async fn save_container(
    State(state): State<AppState>,
    Json(container): Json<Container>,
) -> ApiResult<ApiResponse<Container>> {
    Ok(success(state.containers.save(&container).await?))
}

/// 删除容器及其任务和依赖关系
pub async fn delete_container(
    State(state): State<AppState>,
    Path(cid): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.containers.delete(cid).await?;
    Ok(ApiResponse::success_empty())
}

/// 立即运行容器，阻塞模式下已在运行时视为空操作
pub async fn run_container(
    State(state): State<AppState>,
    Query(params): Query<RunContainerParams>,
) -> ApiResult<ApiResponse<RunStarted>> {
    match state.containers.run(params.cid).await {
        Ok(run_id) => Ok(success(RunStarted { run_id })),
        Err(e) if e.is_noop() => Ok(ApiResponse::noop(e.to_string())),
        Err(e) => Err(e.into()),
    }
}
