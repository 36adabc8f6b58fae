use axum::{
    extract::{Path, Query, State},
    Json,
};
use clock_core::models::{NodePosition, Relation, RelationGraph};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    pub cid: i64,
}

/// 新增依赖关系请求，`cid` 省略时取两端任务所在的容器
#[derive(Debug, Deserialize)]
pub struct CreateRelationRequest {
    #[serde(default)]
    pub cid: i64,
    pub tid: i64,
    pub next_tid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesUpdated {
    pub updated: usize,
}

/// 容器的依赖关系图
pub async fn get_relation_graph(
    State(state): State<AppState>,
    Query(params): Query<GraphParams>,
) -> ApiResult<ApiResponse<RelationGraph>> {
    Ok(success(state.relations.graph(params.cid).await?))
}

/// 新增依赖关系，会形成环时返回 400
pub async fn create_relation(
    State(state): State<AppState>,
    Json(request): Json<CreateRelationRequest>,
) -> ApiResult<ApiResponse<Relation>> {
    let relation = Relation::new(request.cid, request.tid, request.next_tid);
    Ok(success(state.relations.create(&relation).await?))
}

pub async fn delete_relation(
    State(state): State<AppState>,
    Path(rid): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.relations.delete(rid).await?;
    Ok(ApiResponse::success_empty())
}

/// 批量更新节点坐标
pub async fn update_nodes(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<NodePosition>>,
) -> ApiResult<ApiResponse<NodesUpdated>> {
    let updated = state.relations.update_nodes(&nodes).await?;
    Ok(success(NodesUpdated { updated }))
}
