use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use clock_core::config::ApiConfig;

use crate::handlers::{
    containers::{delete_container, get_container, list_containers, run_container, save_container},
    health::health_check,
    logs::{delete_logs, list_logs},
    relations::{create_relation, delete_relation, get_relation_graph, update_nodes},
    stream::stream_events,
    tasks::{
        cancel_run, cancel_task, delete_task, get_task, list_running, list_tasks, run_task,
        save_task, task_counters,
    },
};
use crate::middleware::{auth_middleware, cors_layer, request_logging, trace_layer};
use crate::state::AppState;

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    let v1 = Router::new()
        // 容器
        .route("/container", get(list_containers).put(save_container))
        .route("/container/run", get(run_container))
        .route("/container/{cid}", get(get_container).delete(delete_container))
        // 任务
        .route("/task", get(list_tasks).put(save_task))
        .route("/task/run", get(run_task))
        .route("/task/cancel", post(cancel_task))
        .route("/task/running", get(list_running))
        .route("/task/status", get(task_counters))
        .route("/task/{tid}", get(get_task).delete(delete_task))
        .route("/run/cancel", post(cancel_run))
        // 依赖关系
        .route("/relation", get(get_relation_graph).post(create_relation))
        .route("/relation/{rid}", axum::routing::delete(delete_relation))
        .route("/node", put(update_nodes))
        // 日志与事件
        .route("/log", get(list_logs).delete(delete_logs))
        .route("/stream", get(stream_events))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1)
        .with_state(state)
}

/// 带日志、追踪和跨域中间件的完整应用
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let app = create_routes(state)
        .layer(from_fn(request_logging))
        .layer(trace_layer());

    if config.cors_enabled {
        app.layer(cors_layer())
    } else {
        app
    }
}
