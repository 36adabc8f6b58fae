//! # Clock API
//!
//! 调度系统的 HTTP 接口，基于 Axum 构建。
//!
//! ## 端点
//!
//! - `GET /health`: 存活检查
//! - `/v1/container`: 容器增删改查与手动运行
//! - `/v1/task`: 任务增删改查、手动运行、取消、运行列表、状态计数
//! - `/v1/run/cancel`: 取消整个运行实例
//! - `/v1/relation`、`/v1/node`: 依赖关系图与节点坐标
//! - `/v1/log`: 执行日志查询与删除
//! - `/v1/stream`: 任务事件流（SSE）
//!
//! 所有响应使用统一的 `{success, data, message, timestamp}` 结构。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_app, create_routes};
pub use state::AppState;
