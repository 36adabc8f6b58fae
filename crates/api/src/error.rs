use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clock_core::SchedulerError;
use tracing::error;

use crate::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    #[error("缺少或无效的认证令牌")]
    Unauthorized,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Scheduler(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Scheduler(
                SchedulerError::InvalidCron { .. }
                | SchedulerError::CycleDetected { .. }
                | SchedulerError::InvalidRelation(_)
                | SchedulerError::InvalidTaskParams(_)
                | SchedulerError::InvalidQuery(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(
                SchedulerError::ContainerBusy { .. }
                | SchedulerError::AlreadyRunning { .. }
                | SchedulerError::TaskAlreadyRunning { .. }
                | SchedulerError::NotRunning { .. },
            ) => StatusCode::CONFLICT,
            ApiError::Scheduler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }
        (status, ApiResponse::failure(self.to_string())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
