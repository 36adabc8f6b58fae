use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("容器未找到: {id}")]
    ContainerNotFound { id: i64 },

    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },

    #[error("任务关系未找到: {id}")]
    RelationNotFound { id: i64 },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("检测到循环依赖: {tids:?}")]
    CycleDetected { tids: Vec<i64> },

    #[error("无效的任务关系: {0}")]
    InvalidRelation(String),

    #[error("容器 {cid} 正在运行")]
    AlreadyRunning { cid: i64 },

    #[error("任务 {tid} 正在运行")]
    TaskAlreadyRunning { tid: i64 },

    #[error("任务 {tid} 未在运行")]
    NotRunning { tid: i64 },

    #[error("运行实例未找到: {run_id}")]
    RunNotFound { run_id: String },

    #[error("容器 {cid} 存在未结束的运行实例")]
    ContainerBusy { cid: i64 },

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),

    #[error("无效的查询条件: {0}")]
    InvalidQuery(String),
}

impl SchedulerError {
    /// 是否属于"资源不存在"类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchedulerError::ContainerNotFound { .. }
                | SchedulerError::TaskNotFound { .. }
                | SchedulerError::RelationNotFound { .. }
                | SchedulerError::RunNotFound { .. }
        )
    }

    /// 调用方可以视为空操作的错误（阻塞跳过、取消目标不存在）
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            SchedulerError::AlreadyRunning { .. }
                | SchedulerError::NotRunning { .. }
                | SchedulerError::RunNotFound { .. }
        )
    }
}
