//! Clock 调度系统核心库
//!
//! 提供错误类型、数据模型、仓储与执行器接口、配置以及事件流。

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

pub use errors::SchedulerError;
pub use events::{EventHub, StreamEvent, StreamEventKind};
pub use logging::StructuredLogger;
pub use models::{
    Container, ContainerQuery, ListResult, LogFilter, LogQuery, Node, NodePosition, PageInfo,
    Pagination, Relation, RelationGraph, Link, RunId, RunReport, RunningTaskInfo, Task,
    TaskCounter, TaskLog, TaskQuery, TaskRunState, TaskStatus,
};
pub use traits::{
    ContainerRepository, ExecutionFailure, RelationRepository, TaskExecution, TaskExecutor,
    TaskLogRepository, TaskRepository,
};

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
