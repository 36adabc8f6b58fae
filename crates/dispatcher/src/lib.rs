//! Clock 调度核心
//!
//! - [`RunRegistry`]: 进程内运行实例登记表
//! - [`RunCoordinator`]: 按 DAG 分层执行容器或单个任务
//! - [`ContainerScheduler`]: 每个启用的容器一个 cron 定时器
//! - [`services`]: 容器、任务、依赖关系、日志的业务服务

pub mod coordinator;
pub mod registry;
pub mod scheduler;
pub mod services;

pub use coordinator::{RunCoordinator, RunTicket};
pub use registry::RunRegistry;
pub use scheduler::ContainerScheduler;
pub use services::{
    ContainerService, CounterService, LogService, RelationService, TaskService,
};
