//! 业务服务
//!
//! HTTP 层只调用这里的服务，级联删除、写入前校验等规则都在服务层完成。

mod container_service;
mod counter_service;
mod log_service;
mod relation_service;
mod task_service;

pub use container_service::ContainerService;
pub use counter_service::CounterService;
pub use log_service::LogService;
pub use relation_service::RelationService;
pub use task_service::TaskService;
