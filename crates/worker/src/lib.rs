//! 任务执行器
//!
//! - [`ShellExecutor`]: 启动进程、采集输出、处理超时和取消
//! - [`TaskExecutionService`]: 在执行前后维护任务状态机并写入执行日志

pub mod executors;
pub mod output;
pub mod service;

pub use executors::ShellExecutor;
pub use service::TaskExecutionService;
