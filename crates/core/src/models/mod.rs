//! 调度系统数据模型
//!
//! - `Container`: cron 触发入口，同时是任务 DAG 的根
//! - `Task`: 单个 shell 命令任务
//! - `Relation`: 同一容器内的依赖边 `tid -> next_tid`
//! - `TaskLog`: 单次任务执行的输出记录，写入后不可变
//! - `RunId` / `RunReport` / `RunningTaskInfo`: 内存中的运行实例视图

pub mod container;
pub mod graph;
pub mod page;
pub mod relation;
pub mod run;
pub mod task;
pub mod task_log;

pub use container::Container;
pub use graph::{Link, Node, NodePosition, RelationGraph, TaskCounter};
pub use page::{ContainerQuery, ListResult, LogFilter, LogQuery, PageInfo, Pagination, TaskQuery};
pub use relation::Relation;
pub use run::{RunId, RunReport, RunningTaskInfo, TaskRunState};
pub use task::{Task, TaskStatus};
pub use task_log::{TaskLog, CANCEL_MARKER, TIMEOUT_MARKER};
