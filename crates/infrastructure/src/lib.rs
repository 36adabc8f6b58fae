//! 存储层实现
//!
//! 基于 SQLite 的图存储（容器、任务、依赖关系）和日志存储。

pub mod database;

pub use database::sqlite::{
    SqliteContainerRepository, SqliteRelationRepository, SqliteTaskLogRepository,
    SqliteTaskRepository,
};
pub use database::{DatabaseManager, Repositories};
