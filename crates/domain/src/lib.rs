//! 调度领域算法
//!
//! 只包含纯函数：DAG 分层与环检测、cron 表达式求值、关系图视图构建。
//! 不依赖存储和异步运行时，方便独立测试。

pub mod cron_utils;
pub mod dag;
pub mod graph_view;

pub use cron_utils::CronScheduler;
pub use dag::{DagResolver, ExecutionPlan};
pub use graph_view::build_relation_graph;
