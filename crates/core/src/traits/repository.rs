//! 数据访问层接口定义
//!
//! 图存储（Graph Store）的抽象：容器、任务、依赖关系和执行日志四类实体。
//! 所有实现都必须是 `Send + Sync`，以便在异步调度器和 HTTP 处理器之间共享。
//!
//! ## 级联删除
//!
//! 存储层只负责单表操作，级联语义（删除任务时删除相关边、删除容器时删除
//! 其任务）由服务层组合这些接口完成。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Container, ContainerQuery, LogFilter, LogQuery, Relation, Task, TaskLog, TaskQuery, TaskStatus,
};
use crate::SchedulerResult;

/// 容器仓储接口
#[async_trait]
pub trait ContainerRepository: Send + Sync {
    /// 创建容器，返回带有数据库生成ID的容器
    async fn create(&self, container: &Container) -> SchedulerResult<Container>;

    /// 根据ID获取容器
    async fn get_by_id(&self, cid: i64) -> SchedulerResult<Option<Container>>;

    /// 分页查询容器，返回 (当前页数据, 总数)
    async fn list(&self, query: &ContainerQuery) -> SchedulerResult<(Vec<Container>, i64)>;

    /// 获取所有容器（启动时注册定时器使用）
    async fn find_all(&self) -> SchedulerResult<Vec<Container>>;

    /// 更新容器定义
    async fn update(&self, container: &Container) -> SchedulerResult<()>;

    /// 更新容器运行状态
    async fn update_status(&self, cid: i64, status: TaskStatus) -> SchedulerResult<()>;

    /// 更新容器定时器ID，-1 表示未调度
    async fn update_entry_id(&self, cid: i64, entry_id: i64) -> SchedulerResult<()>;

    /// 删除容器
    async fn delete(&self, cid: i64) -> SchedulerResult<()>;
}

/// 任务仓储接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建任务
    async fn create(&self, task: &Task) -> SchedulerResult<Task>;

    /// 根据ID获取任务
    async fn get_by_id(&self, tid: i64) -> SchedulerResult<Option<Task>>;

    /// 分页查询任务
    async fn list(&self, query: &TaskQuery) -> SchedulerResult<(Vec<Task>, i64)>;

    /// 获取容器下的所有任务，按 tid 升序
    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Task>>;

    /// 更新任务定义（不修改状态）
    async fn update(&self, task: &Task) -> SchedulerResult<()>;

    /// 更新任务状态
    async fn update_status(&self, tid: i64, status: TaskStatus) -> SchedulerResult<()>;

    /// 将容器下所有任务重置为 PENDING
    async fn reset_status_by_cid(&self, cid: i64) -> SchedulerResult<()>;

    /// 更新任务在画布中的坐标
    async fn update_coordinates(&self, tid: i64, x: i64, y: i64) -> SchedulerResult<()>;

    /// 删除任务
    async fn delete(&self, tid: i64) -> SchedulerResult<()>;

    /// 删除容器下的所有任务，返回删除数量
    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64>;

    /// 按状态统计任务数量
    async fn status_counts(&self) -> SchedulerResult<Vec<(TaskStatus, i64)>>;
}

/// 依赖关系仓储接口
#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// 创建依赖关系
    async fn create(&self, relation: &Relation) -> SchedulerResult<Relation>;

    /// 根据ID获取依赖关系
    async fn get_by_id(&self, rid: i64) -> SchedulerResult<Option<Relation>>;

    /// 获取容器下的所有依赖关系
    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Relation>>;

    /// 查找指定的边
    async fn find(&self, tid: i64, next_tid: i64) -> SchedulerResult<Option<Relation>>;

    /// 删除依赖关系
    async fn delete(&self, rid: i64) -> SchedulerResult<()>;

    /// 删除所有以该任务为起点或终点的边
    async fn delete_by_task(&self, tid: i64) -> SchedulerResult<u64>;

    /// 删除容器下的所有边
    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64>;
}

/// 执行日志仓储接口
#[async_trait]
pub trait TaskLogRepository: Send + Sync {
    /// 写入一条执行日志
    async fn create(&self, log: &TaskLog) -> SchedulerResult<()>;

    /// 分页查询日志，按时间倒序
    async fn list(&self, query: &LogQuery) -> SchedulerResult<(Vec<TaskLog>, i64)>;

    /// 按条件删除日志，返回删除数量；时间戳无法转换时返回 `InvalidQuery`
    async fn delete(&self, filter: &LogFilter) -> SchedulerResult<u64>;
}

/// 判断日志时间是否落在 (left, right) 开区间内
pub fn log_in_range(
    at: DateTime<Utc>,
    left: Option<DateTime<Utc>>,
    right: Option<DateTime<Utc>>,
) -> bool {
    left.is_none_or(|l| at > l) && right.is_none_or(|r| at < r)
}
