use std::sync::Arc;

use clock_core::models::{ContainerQuery, Pagination, TaskCounter, TaskQuery, TaskStatus};
use clock_core::traits::{ContainerRepository, TaskRepository};
use clock_core::SchedulerResult;

/// 状态计数服务
pub struct CounterService {
    containers: Arc<dyn ContainerRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl CounterService {
    pub fn new(containers: Arc<dyn ContainerRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { containers, tasks }
    }

    /// 容器数、任务数以及各状态的任务数
    pub async fn counters(&self) -> SchedulerResult<Vec<TaskCounter>> {
        let (_, containers) = self
            .containers
            .list(&ContainerQuery {
                page: Pagination::new(1, 1),
                name: None,
            })
            .await?;
        let (_, tasks) = self
            .tasks
            .list(&TaskQuery {
                page: Pagination::new(1, 1),
                ..Default::default()
            })
            .await?;

        let by_status = self.tasks.status_counts().await?;
        let count_of = |status: TaskStatus| {
            by_status
                .iter()
                .filter(|(s, _)| *s == status)
                .map(|(_, count)| *count)
                .sum::<i64>()
        };

        Ok(vec![
            TaskCounter::new("容器总数", containers),
            TaskCounter::new("任务总数", tasks),
            TaskCounter::new("当前等待", count_of(TaskStatus::Pending)),
            TaskCounter::new("正在运行", count_of(TaskStatus::Start)),
            TaskCounter::new("运行成功", count_of(TaskStatus::Success)),
            TaskCounter::new("运行失败", count_of(TaskStatus::Failure)),
        ])
    }
}
