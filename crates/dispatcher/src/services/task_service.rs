use std::sync::Arc;

use clock_core::models::{ListResult, RunId, RunningTaskInfo, Task, TaskQuery};
use clock_core::traits::{ContainerRepository, RelationRepository, TaskRepository};
use clock_core::{SchedulerError, SchedulerResult};
use tracing::{info, instrument};

use crate::coordinator::RunCoordinator;

/// 任务服务
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    containers: Arc<dyn ContainerRepository>,
    relations: Arc<dyn RelationRepository>,
    coordinator: RunCoordinator,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        containers: Arc<dyn ContainerRepository>,
        relations: Arc<dyn RelationRepository>,
        coordinator: RunCoordinator,
    ) -> Self {
        Self {
            tasks,
            containers,
            relations,
            coordinator,
        }
    }

    pub async fn list(&self, query: &TaskQuery) -> SchedulerResult<ListResult<Task>> {
        let (items, total) = self.tasks.list(query).await?;
        Ok(ListResult::new(items, &query.page, total))
    }

    pub async fn get(&self, tid: i64) -> SchedulerResult<Task> {
        self.tasks
            .get_by_id(tid)
            .await?
            .ok_or(SchedulerError::TaskNotFound { id: tid })
    }

    /// 新建或更新任务定义，任务状态不受影响
    ///
    /// 任务不能移动到其他容器，否则已有的依赖边会跨越容器。
    #[instrument(skip(self, task), fields(tid = task.tid, cid = task.cid))]
    pub async fn save(&self, task: &Task) -> SchedulerResult<Task> {
        if self.containers.get_by_id(task.cid).await?.is_none() {
            return Err(SchedulerError::ContainerNotFound { id: task.cid });
        }
        if task.timeout < 0 {
            return Err(SchedulerError::InvalidTaskParams(
                "超时时间不能为负数".to_string(),
            ));
        }

        let tid = if task.is_new() {
            self.tasks.create(task).await?.tid
        } else {
            let existing = self.get(task.tid).await?;
            if existing.cid != task.cid {
                return Err(SchedulerError::InvalidTaskParams(format!(
                    "任务 {} 属于容器 {}，不能移动到容器 {}",
                    task.tid, existing.cid, task.cid
                )));
            }
            self.tasks.update(task).await?;
            task.tid
        };

        info!("保存任务: tid={}, name={}", tid, task.name);
        self.get(tid).await
    }

    /// 删除任务及所有以它为端点的依赖边
    #[instrument(skip(self))]
    pub async fn delete(&self, tid: i64) -> SchedulerResult<()> {
        self.get(tid).await?;
        let removed = self.relations.delete_by_task(tid).await?;
        self.tasks.delete(tid).await?;
        info!("删除任务: tid={}, 删除依赖关系数={}", tid, removed);
        Ok(())
    }

    pub async fn run(&self, tid: i64) -> SchedulerResult<RunId> {
        let ticket = self.coordinator.start_task(tid).await?;
        Ok(ticket.run_id)
    }

    pub async fn cancel(&self, tid: i64) -> SchedulerResult<RunId> {
        self.coordinator.cancel_task(tid).await
    }

    pub async fn cancel_run(&self, run_id: &RunId) -> SchedulerResult<()> {
        self.coordinator.cancel_run(run_id).await
    }

    pub async fn running(&self) -> Vec<RunningTaskInfo> {
        self.coordinator.list_running().await
    }
}
