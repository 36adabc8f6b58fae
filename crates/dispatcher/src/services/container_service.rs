use std::sync::Arc;
use std::time::Duration;

use clock_core::models::{Container, ContainerQuery, ListResult, RunId};
use clock_core::traits::{ContainerRepository, RelationRepository, TaskRepository};
use clock_core::{SchedulerError, SchedulerResult};
use clock_domain::CronScheduler;
use tracing::{info, instrument, warn};

use crate::scheduler::ContainerScheduler;

/// 容器服务
pub struct ContainerService {
    containers: Arc<dyn ContainerRepository>,
    tasks: Arc<dyn TaskRepository>,
    relations: Arc<dyn RelationRepository>,
    scheduler: Arc<ContainerScheduler>,
    delete_wait: Duration,
}

impl ContainerService {
    pub fn new(
        containers: Arc<dyn ContainerRepository>,
        tasks: Arc<dyn TaskRepository>,
        relations: Arc<dyn RelationRepository>,
        scheduler: Arc<ContainerScheduler>,
        delete_wait: Duration,
    ) -> Self {
        Self {
            containers,
            tasks,
            relations,
            scheduler,
            delete_wait,
        }
    }

    pub async fn list(&self, query: &ContainerQuery) -> SchedulerResult<ListResult<Container>> {
        let (items, total) = self.containers.list(query).await?;
        Ok(ListResult::new(items, &query.page, total))
    }

    pub async fn get(&self, cid: i64) -> SchedulerResult<Container> {
        self.containers
            .get_by_id(cid)
            .await?
            .ok_or(SchedulerError::ContainerNotFound { id: cid })
    }

    /// 新建或更新容器（以 cid 是否为空区分），写入前校验 cron 表达式
    #[instrument(skip(self, container), fields(cid = container.cid))]
    pub async fn save(&self, container: &Container) -> SchedulerResult<Container> {
        CronScheduler::validate_cron_expression(&container.expression)?;
        if container.name.trim().is_empty() {
            return Err(SchedulerError::InvalidTaskParams(
                "容器名称不能为空".to_string(),
            ));
        }

        let cid = if container.is_new() {
            self.containers.create(container).await?.cid
        } else {
            self.get(container.cid).await?;
            self.containers.update(container).await?;
            container.cid
        };

        self.scheduler.reschedule(cid).await?;
        info!("保存容器: cid={}, name={}", cid, container.name);
        self.get(cid).await
    }

    /// 删除容器及其任务和依赖关系
    ///
    /// 先移除定时器，再等待正在进行的运行结束；等待超时则恢复定时器并返回
    /// `ContainerBusy`。
    #[instrument(skip(self))]
    pub async fn delete(&self, cid: i64) -> SchedulerResult<()> {
        self.get(cid).await?;
        self.scheduler.unschedule(cid).await;

        if !self
            .scheduler
            .coordinator()
            .wait_container_idle(cid, self.delete_wait)
            .await
        {
            warn!("容器仍有运行实例，放弃删除: cid={}", cid);
            self.scheduler.reschedule(cid).await?;
            return Err(SchedulerError::ContainerBusy { cid });
        }

        let relations = self.relations.delete_by_cid(cid).await?;
        let tasks = self.tasks.delete_by_cid(cid).await?;
        self.containers.delete(cid).await?;
        info!(
            "删除容器: cid={}, 删除任务数={}, 删除依赖关系数={}",
            cid, tasks, relations
        );
        Ok(())
    }

    /// 立即运行容器
    pub async fn run(&self, cid: i64) -> SchedulerResult<RunId> {
        let ticket = self.scheduler.coordinator().start_run(cid).await?;
        Ok(ticket.run_id)
    }
}
