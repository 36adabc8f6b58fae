use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clock_core::models::{
    RunId, RunReport, RunningTaskInfo, Task, TaskRunState, TaskStatus,
};
use clock_core::traits::{
    ContainerRepository, RelationRepository, TaskExecutor, TaskRepository,
};
use clock_core::{SchedulerError, SchedulerResult, StructuredLogger};
use clock_domain::{DagResolver, ExecutionPlan};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::registry::RunRegistry;

/// 启动成功的运行实例
///
/// `handle` 在运行结束时给出汇总；调用方可以丢弃它，运行会继续在后台完成。
pub struct RunTicket {
    pub run_id: RunId,
    pub handle: JoinHandle<RunReport>,
}

/// 运行协调器
///
/// 负责一次运行的完整生命周期：分层派发任务、根据前置任务结果跳过后继、
/// 响应取消，并在结束时更新容器状态。同一层内的任务并发执行，层与层之间串行。
#[derive(Clone)]
pub struct RunCoordinator {
    containers: Arc<dyn ContainerRepository>,
    tasks: Arc<dyn TaskRepository>,
    relations: Arc<dyn RelationRepository>,
    executor: Arc<dyn TaskExecutor>,
    registry: Arc<RunRegistry>,
}

impl RunCoordinator {
    pub fn new(
        containers: Arc<dyn ContainerRepository>,
        tasks: Arc<dyn TaskRepository>,
        relations: Arc<dyn RelationRepository>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            containers,
            tasks,
            relations,
            executor,
            registry: Arc::new(RunRegistry::new()),
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// 启动容器运行
    ///
    /// 阻塞模式的容器已有运行实例时返回 `AlreadyRunning`，不创建新的运行实例。
    #[instrument(skip(self))]
    pub async fn start_run(&self, cid: i64) -> SchedulerResult<RunTicket> {
        let container = self
            .containers
            .get_by_id(cid)
            .await?
            .ok_or(SchedulerError::ContainerNotFound { id: cid })?;

        let tasks = self.tasks.get_by_cid(cid).await?;
        let relations = self.relations.get_by_cid(cid).await?;
        let plan = DagResolver::resolve(&tasks, &relations)?;

        let (run_id, token) = match self
            .registry
            .register_container_run(cid, container.blocking)
            .await
        {
            Ok(registered) => registered,
            Err(e) => {
                if matches!(e, SchedulerError::AlreadyRunning { .. }) {
                    StructuredLogger::log_run_skipped(cid, "上一次运行尚未结束");
                }
                return Err(e);
            }
        };

        StructuredLogger::log_run_started(cid, &run_id, plan.task_count(), plan.layers.len());

        let coordinator = self.clone();
        let ticket_id = run_id.clone();
        let handle = tokio::spawn(async move {
            coordinator.prepare_run(cid).await;

            let started_at = Utc::now();
            let by_id: HashMap<i64, Task> = tasks.into_iter().map(|t| (t.tid, t)).collect();
            let states = coordinator
                .execute_plan(&run_id, &plan, &by_id, &token)
                .await;

            let report = RunReport {
                run_id: run_id.clone(),
                cid,
                layers: plan.layers.clone(),
                states,
                cancelled: token.is_cancelled(),
                started_at,
                finished_at: Utc::now(),
            };

            let status = if report.is_success() {
                TaskStatus::Success
            } else {
                TaskStatus::Failure
            };
            if let Err(e) = coordinator.containers.update_status(cid, status).await {
                warn!("更新容器状态失败: cid={}, error={}", cid, e);
            }

            coordinator.registry.finish_run(&run_id).await;
            StructuredLogger::log_run_finished(&report);
            report
        });

        Ok(RunTicket {
            run_id: ticket_id,
            handle,
        })
    }

    /// 手动执行单个任务
    ///
    /// 只执行该任务本身，不重新执行上游，也不触发下游。
    #[instrument(skip(self))]
    pub async fn start_task(&self, tid: i64) -> SchedulerResult<RunTicket> {
        let task = self
            .tasks
            .get_by_id(tid)
            .await?
            .ok_or(SchedulerError::TaskNotFound { id: tid })?;

        let (run_id, token) = self.registry.register_task_run(task.cid, tid).await?;
        StructuredLogger::log_run_started(task.cid, &run_id, 1, 1);

        let coordinator = self.clone();
        let ticket_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let started_at = Utc::now();
            let state = if token.is_cancelled() {
                TaskRunState::Skipped
            } else {
                coordinator.dispatch(&run_id, &task).await
            };

            let report = RunReport {
                run_id: run_id.clone(),
                cid: task.cid,
                layers: vec![vec![tid]],
                states: BTreeMap::from([(tid, state)]),
                cancelled: token.is_cancelled(),
                started_at,
                finished_at: Utc::now(),
            };

            coordinator.registry.finish_run(&run_id).await;
            StructuredLogger::log_run_finished(&report);
            report
        });

        Ok(RunTicket {
            run_id: ticket_id,
            handle,
        })
    }

    /// 取消正在执行的任务，任务的后继不会再被派发
    pub async fn cancel_task(&self, tid: i64) -> SchedulerResult<RunId> {
        let run_id = self.registry.cancel_task(tid).await?;
        StructuredLogger::log_task_cancel_requested(tid, &run_id);
        Ok(run_id)
    }

    /// 取消整个运行实例
    ///
    /// 已结束的任务保持原状态，执行中的任务被终止，剩余的层不再派发。
    pub async fn cancel_run(&self, run_id: &RunId) -> SchedulerResult<()> {
        self.registry.cancel_run(run_id).await?;
        info!("运行实例已请求取消: run_id={}", run_id);
        Ok(())
    }

    pub async fn list_running(&self) -> Vec<RunningTaskInfo> {
        self.registry.running_tasks().await
    }

    /// 等待容器的所有运行实例结束
    pub async fn wait_container_idle(&self, cid: i64, timeout: Duration) -> bool {
        self.registry.wait_container_idle(cid, timeout).await
    }

    /// 取消所有运行实例并等待它们结束，超时返回 false
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let cancelled = self.registry.cancel_all().await;
        if cancelled > 0 {
            info!("停止运行实例: 数量={}", cancelled);
        }
        self.registry.wait_idle(timeout).await
    }

    // 运行开始：任务回到 PENDING，容器进入 START
    async fn prepare_run(&self, cid: i64) {
        if let Err(e) = self.tasks.reset_status_by_cid(cid).await {
            warn!("重置任务状态失败: cid={}, error={}", cid, e);
        }
        if let Err(e) = self.containers.update_status(cid, TaskStatus::Start).await {
            warn!("更新容器状态失败: cid={}, error={}", cid, e);
        }
    }

    async fn execute_plan(
        &self,
        run_id: &RunId,
        plan: &ExecutionPlan,
        tasks: &HashMap<i64, Task>,
        token: &CancellationToken,
    ) -> BTreeMap<i64, TaskRunState> {
        let mut states = BTreeMap::new();

        for (index, layer) in plan.layers.iter().enumerate() {
            if token.is_cancelled() {
                debug!("运行实例已取消，跳过第{}层: run_id={}", index, run_id);
                for &tid in layer {
                    states.insert(tid, TaskRunState::Skipped);
                }
                continue;
            }

            let mut runnable = Vec::new();
            for &tid in layer {
                let Some(task) = tasks.get(&tid) else {
                    continue;
                };
                let blocked = plan.predecessors_of(tid).iter().any(|pred| {
                    !states
                        .get(pred)
                        .is_some_and(TaskRunState::unblocks_successors)
                });

                if blocked {
                    debug!("前置任务未成功，跳过任务: run_id={}, tid={}", run_id, tid);
                    states.insert(tid, TaskRunState::Skipped);
                } else if task.disable {
                    debug!("任务已禁用，直接放行: run_id={}, tid={}", run_id, tid);
                    states.insert(tid, TaskRunState::PassThrough);
                } else {
                    runnable.push(task);
                }
            }

            let results = join_all(runnable.into_iter().map(|task| async move {
                (task.tid, self.dispatch(run_id, task).await)
            }))
            .await;
            states.extend(results);
        }

        states
    }

    async fn dispatch(&self, run_id: &RunId, task: &Task) -> TaskRunState {
        let Some(cancel) = self
            .registry
            .task_started(run_id, task.tid, &task.name)
            .await
        else {
            return TaskRunState::Skipped;
        };

        let execution = self.executor.execute(task, run_id, cancel).await;
        self.registry.task_finished(run_id, task.tid).await;

        if execution.is_success() {
            TaskRunState::Succeeded
        } else {
            TaskRunState::Failed
        }
    }
}
