use std::sync::Arc;

use async_trait::async_trait;
use clock_core::models::{RunId, Task, TaskStatus};
use clock_core::traits::{
    ExecutionFailure, TaskExecution, TaskExecutor, TaskLogRepository, TaskRepository,
};
use clock_core::{EventHub, StreamEvent, StructuredLogger};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// 任务执行服务
///
/// 包装实际执行进程的执行器，负责任务状态机
/// `PENDING -> START -> {SUCCESS, FAILURE}` 和日志持久化。
/// 日志总是先于终态写入，外部看到终态时日志已经可查。
pub struct TaskExecutionService {
    runner: Arc<dyn TaskExecutor>,
    tasks: Arc<dyn TaskRepository>,
    logs: Arc<dyn TaskLogRepository>,
    events: EventHub,
}

impl TaskExecutionService {
    pub fn new(
        runner: Arc<dyn TaskExecutor>,
        tasks: Arc<dyn TaskRepository>,
        logs: Arc<dyn TaskLogRepository>,
        events: EventHub,
    ) -> Self {
        Self {
            runner,
            tasks,
            logs,
            events,
        }
    }

    async fn persist(&self, task: &Task, execution: &mut TaskExecution) {
        if task.log_enable {
            if let Err(e) = self.logs.create(&execution.log).await {
                error!("写入任务日志失败: tid={}, error={}", task.tid, e);
            }
        }

        if let Err(e) = self.tasks.update_status(task.tid, execution.status).await {
            error!("更新任务终态失败: tid={}, error={}", task.tid, e);
            if execution.failure.is_none() {
                execution.status = TaskStatus::Failure;
                execution.failure = Some(ExecutionFailure::Storage(e.to_string()));
            }
        }
    }
}

#[async_trait]
impl TaskExecutor for TaskExecutionService {
    async fn execute(
        &self,
        task: &Task,
        run_id: &RunId,
        cancel: CancellationToken,
    ) -> TaskExecution {
        if let Err(e) = self.tasks.update_status(task.tid, TaskStatus::Start).await {
            warn!("更新任务状态为START失败: tid={}, error={}", task.tid, e);
        }
        StructuredLogger::log_task_dispatched(run_id, task.tid, &task.name);
        self.events.publish(StreamEvent::task_start(task, run_id));

        let mut execution = self.runner.execute(task, run_id, cancel).await;
        self.persist(task, &mut execution).await;

        StructuredLogger::log_task_finished(run_id, task.tid, execution.status, execution.duration_ms);
        self.events.publish(StreamEvent::task_end(
            task,
            run_id,
            execution.status,
            execution.duration_ms,
        ));

        execution
    }

    fn name(&self) -> &str {
        self.runner.name()
    }
}
