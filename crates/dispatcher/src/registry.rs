use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clock_core::models::{RunId, RunningTaskInfo};
use clock_core::{SchedulerError, SchedulerResult};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 运行实例的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// 容器触发（定时或手动）
    Container,
    /// 手动执行单个任务
    Task,
}

struct InFlightTask {
    task_name: String,
    start_at: DateTime<Utc>,
    token: CancellationToken,
}

struct RunEntry {
    cid: i64,
    kind: RunKind,
    token: CancellationToken,
    tasks: HashMap<i64, InFlightTask>,
}

#[derive(Default)]
struct RegistryState {
    runs: HashMap<RunId, RunEntry>,
}

impl RegistryState {
    fn find_task(&self, tid: i64) -> Option<(&RunId, &InFlightTask)> {
        self.runs
            .iter()
            .find_map(|(run_id, run)| run.tasks.get(&tid).map(|t| (run_id, t)))
    }
}

/// 运行实例登记表
///
/// 运行实例在 `register_*` 时加入，在 [`RunRegistry::finish_run`] 时移除。
/// 所有检查和修改都在同一把写锁内完成，阻塞模式的判断与登记是原子的。
/// 每个运行实例持有一个取消令牌，正在执行的任务持有它的子令牌，
/// 取消运行实例会级联取消其中所有任务。
pub struct RunRegistry {
    state: RwLock<RegistryState>,
    changes: watch::Sender<u64>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(RegistryState::default()),
            changes,
        }
    }

    /// 登记一次容器运行，阻塞模式下容器已有运行实例时返回 `AlreadyRunning`
    pub async fn register_container_run(
        &self,
        cid: i64,
        blocking: bool,
    ) -> SchedulerResult<(RunId, CancellationToken)> {
        let mut state = self.state.write().await;
        if blocking
            && state
                .runs
                .values()
                .any(|run| run.cid == cid && run.kind == RunKind::Container)
        {
            return Err(SchedulerError::AlreadyRunning { cid });
        }
        Ok(Self::insert(&mut state, cid, RunKind::Container))
    }

    /// 登记一次单任务运行，任务正在执行时返回 `TaskAlreadyRunning`
    pub async fn register_task_run(
        &self,
        cid: i64,
        tid: i64,
    ) -> SchedulerResult<(RunId, CancellationToken)> {
        let mut state = self.state.write().await;
        if state.find_task(tid).is_some() {
            return Err(SchedulerError::TaskAlreadyRunning { tid });
        }
        Ok(Self::insert(&mut state, cid, RunKind::Task))
    }

    fn insert(state: &mut RegistryState, cid: i64, kind: RunKind) -> (RunId, CancellationToken) {
        let run_id = RunId::generate();
        let token = CancellationToken::new();
        state.runs.insert(
            run_id.clone(),
            RunEntry {
                cid,
                kind,
                token: token.clone(),
                tasks: HashMap::new(),
            },
        );
        debug!("登记运行实例: run_id={}, cid={}, kind={:?}", run_id, cid, kind);
        (run_id, token)
    }

    /// 记录任务开始执行，返回任务的取消令牌
    ///
    /// 运行实例已被取消或已移除时返回 None，调用方不应再派发该任务。
    pub async fn task_started(
        &self,
        run_id: &RunId,
        tid: i64,
        task_name: &str,
    ) -> Option<CancellationToken> {
        let mut state = self.state.write().await;
        let run = state.runs.get_mut(run_id)?;
        if run.token.is_cancelled() {
            return None;
        }
        let token = run.token.child_token();
        run.tasks.insert(
            tid,
            InFlightTask {
                task_name: task_name.to_string(),
                start_at: Utc::now(),
                token: token.clone(),
            },
        );
        Some(token)
    }

    pub async fn task_finished(&self, run_id: &RunId, tid: i64) {
        let mut state = self.state.write().await;
        if let Some(run) = state.runs.get_mut(run_id) {
            run.tasks.remove(&tid);
        }
    }

    /// 移除运行实例并通知等待容器空闲的调用方
    pub async fn finish_run(&self, run_id: &RunId) {
        let removed = self.state.write().await.runs.remove(run_id).is_some();
        if removed {
            debug!("运行实例结束: run_id={}", run_id);
            self.changes.send_modify(|version| *version += 1);
        }
    }

    /// 取消正在执行的任务，返回它所属的运行实例
    pub async fn cancel_task(&self, tid: i64) -> SchedulerResult<RunId> {
        let state = self.state.read().await;
        let (run_id, task) = state
            .find_task(tid)
            .ok_or(SchedulerError::NotRunning { tid })?;
        task.token.cancel();
        Ok(run_id.clone())
    }

    /// 取消运行实例，正在执行的任务随之取消
    pub async fn cancel_run(&self, run_id: &RunId) -> SchedulerResult<()> {
        let state = self.state.read().await;
        let run = state
            .runs
            .get(run_id)
            .ok_or_else(|| SchedulerError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        run.token.cancel();
        Ok(())
    }

    /// 取消所有运行实例，返回取消的数量
    pub async fn cancel_all(&self) -> usize {
        let state = self.state.read().await;
        for run in state.runs.values() {
            run.token.cancel();
        }
        state.runs.len()
    }

    /// 所有正在执行的任务，按开始时间排序
    pub async fn running_tasks(&self) -> Vec<RunningTaskInfo> {
        let state = self.state.read().await;
        let mut running: Vec<RunningTaskInfo> = state
            .runs
            .iter()
            .flat_map(|(run_id, run)| {
                run.tasks.iter().map(move |(tid, task)| RunningTaskInfo {
                    tid: *tid,
                    cid: run.cid,
                    run_id: run_id.clone(),
                    task_name: task.task_name.clone(),
                    start_at: task.start_at,
                })
            })
            .collect();
        running.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.tid.cmp(&b.tid)));
        running
    }

    /// 容器是否有任何运行实例（包括其任务的单独运行）
    pub async fn is_container_active(&self, cid: i64) -> bool {
        self.state.read().await.runs.values().any(|run| run.cid == cid)
    }

    pub async fn active_run_count(&self) -> usize {
        self.state.read().await.runs.len()
    }

    /// 等待容器没有运行实例，超时返回 false
    pub async fn wait_container_idle(&self, cid: i64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut changes = self.changes.subscribe();
        loop {
            if !self.is_container_active(cid).await {
                return true;
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                _ => return !self.is_container_active(cid).await,
            }
        }
    }

    /// 等待所有运行实例结束，超时返回 false
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut changes = self.changes.subscribe();
        loop {
            if self.active_run_count().await == 0 {
                return true;
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                _ => return self.active_run_count().await == 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocking_container_rejects_second_run() {
        let registry = RunRegistry::new();
        let (run_id, _) = registry.register_container_run(1, true).await.unwrap();

        assert!(matches!(
            registry.register_container_run(1, true).await,
            Err(SchedulerError::AlreadyRunning { cid: 1 })
        ));
        assert_eq!(registry.active_run_count().await, 1);

        registry.finish_run(&run_id).await;
        assert!(registry.register_container_run(1, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_all_then_wait_idle() {
        let registry = RunRegistry::new();
        let (first, first_token) = registry.register_container_run(1, true).await.unwrap();
        let (second, second_token) = registry.register_task_run(2, 20).await.unwrap();

        assert_eq!(registry.cancel_all().await, 2);
        assert!(first_token.is_cancelled());
        assert!(second_token.is_cancelled());
        assert!(!registry.wait_idle(Duration::from_millis(20)).await);

        registry.finish_run(&first).await;
        registry.finish_run(&second).await;
        assert!(registry.wait_idle(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_non_blocking_container_allows_overlap() {
        let registry = RunRegistry::new();
        registry.register_container_run(1, false).await.unwrap();
        registry.register_container_run(1, false).await.unwrap();
        assert_eq!(registry.active_run_count().await, 2);
    }

    #[tokio::test]
    async fn test_cancel_run_cascades_to_tasks() {
        let registry = RunRegistry::new();
        let (run_id, run_token) = registry.register_container_run(1, true).await.unwrap();
        let task_token = registry.task_started(&run_id, 10, "a").await.unwrap();

        registry.cancel_run(&run_id).await.unwrap();
        assert!(run_token.is_cancelled());
        assert!(task_token.is_cancelled());
        // 取消后的运行实例不再派发任务
        assert!(registry.task_started(&run_id, 11, "b").await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_task_targets_single_task() {
        let registry = RunRegistry::new();
        let (run_id, run_token) = registry.register_container_run(1, true).await.unwrap();
        let first = registry.task_started(&run_id, 10, "a").await.unwrap();
        let second = registry.task_started(&run_id, 11, "b").await.unwrap();

        assert_eq!(registry.cancel_task(10).await.unwrap(), run_id);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!run_token.is_cancelled());

        registry.task_finished(&run_id, 10).await;
        assert!(matches!(
            registry.cancel_task(10).await,
            Err(SchedulerError::NotRunning { tid: 10 })
        ));
    }

    #[tokio::test]
    async fn test_running_tasks_and_task_run_guard() {
        let registry = RunRegistry::new();
        let (run_id, _) = registry.register_task_run(2, 20).await.unwrap();
        registry.task_started(&run_id, 20, "solo").await.unwrap();

        let running = registry.running_tasks().await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].tid, 20);
        assert_eq!(running[0].cid, 2);
        assert_eq!(running[0].run_id, run_id);
        assert_eq!(running[0].task_name, "solo");

        assert!(matches!(
            registry.register_task_run(2, 20).await,
            Err(SchedulerError::TaskAlreadyRunning { tid: 20 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_run_cancel() {
        let registry = RunRegistry::new();
        assert!(matches!(
            registry.cancel_run(&RunId::from("missing")).await,
            Err(SchedulerError::RunNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_container_idle() {
        let registry = std::sync::Arc::new(RunRegistry::new());
        let (run_id, _) = registry.register_container_run(3, true).await.unwrap();

        assert!(!registry.wait_container_idle(3, Duration::from_millis(50)).await);

        let finisher = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            finisher.finish_run(&run_id).await;
        });
        assert!(registry.wait_container_idle(3, Duration::from_secs(2)).await);
        assert!(registry.wait_container_idle(99, Duration::from_millis(1)).await);
    }
}
