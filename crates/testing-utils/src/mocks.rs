//! 仓储和执行器的内存实现
//!
//! 不需要数据库和真实进程即可测试服务层与调度逻辑。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use clock_core::models::{
    Container, ContainerQuery, LogFilter, LogQuery, Relation, RunId, Task, TaskLog, TaskQuery,
    TaskStatus, CANCEL_MARKER,
};
use clock_core::traits::repository::log_in_range;
use clock_core::traits::{
    ContainerRepository, ExecutionFailure, RelationRepository, TaskExecution, TaskExecutor,
    TaskLogRepository, TaskRepository,
};
use clock_core::{SchedulerError, SchedulerResult};
use tokio_util::sync::CancellationToken;

/// 存储写操作记录，用于断言写入顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskStatus(i64, TaskStatus),
    ContainerStatus(i64, TaskStatus),
    LogWritten(i64),
}

#[derive(Default)]
struct StoreState {
    containers: BTreeMap<i64, Container>,
    tasks: BTreeMap<i64, Task>,
    relations: BTreeMap<i64, Relation>,
    logs: Vec<TaskLog>,
    journal: Vec<StoreEvent>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    (page, total)
}

fn matches_log(log: &TaskLog, filter: &LogFilter) -> bool {
    filter.tid.is_none_or(|tid| log.tid == tid)
        && filter.cid.is_none_or(|cid| log.cid == cid)
        && log_in_range(log.update_at, filter.left_time(), filter.right_time())
}

/// 同时实现四个仓储接口的内存存储
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接插入容器，cid 为 0 时自动分配
    pub fn insert_container(&self, mut container: Container) -> Container {
        let mut state = self.state.lock().unwrap();
        if container.cid <= 0 {
            container.cid = state.next_id();
        } else {
            state.next_id = state.next_id.max(container.cid);
        }
        state.containers.insert(container.cid, container.clone());
        container
    }

    /// 直接插入任务，tid 为 0 时自动分配
    pub fn insert_task(&self, mut task: Task) -> Task {
        let mut state = self.state.lock().unwrap();
        if task.tid <= 0 {
            task.tid = state.next_id();
        } else {
            state.next_id = state.next_id.max(task.tid);
        }
        state.tasks.insert(task.tid, task.clone());
        task
    }

    /// 直接插入依赖边，不做环检测
    pub fn insert_relation(&self, cid: i64, tid: i64, next_tid: i64) -> Relation {
        let mut state = self.state.lock().unwrap();
        let mut relation = Relation::new(cid, tid, next_tid);
        relation.rid = state.next_id();
        state.relations.insert(relation.rid, relation.clone());
        relation
    }

    pub fn task(&self, tid: i64) -> Option<Task> {
        self.state.lock().unwrap().tasks.get(&tid).cloned()
    }

    pub fn container(&self, cid: i64) -> Option<Container> {
        self.state.lock().unwrap().containers.get(&cid).cloned()
    }

    pub fn all_relations(&self) -> Vec<Relation> {
        self.state.lock().unwrap().relations.values().cloned().collect()
    }

    pub fn all_logs(&self) -> Vec<TaskLog> {
        self.state.lock().unwrap().logs.clone()
    }

    pub fn logs_for(&self, tid: i64) -> Vec<TaskLog> {
        self.all_logs().into_iter().filter(|l| l.tid == tid).collect()
    }

    pub fn journal(&self) -> Vec<StoreEvent> {
        self.state.lock().unwrap().journal.clone()
    }
}

#[async_trait]
impl ContainerRepository for InMemoryStore {
    async fn create(&self, container: &Container) -> SchedulerResult<Container> {
        let mut container = container.clone();
        container.cid = 0;
        container.update_at = Utc::now();
        Ok(self.insert_container(container))
    }

    async fn get_by_id(&self, cid: i64) -> SchedulerResult<Option<Container>> {
        Ok(self.container(cid))
    }

    async fn list(&self, query: &ContainerQuery) -> SchedulerResult<(Vec<Container>, i64)> {
        let state = self.state.lock().unwrap();
        let items: Vec<Container> = state
            .containers
            .values()
            .filter(|c| query.name.as_deref().is_none_or(|n| c.name.contains(n)))
            .cloned()
            .collect();
        Ok(paginate(items, query.page.offset(), query.page.limit()))
    }

    async fn find_all(&self) -> SchedulerResult<Vec<Container>> {
        Ok(self.state.lock().unwrap().containers.values().cloned().collect())
    }

    async fn update(&self, container: &Container) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .containers
            .get_mut(&container.cid)
            .ok_or(SchedulerError::ContainerNotFound { id: container.cid })?;
        existing.name = container.name.clone();
        existing.expression = container.expression.clone();
        existing.disable = container.disable;
        existing.blocking = container.blocking;
        existing.update_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, cid: i64, status: TaskStatus) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .containers
            .get_mut(&cid)
            .ok_or(SchedulerError::ContainerNotFound { id: cid })?;
        existing.status = status;
        state.journal.push(StoreEvent::ContainerStatus(cid, status));
        Ok(())
    }

    async fn update_entry_id(&self, cid: i64, entry_id: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .containers
            .get_mut(&cid)
            .ok_or(SchedulerError::ContainerNotFound { id: cid })?;
        existing.entry_id = entry_id;
        Ok(())
    }

    async fn delete(&self, cid: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .containers
            .remove(&cid)
            .map(|_| ())
            .ok_or(SchedulerError::ContainerNotFound { id: cid })
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let mut task = task.clone();
        task.tid = 0;
        task.status = TaskStatus::Pending;
        task.update_at = Utc::now();
        Ok(self.insert_task(task))
    }

    async fn get_by_id(&self, tid: i64) -> SchedulerResult<Option<Task>> {
        Ok(self.task(tid))
    }

    async fn list(&self, query: &TaskQuery) -> SchedulerResult<(Vec<Task>, i64)> {
        let state = self.state.lock().unwrap();
        let items: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| query.cid.is_none_or(|cid| t.cid == cid))
            .filter(|t| query.name.as_deref().is_none_or(|n| t.name.contains(n)))
            .cloned()
            .collect();
        Ok(paginate(items, query.page.offset(), query.page.limit()))
    }

    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .values()
            .filter(|t| t.cid == cid)
            .cloned()
            .collect())
    }

    async fn update(&self, task: &Task) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .tasks
            .get_mut(&task.tid)
            .ok_or(SchedulerError::TaskNotFound { id: task.tid })?;
        let status = existing.status;
        *existing = task.clone();
        existing.status = status;
        existing.update_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, tid: i64, status: TaskStatus) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .tasks
            .get_mut(&tid)
            .ok_or(SchedulerError::TaskNotFound { id: tid })?;
        existing.status = status;
        existing.update_at = Utc::now();
        state.journal.push(StoreEvent::TaskStatus(tid, status));
        Ok(())
    }

    async fn reset_status_by_cid(&self, cid: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        for task in state.tasks.values_mut().filter(|t| t.cid == cid) {
            task.status = TaskStatus::Pending;
        }
        Ok(())
    }

    async fn update_coordinates(&self, tid: i64, x: i64, y: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .tasks
            .get_mut(&tid)
            .ok_or(SchedulerError::TaskNotFound { id: tid })?;
        existing.point_x = x;
        existing.point_y = y;
        Ok(())
    }

    async fn delete(&self, tid: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .tasks
            .remove(&tid)
            .map(|_| ())
            .ok_or(SchedulerError::TaskNotFound { id: tid })
    }

    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.tasks.len();
        state.tasks.retain(|_, t| t.cid != cid);
        Ok((before - state.tasks.len()) as u64)
    }

    async fn status_counts(&self) -> SchedulerResult<Vec<(TaskStatus, i64)>> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<TaskStatus, i64> = HashMap::new();
        for task in state.tasks.values() {
            *counts.entry(task.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl RelationRepository for InMemoryStore {
    async fn create(&self, relation: &Relation) -> SchedulerResult<Relation> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state
            .relations
            .values()
            .any(|r| r.tid == relation.tid && r.next_tid == relation.next_tid);
        if duplicate {
            return Err(SchedulerError::InvalidRelation(format!(
                "依赖关系已存在: {} -> {}",
                relation.tid, relation.next_tid
            )));
        }

        let mut relation = relation.clone();
        relation.rid = state.next_id();
        relation.update_at = Utc::now();
        state.relations.insert(relation.rid, relation.clone());
        Ok(relation)
    }

    async fn get_by_id(&self, rid: i64) -> SchedulerResult<Option<Relation>> {
        Ok(self.state.lock().unwrap().relations.get(&rid).cloned())
    }

    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Relation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .values()
            .filter(|r| r.cid == cid)
            .cloned()
            .collect())
    }

    async fn find(&self, tid: i64, next_tid: i64) -> SchedulerResult<Option<Relation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .values()
            .find(|r| r.tid == tid && r.next_tid == next_tid)
            .cloned())
    }

    async fn delete(&self, rid: i64) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .relations
            .remove(&rid)
            .map(|_| ())
            .ok_or(SchedulerError::RelationNotFound { id: rid })
    }

    async fn delete_by_task(&self, tid: i64) -> SchedulerResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.relations.len();
        state
            .relations
            .retain(|_, r| r.tid != tid && r.next_tid != tid);
        Ok((before - state.relations.len()) as u64)
    }

    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.relations.len();
        state.relations.retain(|_, r| r.cid != cid);
        Ok((before - state.relations.len()) as u64)
    }
}

#[async_trait]
impl TaskLogRepository for InMemoryStore {
    async fn create(&self, log: &TaskLog) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.logs.push(log.clone());
        state.journal.push(StoreEvent::LogWritten(log.tid));
        Ok(())
    }

    async fn list(&self, query: &LogQuery) -> SchedulerResult<(Vec<TaskLog>, i64)> {
        let filter = query.filter();
        filter.validate()?;
        let state = self.state.lock().unwrap();
        let mut items: Vec<TaskLog> = state
            .logs
            .iter()
            .filter(|log| matches_log(log, &filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.update_at.cmp(&a.update_at));
        Ok(paginate(items, query.page.offset(), query.page.limit()))
    }

    async fn delete(&self, filter: &LogFilter) -> SchedulerResult<u64> {
        filter.validate()?;
        if !filter.all && !filter.has_condition() {
            return Ok(0);
        }
        let mut state = self.state.lock().unwrap();
        let before = state.logs.len();
        if filter.all {
            state.logs.clear();
        } else {
            state.logs.retain(|log| !matches_log(log, filter));
        }
        Ok((before - state.logs.len()) as u64)
    }
}

/// 编排好的执行结果
#[derive(Debug, Clone, Copy)]
pub struct FakeOutcome {
    pub success: bool,
    pub delay: Duration,
}

impl FakeOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            delay: Duration::from_millis(10),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            delay: Duration::from_millis(10),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// 一次假执行的记录
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub tid: i64,
    pub run_id: RunId,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub status: TaskStatus,
}

/// 可编排的假执行器
///
/// 未编排的任务使用默认结果（成功，耗时 10ms）。取消时立即返回
/// 带取消标记的失败结果。
pub struct FakeExecutor {
    outcomes: Mutex<HashMap<i64, FakeOutcome>>,
    default_outcome: FakeOutcome,
    records: Mutex<Vec<ExecutionRecord>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            default_outcome: FakeOutcome::success(),
            records: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_default(mut self, outcome: FakeOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    pub fn set_outcome(&self, tid: i64, outcome: FakeOutcome) {
        self.outcomes.lock().unwrap().insert(tid, outcome);
    }

    pub fn fail(&self, tid: i64) {
        self.set_outcome(tid, FakeOutcome::failure());
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn executed_tids(&self) -> Vec<i64> {
        self.records().iter().map(|r| r.tid).collect()
    }

    pub fn record_of(&self, tid: i64) -> Option<ExecutionRecord> {
        self.records().into_iter().find(|r| r.tid == tid)
    }

    /// 同一时刻最多有多少个任务在执行
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn execute(
        &self,
        task: &Task,
        run_id: &RunId,
        cancel: CancellationToken,
    ) -> TaskExecution {
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&task.tid)
            .copied()
            .unwrap_or(self.default_outcome);

        let started_at = Instant::now();
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let cancelled = tokio::select! {
            _ = tokio::time::sleep(outcome.delay) => false,
            _ = cancel.cancelled() => true,
        };
        self.active.fetch_sub(1, Ordering::SeqCst);

        let mut log = TaskLog::for_task(task, run_id);
        log.std_out = format!("fake output {}", task.tid);
        let duration_ms = started_at.elapsed().as_millis() as i64;

        let execution = if cancelled {
            log.std_err = format!("{CANCEL_MARKER} {}", ExecutionFailure::Cancelled);
            TaskExecution::failed(log, ExecutionFailure::Cancelled, duration_ms)
        } else if outcome.success {
            TaskExecution::succeeded(log, duration_ms)
        } else {
            log.std_err = "fake failure".to_string();
            TaskExecution::failed(
                log,
                ExecutionFailure::ProcessFailure { exit_code: Some(1) },
                duration_ms,
            )
        };

        self.records.lock().unwrap().push(ExecutionRecord {
            tid: task.tid,
            run_id: run_id.clone(),
            started_at,
            finished_at: Instant::now(),
            status: execution.status,
        });

        execution
    }

    fn name(&self) -> &str {
        "fake"
    }
}
