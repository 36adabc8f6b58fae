use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clock_core::models::{Container, TaskStatus};
use clock_core::traits::ContainerRepository;
use clock_core::{SchedulerError, SchedulerResult, StructuredLogger};
use clock_domain::CronScheduler;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::coordinator::RunCoordinator;

/// 未调度容器的 entry_id
pub const UNSCHEDULED_ENTRY: i64 = -1;

struct TimerEntry {
    entry_id: i64,
    handle: JoinHandle<()>,
}

/// 容器定时调度器
///
/// 每个启用的容器对应一个后台定时器，定时器睡眠到下一次触发时间后调用
/// [`RunCoordinator::start_run`]。容器增删改后调用 [`ContainerScheduler::reschedule`]
/// 即可生效，无需重启。单个容器的触发失败只记录日志，不影响其他容器。
pub struct ContainerScheduler {
    containers: Arc<dyn ContainerRepository>,
    coordinator: RunCoordinator,
    timers: Mutex<HashMap<i64, TimerEntry>>,
    next_entry_id: AtomicI64,
    shutdown: CancellationToken,
}

impl ContainerScheduler {
    pub fn new(containers: Arc<dyn ContainerRepository>, coordinator: RunCoordinator) -> Self {
        Self {
            containers,
            coordinator,
            timers: Mutex::new(HashMap::new()),
            next_entry_id: AtomicI64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn coordinator(&self) -> &RunCoordinator {
        &self.coordinator
    }

    /// 启动时加载所有容器
    ///
    /// 容器状态重置为 PENDING，并重新生成 entry_id。
    /// 返回注册成功的定时器数量。
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<usize> {
        let containers = self.containers.find_all().await?;
        let mut scheduled = 0;

        for container in &containers {
            if let Err(e) = self
                .containers
                .update_status(container.cid, TaskStatus::Pending)
                .await
            {
                warn!("重置容器状态失败: cid={}, error={}", container.cid, e);
            }

            match self.schedule(container).await {
                Ok(entry_id) if entry_id != UNSCHEDULED_ENTRY => scheduled += 1,
                Ok(_) => {}
                Err(e) => error!("注册容器定时器失败: cid={}, error={}", container.cid, e),
            }
        }

        info!(
            "调度器启动完成: 容器总数={}, 已注册定时器={}",
            containers.len(),
            scheduled
        );
        Ok(scheduled)
    }

    /// 为容器注册定时器，替换已有的定时器
    ///
    /// 禁用的容器只移除定时器，返回 [`UNSCHEDULED_ENTRY`]。
    pub async fn schedule(&self, container: &Container) -> SchedulerResult<i64> {
        let mut timers = self.timers.lock().await;
        self.schedule_locked(&mut timers, container).await
    }

    /// 按存储中的最新定义重新调度，容器不存在时移除定时器
    ///
    /// 读取定义和替换定时器在同一把锁内完成，并发调用按顺序生效。
    pub async fn reschedule(&self, cid: i64) -> SchedulerResult<i64> {
        let mut timers = self.timers.lock().await;
        match self.containers.get_by_id(cid).await? {
            Some(container) => self.schedule_locked(&mut timers, &container).await,
            None => {
                Self::remove_timer(&mut timers, cid);
                Ok(UNSCHEDULED_ENTRY)
            }
        }
    }

    /// 移除容器的定时器，不影响已经开始的运行
    pub async fn unschedule(&self, cid: i64) -> bool {
        Self::remove_timer(&mut *self.timers.lock().await, cid)
    }

    async fn schedule_locked(
        &self,
        timers: &mut HashMap<i64, TimerEntry>,
        container: &Container,
    ) -> SchedulerResult<i64> {
        Self::remove_timer(timers, container.cid);

        if !container.is_schedulable() || self.shutdown.is_cancelled() {
            self.containers
                .update_entry_id(container.cid, UNSCHEDULED_ENTRY)
                .await?;
            debug!("容器未启用，不注册定时器: cid={}", container.cid);
            return Ok(UNSCHEDULED_ENTRY);
        }

        let cron = CronScheduler::new(&container.expression)?;
        let entry_id = self.next_entry_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(Self::timer_loop(
            container.cid,
            entry_id,
            cron,
            Arc::clone(&self.containers),
            self.coordinator.clone(),
            self.shutdown.child_token(),
        ));
        if let Some(stale) = timers.insert(container.cid, TimerEntry { entry_id, handle }) {
            stale.handle.abort();
        }
        self.containers
            .update_entry_id(container.cid, entry_id)
            .await?;

        info!(
            "注册容器定时器: cid={}, entry_id={}, expression={}",
            container.cid, entry_id, container.expression
        );
        Ok(entry_id)
    }

    fn remove_timer(timers: &mut HashMap<i64, TimerEntry>, cid: i64) -> bool {
        match timers.remove(&cid) {
            Some(entry) => {
                entry.handle.abort();
                debug!("移除容器定时器: cid={}, entry_id={}", cid, entry.entry_id);
                true
            }
            None => false,
        }
    }

    pub async fn entry_id_of(&self, cid: i64) -> Option<i64> {
        self.timers.lock().await.get(&cid).map(|e| e.entry_id)
    }

    pub async fn timer_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// 停止所有定时器
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut timers = self.timers.lock().await;
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
        info!("调度器已停止");
    }

    async fn timer_loop(
        cid: i64,
        entry_id: i64,
        cron: CronScheduler,
        containers: Arc<dyn ContainerRepository>,
        coordinator: RunCoordinator,
        shutdown: CancellationToken,
    ) {
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = Utc::now();
            // 墙上时钟可能略慢于单调时钟，避免同一时刻触发两次
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = cron.next_execution_time(from) else {
                warn!("容器表达式不会再触发，定时器退出: cid={}", cid);
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(next);
            // 触发前确认容器仍然存在且启用
            match containers.get_by_id(cid).await {
                Ok(Some(container)) if container.is_schedulable() => {}
                Ok(_) => {
                    debug!("容器已禁用或删除，定时器退出: cid={}, entry_id={}", cid, entry_id);
                    break;
                }
                Err(e) => {
                    warn!("读取容器失败，跳过本次触发: cid={}, error={}", cid, e);
                    continue;
                }
            }
            StructuredLogger::log_timer_fired(cid, entry_id);
            match coordinator.start_run(cid).await {
                Ok(ticket) => debug!("定时触发容器运行: cid={}, run_id={}", cid, ticket.run_id),
                Err(SchedulerError::AlreadyRunning { .. }) => {}
                Err(e) => error!("定时触发容器运行失败: cid={}, error={}", cid, e),
            }
        }
    }
}
