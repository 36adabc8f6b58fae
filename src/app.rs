use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clock_api::{create_app, AppState};
use clock_core::config::AppConfig;
use clock_core::EventHub;
use clock_dispatcher::{
    ContainerScheduler, ContainerService, CounterService, LogService, RelationService,
    RunCoordinator, TaskService,
};
use clock_infrastructure::DatabaseManager;
use clock_worker::{ShellExecutor, TaskExecutionService};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 关闭时等待运行实例结束的时间
const RUN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// 主应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    scheduler: Arc<ContainerScheduler>,
    state: AppState,
}

impl Application {
    /// 按配置组装存储、执行器、调度器和服务
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let database = DatabaseManager::new(&config.database)
            .await
            .context("初始化数据库失败")?;
        let repos = database.repositories();

        let events = EventHub::new(config.scheduler.event_buffer);
        let runner = ShellExecutor::new(&config.executor).with_events(events.clone());
        let execution = TaskExecutionService::new(
            Arc::new(runner),
            repos.tasks.clone(),
            repos.logs.clone(),
            events.clone(),
        );

        let coordinator = RunCoordinator::new(
            repos.containers.clone(),
            repos.tasks.clone(),
            repos.relations.clone(),
            Arc::new(execution),
        );
        let scheduler = Arc::new(ContainerScheduler::new(
            repos.containers.clone(),
            coordinator.clone(),
        ));

        let state = AppState {
            containers: Arc::new(ContainerService::new(
                repos.containers.clone(),
                repos.tasks.clone(),
                repos.relations.clone(),
                Arc::clone(&scheduler),
                config.scheduler.delete_wait(),
            )),
            tasks: Arc::new(TaskService::new(
                repos.tasks.clone(),
                repos.containers.clone(),
                repos.relations.clone(),
                coordinator,
            )),
            relations: Arc::new(RelationService::new(
                repos.tasks.clone(),
                repos.relations.clone(),
            )),
            logs: Arc::new(LogService::new(repos.logs.clone())),
            counters: Arc::new(CounterService::new(
                repos.containers.clone(),
                repos.tasks.clone(),
            )),
            events,
            auth_token: config.api.auth_token.clone(),
            shutdown: CancellationToken::new(),
        };

        Ok(Self {
            config,
            database,
            scheduler,
            state,
        })
    }

    /// 启动调度器和HTTP服务，收到关闭信号后依次停止
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.scheduler.enabled {
            let scheduled = self.scheduler.start().await.context("启动调度器失败")?;
            info!("调度器已启动: 已注册定时器={}", scheduled);
        } else {
            warn!("调度器已禁用，容器只能手动运行");
        }

        if self.config.api.enabled {
            let app = create_app(self.state.clone(), &self.config.api);
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
            info!("API服务器启动在: {}", self.config.api.bind_address);

            // 先结束事件流等长连接，否则HTTP服务会一直等待它们断开
            let streams = self.state.shutdown.clone();
            let scheduler = Arc::clone(&self.scheduler);
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("API服务器收到关闭信号");
                    streams.cancel();
                    scheduler.shutdown().await;
                })
                .await;
            if let Err(e) = served {
                error!("API服务器运行失败: {e}");
            }
        } else {
            let _ = shutdown_rx.recv().await;
        }

        self.stop().await;
        Ok(())
    }

    async fn stop(&self) {
        self.state.shutdown.cancel();
        self.scheduler.shutdown().await;
        if !self
            .scheduler
            .coordinator()
            .shutdown(RUN_DRAIN_TIMEOUT)
            .await
        {
            warn!("仍有运行实例未结束，直接关闭");
        }
        self.database.close().await;
        info!("应用程序已停止");
    }
}
