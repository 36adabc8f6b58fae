use std::sync::Arc;

use clock_core::EventHub;
use clock_dispatcher::{ContainerService, CounterService, LogService, RelationService, TaskService};
use tokio_util::sync::CancellationToken;

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub containers: Arc<ContainerService>,
    pub tasks: Arc<TaskService>,
    pub relations: Arc<RelationService>,
    pub logs: Arc<LogService>,
    pub counters: Arc<CounterService>,
    pub events: EventHub,
    /// 为空时不做认证
    pub auth_token: Option<String>,
    /// 取消后长连接（事件流）立即结束
    pub shutdown: CancellationToken,
}
