//! 结构化日志辅助
//!
//! 调度关键节点统一输出带 `event` 字段的日志，便于 json 格式下检索。

use tracing::{info, warn};

use crate::models::{RunId, RunReport, TaskStatus};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_run_started(cid: i64, run_id: &RunId, task_count: usize, layer_count: usize) {
        info!(
            event = "run_started",
            cid = cid,
            run_id = %run_id,
            task_count = task_count,
            layer_count = layer_count,
            "容器开始运行"
        );
    }

    pub fn log_run_finished(report: &RunReport) {
        let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
        info!(
            event = "run_finished",
            cid = report.cid,
            run_id = %report.run_id,
            success = report.is_success(),
            cancelled = report.cancelled,
            duration_ms = duration_ms,
            "容器运行结束"
        );
    }

    pub fn log_run_skipped(cid: i64, reason: &str) {
        warn!(event = "run_skipped", cid = cid, reason = reason, "跳过本次触发");
    }

    pub fn log_task_dispatched(run_id: &RunId, tid: i64, task_name: &str) {
        info!(
            event = "task_dispatched",
            run_id = %run_id,
            tid = tid,
            task_name = task_name,
            "任务已派发"
        );
    }

    pub fn log_task_finished(run_id: &RunId, tid: i64, status: TaskStatus, duration_ms: i64) {
        info!(
            event = "task_finished",
            run_id = %run_id,
            tid = tid,
            status = %status,
            duration_ms = duration_ms,
            "任务执行结束"
        );
    }

    pub fn log_task_cancel_requested(tid: i64, run_id: &RunId) {
        info!(
            event = "task_cancel_requested",
            tid = tid,
            run_id = %run_id,
            "收到任务取消请求"
        );
    }

    pub fn log_timer_fired(cid: i64, entry_id: i64) {
        info!(
            event = "timer_fired",
            cid = cid,
            entry_id = entry_id,
            "定时器触发"
        );
    }
}
