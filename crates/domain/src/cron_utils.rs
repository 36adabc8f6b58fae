use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::debug;

use clock_core::{SchedulerError, SchedulerResult};

/// CRON表达式解析和调度工具
///
/// 同时接受标准 5 段表达式（分 时 日 月 周）和带秒的 6/7 段表达式。
/// 5 段表达式会补上 `0` 秒，并把周字段从 `0-7`（0 和 7 都是周日）
/// 转换为 `1-7`（1 为周日）。所有时间均按 UTC 计算。
pub struct CronScheduler {
    expression: String,
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let normalized = Self::normalize(cron_expr)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        if schedule.upcoming(Utc).next().is_none() {
            return Err(SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: "表达式不会再触发".to_string(),
            });
        }

        Ok(Self {
            expression: cron_expr.trim().to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 获取严格晚于 `from` 的下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }

    /// `expression × now -> 下一次触发时间`
    pub fn next_fire_time(cron_expr: &str, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        let scheduler = Self::new(cron_expr)?;
        scheduler
            .next_execution_time(now)
            .ok_or_else(|| SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: "表达式不会再触发".to_string(),
            })
    }

    /// 把标准 5 段表达式转换为 `cron` 库接受的格式
    pub fn normalize(cron_expr: &str) -> SchedulerResult<String> {
        let fields: Vec<&str> = cron_expr.split_whitespace().collect();
        match fields.len() {
            5 => {
                let day_of_week = Self::convert_day_of_week(fields[4]).ok_or_else(|| {
                    SchedulerError::InvalidCron {
                        expr: cron_expr.to_string(),
                        message: format!("无效的星期字段: {}", fields[4]),
                    }
                })?;
                let normalized = format!(
                    "0 {} {} {} {} {}",
                    fields[0], fields[1], fields[2], fields[3], day_of_week
                );
                debug!("CRON表达式转换: '{}' -> '{}'", cron_expr, normalized);
                Ok(normalized)
            }
            6 | 7 => Ok(fields.join(" ")),
            n => Err(SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: format!("字段数量应为5到7个，实际为{n}个"),
            }),
        }
    }

    fn convert_day_of_week(field: &str) -> Option<String> {
        let items: Option<Vec<String>> = field.split(',').map(Self::convert_dow_item).collect();
        items.map(|items| items.join(","))
    }

    fn convert_dow_item(item: &str) -> Option<String> {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let with_step = |s: String| match step {
            Some(step) => format!("{s}/{step}"),
            None => s,
        };

        if range == "*" || range == "?" {
            return Some(with_step(range.to_string()));
        }

        // 名称形式（MON、Sun 等）两个库一致，无需转换
        if range.chars().any(|c| c.is_ascii_alphabetic()) {
            return Some(with_step(range.to_string()));
        }

        match range.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.parse().ok()?;
                let end: u32 = end.parse().ok()?;
                if start > 7 || end > 7 || start > end {
                    return None;
                }
                // 带步长且包含 7 的范围无法平移，直接展开成列表
                if end == 7 {
                    if let Some(step) = step {
                        let step: usize = step.parse().ok().filter(|s| *s > 0)?;
                        let mut days: Vec<u32> =
                            (start..=end).step_by(step).map(|d| d % 7 + 1).collect();
                        days.sort_unstable();
                        days.dedup();
                        let days: Vec<String> = days.iter().map(u32::to_string).collect();
                        return Some(days.join(","));
                    }
                }
                // 7 表示周日，`a-7` 需要拆成 `a+1..7` 加上周日
                if end == 7 && start > 0 && step.is_none() {
                    let head = if start == 7 {
                        "1".to_string()
                    } else {
                        format!("{}-7,1", start + 1)
                    };
                    return Some(head);
                }
                let end = if end == 7 { 6 } else { end };
                Some(with_step(format!("{}-{}", start + 1, end + 1)))
            }
            None => {
                let day: u32 = range.parse().ok()?;
                if day > 7 {
                    return None;
                }
                Some(with_step(((day % 7) + 1).to_string()))
            }
        }
    }
}
