use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 任务执行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// 发送终止信号后等待进程退出的宽限期
    pub kill_grace_seconds: u64,
    /// stdout/stderr 各自最多保留的字节数
    pub max_output_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kill_grace_seconds: 5,
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl ExecutorConfig {
    /// 验证执行器配置
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.kill_grace_seconds > 300 {
            return Err(anyhow::anyhow!("终止宽限期不能超过300秒"));
        }

        if self.max_output_bytes == 0 {
            return Err(anyhow::anyhow!("输出缓冲大小必须大于0"));
        }

        Ok(())
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_seconds)
    }
}

/// 触发调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// 删除容器时等待运行结束的最长时间
    pub delete_wait_seconds: u64,
    /// 事件流缓冲区大小
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delete_wait_seconds: 30,
            event_buffer: 1000,
        }
    }
}

impl SchedulerConfig {
    /// 验证调度器配置
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.event_buffer == 0 {
            return Err(anyhow::anyhow!("事件缓冲区大小必须大于0"));
        }

        Ok(())
    }

    pub fn delete_wait(&self) -> Duration {
        Duration::from_secs(self.delete_wait_seconds)
    }
}
