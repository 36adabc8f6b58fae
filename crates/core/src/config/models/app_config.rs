use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    executor_scheduler::{ExecutorConfig, SchedulerConfig},
};

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config/clock.toml", "clock.toml", "/etc/clock/config.toml"];

/// 系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub executor: ExecutorConfig,
    pub scheduler: SchedulerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序：
    /// 1. 内置默认值
    /// 2. 配置文件（TOML 格式）
    /// 3. 环境变量覆盖（前缀 `CLOCK__`，分隔符 `__`），优先级最高
    ///
    /// 显式指定的配置文件不存在时返回错误；未指定时依次尝试默认路径，
    /// 都不存在则只使用默认值。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url.clone())?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default("database.min_connections", defaults.database.min_connections)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.database.connection_timeout_seconds,
            )?
            .set_default("api.enabled", defaults.api.enabled)?
            .set_default("api.bind_address", defaults.api.bind_address.clone())?
            .set_default("api.cors_enabled", defaults.api.cors_enabled)?
            .set_default("executor.kill_grace_seconds", defaults.executor.kill_grace_seconds)?
            .set_default(
                "executor.max_output_bytes",
                defaults.executor.max_output_bytes as u64,
            )?
            .set_default("scheduler.enabled", defaults.scheduler.enabled)?
            .set_default(
                "scheduler.delete_wait_seconds",
                defaults.scheduler.delete_wait_seconds,
            )?
            .set_default("scheduler.event_buffer", defaults.scheduler.event_buffer as u64)?
            .set_default("observability.log_level", defaults.observability.log_level.clone())?
            .set_default(
                "observability.log_format",
                defaults.observability.log_format.clone(),
            )?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("CLOCK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 从TOML字符串加载配置
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 序列化为TOML字符串
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        self.executor.validate().context("执行器配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.url, "sqlite://clock.db");
        assert_eq!(config.executor.kill_grace_seconds, 5);
        assert_eq!(config.executor.max_output_bytes, 1024 * 1024);
        assert_eq!(config.scheduler.delete_wait_seconds, 30);
        assert!(config.api.auth_token.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.api.auth_token = Some("secret".to_string());
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.api.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/clock".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.min_connections = 10;
        config.database.max_connections = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = AppConfig::load(Some("/nonexistent/clock.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.toml");
        std::fs::write(
            &path,
            r#"
[database]
url = "sqlite::memory:"
max_connections = 2
min_connections = 1
connection_timeout_seconds = 5

[scheduler]
enabled = false
delete_wait_seconds = 3
event_buffer = 16
"#,
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.event_buffer, 16);
        // 未出现的配置段使用默认值
        assert_eq!(config.executor.kill_grace_seconds, 5);
    }
}
