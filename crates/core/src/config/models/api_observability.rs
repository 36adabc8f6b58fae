use serde::{Deserialize, Serialize};

/// API 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
    /// 设置后所有 `/v1` 接口都需要 `Authorization: Bearer <token>`
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9528".to_string(),
            cors_enabled: true,
            auth_token: None,
        }
    }
}

impl ApiConfig {
    /// 验证API配置
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("API绑定地址不能为空"));
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!("无效的API绑定地址: {}", self.bind_address));
        }

        if matches!(&self.auth_token, Some(token) if token.trim().is_empty()) {
            return Err(anyhow::anyhow!("认证令牌不能为空字符串"));
        }

        Ok(())
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// `pretty` 或 `json`
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 验证可观测性配置
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!("无效的日志级别: {}", self.log_level));
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!("无效的日志格式: {}", self.log_format));
        }

        Ok(())
    }
}
