pub mod migrations;
pub mod sqlite;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clock_core::config::DatabaseConfig;
use clock_core::traits::{
    ContainerRepository, RelationRepository, TaskLogRepository, TaskRepository,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use sqlite::{
    SqliteContainerRepository, SqliteRelationRepository, SqliteTaskLogRepository,
    SqliteTaskRepository,
};

/// 仓储集合，供服务层按接口注入
#[derive(Clone)]
pub struct Repositories {
    pub containers: Arc<dyn ContainerRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub relations: Arc<dyn RelationRepository>,
    pub logs: Arc<dyn TaskLogRepository>,
}

/// 数据库管理器
///
/// 负责创建连接池并执行建表迁移。
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 按配置连接数据库，文件不存在时自动创建
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("无效的数据库URL: {}", config.url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            });

        // 内存数据库每个连接都是独立的库，只能使用单连接
        let max_connections = if in_memory { 1 } else { config.max_connections };
        let min_connections = config.min_connections.min(max_connections);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(config.connection_timeout());
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .context("连接数据库失败")?;

        info!("数据库连接成功: {}", config.url);
        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    /// 创建内存数据库，主要用于测试
    pub async fn new_in_memory() -> Result<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        Self::new(&config).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 执行建表迁移（幂等）
    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .context("数据库迁移失败")?;
        debug!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            containers: Arc::new(SqliteContainerRepository::new(self.pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(self.pool.clone())),
            relations: Arc::new(SqliteRelationRepository::new(self.pool.clone())),
            logs: Arc::new(SqliteTaskLogRepository::new(self.pool.clone())),
        }
    }
}
