pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod executor_scheduler;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use executor_scheduler::{ExecutorConfig, SchedulerConfig};
