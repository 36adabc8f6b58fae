pub mod repository;
pub mod task_executor;

pub use repository::{ContainerRepository, RelationRepository, TaskLogRepository, TaskRepository};
pub use task_executor::{ExecutionFailure, TaskExecution, TaskExecutor};
