pub mod sqlite_container_repository;
pub mod sqlite_relation_repository;
pub mod sqlite_task_log_repository;
pub mod sqlite_task_repository;

pub use sqlite_container_repository::SqliteContainerRepository;
pub use sqlite_relation_repository::SqliteRelationRepository;
pub use sqlite_task_log_repository::SqliteTaskLogRepository;
pub use sqlite_task_repository::SqliteTaskRepository;

/// `LIKE` 模糊匹配参数
pub(crate) fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
