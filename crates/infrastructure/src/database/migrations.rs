use clock_core::SchedulerResult;
use sqlx::SqlitePool;
use tracing::debug;

const TABLES: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS containers (
        cid INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL DEFAULT -1,
        name TEXT NOT NULL DEFAULT '',
        expression TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'PENDING',
        disable BOOLEAN NOT NULL DEFAULT 0,
        blocking BOOLEAN NOT NULL DEFAULT 1,
        update_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        tid INTEGER PRIMARY KEY AUTOINCREMENT,
        cid INTEGER NOT NULL,
        command TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        directory TEXT NOT NULL DEFAULT '',
        disable BOOLEAN NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'PENDING',
        timeout INTEGER NOT NULL DEFAULT 0,
        update_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        log_enable BOOLEAN NOT NULL DEFAULT 1,
        point_x INTEGER NOT NULL DEFAULT 0,
        point_y INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relations (
        rid INTEGER PRIMARY KEY AUTOINCREMENT,
        cid INTEGER NOT NULL,
        tid INTEGER NOT NULL,
        next_tid INTEGER NOT NULL,
        update_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (tid, next_tid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_logs (
        lid TEXT PRIMARY KEY,
        tid INTEGER NOT NULL,
        cid INTEGER NOT NULL,
        run_id TEXT,
        std_out TEXT NOT NULL DEFAULT '',
        std_err TEXT NOT NULL DEFAULT '',
        update_at DATETIME NOT NULL
    )
    "#,
];

const INDEXES: [&str; 6] = [
    "CREATE INDEX IF NOT EXISTS idx_tasks_cid ON tasks(cid)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_relations_cid ON relations(cid)",
    "CREATE INDEX IF NOT EXISTS idx_task_logs_tid ON task_logs(tid)",
    "CREATE INDEX IF NOT EXISTS idx_task_logs_cid ON task_logs(cid)",
    "CREATE INDEX IF NOT EXISTS idx_task_logs_update_at ON task_logs(update_at)",
];

/// 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
    debug!("Running SQLite database migrations");

    for table_sql in TABLES {
        sqlx::query(table_sql).execute(pool).await?;
    }

    for index_sql in INDEXES {
        sqlx::query(index_sql).execute(pool).await?;
    }

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}
