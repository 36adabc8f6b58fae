use async_trait::async_trait;
use chrono::Utc;
use clock_core::models::{Task, TaskQuery, TaskStatus};
use clock_core::traits::TaskRepository;
use clock_core::{SchedulerError, SchedulerResult};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::like_pattern;

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Task> {
        Ok(Task {
            tid: row.try_get("tid")?,
            cid: row.try_get("cid")?,
            command: row.try_get("command")?,
            name: row.try_get("name")?,
            directory: row.try_get("directory")?,
            disable: row.try_get("disable")?,
            status: row.try_get("status")?,
            timeout: row.try_get("timeout")?,
            update_at: row.try_get("update_at")?,
            log_enable: row.try_get("log_enable")?,
            point_x: row.try_get("point_x")?,
            point_y: row.try_get("point_y")?,
        })
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &TaskQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(cid) = query.cid {
            builder.push(" AND cid = ").push_bind(cid);
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            builder
                .push(" AND name LIKE ")
                .push_bind(like_pattern(name))
                .push(" ESCAPE '\\'");
        }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(cid = task.cid, task_name = %task.name))]
    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let row = sqlx::query(
            r#"
            INSERT INTO tasks (cid, command, name, directory, disable, status, timeout,
                               update_at, log_enable, point_x, point_y)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(task.cid)
        .bind(&task.command)
        .bind(&task.name)
        .bind(&task.directory)
        .bind(task.disable)
        .bind(TaskStatus::Pending)
        .bind(task.timeout)
        .bind(Utc::now())
        .bind(task.log_enable)
        .bind(task.point_x)
        .bind(task.point_y)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_task(&row)?;
        debug!("创建任务成功: tid={}", created.tid);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, tid: i64) -> SchedulerResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE tid = ?")
            .bind(tid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self, query), fields(cid = ?query.cid))]
    async fn list(&self, query: &TaskQuery) -> SchedulerResult<(Vec<Task>, i64)> {
        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        Self::push_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM tasks");
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY tid ASC LIMIT ")
            .push_bind(query.page.limit())
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let tasks = rows
            .iter()
            .map(Self::row_to_task)
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok((tasks, total))
    }

    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE cid = ? ORDER BY tid ASC")
            .bind(cid)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self, task), fields(tid = task.tid))]
    async fn update(&self, task: &Task) -> SchedulerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET cid = ?, command = ?, name = ?, directory = ?, disable = ?, timeout = ?,
                update_at = ?, log_enable = ?, point_x = ?, point_y = ?
            WHERE tid = ?
            "#,
        )
        .bind(task.cid)
        .bind(&task.command)
        .bind(&task.name)
        .bind(&task.directory)
        .bind(task.disable)
        .bind(task.timeout)
        .bind(Utc::now())
        .bind(task.log_enable)
        .bind(task.point_x)
        .bind(task.point_y)
        .bind(task.tid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id: task.tid });
        }
        Ok(())
    }

    async fn update_status(&self, tid: i64, status: TaskStatus) -> SchedulerResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ?, update_at = ? WHERE tid = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(tid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id: tid });
        }
        Ok(())
    }

    async fn reset_status_by_cid(&self, cid: i64) -> SchedulerResult<()> {
        sqlx::query("UPDATE tasks SET status = ? WHERE cid = ?")
            .bind(TaskStatus::Pending)
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_coordinates(&self, tid: i64, x: i64, y: i64) -> SchedulerResult<()> {
        let result = sqlx::query("UPDATE tasks SET point_x = ?, point_y = ? WHERE tid = ?")
            .bind(x)
            .bind(y)
            .bind(tid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id: tid });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, tid: i64) -> SchedulerResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE tid = ?")
            .bind(tid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id: tid });
        }
        Ok(())
    }

    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE cid = ?")
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn status_counts(&self) -> SchedulerResult<Vec<(TaskStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> SchedulerResult<(TaskStatus, i64)> {
                Ok((row.try_get("status")?, row.try_get("total")?))
            })
            .collect()
    }
}
