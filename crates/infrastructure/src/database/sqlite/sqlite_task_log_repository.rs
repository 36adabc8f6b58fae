use async_trait::async_trait;
use clock_core::models::{LogFilter, LogQuery, TaskLog};
use clock_core::traits::TaskLogRepository;
use clock_core::SchedulerResult;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteTaskLogRepository {
    pool: SqlitePool,
}

impl SqliteTaskLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<TaskLog> {
        Ok(TaskLog {
            lid: row.try_get("lid")?,
            tid: row.try_get("tid")?,
            cid: row.try_get("cid")?,
            run_id: row.try_get("run_id")?,
            std_out: row.try_get("std_out")?,
            std_err: row.try_get("std_err")?,
            update_at: row.try_get("update_at")?,
        })
    }

    /// 追加查询条件，时间范围为开区间
    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LogFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(tid) = filter.tid {
            builder.push(" AND tid = ").push_bind(tid);
        }
        if let Some(cid) = filter.cid {
            builder.push(" AND cid = ").push_bind(cid);
        }
        if let Some(left) = filter.left_time() {
            builder.push(" AND update_at > ").push_bind(left);
        }
        if let Some(right) = filter.right_time() {
            builder.push(" AND update_at < ").push_bind(right);
        }
    }
}

#[async_trait]
impl TaskLogRepository for SqliteTaskLogRepository {
    #[instrument(skip(self, log), fields(tid = log.tid, run_id = ?log.run_id))]
    async fn create(&self, log: &TaskLog) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_logs (lid, tid, cid, run_id, std_out, std_err, update_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.lid)
        .bind(log.tid)
        .bind(log.cid)
        .bind(&log.run_id)
        .bind(&log.std_out)
        .bind(&log.std_err)
        .bind(log.update_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, query))]
    async fn list(&self, query: &LogQuery) -> SchedulerResult<(Vec<TaskLog>, i64)> {
        let filter = query.filter();
        filter.validate()?;

        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM task_logs");
        Self::push_filters(&mut count_builder, &filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM task_logs");
        Self::push_filters(&mut builder, &filter);
        builder
            .push(" ORDER BY update_at DESC LIMIT ")
            .push_bind(query.page.limit())
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let logs = rows
            .iter()
            .map(Self::row_to_log)
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok((logs, total))
    }

    #[instrument(skip(self, filter))]
    async fn delete(&self, filter: &LogFilter) -> SchedulerResult<u64> {
        filter.validate()?;
        if !filter.all && !filter.has_condition() {
            debug!("日志删除请求没有任何条件，忽略");
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM task_logs");
        if !filter.all {
            Self::push_filters(&mut builder, filter);
        }
        let result = builder.build().execute(&self.pool).await?;

        debug!("删除日志{}条", result.rows_affected());
        Ok(result.rows_affected())
    }
}
