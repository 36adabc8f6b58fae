use async_trait::async_trait;
use chrono::Utc;
use clock_core::models::Relation;
use clock_core::traits::RelationRepository;
use clock_core::{SchedulerError, SchedulerResult};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub struct SqliteRelationRepository {
    pool: SqlitePool,
}

impl SqliteRelationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_relation(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Relation> {
        Ok(Relation {
            rid: row.try_get("rid")?,
            cid: row.try_get("cid")?,
            tid: row.try_get("tid")?,
            next_tid: row.try_get("next_tid")?,
            update_at: row.try_get("update_at")?,
        })
    }
}

#[async_trait]
impl RelationRepository for SqliteRelationRepository {
    #[instrument(skip(self, relation), fields(cid = relation.cid, tid = relation.tid, next_tid = relation.next_tid))]
    async fn create(&self, relation: &Relation) -> SchedulerResult<Relation> {
        let result = sqlx::query(
            r#"
            INSERT INTO relations (cid, tid, next_tid, update_at)
            VALUES (?, ?, ?, ?)
            RETURNING rid, cid, tid, next_tid, update_at
            "#,
        )
        .bind(relation.cid)
        .bind(relation.tid)
        .bind(relation.next_tid)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::row_to_relation(&row),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(SchedulerError::InvalidRelation(format!(
                    "依赖关系已存在: {} -> {}",
                    relation.tid, relation.next_tid
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, rid: i64) -> SchedulerResult<Option<Relation>> {
        let row = sqlx::query("SELECT * FROM relations WHERE rid = ?")
            .bind(rid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_relation).transpose()
    }

    async fn get_by_cid(&self, cid: i64) -> SchedulerResult<Vec<Relation>> {
        let rows = sqlx::query("SELECT * FROM relations WHERE cid = ? ORDER BY rid ASC")
            .bind(cid)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_relation).collect()
    }

    async fn find(&self, tid: i64, next_tid: i64) -> SchedulerResult<Option<Relation>> {
        let row = sqlx::query("SELECT * FROM relations WHERE tid = ? AND next_tid = ?")
            .bind(tid)
            .bind(next_tid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_relation).transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, rid: i64) -> SchedulerResult<()> {
        let result = sqlx::query("DELETE FROM relations WHERE rid = ?")
            .bind(rid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::RelationNotFound { id: rid });
        }
        Ok(())
    }

    async fn delete_by_task(&self, tid: i64) -> SchedulerResult<u64> {
        let result = sqlx::query("DELETE FROM relations WHERE tid = ? OR next_tid = ?")
            .bind(tid)
            .bind(tid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_cid(&self, cid: i64) -> SchedulerResult<u64> {
        let result = sqlx::query("DELETE FROM relations WHERE cid = ?")
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
