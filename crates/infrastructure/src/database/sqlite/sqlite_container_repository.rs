use async_trait::async_trait;
use chrono::Utc;
use clock_core::models::{Container, ContainerQuery, TaskStatus};
use clock_core::traits::ContainerRepository;
use clock_core::{SchedulerError, SchedulerResult};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::like_pattern;

pub struct SqliteContainerRepository {
    pool: SqlitePool,
}

impl SqliteContainerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_container(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Container> {
        Ok(Container {
            cid: row.try_get("cid")?,
            entry_id: row.try_get("entry_id")?,
            name: row.try_get("name")?,
            expression: row.try_get("expression")?,
            status: row.try_get("status")?,
            disable: row.try_get("disable")?,
            blocking: row.try_get("blocking")?,
            update_at: row.try_get("update_at")?,
        })
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a ContainerQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            builder
                .push(" AND name LIKE ")
                .push_bind(like_pattern(name))
                .push(" ESCAPE '\\'");
        }
    }
}

#[async_trait]
impl ContainerRepository for SqliteContainerRepository {
    #[instrument(skip(self, container), fields(container_name = %container.name))]
    async fn create(&self, container: &Container) -> SchedulerResult<Container> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO containers (entry_id, name, expression, status, disable, blocking, update_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING cid, entry_id, name, expression, status, disable, blocking, update_at
            "#,
        )
        .bind(container.entry_id)
        .bind(&container.name)
        .bind(&container.expression)
        .bind(container.status)
        .bind(container.disable)
        .bind(container.blocking)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_container(&row)?;
        debug!("创建容器成功: cid={}", created.cid);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, cid: i64) -> SchedulerResult<Option<Container>> {
        let row = sqlx::query("SELECT * FROM containers WHERE cid = ?")
            .bind(cid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_container).transpose()
    }

    #[instrument(skip(self, query))]
    async fn list(&self, query: &ContainerQuery) -> SchedulerResult<(Vec<Container>, i64)> {
        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM containers");
        Self::push_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM containers");
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY cid ASC LIMIT ")
            .push_bind(query.page.limit())
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let containers = rows
            .iter()
            .map(Self::row_to_container)
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok((containers, total))
    }

    async fn find_all(&self) -> SchedulerResult<Vec<Container>> {
        let rows = sqlx::query("SELECT * FROM containers ORDER BY cid ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_container).collect()
    }

    #[instrument(skip(self, container), fields(cid = container.cid))]
    async fn update(&self, container: &Container) -> SchedulerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE containers
            SET name = ?, expression = ?, disable = ?, blocking = ?, update_at = ?
            WHERE cid = ?
            "#,
        )
        .bind(&container.name)
        .bind(&container.expression)
        .bind(container.disable)
        .bind(container.blocking)
        .bind(Utc::now())
        .bind(container.cid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::ContainerNotFound { id: container.cid });
        }
        Ok(())
    }

    async fn update_status(&self, cid: i64, status: TaskStatus) -> SchedulerResult<()> {
        let result = sqlx::query("UPDATE containers SET status = ? WHERE cid = ?")
            .bind(status)
            .bind(cid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::ContainerNotFound { id: cid });
        }
        Ok(())
    }

    async fn update_entry_id(&self, cid: i64, entry_id: i64) -> SchedulerResult<()> {
        let result = sqlx::query("UPDATE containers SET entry_id = ? WHERE cid = ?")
            .bind(entry_id)
            .bind(cid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::ContainerNotFound { id: cid });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, cid: i64) -> SchedulerResult<()> {
        let result = sqlx::query("DELETE FROM containers WHERE cid = ?")
            .bind(cid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::ContainerNotFound { id: cid });
        }
        Ok(())
    }
}
