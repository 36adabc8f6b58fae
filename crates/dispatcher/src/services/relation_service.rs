use std::sync::Arc;

use clock_core::models::{NodePosition, Relation, RelationGraph};
use clock_core::traits::{RelationRepository, TaskRepository};
use clock_core::{SchedulerError, SchedulerResult};
use clock_domain::{build_relation_graph, DagResolver};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// 依赖关系服务
///
/// 新增边之前在同一把锁内完成环检测和写入，并发插入不会绕过检测形成环。
pub struct RelationService {
    tasks: Arc<dyn TaskRepository>,
    relations: Arc<dyn RelationRepository>,
    insert_lock: Mutex<()>,
}

impl RelationService {
    pub fn new(tasks: Arc<dyn TaskRepository>, relations: Arc<dyn RelationRepository>) -> Self {
        Self {
            tasks,
            relations,
            insert_lock: Mutex::new(()),
        }
    }

    /// 容器的关系图，节点状态为任务的最新状态
    pub async fn graph(&self, cid: i64) -> SchedulerResult<RelationGraph> {
        let tasks = self.tasks.get_by_cid(cid).await?;
        let relations = self.relations.get_by_cid(cid).await?;
        Ok(build_relation_graph(&tasks, &relations))
    }

    /// 新增依赖边 `tid -> next_tid`
    ///
    /// 两端任务必须存在且属于同一容器；边已存在或会形成环时拒绝，存储不变。
    #[instrument(skip(self, relation), fields(tid = relation.tid, next_tid = relation.next_tid))]
    pub async fn create(&self, relation: &Relation) -> SchedulerResult<Relation> {
        let from = self
            .tasks
            .get_by_id(relation.tid)
            .await?
            .ok_or(SchedulerError::TaskNotFound { id: relation.tid })?;
        let to = self
            .tasks
            .get_by_id(relation.next_tid)
            .await?
            .ok_or(SchedulerError::TaskNotFound {
                id: relation.next_tid,
            })?;

        if from.cid != to.cid {
            return Err(SchedulerError::InvalidRelation(format!(
                "任务 {} 和 {} 不属于同一个容器",
                from.tid, to.tid
            )));
        }
        if relation.cid > 0 && relation.cid != from.cid {
            return Err(SchedulerError::InvalidRelation(format!(
                "任务 {} 不属于容器 {}",
                from.tid, relation.cid
            )));
        }

        let _guard = self.insert_lock.lock().await;

        if self.relations.find(from.tid, to.tid).await?.is_some() {
            return Err(SchedulerError::InvalidRelation(format!(
                "依赖关系已存在: {} -> {}",
                from.tid, to.tid
            )));
        }

        let existing = self.relations.get_by_cid(from.cid).await?;
        DagResolver::validate_insertion(&existing, from.tid, to.tid)?;

        let created = self
            .relations
            .create(&Relation::new(from.cid, from.tid, to.tid))
            .await?;
        info!(
            "新增依赖关系: rid={}, cid={}, {} -> {}",
            created.rid, created.cid, created.tid, created.next_tid
        );
        Ok(created)
    }

    pub async fn delete(&self, rid: i64) -> SchedulerResult<()> {
        self.relations.delete(rid).await?;
        info!("删除依赖关系: rid={}", rid);
        Ok(())
    }

    /// 批量更新节点坐标，不存在的任务被忽略，返回实际更新的数量
    pub async fn update_nodes(&self, nodes: &[NodePosition]) -> SchedulerResult<usize> {
        let mut updated = 0;
        for node in nodes {
            match self.tasks.update_coordinates(node.id, node.x, node.y).await {
                Ok(()) => updated += 1,
                Err(SchedulerError::TaskNotFound { id }) => {
                    debug!("更新坐标时任务不存在，已忽略: tid={}", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    }
}
