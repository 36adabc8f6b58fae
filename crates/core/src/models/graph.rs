use serde::{Deserialize, Serialize};

use super::{Relation, Task, TaskStatus};

/// 关系图节点（视图对象）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub status: TaskStatus,
    pub x: i64,
    pub y: i64,
}

impl From<&Task> for Node {
    fn from(task: &Task) -> Self {
        Self {
            id: task.tid,
            name: task.name.clone(),
            status: task.status,
            x: task.point_x,
            y: task.point_y,
        }
    }
}

/// 关系图边（视图对象）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub id: i64,
    pub name: String,
    pub cid: i64,
    pub tid: i64,
    pub next_tid: i64,
}

impl From<&Relation> for Link {
    fn from(relation: &Relation) -> Self {
        relation.to_link()
    }
}

/// 关系图
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelationGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

/// 节点坐标更新请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePosition {
    pub id: i64,
    pub x: i64,
    pub y: i64,
}

/// 任务统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCounter {
    pub title: String,
    pub count: i64,
}

impl TaskCounter {
    pub fn new(title: &str, count: i64) -> Self {
        Self {
            title: title.to_string(),
            count,
        }
    }
}
