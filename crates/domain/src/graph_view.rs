use std::collections::HashMap;

use clock_core::models::{Link, Node, Relation, RelationGraph, Task};

/// 构建容器的关系图视图
///
/// 节点状态直接取任务当前状态；边的名称为 `起点 -> 终点`。
/// 引用了不存在任务的边会被忽略。
pub fn build_relation_graph(tasks: &[Task], relations: &[Relation]) -> RelationGraph {
    let names: HashMap<i64, &str> = tasks.iter().map(|t| (t.tid, t.name.as_str())).collect();

    let nodes = tasks.iter().map(Node::from).collect();
    let links = relations
        .iter()
        .filter_map(|relation| {
            let from = names.get(&relation.tid)?;
            let to = names.get(&relation.next_tid)?;
            Some(Link {
                name: format!("{from} -> {to}"),
                ..Link::from(relation)
            })
        })
        .collect();

    RelationGraph { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock_core::models::TaskStatus;

    #[test]
    fn test_build_relation_graph() {
        let mut a = Task::new(7, "extract", "true");
        a.tid = 1;
        a.status = TaskStatus::Success;
        a.point_x = 10;
        let mut b = Task::new(7, "load", "true");
        b.tid = 2;

        let mut relation = Relation::new(7, 1, 2);
        relation.rid = 11;
        let dangling = Relation::new(7, 2, 42);

        let graph = build_relation_graph(&[a, b], &[relation, dangling]);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].status, TaskStatus::Success);
        assert_eq!(graph.nodes[0].x, 10);
        assert_eq!(graph.links.len(), 1);

        let link = &graph.links[0];
        assert_eq!((link.id, link.cid, link.tid, link.next_tid), (11, 7, 1, 2));
        assert_eq!(link.name, "extract -> load");
    }
}
