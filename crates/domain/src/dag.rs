use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use clock_core::models::{Relation, Task};
use clock_core::{SchedulerError, SchedulerResult};
use tracing::debug;

/// 容器的执行计划
///
/// `layers[i]` 中的任务之间没有依赖边，可以并发执行；
/// 每个任务的前置任务都位于更早的层中。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub layers: Vec<Vec<i64>>,
    /// tid -> 直接前置任务
    pub predecessors: HashMap<i64, Vec<i64>>,
}

impl ExecutionPlan {
    pub fn task_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn predecessors_of(&self, tid: i64) -> &[i64] {
        self.predecessors
            .get(&tid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 按层展开后的拓扑序
    pub fn topological_order(&self) -> Vec<i64> {
        self.layers.iter().flatten().copied().collect()
    }
}

/// DAG 解析器
///
/// 任务图以 tid 为键的邻接表表示，环检测完全是对 id 的图运算。
pub struct DagResolver;

impl DagResolver {
    /// 计算分层执行顺序（按层批量的 Kahn 算法）
    ///
    /// 只考虑两端都在 `tasks` 中的边，层内 tid 升序排列。
    /// 某一轮没有入度为 0 的任务但仍有未放置的任务时返回
    /// `CycleDetected`，其中包含所有未能放置的任务。
    pub fn resolve(tasks: &[Task], relations: &[Relation]) -> SchedulerResult<ExecutionPlan> {
        let tids: BTreeSet<i64> = tasks.iter().map(|t| t.tid).collect();
        let mut in_degree: BTreeMap<i64, usize> = tids.iter().map(|&tid| (tid, 0)).collect();
        let mut successors: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut predecessors: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut seen_edges: HashSet<(i64, i64)> = HashSet::new();

        for relation in relations {
            if !tids.contains(&relation.tid) || !tids.contains(&relation.next_tid) {
                continue;
            }
            if !seen_edges.insert((relation.tid, relation.next_tid)) {
                continue;
            }
            successors
                .entry(relation.tid)
                .or_default()
                .push(relation.next_tid);
            predecessors
                .entry(relation.next_tid)
                .or_default()
                .push(relation.tid);
            if let Some(degree) = in_degree.get_mut(&relation.next_tid) {
                *degree += 1;
            }
        }

        let mut layers = Vec::new();
        let mut placed = 0usize;
        let mut current: Vec<i64> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&tid, _)| tid)
            .collect();

        while !current.is_empty() {
            placed += current.len();
            let mut next = BTreeSet::new();
            for tid in &current {
                in_degree.remove(tid);
                for succ in successors.get(tid).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.insert(*succ);
                        }
                    }
                }
            }
            layers.push(current);
            current = next.into_iter().collect();
        }

        if placed < tids.len() {
            let remaining: Vec<i64> = in_degree.keys().copied().collect();
            debug!("检测到循环依赖，未能放置的任务: {:?}", remaining);
            return Err(SchedulerError::CycleDetected { tids: remaining });
        }

        for preds in predecessors.values_mut() {
            preds.sort_unstable();
        }

        Ok(ExecutionPlan {
            layers,
            predecessors,
        })
    }

    /// 检查新增边 `tid -> next_tid` 是否会形成环
    ///
    /// 只需从 `next_tid` 出发沿已有边搜索，能到达 `tid` 即成环。
    /// 成环时 `tids` 为环上的任务，从 `tid` 开始。
    pub fn validate_insertion(
        relations: &[Relation],
        tid: i64,
        next_tid: i64,
    ) -> SchedulerResult<()> {
        if tid == next_tid {
            return Err(SchedulerError::CycleDetected { tids: vec![tid] });
        }

        let mut successors: HashMap<i64, Vec<i64>> = HashMap::new();
        for relation in relations {
            successors
                .entry(relation.tid)
                .or_default()
                .push(relation.next_tid);
        }

        let mut parent: HashMap<i64, i64> = HashMap::new();
        let mut visited: HashSet<i64> = HashSet::from([next_tid]);
        let mut stack = vec![next_tid];

        while let Some(node) = stack.pop() {
            if node == tid {
                return Err(SchedulerError::CycleDetected {
                    tids: Self::cycle_path(&parent, tid, next_tid),
                });
            }
            for &succ in successors.get(&node).into_iter().flatten() {
                if visited.insert(succ) {
                    parent.insert(succ, node);
                    stack.push(succ);
                }
            }
        }

        Ok(())
    }

    // 沿父节点回溯得到 next_tid -> ... -> tid，再把 tid 挪到开头
    fn cycle_path(parent: &HashMap<i64, i64>, tid: i64, next_tid: i64) -> Vec<i64> {
        let mut path = vec![tid];
        let mut cursor = tid;
        while cursor != next_tid {
            match parent.get(&cursor) {
                Some(&p) => {
                    path.push(p);
                    cursor = p;
                }
                None => break,
            }
        }
        path.reverse();
        path.rotate_right(1);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(tid: i64) -> Task {
        let mut task = Task::new(1, format!("task-{tid}"), "true");
        task.tid = tid;
        task
    }

    fn edge(tid: i64, next_tid: i64) -> Relation {
        Relation::new(1, tid, next_tid)
    }

    #[test]
    fn test_diamond_layers() {
        let tasks: Vec<Task> = (1..=4).map(task).collect();
        let relations = vec![edge(1, 2), edge(1, 3), edge(2, 4), edge(3, 4)];

        let plan = DagResolver::resolve(&tasks, &relations).unwrap();
        assert_eq!(plan.layers, vec![vec![1], vec![2, 3], vec![4]]);
        assert_eq!(plan.predecessors_of(4), &[2, 3]);
        assert!(plan.predecessors_of(1).is_empty());
        assert_eq!(plan.task_count(), 4);
        assert_eq!(plan.topological_order(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_independent_tasks_share_first_layer() {
        let tasks: Vec<Task> = vec![task(5), task(2), task(9)];
        let plan = DagResolver::resolve(&tasks, &[]).unwrap();
        assert_eq!(plan.layers, vec![vec![2, 5, 9]]);
    }

    #[test]
    fn test_empty_container() {
        let plan = DagResolver::resolve(&[], &[]).unwrap();
        assert!(plan.layers.is_empty());
    }

    #[test]
    fn test_cycle_reports_unplaced_tasks() {
        let tasks: Vec<Task> = (1..=4).map(task).collect();
        let relations = vec![edge(1, 2), edge(2, 3), edge(3, 2), edge(3, 4)];

        match DagResolver::resolve(&tasks, &relations) {
            Err(SchedulerError::CycleDetected { tids }) => assert_eq!(tids, vec![2, 3, 4]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_and_duplicate_edges_ignored() {
        let tasks: Vec<Task> = vec![task(1), task(2)];
        let relations = vec![edge(1, 2), edge(1, 2), edge(2, 99)];
        let plan = DagResolver::resolve(&tasks, &relations).unwrap();
        assert_eq!(plan.layers, vec![vec![1], vec![2]]);
        assert_eq!(plan.predecessors_of(2), &[1]);
    }

    #[test]
    fn test_validate_insertion() {
        let relations = vec![edge(1, 2), edge(2, 3)];

        assert!(DagResolver::validate_insertion(&relations, 1, 3).is_ok());
        assert!(DagResolver::validate_insertion(&relations, 4, 1).is_ok());

        match DagResolver::validate_insertion(&relations, 3, 1) {
            Err(SchedulerError::CycleDetected { tids }) => assert_eq!(tids, vec![3, 1, 2]),
            other => panic!("expected cycle, got {other:?}"),
        }

        assert!(matches!(
            DagResolver::validate_insertion(&relations, 7, 7),
            Err(SchedulerError::CycleDetected { .. })
        ));
    }
}
