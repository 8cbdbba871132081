//! Dependency graph checks: cycle detection and failure cascades.
//!
//! Edges are id lists on the tasks themselves; the graph here is derived on
//! demand over the unfinished subset so finished work can never resurrect a
//! cycle.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::models::TaskStatus;
use crate::services::task_store::TaskStore;

/// Stateless dependency analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyGraph;

/// DFS marking for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

fn visit(
    node: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
    colors: &mut HashMap<Uuid, Color>,
    stack: &mut Vec<Uuid>,
    cyclic: &mut HashSet<Uuid>,
) {
    colors.insert(node, Color::Gray);
    stack.push(node);

    if let Some(neighbors) = graph.get(&node) {
        for &neighbor in neighbors {
            match colors.get(&neighbor).copied().unwrap_or(Color::White) {
                Color::White => visit(neighbor, graph, colors, stack, cyclic),
                Color::Gray => {
                    // Back edge: everything from the neighbor to the top of
                    // the stack is on the cycle.
                    if let Some(start) = stack.iter().position(|&id| id == neighbor) {
                        cyclic.extend(stack[start..].iter().copied());
                    }
                }
                Color::Black => {}
            }
        }
    }

    stack.pop();
    colors.insert(node, Color::Black);
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self
    }

    /// Ids of every task participating in a dependency cycle among
    /// unfinished tasks.
    pub fn cycle_participants(&self, store: &TaskStore) -> HashSet<Uuid> {
        let unfinished: HashSet<Uuid> = store
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id)
            .collect();

        let mut graph: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for task in store.iter().filter(|t| unfinished.contains(&t.id)) {
            let edges: Vec<Uuid> = task
                .dependencies
                .iter()
                .copied()
                .filter(|dep| unfinished.contains(dep))
                .collect();
            graph.insert(task.id, edges);
        }

        let mut colors: HashMap<Uuid, Color> = HashMap::new();
        let mut stack = Vec::new();
        let mut cyclic = HashSet::new();

        let mut nodes: Vec<Uuid> = graph.keys().copied().collect();
        nodes.sort(); // deterministic traversal
        for node in nodes {
            if colors.get(&node).copied().unwrap_or(Color::White) == Color::White {
                visit(node, &graph, &mut colors, &mut stack, &mut cyclic);
            }
        }

        cyclic
    }

    /// Pending tasks that transitively depend on any id in `failed`.
    ///
    /// Computed to a fixpoint so chains of dependents collapse in one pass.
    pub fn cascade_targets(&self, store: &TaskStore, failed: &HashSet<Uuid>) -> Vec<Uuid> {
        let mut doomed: HashSet<Uuid> = failed.clone();
        let mut out = Vec::new();

        loop {
            let mut grew = false;
            for task in store.iter() {
                if task.status != TaskStatus::Pending || doomed.contains(&task.id) {
                    continue;
                }
                if task.dependencies.iter().any(|dep| doomed.contains(dep)) {
                    doomed.insert(task.id);
                    out.push(task.id);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, TaskSpec};

    fn domains() -> Vec<String> {
        vec!["analysis".to_string()]
    }

    fn task(desc: &str) -> Task {
        TaskSpec::new(desc, "analysis", 3.0).build(&domains()).unwrap()
    }

    fn store_with_chain(cyclic: bool) -> (TaskStore, Vec<Uuid>) {
        let mut store = TaskStore::new();
        let mut a = task("a");
        let mut b = task("b");
        let mut c = task("c");
        let ids = vec![a.id, b.id, c.id];

        a.dependencies.push(ids[1]); // a -> b
        b.dependencies.push(ids[2]); // b -> c
        if cyclic {
            c.dependencies.push(ids[0]); // c -> a
        }

        store.inject(a).unwrap();
        store.inject(b).unwrap();
        store.inject(c).unwrap();
        (store, ids)
    }

    #[test]
    fn test_acyclic_chain_has_no_participants() {
        let (store, _) = store_with_chain(false);
        assert!(DependencyGraph::new().cycle_participants(&store).is_empty());
    }

    #[test]
    fn test_three_cycle_detected() {
        let (store, ids) = store_with_chain(true);
        let cyclic = DependencyGraph::new().cycle_participants(&store);
        assert_eq!(cyclic, ids.into_iter().collect());
    }

    #[test]
    fn test_self_cycle_detected() {
        let mut store = TaskStore::new();
        let mut t = task("selfish");
        t.dependencies.push(t.id);
        let id = t.id;
        store.inject(t).unwrap();

        let cyclic = DependencyGraph::new().cycle_participants(&store);
        assert!(cyclic.contains(&id));
    }

    #[test]
    fn test_completed_tasks_break_cycles() {
        let (mut store, ids) = store_with_chain(true);
        // Finish c: the back edge through it no longer exists
        let c = store.get_mut(ids[2]).unwrap();
        c.transition_to(TaskStatus::Processing).unwrap();
        c.transition_to(TaskStatus::Completed).unwrap();

        assert!(DependencyGraph::new().cycle_participants(&store).is_empty());
    }

    #[test]
    fn test_cascade_is_transitive() {
        let mut store = TaskStore::new();
        let root = task("root");
        let root_id = root.id;
        let mut mid = task("mid");
        mid.dependencies.push(root_id);
        let mid_id = mid.id;
        let mut leaf = task("leaf");
        leaf.dependencies.push(mid_id);
        let leaf_id = leaf.id;
        let bystander = task("bystander");
        let bystander_id = bystander.id;

        store.inject(root).unwrap();
        store.inject(mid).unwrap();
        store.inject(leaf).unwrap();
        store.inject(bystander).unwrap();

        let failed: HashSet<Uuid> = [root_id].into_iter().collect();
        let targets = DependencyGraph::new().cascade_targets(&store, &failed);

        assert!(targets.contains(&mid_id));
        assert!(targets.contains(&leaf_id));
        assert!(!targets.contains(&bystander_id));
    }
}
