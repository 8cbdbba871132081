//! Property suites for the scoring, leasing, and graph components.

use std::collections::HashMap;

use loc::domain::models::{AgentSpec, ResourceMode, TaskSpec};
use loc::services::{DependencyGraph, ResourceArbiter, TaskStore};
use proptest::prelude::*;
use uuid::Uuid;

fn domains() -> Vec<String> {
    vec!["analysis".to_string()]
}

proptest! {
    /// Property: accepted compatibility scores always land in
    /// [min_compatibility, 1].
    #[test]
    fn prop_score_is_bounded(
        skill in 0.0f64..=10.0,
        completed in 0u64..200,
        success_rate in 0.0f64..=1.0,
        complexity in 1.0f64..=10.0,
        priority in 1i64..=10,
    ) {
        let mut agent = AgentSpec::new("a", "e")
            .with_domain("analysis")
            .with_skill("analysis", skill)
            .build(&domains())
            .unwrap();
        agent.perf.tasks_completed = completed;
        agent.perf.success_rate = success_rate;

        let task = TaskSpec::new("t", "analysis", complexity)
            .with_priority(priority)
            .build(&domains())
            .unwrap();

        if let Some(score) = loc::services::compatibility::score(&agent, &task, 0.2) {
            prop_assert!((0.2..=1.0).contains(&score), "score {score} out of bounds");
        }
    }

    /// Property: under arbitrary acquire/release interleavings, no resource
    /// ever exceeds its capacity.
    #[test]
    fn prop_arbiter_never_oversubscribes(
        capacity in 1u32..5,
        ops in prop::collection::vec((0usize..8, prop::bool::ANY), 1..60),
    ) {
        let mut arbiter = ResourceArbiter::new();
        let mode = ResourceMode::Parallel { capacity };
        arbiter.register("shared", mode);

        let tasks: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let requirements: HashMap<String, ResourceMode> =
            [("shared".to_string(), mode)].into_iter().collect();

        for (slot, acquire) in ops {
            if acquire {
                arbiter.try_acquire(tasks[slot], &requirements);
            } else {
                arbiter.release(tasks[slot]);
            }
            let usage = arbiter.get("shared").unwrap().current_usage();
            prop_assert!(usage <= capacity, "usage {usage} exceeds capacity {capacity}");
        }
    }

    /// Property: a randomly generated forward-edge graph is never flagged as
    /// cyclic.
    #[test]
    fn prop_dag_has_no_cycle_participants(
        size in 1usize..20,
        edge_seed in prop::collection::vec(0usize..100, 0..40),
    ) {
        let mut store = TaskStore::new();
        let mut ids = Vec::with_capacity(size);
        for i in 0..size {
            let task = TaskSpec::new(format!("task {i}"), "analysis", 3.0)
                .build(&domains())
                .unwrap();
            ids.push(task.id);
            store.inject(task).unwrap();
        }

        // Edges only point from later tasks to earlier ones: acyclic by
        // construction.
        for (i, seed) in edge_seed.iter().enumerate() {
            let from = (i + seed) % size;
            if from == 0 {
                continue;
            }
            let to = seed % from;
            let from_id = ids[from];
            let to_id = ids[to];
            if let Some(task) = store.get_mut(from_id) {
                if !task.dependencies.contains(&to_id) {
                    task.dependencies.push(to_id);
                }
            }
        }

        let cyclic = DependencyGraph::new().cycle_participants(&store);
        prop_assert!(cyclic.is_empty(), "false positive on a DAG: {cyclic:?}");
    }

    /// Property: closing any forward chain into a ring is always detected,
    /// and every ring member is reported.
    #[test]
    fn prop_ring_is_fully_detected(size in 2usize..15) {
        let mut store = TaskStore::new();
        let mut ids = Vec::with_capacity(size);
        for i in 0..size {
            let task = TaskSpec::new(format!("task {i}"), "analysis", 3.0)
                .build(&domains())
                .unwrap();
            ids.push(task.id);
            store.inject(task).unwrap();
        }
        for i in 0..size {
            let next = ids[(i + 1) % size];
            if let Some(task) = store.get_mut(ids[i]) {
                task.dependencies.push(next);
            }
        }

        let cyclic = DependencyGraph::new().cycle_participants(&store);
        for id in &ids {
            prop_assert!(cyclic.contains(id), "ring member {id} not reported");
        }
    }
}
