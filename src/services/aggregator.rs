//! Sub-task aggregation: parent completion is derived, never dispatched.
//!
//! When a sub-task reaches a terminal state the aggregator walks upward,
//! completing parents whose children all succeeded (merging their outputs
//! and any collaboration-bus contributions) and failing parents that lost a
//! child.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::{FailureReason, TaskOutput, TaskStatus};
use crate::services::collaboration::CollaborationBus;
use crate::services::task_store::TaskStore;

/// Sentinel agent id stamped on aggregated outputs.
pub const AGGREGATOR_AGENT_ID: &str = "AGGREGATOR_SYSTEM";

/// Parent transitions produced by one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationEvent {
    /// Parent completed with a merged output.
    Completed(Uuid),
    /// Parent failed because a child failed.
    Failed(Uuid),
}

/// React to `child_id` reaching a terminal state.
///
/// Walks the parent chain as far as it resolves, so a grandchild finishing
/// can complete (or fail) several ancestors in one pass. Returned events are
/// ordered bottom-up.
pub fn on_subtask_terminal(
    store: &mut TaskStore,
    bus: &CollaborationBus,
    child_id: Uuid,
) -> Vec<AggregationEvent> {
    let mut events = Vec::new();

    let Some(child) = store.get(child_id) else {
        return events;
    };
    let mut child_failed = child.status == TaskStatus::Failed;
    let mut current = child.parent_id;

    while let Some(parent_id) = current {
        let Some(parent) = store.get(parent_id) else {
            break;
        };
        if parent.status != TaskStatus::WaitingForSubtasks {
            break;
        }
        let next_parent = parent.parent_id;

        if child_failed {
            if let Some(p) = store.get_mut(parent_id) {
                p.failure_reason = Some(FailureReason::DependencyFailureCascade);
                if p.transition_to(TaskStatus::Failed).is_ok() {
                    warn!(parent_id = %parent_id, "Parent failed: sub-task failed terminally");
                    events.push(AggregationEvent::Failed(parent_id));
                }
            }
            current = next_parent;
            continue;
        }

        let children = store.subtasks_of(parent_id);
        let all_completed = children.iter().all(|c| {
            store
                .get(*c)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        });
        if !all_completed {
            break;
        }

        let output = compose_output(store, bus, parent_id, &children);
        let predicted = mean(children.iter().filter_map(|c| store.get(*c)).map(|t| t.predicted_impact));
        if let Some(p) = store.get_mut(parent_id) {
            p.predicted_impact = predicted;
            p.output = Some(output);
            if p.transition_to(TaskStatus::Completed).is_ok() {
                info!(parent_id = %parent_id, children = children.len(), "Parent aggregated to completion");
                events.push(AggregationEvent::Completed(parent_id));
            }
        }
        current = next_parent;
        child_failed = false;
    }

    events
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0u32;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}

/// Merge child outputs and collaboration contributions into one output.
fn compose_output(
    store: &TaskStore,
    bus: &CollaborationBus,
    parent_id: Uuid,
    children: &[Uuid],
) -> TaskOutput {
    let outputs: Vec<&TaskOutput> = children
        .iter()
        .filter_map(|c| store.get(*c))
        .filter_map(|t| t.output.as_ref())
        .collect();

    let mut parts: Vec<String> = outputs.iter().map(|o| o.result_data.clone()).collect();
    for shared in bus.shared_for(parent_id) {
        let rendered = match shared.data {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        parts.push(rendered);
    }

    let n = outputs.len().max(1) as f64;
    TaskOutput {
        result_data: parts.join("\n"),
        confidence_score: outputs.iter().map(|o| o.confidence_score).sum::<f64>() / n,
        actual_impact: outputs.iter().map(|o| o.actual_impact).sum::<f64>() / n,
        execution_time_ms: outputs.iter().map(|o| o.execution_time_ms).sum(),
        produced_by: AGGREGATOR_AGENT_ID.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskSpec;
    use serde_json::json;

    fn domains() -> Vec<String> {
        vec!["analysis".to_string()]
    }

    fn completed_child(store: &mut TaskStore, parent_id: Uuid, conf: f64, impact: f64, ms: u64, data: &str) -> Uuid {
        let mut child = TaskSpec::new(data, "analysis", 4.0).build(&domains()).unwrap();
        child.output = Some(TaskOutput {
            result_data: data.to_string(),
            confidence_score: conf,
            actual_impact: impact,
            execution_time_ms: ms,
            produced_by: "agent-1".to_string(),
        });
        child.status = TaskStatus::Completed;
        store.attach_subtask(parent_id, child).unwrap()
    }

    fn waiting_parent(store: &mut TaskStore) -> Uuid {
        let mut parent = TaskSpec::new("parent", "analysis", 9.0).build(&domains()).unwrap();
        parent.status = TaskStatus::WaitingForSubtasks;
        store.inject(parent).unwrap()
    }

    #[test]
    fn test_aggregation_means_and_sum() {
        let mut store = TaskStore::new();
        let bus = CollaborationBus::new();
        let parent_id = waiting_parent(&mut store);
        completed_child(&mut store, parent_id, 0.8, 6.0, 100, "s1 out");
        let last = completed_child(&mut store, parent_id, 0.9, 4.0, 250, "s2 out");

        let events = on_subtask_terminal(&mut store, &bus, last);
        assert_eq!(events, vec![AggregationEvent::Completed(parent_id)]);

        let parent = store.get(parent_id).unwrap();
        assert_eq!(parent.status, TaskStatus::Completed);
        let out = parent.output.as_ref().unwrap();
        assert!((out.confidence_score - 0.85).abs() < 1e-9);
        assert!((out.actual_impact - 5.0).abs() < 1e-9);
        assert_eq!(out.execution_time_ms, 350);
        assert!(out.result_data.contains("s1 out"));
        assert!(out.result_data.contains("s2 out"));
        assert_eq!(out.produced_by, AGGREGATOR_AGENT_ID);
    }

    #[test]
    fn test_incomplete_sibling_blocks_aggregation() {
        let mut store = TaskStore::new();
        let bus = CollaborationBus::new();
        let parent_id = waiting_parent(&mut store);
        let done = completed_child(&mut store, parent_id, 0.8, 6.0, 100, "done");
        let pending = TaskSpec::new("pending child", "analysis", 4.0).build(&domains()).unwrap();
        store.attach_subtask(parent_id, pending).unwrap();

        let events = on_subtask_terminal(&mut store, &bus, done);
        assert!(events.is_empty());
        assert_eq!(store.get(parent_id).unwrap().status, TaskStatus::WaitingForSubtasks);
    }

    #[test]
    fn test_failed_child_fails_parent() {
        let mut store = TaskStore::new();
        let bus = CollaborationBus::new();
        let parent_id = waiting_parent(&mut store);
        completed_child(&mut store, parent_id, 0.9, 5.0, 10, "ok");
        let mut bad = TaskSpec::new("bad child", "analysis", 4.0).build(&domains()).unwrap();
        bad.status = TaskStatus::Failed;
        let bad_id = store.attach_subtask(parent_id, bad).unwrap();

        let events = on_subtask_terminal(&mut store, &bus, bad_id);
        assert_eq!(events, vec![AggregationEvent::Failed(parent_id)]);
        let parent = store.get(parent_id).unwrap();
        assert_eq!(parent.status, TaskStatus::Failed);
        assert_eq!(parent.failure_reason, Some(FailureReason::DependencyFailureCascade));
    }

    #[test]
    fn test_collaboration_contributions_appended() {
        let mut store = TaskStore::new();
        let mut bus = CollaborationBus::new();
        let parent_id = waiting_parent(&mut store);
        completed_child(&mut store, parent_id, 0.8, 6.0, 100, "child out");
        bus.share(parent_id, Uuid::new_v4(), "agent-2", json!("shared context"));

        let last = completed_child(&mut store, parent_id, 0.9, 4.0, 100, "other out");
        on_subtask_terminal(&mut store, &bus, last);

        let out = store.get(parent_id).unwrap().output.clone().unwrap();
        assert!(out.result_data.contains("shared context"));
    }

    #[test]
    fn test_recursion_completes_grandparent() {
        let mut store = TaskStore::new();
        let bus = CollaborationBus::new();
        let grandparent_id = waiting_parent(&mut store);

        let mut parent = TaskSpec::new("parent", "analysis", 8.0).build(&domains()).unwrap();
        parent.status = TaskStatus::WaitingForSubtasks;
        let parent_id = store.attach_subtask(grandparent_id, parent).unwrap();

        let leaf = completed_child(&mut store, parent_id, 1.0, 2.0, 5, "leaf out");

        let events = on_subtask_terminal(&mut store, &bus, leaf);
        assert_eq!(
            events,
            vec![
                AggregationEvent::Completed(parent_id),
                AggregationEvent::Completed(grandparent_id)
            ]
        );
        assert_eq!(store.get(grandparent_id).unwrap().status, TaskStatus::Completed);
    }
}
