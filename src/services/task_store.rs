//! Canonical task store: a flat id-keyed map plus readiness queries.
//!
//! Tasks and sub-tasks live in one map; parent/child and dependency
//! relationships are id lists, never owning references.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};

/// Canonical set of tasks for one engine instance.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<Uuid, Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated task. Ids are caller-generated v4 uuids; a
    /// duplicate indicates a bug and is rejected.
    pub fn insert(&mut self, task: Task) -> DomainResult<Uuid> {
        if self.tasks.contains_key(&task.id) {
            return Err(DomainError::InvalidTask(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        let id = task.id;
        debug!(task_id = %id, domain = %task.domain, priority = task.priority, "Task stored");
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Insert bypassing the validated submission path.
    ///
    /// Exists for recovery tooling and tests that need to reconstruct
    /// arbitrary state (including broken state the scheduler must survive).
    pub fn inject(&mut self, task: Task) -> DomainResult<Uuid> {
        warn!(task_id = %task.id, "Task injected without validation");
        self.insert(task)
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Attach a child task to `parent_id` and store it.
    ///
    /// The parent keeps an id list only; the child carries the
    /// back-reference.
    pub fn attach_subtask(&mut self, parent_id: Uuid, mut child: Task) -> DomainResult<Uuid> {
        if !self.tasks.contains_key(&parent_id) {
            return Err(DomainError::UnknownTask(parent_id));
        }
        child.parent_id = Some(parent_id);
        let child_id = self.insert(child)?;
        if let Some(parent) = self.tasks.get_mut(&parent_id) {
            parent.subtasks.push(child_id);
            parent.updated_at = Utc::now();
        }
        Ok(child_id)
    }

    /// Whether a task is ready to be scheduled: pending, not a decomposition
    /// parent, and with every dependency completed.
    pub fn is_ready(&self, task: &Task) -> bool {
        task.status == TaskStatus::Pending
            && task.subtasks.is_empty()
            && task.dependencies.iter().all(|dep| {
                self.tasks
                    .get(dep)
                    .is_some_and(|t| t.status == TaskStatus::Completed)
            })
    }

    /// Ready task ids sorted by (priority desc, predicted impact desc).
    ///
    /// Ordering across ticks is not stable beyond that key; creation time
    /// breaks remaining ties so a snapshot is at least deterministic.
    pub fn ready_snapshot(&self) -> Vec<Uuid> {
        let mut ready: Vec<&Task> = self.tasks.values().filter(|t| self.is_ready(t)).collect();
        ready.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.predicted_impact.total_cmp(&a.predicted_impact))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        ready.into_iter().map(|t| t.id).collect()
    }

    /// Whether any non-terminal tasks remain.
    pub fn has_pending(&self) -> bool {
        self.tasks
            .values()
            .any(|t| t.status == TaskStatus::Pending)
    }

    /// Ids of direct children of `parent_id`.
    pub fn subtasks_of(&self, parent_id: Uuid) -> Vec<Uuid> {
        self.tasks
            .get(&parent_id)
            .map(|t| t.subtasks.clone())
            .unwrap_or_default()
    }

    /// Count of active interferers for a task: processing or completed tasks
    /// whose domain appears in the task's interference list.
    pub fn active_interferers(&self, task: &Task) -> usize {
        if task.interfered_by.is_empty() {
            return 0;
        }
        self.tasks
            .values()
            .filter(|t| {
                t.id != task.id
                    && matches!(t.status, TaskStatus::Processing | TaskStatus::Completed)
                    && task.interfered_by.iter().any(|d| d == &t.domain)
            })
            .count()
    }
}
