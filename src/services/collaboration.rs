//! Collaboration bus: a per-context blackboard with an append-only audit log.
//!
//! Contexts are keyed by the parent task id (or the task's own id when it
//! has no parent). Consumers poll or are handed shared results on request;
//! there are no callbacks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// One result shared into a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResult {
    pub task_id: Uuid,
    pub agent_id: String,
    pub data: Value,
    pub ts: DateTime<Utc>,
}

/// An unfulfilled request for input from another task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    pub requester: Uuid,
    pub from: Option<Uuid>,
    pub ts: DateTime<Utc>,
}

/// What happened on the bus, for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CollaborationOp {
    Share { task_id: Uuid, agent_id: String },
    RequestHit { requester: Uuid, from: Uuid },
    RequestQueued { requester: Uuid },
    Sync { task_id: Uuid },
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationLogEntry {
    pub context_id: Uuid,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub op: CollaborationOp,
}

/// Blackboard state for one context.
#[derive(Debug, Clone, Default)]
struct ContextBoard {
    shared: HashMap<Uuid, SharedResult>,
    requests: Vec<InputRequest>,
    sync_points: HashMap<Uuid, Value>,
}

/// The shared blackboard across all contexts of one engine instance.
#[derive(Debug, Default)]
pub struct CollaborationBus {
    contexts: HashMap<Uuid, ContextBoard>,
    log: Vec<CollaborationLogEntry>,
}

impl CollaborationBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, context_id: Uuid, op: CollaborationOp) {
        self.log.push(CollaborationLogEntry {
            context_id,
            ts: Utc::now(),
            op,
        });
    }

    /// Share a result into a context.
    pub fn share(&mut self, context_id: Uuid, task_id: Uuid, agent_id: &str, data: Value) {
        debug!(%context_id, %task_id, agent_id, "Collaboration share");
        self.contexts.entry(context_id).or_default().shared.insert(
            task_id,
            SharedResult {
                task_id,
                agent_id: agent_id.to_string(),
                data,
                ts: Utc::now(),
            },
        );
        self.append(
            context_id,
            CollaborationOp::Share {
                task_id,
                agent_id: agent_id.to_string(),
            },
        );
    }

    /// Request input from a context: a matching shared result is returned
    /// synchronously; otherwise the request is queued for later fulfillment.
    pub fn request_input(
        &mut self,
        context_id: Uuid,
        requester: Uuid,
        from: Option<Uuid>,
    ) -> Option<SharedResult> {
        let board = self.contexts.entry(context_id).or_default();
        let hit = match from {
            Some(task_id) => board.shared.get(&task_id).cloned(),
            None => board
                .shared
                .values()
                .min_by_key(|r| r.ts)
                .cloned(),
        };

        match hit {
            Some(result) => {
                self.append(
                    context_id,
                    CollaborationOp::RequestHit {
                        requester,
                        from: result.task_id,
                    },
                );
                Some(result)
            }
            None => {
                board.requests.push(InputRequest {
                    requester,
                    from,
                    ts: Utc::now(),
                });
                self.append(context_id, CollaborationOp::RequestQueued { requester });
                None
            }
        }
    }

    /// Record a sync point for a task within a context.
    pub fn sync(&mut self, context_id: Uuid, task_id: Uuid, payload: Value) {
        self.contexts
            .entry(context_id)
            .or_default()
            .sync_points
            .insert(task_id, payload);
        self.append(context_id, CollaborationOp::Sync { task_id });
    }

    /// Shared results for a context, oldest first.
    pub fn shared_for(&self, context_id: Uuid) -> Vec<SharedResult> {
        let mut results: Vec<SharedResult> = self
            .contexts
            .get(&context_id)
            .map(|b| b.shared.values().cloned().collect())
            .unwrap_or_default();
        results.sort_by_key(|r| r.ts);
        results
    }

    /// Pending (unfulfilled) requests for a context.
    pub fn pending_requests(&self, context_id: Uuid) -> Vec<InputRequest> {
        self.contexts
            .get(&context_id)
            .map(|b| b.requests.clone())
            .unwrap_or_default()
    }

    /// The full append-only audit log.
    pub fn log(&self) -> &[CollaborationLogEntry] {
        &self.log
    }
}
