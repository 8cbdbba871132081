//! Dispatcher adapters for tests and embedders.
//!
//! Production deployments implement [`Dispatcher`] over their own transport;
//! these in-process adapters cover scripted scenarios and closures.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, Task};
use crate::domain::ports::Dispatcher;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Resolve with this payload.
    Resolve(Value),
    /// Reject with this message.
    Reject(String),
}

/// Dispatcher that replays a queue of scripted replies, then falls back to a
/// default success payload. Records every (agent, task) pair it saw.
pub struct ScriptedDispatcher {
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<(String, uuid::Uuid)>>,
}

impl Default for ScriptedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply with the given confidence and impact.
    pub async fn push_success(&self, data: &str, confidence: f64, impact: f64) {
        self.script
            .lock()
            .await
            .push_back(ScriptedReply::Resolve(json!({
                "resultData": data,
                "confidenceScore": confidence,
                "actualImpact": impact,
                "executionTime": 25,
            })));
    }

    /// Queue a raw payload (e.g. a malformed one).
    pub async fn push_payload(&self, payload: Value) {
        self.script
            .lock()
            .await
            .push_back(ScriptedReply::Resolve(payload));
    }

    /// Queue a rejection.
    pub async fn push_rejection(&self, message: &str) {
        self.script
            .lock()
            .await
            .push_back(ScriptedReply::Reject(message.to_string()));
    }

    /// (agent id, task id) pairs dispatched so far.
    pub async fn calls(&self) -> Vec<(String, uuid::Uuid)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(&self, agent: &Agent, task: &Task) -> DomainResult<Value> {
        self.calls.lock().await.push((agent.id.clone(), task.id));
        let next = self.script.lock().await.pop_front();
        match next {
            Some(ScriptedReply::Resolve(value)) => Ok(value),
            Some(ScriptedReply::Reject(message)) => Err(DomainError::DispatchFailed(message)),
            None => Ok(json!({
                "resultData": format!("{} handled by {}", task.description, agent.id),
                "confidenceScore": 0.9,
                "actualImpact": task.complexity,
                "executionTime": 10,
            })),
        }
    }
}

type DispatchFn = dyn Fn(&Agent, &Task) -> DomainResult<Value> + Send + Sync;

/// Dispatcher backed by a closure; handy for per-agent behavior.
pub struct ClosureDispatcher {
    f: Arc<DispatchFn>,
}

impl ClosureDispatcher {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Agent, &Task) -> DomainResult<Value> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl Dispatcher for ClosureDispatcher {
    async fn dispatch(&self, agent: &Agent, task: &Task) -> DomainResult<Value> {
        (self.f)(agent, task)
    }
}
