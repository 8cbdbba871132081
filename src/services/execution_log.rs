//! In-tree event sinks for the execution-record log.
//!
//! The durable log itself is an external system; these adapters cover the
//! two needs the engine has locally: structured emission into the tracing
//! pipeline, and an inspectable in-memory buffer for tests and audits.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::info;

use crate::domain::ports::{EventSink, ExecutionRecord};

/// Default retention of the in-memory sink.
const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded in-memory sink; oldest records are evicted at capacity.
#[derive(Debug)]
pub struct MemoryEventSink {
    capacity: usize,
    records: Mutex<VecDeque<ExecutionRecord>>,
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of retained records, oldest first.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Retained records for one task, oldest first.
    pub fn records_for(&self, task_id: uuid::Uuid) -> Vec<ExecutionRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.task_id == task_id)
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, record: ExecutionRecord) {
        if let Ok(mut records) = self.records.lock() {
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(record);
        }
    }
}

/// Sink that forwards records as structured tracing events under the
/// `loc::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, record: ExecutionRecord) {
        info!(
            target: "loc::events",
            task_id = %record.task_id,
            agent_id = record.agent_id.as_deref().unwrap_or("-"),
            domain = %record.domain,
            status = %record.status,
            reason = record.reason.map(|r| r.as_str()).unwrap_or("-"),
            predicted_impact = record.predicted_impact,
            actual_impact = record.actual_impact,
            confidence_score = record.confidence_score,
            execution_time_ms = record.execution_time_ms,
            collaboration = record.collaboration,
            "execution record"
        );
    }
}
