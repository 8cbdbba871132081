//! Event sink port.
//!
//! The durable log of execution records is an external collaborator; the
//! engine only appends. A record is emitted on every terminal transition, on
//! every reassignment, and on aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::FailureReason;

/// One appended execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub task_id: Uuid,
    pub agent_id: Option<String>,
    pub domain: String,
    pub predicted_impact: f64,
    pub actual_impact: Option<f64>,
    pub confidence_score: Option<f64>,
    pub execution_time_ms: Option<u64>,
    pub dependencies: Vec<Uuid>,
    pub collaboration: bool,
    /// Terminal status, "reassigned", or "aggregated"
    pub status: String,
    /// Failure reason when the record describes a failure or a failed attempt
    pub reason: Option<FailureReason>,
}

/// Append-only sink for execution records.
///
/// Emission happens inside the scheduler's critical section, so
/// implementations must not block.
pub trait EventSink: Send + Sync {
    /// Append one record.
    fn emit(&self, record: ExecutionRecord);
}
