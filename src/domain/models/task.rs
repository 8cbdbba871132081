//! Task domain model.
//!
//! Tasks are discrete units of work that agents execute. They carry a single
//! domain label, a complexity score, dependency edges, and optional sub-tasks
//! forming a flat id-keyed graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::resource::ResourceMode;

/// Status of a task in the scheduling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet dispatched (or requeued for reassignment)
    Pending,
    /// Dispatched to exactly one busy agent
    Processing,
    /// Decomposed; completion is derived from sub-tasks
    WaitingForSubtasks,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::WaitingForSubtasks => "waiting_for_subtasks",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "waiting_for_subtasks" => Some(Self::WaitingForSubtasks),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Processing, Self::WaitingForSubtasks, Self::Failed],
            // Pending is reachable again on reassignment after a poor result.
            Self::Processing => &[Self::Completed, Self::Failed, Self::Pending],
            Self::WaitingForSubtasks => &[Self::Completed, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Terminal reason attached to a failed task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    CyclicDependencyFailure,
    DependencyFailureCascade,
    MaxRetriesExhausted,
    LowConfidenceAbort,
    MalformedDispatchResult,
    InvalidTask,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CyclicDependencyFailure => "CYCLIC_DEPENDENCY_FAILURE",
            Self::DependencyFailureCascade => "DEPENDENCY_FAILURE_CASCADE",
            Self::MaxRetriesExhausted => "MAX_RETRIES_EXHAUSTED",
            Self::LowConfidenceAbort => "LOW_CONFIDENCE_ABORT",
            Self::MalformedDispatchResult => "MALFORMED_DISPATCH_RESULT",
            Self::InvalidTask => "INVALID_TASK",
        }
    }
}

/// Hint attached by the remediation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    UseCollaborationProtocol,
}

/// Validated output of a successful dispatch, stored on the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Free-form result payload produced by the agent
    pub result_data: String,
    /// Agent's self-reported confidence in [0,1]
    pub confidence_score: f64,
    /// Observed impact of the execution
    pub actual_impact: f64,
    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: u64,
    /// Agent id (or aggregator sentinel) that produced this output
    pub produced_by: String,
}

/// A unit of work in one domain, schedulable onto an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable description
    pub description: String,
    /// Domain label (member of the configured valid set)
    pub domain: String,
    /// Difficulty in [1,10]
    pub complexity: f64,
    /// Scheduling priority, clamped into [1,10]
    pub priority: i64,
    /// Tasks that must complete before this one starts
    pub dependencies: Vec<Uuid>,
    /// Child task ids (non-empty means this task is never dispatched itself)
    pub subtasks: Vec<Uuid>,
    /// Parent task (for sub-tasks)
    pub parent_id: Option<Uuid>,
    /// Domains whose active work degrades this task's predicted success
    pub interfered_by: Vec<String>,
    /// Required resource leases, by resource id
    pub resources: HashMap<String, ResourceMode>,
    /// Current status
    pub status: TaskStatus,
    /// Agent currently executing this task
    pub assigned_to: Option<String>,
    /// Number of reassignments so far
    pub retry_count: u32,
    /// Agents that already failed this task (hard-excluded from reassignment)
    pub failed_agents: HashSet<String>,
    /// Impact prediction computed at submission
    pub predicted_impact: f64,
    /// Success prediction recorded at the latest dispatch
    pub predicted_success: Option<f64>,
    /// Whether the collaboration protocol was requested for this task
    pub collaborative: bool,
    /// Remediation hint, if any
    pub suggested_action: Option<SuggestedAction>,
    /// Terminal reason when failed
    pub failure_reason: Option<FailureReason>,
    /// Stored output when completed
    pub output: Option<TaskOutput>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, updating timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> DomainResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        match new_status {
            TaskStatus::Processing => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }

        Ok(())
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether this task is a decomposition parent.
    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Validate structural soundness against the configured domain set.
    ///
    /// Runs at submission and again before every dispatch, so tasks injected
    /// around the validated path are failed rather than executed.
    pub fn validate(&self, valid_domains: &[String]) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::InvalidTask(
                "description cannot be empty".to_string(),
            ));
        }
        if !valid_domains.iter().any(|d| d == &self.domain) {
            return Err(DomainError::InvalidTask(format!(
                "unknown domain '{}'",
                self.domain
            )));
        }
        if !self.complexity.is_finite() || !(1.0..=10.0).contains(&self.complexity) {
            return Err(DomainError::InvalidTask(format!(
                "complexity {} outside [1,10]",
                self.complexity
            )));
        }
        if self.dependencies.contains(&self.id) {
            return Err(DomainError::InvalidTask(
                "task cannot depend on itself".to_string(),
            ));
        }
        Ok(())
    }
}

/// Submission schema for a new task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Human-readable description (required, non-empty)
    pub description: String,
    /// Domain label (required, from the configured valid set)
    pub domain: String,
    /// Difficulty in [1,10]
    pub complexity: f64,
    /// Scheduling priority (optional, default 1)
    pub priority: Option<i64>,
    /// Ids of tasks that must complete first
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// Domains whose active work interferes with this task
    #[serde(default)]
    pub interfered_by: Vec<String>,
    /// Required resource leases
    #[serde(default)]
    pub resources: HashMap<String, ResourceMode>,
}

impl TaskSpec {
    /// Create a spec with the required fields.
    pub fn new(description: impl Into<String>, domain: impl Into<String>, complexity: f64) -> Self {
        Self {
            description: description.into(),
            domain: domain.into(),
            complexity,
            ..Self::default()
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    /// Mark a domain as interfering.
    pub fn with_interference(mut self, domain: impl Into<String>) -> Self {
        self.interfered_by.push(domain.into());
        self
    }

    /// Require a resource lease.
    pub fn with_resource(mut self, resource_id: impl Into<String>, mode: ResourceMode) -> Self {
        self.resources.insert(resource_id.into(), mode);
        self
    }

    /// Build and validate a [`Task`] from this spec.
    ///
    /// Priority defaults to 1 and is clamped into [1,10]; the effective
    /// ceiling also bounds later remediation bumps.
    pub fn build(self, valid_domains: &[String]) -> DomainResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            description: self.description,
            domain: self.domain,
            complexity: self.complexity,
            priority: self.priority.unwrap_or(1).clamp(1, 10),
            dependencies: self.dependencies,
            subtasks: Vec::new(),
            parent_id: None,
            interfered_by: self.interfered_by,
            resources: self.resources,
            status: TaskStatus::Pending,
            assigned_to: None,
            retry_count: 0,
            failed_agents: HashSet::new(),
            predicted_impact: 0.0,
            predicted_success: None,
            collaborative: false,
            suggested_action: None,
            failure_reason: None,
            output: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        task.validate(valid_domains)?;
        Ok(task)
    }
}
