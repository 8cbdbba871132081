//! LOC - Lightweight Orchestration Core
//!
//! A task-scheduling engine that dispatches heterogeneous units of work to a
//! pool of registered agents with:
//! - Compatibility scoring and predictive assignment
//! - Dependency graphs with cycle detection and failure cascades
//! - Named resource leases (exclusive or bounded-parallel)
//! - Remediation of low-confidence assignments (split / collaborate / reroute)
//! - Outcome-driven performance learning that feeds back into scheduling

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Agent, AgentSpec, AgentStatus, EngineConfig, FailureReason, ResourceMode, Task, TaskOutput,
    TaskSpec, TaskStatus,
};
pub use domain::ports::{Dispatcher, EventSink, ExecutionRecord};
pub use services::{Engine, EngineStatus};
