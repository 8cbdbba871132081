//! Domain models.

pub mod agent;
pub mod config;
pub mod outcome;
pub mod resource;
pub mod task;

pub use agent::{Agent, AgentSpec, AgentStatus, DomainPerformance, PerformanceStats};
pub use config::{EngineConfig, LogConfig, LogFormat, RotationPolicy, SchedulerConfig};
pub use outcome::{validate_payload, PayloadError};
pub use resource::{ResourceDescriptor, ResourceMode};
pub use task::{FailureReason, SuggestedAction, Task, TaskOutput, TaskSpec, TaskStatus};
