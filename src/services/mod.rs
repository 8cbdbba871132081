//! Engine components: registries, stores, scoring, and the scheduler.

pub mod agent_registry;
pub mod aggregator;
pub mod collaboration;
pub mod compatibility;
pub mod dependency_graph;
pub mod execution_log;
pub mod meta_reflection;
pub mod resource_arbiter;
pub mod scheduler;
pub mod task_store;

pub use agent_registry::AgentRegistry;
pub use aggregator::{AggregationEvent, AGGREGATOR_AGENT_ID};
pub use collaboration::{
    CollaborationBus, CollaborationLogEntry, CollaborationOp, InputRequest, SharedResult,
};
pub use dependency_graph::DependencyGraph;
pub use execution_log::{MemoryEventSink, TracingEventSink};
pub use meta_reflection::Remediation;
pub use resource_arbiter::ResourceArbiter;
pub use scheduler::{Engine, EngineState, EngineStatus};
pub use task_store::TaskStore;
