//! Dispatcher port.
//!
//! The dispatcher is the opaque capability that carries a task to an agent
//! endpoint and returns whatever the agent answered. The wire protocol lives
//! entirely behind this trait; the engine validates the returned JSON
//! structurally before trusting it.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, Task};

/// Capability to execute a task on an agent.
///
/// A timeout inside an implementation surfaces as an `Err`, which the
/// scheduler treats like any other rejection.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Ask `agent` to execute `task`.
    ///
    /// The returned value is untrusted; the engine rejects payloads that are
    /// not well-formed result objects.
    async fn dispatch(&self, agent: &Agent, task: &Task) -> DomainResult<Value>;
}
