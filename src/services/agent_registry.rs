//! Agent registry: descriptors, availability, and live performance stats.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentSpec, AgentStatus};
use crate::services::meta_reflection;

/// Holds every registered agent for one engine instance.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new agent. Fails with `InvalidAgent` on duplicate ids or a
    /// malformed spec.
    pub fn register(&mut self, spec: AgentSpec, valid_domains: &[String]) -> DomainResult<String> {
        if self.agents.contains_key(&spec.id) {
            return Err(DomainError::InvalidAgent(format!(
                "agent id '{}' already registered",
                spec.id
            )));
        }
        let agent = spec.build(valid_domains)?;
        let id = agent.id.clone();
        info!(agent_id = %id, domains = ?agent.domains, "Agent registered");
        self.agents.insert(id.clone(), agent);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Agents currently available for assignment.
    pub fn idle(&self) -> impl Iterator<Item = &Agent> {
        self.agents
            .values()
            .filter(|a| a.status == AgentStatus::Idle)
    }

    /// Number of agents covering a domain, regardless of availability.
    pub fn covering(&self, domain: &str) -> usize {
        self.agents.values().filter(|a| a.covers(domain)).count()
    }

    pub fn mark_busy(&mut self, id: &str) -> DomainResult<()> {
        self.set_status(id, AgentStatus::Busy)
    }

    pub fn mark_idle(&mut self, id: &str) -> DomainResult<()> {
        self.set_status(id, AgentStatus::Idle)
    }

    fn set_status(&mut self, id: &str, status: AgentStatus) -> DomainResult<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| DomainError::UnknownAgent(id.to_string()))?;
        debug!(agent_id = %id, status = status.as_str(), "Agent status change");
        agent.status = status;
        Ok(())
    }

    /// Apply a learning update to an agent's stats after an execution.
    pub fn learn(
        &mut self,
        id: &str,
        domain: &str,
        success: bool,
        impact: f64,
    ) -> DomainResult<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| DomainError::UnknownAgent(id.to_string()))?;
        meta_reflection::learn(&mut agent.perf, domain, success, impact, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec!["analysis".to_string(), "logic".to_string()]
    }

    fn registry_with_one() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(
                AgentSpec::new("a-1", "inproc://a-1")
                    .with_domain("analysis")
                    .with_skill("analysis", 7.0),
                &domains(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry_with_one();
        let agent = registry.get("a-1").unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(registry.covering("analysis"), 1);
        assert_eq!(registry.covering("logic"), 0);
    }

    #[test]
    fn test_register_without_id_generates_one() {
        let mut registry = AgentRegistry::new();
        let id = registry
            .register(AgentSpec::new("", "inproc://anon").with_domain("analysis"), &domains())
            .unwrap();
        assert!(!id.is_empty());
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = registry_with_one();
        let err = registry
            .register(
                AgentSpec::new("a-1", "inproc://other").with_domain("logic"),
                &domains(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidAgent(_)));
    }

    #[test]
    fn test_status_roundtrip() {
        let mut registry = registry_with_one();
        registry.mark_busy("a-1").unwrap();
        assert_eq!(registry.get("a-1").unwrap().status, AgentStatus::Busy);
        assert_eq!(registry.idle().count(), 0);

        registry.mark_idle("a-1").unwrap();
        assert_eq!(registry.idle().count(), 1);
    }

    #[test]
    fn test_unknown_agent_status_change() {
        let mut registry = AgentRegistry::new();
        assert!(matches!(
            registry.mark_busy("ghost"),
            Err(DomainError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_learn_touches_stats() {
        let mut registry = registry_with_one();
        registry.learn("a-1", "analysis", true, 6.0).unwrap();

        let perf = &registry.get("a-1").unwrap().perf;
        assert_eq!(perf.tasks_completed, 1);
        assert!(perf.last_active.is_some());
        assert!((perf.domain("analysis").success_rate - 1.0).abs() < f64::EPSILON);
    }
}
