//! Agent domain model.
//!
//! Agents are executors described by domain coverage and a skill vector,
//! reached through an opaque dispatch endpoint. Scheduling mutates only the
//! status field; performance stats are mutated only by learning updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Available for assignment
    Idle,
    /// Executing a task
    Busy,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }
}

/// Per-domain execution statistics for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPerformance {
    /// Executions finished (success or failure) in this domain
    pub tasks_completed: u64,
    /// Successful executions in this domain
    pub tasks_succeeded: u64,
    /// Running success ratio in [0,1]
    pub success_rate: f64,
    /// Running mean impact over successful executions
    pub average_impact: f64,
    /// Shrinks with experience: 1/(tasks_completed + 1)
    pub uncertainty: f64,
    /// Blend of success rate and experience in [0,1]
    pub confidence: f64,
}

impl Default for DomainPerformance {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_succeeded: 0,
            success_rate: 0.5,
            average_impact: 0.0,
            uncertainty: 1.0,
            confidence: 0.0,
        }
    }
}

/// Performance stats: per-domain entries plus global rollups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Domain-indexed statistics
    pub domains: HashMap<String, DomainPerformance>,
    /// Total executions across domains
    pub tasks_completed: u64,
    /// Total successes across domains
    pub tasks_succeeded: u64,
    /// Global success ratio in [0,1]
    pub success_rate: f64,
    /// Global running mean impact over successes
    pub average_impact: f64,
    /// Last time a learning update touched this agent
    pub last_active: Option<DateTime<Utc>>,
}

impl PerformanceStats {
    /// Domain entry, or the no-history default.
    pub fn domain(&self, domain: &str) -> DomainPerformance {
        self.domains.get(domain).cloned().unwrap_or_default()
    }
}

/// An executor registered with the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: String,
    /// Domains this agent covers
    pub domains: Vec<String>,
    /// Skill per domain, each in [0,10]
    pub skills: HashMap<String, f64>,
    /// Opaque endpoint handle consumed by the dispatcher
    pub endpoint: String,
    /// Availability
    pub status: AgentStatus,
    /// Execution statistics
    pub perf: PerformanceStats,
    /// When registered
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Whether this agent covers the given domain.
    pub fn covers(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }

    /// Skill for a domain; absent domains fall back to 70% of the mean skill.
    pub fn skill_for(&self, domain: &str) -> f64 {
        if let Some(s) = self.skills.get(domain) {
            return *s;
        }
        if self.skills.is_empty() {
            return 0.0;
        }
        let mean = self.skills.values().sum::<f64>() / self.skills.len() as f64;
        0.7 * mean
    }
}

/// Submission schema for registering an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique identifier; auto-generated when omitted
    #[serde(default)]
    pub id: String,
    /// Covered domains (required, non-empty, from the configured valid set)
    pub domains: Vec<String>,
    /// Skill per domain, each in [0,10]
    #[serde(default)]
    pub skills: HashMap<String, f64>,
    /// Opaque endpoint handle (required, non-empty)
    pub endpoint: String,
    /// Optional seed statistics; zeroed rollups when absent
    #[serde(default)]
    pub performance: Option<PerformanceStats>,
}

impl AgentSpec {
    /// Create a spec with the required fields.
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Add a covered domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    /// Set the skill score for a domain.
    pub fn with_skill(mut self, domain: impl Into<String>, score: f64) -> Self {
        self.skills.insert(domain.into(), score);
        self
    }

    /// Seed performance stats (e.g. migrated history).
    pub fn with_performance(mut self, perf: PerformanceStats) -> Self {
        self.performance = Some(perf);
        self
    }

    /// Build and validate an [`Agent`] from this spec.
    ///
    /// The id is optional: an omitted or blank id gets a generated v4 uuid,
    /// the same way task ids are always generated.
    pub fn build(self, valid_domains: &[String]) -> DomainResult<Agent> {
        let id = if self.id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.id
        };
        if self.endpoint.trim().is_empty() {
            return Err(DomainError::InvalidAgent(format!(
                "agent '{id}' has no endpoint"
            )));
        }
        if self.domains.is_empty() {
            return Err(DomainError::InvalidAgent(format!(
                "agent '{id}' covers no domains"
            )));
        }
        for domain in &self.domains {
            if !valid_domains.iter().any(|d| d == domain) {
                return Err(DomainError::InvalidAgent(format!(
                    "agent '{id}' references unknown domain '{domain}'"
                )));
            }
        }
        for (domain, score) in &self.skills {
            if !score.is_finite() || !(0.0..=10.0).contains(score) {
                return Err(DomainError::InvalidAgent(format!(
                    "agent '{id}' skill for '{domain}' is {score}, expected [0,10]"
                )));
            }
        }

        Ok(Agent {
            id,
            domains: self.domains,
            skills: self.skills,
            endpoint: self.endpoint,
            status: AgentStatus::Idle,
            perf: self.performance.unwrap_or_default(),
            registered_at: Utc::now(),
        })
    }
}
