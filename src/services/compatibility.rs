//! Compatibility scoring between agents and tasks.
//!
//! A pure function of (agent, task): no engine state, no side effects, so it
//! is independently testable and reusable from prediction code.

use crate::domain::models::{Agent, Task};

/// Weight of domain membership in the final score.
const DOMAIN_WEIGHT: f64 = 0.4;
/// Weight of skill-vs-complexity fit.
const SKILL_WEIGHT: f64 = 0.3;
/// Weight of the agent's global success rate.
const HISTORY_WEIGHT: f64 = 0.2;
/// Weight of the reliability buffer (experience + task priority).
const RELIABILITY_WEIGHT: f64 = 0.1;

/// Executions after which the experience term saturates.
const EXPERIENCE_SATURATION: f64 = 50.0;

/// Skill-vs-complexity fit in [0,1].
///
/// 1.0 once the (normalized) skill covers the (normalized) complexity,
/// proportional shortfall below that.
pub fn skill_fit(agent: &Agent, task: &Task) -> f64 {
    let ns = agent.skill_for(&task.domain) / 10.0;
    let nc = task.complexity / 10.0;
    if nc <= 0.0 || ns >= nc {
        1.0
    } else {
        (ns / nc).clamp(0.0, 1.0)
    }
}

/// Compatibility score in [0,1], or `None` when the agent is rejected.
///
/// Agents scoring below `min_compatibility` are not candidates at all.
pub fn score(agent: &Agent, task: &Task, min_compatibility: f64) -> Option<f64> {
    let domain_component = if agent.covers(&task.domain) { 1.0 } else { 0.0 };

    let history_component = if agent.perf.tasks_completed == 0 {
        0.5
    } else {
        agent.perf.success_rate
    };

    let experience = (agent.perf.tasks_completed as f64 / EXPERIENCE_SATURATION).min(1.0);
    let priority_pressure = (task.priority as f64 / 10.0).clamp(0.0, 1.0);
    let reliability_component = 0.5 * experience + 0.5 * priority_pressure;

    let total = DOMAIN_WEIGHT * domain_component
        + SKILL_WEIGHT * skill_fit(agent, task)
        + HISTORY_WEIGHT * history_component
        + RELIABILITY_WEIGHT * reliability_component;

    if total < min_compatibility {
        None
    } else {
        Some(total.clamp(0.0, 1.0))
    }
}
