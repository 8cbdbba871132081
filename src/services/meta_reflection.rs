//! Meta-reflection: success/impact prediction, outcome learning, and the
//! remediation selector.
//!
//! Everything here is a pure function of (agent, task, history snapshot), so
//! prediction and scoring stay independently testable; the scheduler owns
//! all state mutation except [`learn`], which updates one stats struct in
//! place.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::models::{Agent, AgentStatus, PerformanceStats, Task};
use crate::domain::models::config::SchedulerConfig;
use crate::services::agent_registry::AgentRegistry;
use crate::services::compatibility;
use crate::services::task_store::TaskStore;

/// Scheduler response to a low-prediction assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Decompose into two half-complexity children.
    Split,
    /// Dispatch anyway under the collaboration protocol, at boosted priority.
    Collaborate,
    /// Leave pending and wait for agent availability to change.
    Reroute,
}

/// Predicted probability that `agent` completes `task` well.
///
/// History and skill fit are blended by uncertainty: a fresh agent is judged
/// on skill, an experienced one on its record. Active interfering tasks
/// subtract a fixed penalty each, floored so no task is ever unschedulable
/// by prediction alone.
pub fn predict_success(
    agent: &Agent,
    task: &Task,
    interferers: usize,
    config: &SchedulerConfig,
) -> f64 {
    let dp = agent.perf.domain(&task.domain);
    // Seeded stats may carry a stale uncertainty; derive it when it is not a
    // usable weight.
    let uncertainty = if dp.uncertainty.is_finite() && (0.0..=1.0).contains(&dp.uncertainty) {
        dp.uncertainty
    } else {
        1.0 / (dp.tasks_completed + 1) as f64
    };

    let fit = compatibility::skill_fit(agent, task);
    let mut prediction = dp.success_rate * (1.0 - uncertainty) + fit * uncertainty;

    if interferers > 0 {
        warn!(
            task_id = %task.id,
            agent_id = %agent.id,
            interferers,
            "INTERFERENCE_DETECTED: active work in interfering domains"
        );
        prediction -= config.interference_penalty * interferers as f64;
    }

    prediction.max(config.prediction_floor)
}

/// Best (agent id, predicted success) over idle, non-excluded, compatible
/// agents; `None` when no candidate exists.
pub fn evaluate_assignment(
    task: &Task,
    registry: &AgentRegistry,
    store: &TaskStore,
    exclude: &HashSet<String>,
    config: &SchedulerConfig,
) -> Option<(String, f64)> {
    let interferers = store.active_interferers(task);

    let mut best: Option<(String, f64)> = None;
    for agent in registry.list() {
        if agent.status != AgentStatus::Idle || exclude.contains(&agent.id) {
            continue;
        }
        if compatibility::score(agent, task, config.min_compatibility).is_none() {
            continue;
        }
        let p = predict_success(agent, task, interferers, config);
        match &best {
            Some((_, current)) if *current >= p => {}
            _ => best = Some((agent.id.clone(), p)),
        }
    }
    best
}

/// Predicted impact of a task at submission time.
///
/// Blends the task's own weight (complexity scaled by priority) with the
/// fleet's observed impact in that domain, defaulting to mid-scale when no
/// history exists.
pub fn predict_impact<'a>(task: &Task, agents: impl Iterator<Item = &'a Agent>) -> f64 {
    let base_impact = task.complexity;
    let priority_multiplier = 1.0 + task.priority as f64 / 10.0;

    let mut weighted = 0.0;
    let mut total: u64 = 0;
    for agent in agents {
        let dp = agent.perf.domain(&task.domain);
        weighted += dp.average_impact * dp.tasks_completed as f64;
        total += dp.tasks_completed;
    }
    let domain_average = if total == 0 { 5.0 } else { weighted / total as f64 };

    0.6 * base_impact * priority_multiplier + 0.4 * domain_average
}

/// Fold one execution outcome into an agent's stats.
///
/// Success rate is a running mean over all executions; average impact a
/// running mean over successes only. Uncertainty shrinks with experience and
/// confidence blends the two.
pub fn learn(
    perf: &mut PerformanceStats,
    domain: &str,
    success: bool,
    impact: f64,
    now: DateTime<Utc>,
) {
    let dp = perf.domains.entry(domain.to_string()).or_default();

    dp.tasks_completed += 1;
    if success {
        dp.tasks_succeeded += 1;
        dp.average_impact += (impact - dp.average_impact) / dp.tasks_succeeded as f64;
    }
    dp.success_rate = dp.tasks_succeeded as f64 / dp.tasks_completed as f64;
    dp.uncertainty = 1.0 / (dp.tasks_completed + 1) as f64;
    dp.confidence = 0.7 * dp.success_rate + 0.3 * (1.0 - dp.uncertainty);

    perf.tasks_completed += 1;
    if success {
        perf.tasks_succeeded += 1;
        perf.average_impact += (impact - perf.average_impact) / perf.tasks_succeeded as f64;
    }
    perf.success_rate = perf.tasks_succeeded as f64 / perf.tasks_completed as f64;
    perf.last_active = Some(now);
}

/// Pick a remediation for a task no agent is predicted to handle well.
pub fn suggest_remediation(
    task: &Task,
    registry: &AgentRegistry,
    config: &SchedulerConfig,
) -> Remediation {
    if task.complexity > config.split_complexity {
        Remediation::Split
    } else if registry.covering(&task.domain) >= 2 {
        Remediation::Collaborate
    } else {
        Remediation::Reroute
    }
}
