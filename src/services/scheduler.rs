//! The scheduling engine: periodic tick loop, assignment, dispatch, and
//! result handling.
//!
//! One [`Engine`] instance owns one shared-nothing state (registry, store,
//! arbiter, collaboration bus) behind a single lock. The pick-task +
//! mark-busy + reserve-resources sequence runs inside one write-lock
//! critical section; dispatches are spawned outside it and re-enter the
//! lock when their result arrives, so the loop never stalls on an agent.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    validate_payload, Agent, AgentSpec, EngineConfig, FailureReason, ResourceDescriptor,
    ResourceMode, SuggestedAction, Task, TaskOutput, TaskSpec, TaskStatus,
};
use crate::domain::ports::{Dispatcher, EventSink, ExecutionRecord};
use crate::services::agent_registry::AgentRegistry;
use crate::services::aggregator::{self, AggregationEvent};
use crate::services::collaboration::{CollaborationBus, CollaborationLogEntry, SharedResult};
use crate::services::dependency_graph::DependencyGraph;
use crate::services::execution_log::TracingEventSink;
use crate::services::meta_reflection::{self, Remediation};
use crate::services::resource_arbiter::ResourceArbiter;
use crate::services::task_store::TaskStore;

/// Lifecycle of the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Created; the periodic loop is not running (manual ticks allowed)
    Idle,
    /// Periodic loop running
    Running,
    /// Stopped; no further dispatches are issued
    Stopped,
}

/// Mutable state of one engine instance. Instances share nothing.
#[derive(Debug, Default)]
pub struct EngineState {
    pub registry: AgentRegistry,
    pub store: TaskStore,
    pub arbiter: ResourceArbiter,
    pub collaboration: CollaborationBus,
}

/// Outcome of evaluating one ready task inside a tick.
#[allow(clippy::large_enum_variant)]
enum ReadyOutcome {
    /// Reserved: dispatch this pair.
    Dispatch(Task, Agent),
    /// Not schedulable right now; try the next ready task.
    Skip,
    /// Remediation or contention consumed the pass; stop until next tick.
    EndTick,
}

/// The orchestration engine.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    state: Arc<RwLock<EngineState>>,
    dispatcher: Arc<dyn Dispatcher>,
    sink: Arc<dyn EventSink>,
    graph: DependencyGraph,
    status: Arc<RwLock<EngineStatus>>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    inflight: Arc<Mutex<JoinSet<()>>>,
}

impl Engine {
    /// Create an engine with the default (tracing) event sink.
    pub fn new(config: EngineConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(EngineState::default())),
            dispatcher,
            sink: Arc::new(TracingEventSink::new()),
            graph: DependencyGraph::new(),
            status: Arc::new(RwLock::new(EngineStatus::Idle)),
            shutdown_tx,
            loop_handle: Arc::new(Mutex::new(None)),
            inflight: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Replace the event sink (e.g. with a memory sink for audits).
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn status(&self) -> EngineStatus {
        *self.status.read().await
    }

    // ------------------------------------------------------------------
    // Submission surface
    // ------------------------------------------------------------------

    /// Register an agent.
    pub async fn register_agent(&self, spec: AgentSpec) -> DomainResult<String> {
        let mut st = self.state.write().await;
        st.registry.register(spec, &self.config.domains)
    }

    /// Register a resource ahead of use.
    pub async fn register_resource(&self, id: impl Into<String>, mode: ResourceMode) {
        let mut st = self.state.write().await;
        st.arbiter.register(id, mode);
    }

    /// Submit a task; validation failures surface synchronously and nothing
    /// enters the store.
    pub async fn submit_task(&self, spec: TaskSpec) -> DomainResult<Uuid> {
        let mut st = self.state.write().await;
        let mut task = spec.build(&self.config.domains)?;
        task.predicted_impact = meta_reflection::predict_impact(&task, st.registry.list());
        st.store.insert(task)
    }

    /// Submit a sub-task under an existing parent.
    pub async fn submit_subtask(&self, parent_id: Uuid, spec: TaskSpec) -> DomainResult<Uuid> {
        let mut st = self.state.write().await;
        let mut task = spec.build(&self.config.domains)?;
        task.predicted_impact = meta_reflection::predict_impact(&task, st.registry.list());
        st.store.attach_subtask(parent_id, task)
    }

    /// Insert a pre-built task without validation (recovery tooling, tests).
    pub async fn inject_task(&self, task: Task) -> DomainResult<Uuid> {
        let mut st = self.state.write().await;
        st.store.inject(task)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub async fn task(&self, id: Uuid) -> Option<Task> {
        self.state.read().await.store.get(id).cloned()
    }

    pub async fn agent(&self, id: &str) -> Option<Agent> {
        self.state.read().await.registry.get(id).cloned()
    }

    pub async fn resource(&self, id: &str) -> Option<ResourceDescriptor> {
        self.state.read().await.arbiter.get(id).cloned()
    }

    /// Ready task ids in pick order.
    pub async fn ready_queue(&self) -> Vec<Uuid> {
        self.state.read().await.store.ready_snapshot()
    }

    // ------------------------------------------------------------------
    // Collaboration surface
    // ------------------------------------------------------------------

    /// Context id for a task: its parent, or itself when top-level.
    async fn context_of(&self, task_id: Uuid) -> DomainResult<Uuid> {
        let st = self.state.read().await;
        let task = st.store.get(task_id).ok_or(DomainError::UnknownTask(task_id))?;
        Ok(task.parent_id.unwrap_or(task_id))
    }

    /// Share a result into the task's collaboration context.
    pub async fn share_result(
        &self,
        task_id: Uuid,
        agent_id: &str,
        data: Value,
    ) -> DomainResult<()> {
        let ctx = self.context_of(task_id).await?;
        let mut st = self.state.write().await;
        st.collaboration.share(ctx, task_id, agent_id, data);
        Ok(())
    }

    /// Request input within the task's context; hits return synchronously.
    pub async fn request_input(
        &self,
        task_id: Uuid,
        from: Option<Uuid>,
    ) -> DomainResult<Option<SharedResult>> {
        let ctx = self.context_of(task_id).await?;
        let mut st = self.state.write().await;
        Ok(st.collaboration.request_input(ctx, task_id, from))
    }

    /// Record a sync point within the task's context.
    pub async fn sync_point(&self, task_id: Uuid, payload: Value) -> DomainResult<()> {
        let ctx = self.context_of(task_id).await?;
        let mut st = self.state.write().await;
        st.collaboration.sync(ctx, task_id, payload);
        Ok(())
    }

    /// The append-only collaboration audit log.
    pub async fn collaboration_log(&self) -> Vec<CollaborationLogEntry> {
        self.state.read().await.collaboration.log().to_vec()
    }

    // ------------------------------------------------------------------
    // Loop lifecycle
    // ------------------------------------------------------------------

    /// Start the periodic tick loop.
    pub async fn start(&self) {
        {
            let mut status = self.status.write().await;
            if *status != EngineStatus::Idle {
                return;
            }
            *status = EngineStatus::Running;
        }

        let engine = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_millis(self.config.scheduler.tick_interval_ms.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.tick().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Scheduler loop exited");
        });
        *self.loop_handle.lock().await = Some(handle);
        info!(tick_ms = self.config.scheduler.tick_interval_ms, "Engine started");
    }

    /// Stop the loop, drain in-flight dispatches, and seal the engine.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.loop_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.drain().await;
        *self.status.write().await = EngineStatus::Stopped;
        info!("Engine stopped");
    }

    /// Await every in-flight dispatch. Useful for deterministic tests.
    pub async fn drain(&self) {
        let mut inflight = self.inflight.lock().await;
        while let Some(joined) = inflight.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("Dispatch task panicked: {e}");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // The tick
    // ------------------------------------------------------------------

    /// Run one scheduling pass: fail cycles, pick the best ready task, and
    /// (when an assignment holds up) issue one non-blocking dispatch.
    pub async fn tick(&self) {
        if *self.status.read().await == EngineStatus::Stopped {
            return;
        }

        let job = {
            let mut st = self.state.write().await;
            self.fail_cycles(&mut st);
            self.select_and_reserve(&mut st)
        };

        if let Some((task, agent)) = job {
            let engine = self.clone();
            self.inflight.lock().await.spawn(async move {
                engine.run_dispatch(task, agent).await;
            });
        }
    }

    /// Detect dependency cycles and fail every participant, cascading.
    fn fail_cycles(&self, st: &mut EngineState) {
        let cyclic = self.graph.cycle_participants(&st.store);
        if cyclic.is_empty() {
            return;
        }
        warn!(count = cyclic.len(), "Dependency cycle detected");
        let seeds: Vec<(Uuid, FailureReason)> = cyclic
            .into_iter()
            .map(|id| (id, FailureReason::CyclicDependencyFailure))
            .collect();
        self.fail_with_cascade(st, seeds);
    }

    /// The critical section: walk the ready queue in priority order and
    /// reserve the first task whose assignment holds up.
    ///
    /// Tasks with no candidate agent are skipped so they cannot starve the
    /// rest of the queue; remediation and resource contention end the pass
    /// (the task retries next tick).
    fn select_and_reserve(&self, st: &mut EngineState) -> Option<(Task, Agent)> {
        for task_id in st.store.ready_snapshot() {
            let evaluated = self.evaluate_ready_task(st, task_id);
            match evaluated {
                ReadyOutcome::Dispatch(task, agent) => return Some((task, agent)),
                ReadyOutcome::Skip => continue,
                ReadyOutcome::EndTick => return None,
            }
        }
        None
    }

    /// Evaluate one ready task: toxic check, assignment, remediation,
    /// resource reservation.
    fn evaluate_ready_task(&self, st: &mut EngineState, task_id: Uuid) -> ReadyOutcome {
        let cfg = &self.config.scheduler;
        let Some(task) = st.store.get(task_id).cloned() else {
            return ReadyOutcome::Skip;
        };

        // Tasks injected around the validated path are failed on first
        // inspection instead of dispatched.
        if let Err(e) = task.validate(&self.config.domains) {
            warn!(task_id = %task_id, error = %e, "Refusing to dispatch invalid task");
            self.fail_with_cascade(st, vec![(task_id, FailureReason::InvalidTask)]);
            return ReadyOutcome::Skip;
        }

        let Some((agent_id, predicted)) = meta_reflection::evaluate_assignment(
            &task,
            &st.registry,
            &st.store,
            &task.failed_agents,
            cfg,
        ) else {
            return ReadyOutcome::Skip;
        };

        if predicted < cfg.remediation_threshold {
            match meta_reflection::suggest_remediation(&task, &st.registry, cfg) {
                Remediation::Split => {
                    self.split_task(st, task_id);
                    return ReadyOutcome::EndTick;
                }
                Remediation::Collaborate => {
                    if let Some(t) = st.store.get_mut(task_id) {
                        t.collaborative = true;
                        t.priority = (t.priority + 2).min(10);
                        t.suggested_action = Some(SuggestedAction::UseCollaborationProtocol);
                        t.updated_at = Utc::now();
                    }
                    info!(task_id = %task_id, predicted, "Collaboration protocol engaged");
                    // falls through to dispatch
                }
                Remediation::Reroute => {
                    debug!(task_id = %task_id, predicted, "Rerouting: waiting for agent availability");
                    return ReadyOutcome::EndTick;
                }
            }
        }

        let requirements = task.resources.clone();
        if !st.arbiter.try_acquire(task_id, &requirements) {
            debug!(task_id = %task_id, "Resources unavailable, task stays pending");
            return ReadyOutcome::EndTick;
        }

        let transitioned = match st.store.get_mut(task_id) {
            Some(t) => {
                t.assigned_to = Some(agent_id.clone());
                t.predicted_success = Some(predicted);
                t.transition_to(TaskStatus::Processing).is_ok()
            }
            None => false,
        };
        if !transitioned {
            st.arbiter.release(task_id);
            return ReadyOutcome::Skip;
        }
        if st.registry.mark_busy(&agent_id).is_err() {
            // Agent vanished between evaluation and reservation; undo.
            st.arbiter.release(task_id);
            if let Some(t) = st.store.get_mut(task_id) {
                t.assigned_to = None;
                let _ = t.transition_to(TaskStatus::Pending);
            }
            return ReadyOutcome::Skip;
        }

        let (Some(task), Some(agent)) = (
            st.store.get(task_id).cloned(),
            st.registry.get(&agent_id).cloned(),
        ) else {
            return ReadyOutcome::Skip;
        };
        info!(
            task_id = %task_id,
            agent_id = %agent_id,
            predicted_success = predicted,
            "Dispatching task"
        );
        ReadyOutcome::Dispatch(task, agent)
    }

    /// Decompose a task into two half-complexity children.
    fn split_task(&self, st: &mut EngineState, task_id: Uuid) {
        let Some(parent) = st.store.get(task_id).cloned() else {
            return;
        };
        info!(task_id = %task_id, complexity = parent.complexity, "Splitting task");

        let halves = [
            ((parent.complexity / 2.0).ceil().max(1.0), (parent.priority + 1).min(10)),
            ((parent.complexity / 2.0).floor().max(1.0), parent.priority),
        ];
        for (index, (complexity, priority)) in halves.into_iter().enumerate() {
            let spec = TaskSpec::new(
                format!("{} (part {} of 2)", parent.description, index + 1),
                parent.domain.clone(),
                complexity,
            )
            .with_priority(priority);
            match spec.build(&self.config.domains) {
                Ok(mut child) => {
                    child.interfered_by = parent.interfered_by.clone();
                    child.resources = parent.resources.clone();
                    child.predicted_impact =
                        meta_reflection::predict_impact(&child, st.registry.list());
                    if let Err(e) = st.store.attach_subtask(task_id, child) {
                        error!(task_id = %task_id, error = %e, "Failed to attach split child");
                    }
                }
                Err(e) => error!(task_id = %task_id, error = %e, "Failed to build split child"),
            }
        }

        if let Some(t) = st.store.get_mut(task_id) {
            let _ = t.transition_to(TaskStatus::WaitingForSubtasks);
        }
    }

    // ------------------------------------------------------------------
    // Dispatch result handling (runs on spawned tasks)
    // ------------------------------------------------------------------

    async fn run_dispatch(&self, task: Task, agent: Agent) {
        let result = self.dispatcher.dispatch(&agent, &task).await;

        let mut st = self.state.write().await;
        let applicable = st.store.get(task.id).is_some_and(|t| {
            t.status == TaskStatus::Processing && t.assigned_to.as_deref() == Some(agent.id.as_str())
        });
        if !applicable {
            warn!(task_id = %task.id, agent_id = %agent.id, "Discarding stale dispatch result");
            return;
        }

        match result {
            Ok(value) => match validate_payload(&value, &agent.id) {
                Ok(output)
                    if output.confidence_score
                        < self.config.scheduler.low_confidence_threshold =>
                {
                    warn!(
                        task_id = %task.id,
                        agent_id = %agent.id,
                        confidence = output.confidence_score,
                        "Low-confidence result, reassigning"
                    );
                    self.handle_setback(
                        &mut st,
                        task.id,
                        &agent.id,
                        FailureReason::LowConfidenceAbort,
                        None,
                    );
                }
                Ok(output) => self.commit(&mut st, task.id, &agent.id, output),
                Err(e) => {
                    warn!(task_id = %task.id, agent_id = %agent.id, error = %e, "Malformed dispatch result");
                    self.handle_setback(
                        &mut st,
                        task.id,
                        &agent.id,
                        FailureReason::MaxRetriesExhausted,
                        Some(FailureReason::MalformedDispatchResult),
                    );
                }
            },
            Err(e) => {
                warn!(task_id = %task.id, agent_id = %agent.id, error = %e, "Dispatch rejected");
                self.handle_setback(
                    &mut st,
                    task.id,
                    &agent.id,
                    FailureReason::MaxRetriesExhausted,
                    None,
                );
            }
        }
    }

    /// Successful completion: store output, free the pair, learn, aggregate.
    fn commit(&self, st: &mut EngineState, task_id: Uuid, agent_id: &str, output: TaskOutput) {
        st.arbiter.release(task_id);
        let _ = st.registry.mark_idle(agent_id);

        let domain = match st.store.get(task_id) {
            Some(t) => t.domain.clone(),
            None => return,
        };
        let impact = output.actual_impact;

        if let Some(t) = st.store.get_mut(task_id) {
            t.output = Some(output);
            if t.transition_to(TaskStatus::Completed).is_err() {
                return;
            }
        }
        let _ = st.registry.learn(agent_id, &domain, true, impact);

        info!(task_id = %task_id, agent_id = %agent_id, impact, "Task completed");
        self.emit(st, task_id, Some(agent_id), "completed", None);

        let events = aggregator::on_subtask_terminal(&mut st.store, &st.collaboration, task_id);
        self.handle_aggregation_events(st, events);
    }

    /// Shared path for rejections, malformed payloads, and low-confidence
    /// results: free the pair, learn a failure, and requeue or fail.
    fn handle_setback(
        &self,
        st: &mut EngineState,
        task_id: Uuid,
        agent_id: &str,
        terminal_reason: FailureReason,
        attempt_reason: Option<FailureReason>,
    ) {
        st.arbiter.release(task_id);
        let _ = st.registry.mark_idle(agent_id);

        let domain = match st.store.get(task_id) {
            Some(t) => t.domain.clone(),
            None => return,
        };
        let _ = st.registry.learn(agent_id, &domain, false, 0.0);

        let max_retries = self.config.scheduler.max_retries;
        let mut exhausted = false;
        if let Some(t) = st.store.get_mut(task_id) {
            t.failed_agents.insert(agent_id.to_string());
            t.retry_count += 1;
            t.assigned_to = None;
            exhausted = t.retry_count >= max_retries;
            if exhausted {
                t.failure_reason = Some(terminal_reason);
                let _ = t.transition_to(TaskStatus::Failed);
            } else {
                let _ = t.transition_to(TaskStatus::Pending);
            }
        }

        if exhausted {
            warn!(task_id = %task_id, reason = terminal_reason.as_str(), "Task failed terminally");
            self.emit(st, task_id, Some(agent_id), "failed", Some(terminal_reason));
            let events =
                aggregator::on_subtask_terminal(&mut st.store, &st.collaboration, task_id);
            for parent_id in self.handle_aggregation_events(st, events) {
                self.cascade_from(st, parent_id);
            }
            self.cascade_from(st, task_id);
        } else {
            self.emit(st, task_id, Some(agent_id), "reassigned", attempt_reason);
        }
    }

    // ------------------------------------------------------------------
    // Failure propagation
    // ------------------------------------------------------------------

    /// Fail each seed task (releasing anything it holds), then fail its
    /// transitive dependents and bubble through decomposition parents.
    fn fail_with_cascade(&self, st: &mut EngineState, seeds: Vec<(Uuid, FailureReason)>) {
        let mut queue: VecDeque<(Uuid, FailureReason)> = seeds.into();
        while let Some((task_id, reason)) = queue.pop_front() {
            if !self.fail_task(st, task_id, reason) {
                continue;
            }
            let events =
                aggregator::on_subtask_terminal(&mut st.store, &st.collaboration, task_id);
            for parent_id in self.handle_aggregation_events(st, events) {
                for target in self
                    .graph
                    .cascade_targets(&st.store, &HashSet::from([parent_id]))
                {
                    queue.push_back((target, FailureReason::DependencyFailureCascade));
                }
            }
            for target in self
                .graph
                .cascade_targets(&st.store, &HashSet::from([task_id]))
            {
                queue.push_back((target, FailureReason::DependencyFailureCascade));
            }
        }
    }

    /// Cascade dependents of an already-failed task.
    fn cascade_from(&self, st: &mut EngineState, failed_id: Uuid) {
        let seeds: Vec<(Uuid, FailureReason)> = self
            .graph
            .cascade_targets(&st.store, &HashSet::from([failed_id]))
            .into_iter()
            .map(|id| (id, FailureReason::DependencyFailureCascade))
            .collect();
        self.fail_with_cascade(st, seeds);
    }

    /// Force one task to `Failed`, releasing its agent and leases.
    /// Returns false when the task is missing or already terminal.
    fn fail_task(&self, st: &mut EngineState, task_id: Uuid, reason: FailureReason) -> bool {
        let Some(task) = st.store.get(task_id) else {
            return false;
        };
        if task.is_terminal() {
            return false;
        }
        let assigned = task.assigned_to.clone();

        st.arbiter.release(task_id);
        if let Some(agent_id) = assigned {
            let _ = st.registry.mark_idle(&agent_id);
        }

        let failed = match st.store.get_mut(task_id) {
            Some(t) => {
                t.failure_reason = Some(reason);
                t.transition_to(TaskStatus::Failed).is_ok()
            }
            None => false,
        };
        if failed {
            warn!(task_id = %task_id, reason = reason.as_str(), "Task failed");
            self.emit(st, task_id, None, "failed", Some(reason));
        }
        failed
    }

    /// Emit records for aggregation events; returns ids of failed parents so
    /// callers can cascade their dependents.
    fn handle_aggregation_events(
        &self,
        st: &mut EngineState,
        events: Vec<AggregationEvent>,
    ) -> Vec<Uuid> {
        let mut failed_parents = Vec::new();
        for event in events {
            match event {
                AggregationEvent::Completed(parent_id) => {
                    self.emit(
                        st,
                        parent_id,
                        Some(aggregator::AGGREGATOR_AGENT_ID),
                        "aggregated",
                        None,
                    );
                }
                AggregationEvent::Failed(parent_id) => {
                    self.emit(
                        st,
                        parent_id,
                        Some(aggregator::AGGREGATOR_AGENT_ID),
                        "failed",
                        Some(FailureReason::DependencyFailureCascade),
                    );
                    failed_parents.push(parent_id);
                }
            }
        }
        failed_parents
    }

    /// Append one execution record for a task's current snapshot.
    fn emit(
        &self,
        st: &EngineState,
        task_id: Uuid,
        agent_id: Option<&str>,
        status: &str,
        reason: Option<FailureReason>,
    ) {
        let Some(task) = st.store.get(task_id) else {
            return;
        };
        self.sink.emit(ExecutionRecord {
            timestamp: Utc::now(),
            task_id,
            agent_id: agent_id
                .map(ToString::to_string)
                .or_else(|| task.assigned_to.clone()),
            domain: task.domain.clone(),
            predicted_impact: task.predicted_impact,
            actual_impact: task.output.as_ref().map(|o| o.actual_impact),
            confidence_score: task.output.as_ref().map(|o| o.confidence_score),
            execution_time_ms: task.output.as_ref().map(|o| o.execution_time_ms),
            dependencies: task.dependencies.clone(),
            collaboration: task.collaborative,
            status: status.to_string(),
            reason,
        });
    }
}
