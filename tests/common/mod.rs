//! Shared helpers for integration tests.

use std::sync::Arc;

use loc::adapters::ScriptedDispatcher;
use loc::domain::models::{AgentSpec, EngineConfig, Task, TaskSpec};
use loc::services::MemoryEventSink;
use loc::Engine;

/// Domain labels used across scenarios.
pub const DOMAINS: [&str; 3] = ["analysis", "logic", "creative-writing"];

/// Engine wired to a scripted dispatcher and a memory event sink.
pub struct Harness {
    pub engine: Engine,
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub sink: Arc<MemoryEventSink>,
}

pub fn harness() -> Harness {
    let dispatcher = Arc::new(ScriptedDispatcher::new());
    let sink = Arc::new(MemoryEventSink::new());
    let engine = Engine::new(EngineConfig::with_domains(DOMAINS), dispatcher.clone())
        .with_event_sink(sink.clone());
    Harness {
        engine,
        dispatcher,
        sink,
    }
}

/// Build a valid task outside the engine, for injection-based setups.
pub fn build_task(description: &str, domain: &str, complexity: f64, priority: i64) -> Task {
    let domains: Vec<String> = DOMAINS.iter().map(ToString::to_string).collect();
    TaskSpec::new(description, domain, complexity)
        .with_priority(priority)
        .build(&domains)
        .expect("valid task")
}

impl Harness {
    /// Register a capable agent for `domain`.
    pub async fn register_agent(&self, id: &str, domain: &str, skill: f64) -> String {
        self.engine
            .register_agent(
                AgentSpec::new(id, format!("inproc://{id}"))
                    .with_domain(domain)
                    .with_skill(domain, skill),
            )
            .await
            .expect("agent registration")
    }

    /// One tick followed by a full drain of in-flight dispatches.
    pub async fn step(&self) {
        self.engine.tick().await;
        self.engine.drain().await;
    }
}
