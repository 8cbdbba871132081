//! Resource domain model.
//!
//! Named resources gate concurrent execution: `exclusive` admits one holder,
//! `parallel` admits up to a fixed capacity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sharing semantics of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResourceMode {
    /// At most one holder at a time.
    Exclusive,
    /// Up to `capacity` simultaneous holders.
    Parallel { capacity: u32 },
}

impl ResourceMode {
    /// Maximum simultaneous holders under this mode.
    pub fn capacity(&self) -> u32 {
        match self {
            Self::Exclusive => 1,
            Self::Parallel { capacity } => (*capacity).max(1),
        }
    }
}

/// A registered resource and its current holders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Unique identifier
    pub id: String,
    /// Sharing semantics
    pub mode: ResourceMode,
    /// Tasks currently holding a lease
    pub holders: HashSet<Uuid>,
}

impl ResourceDescriptor {
    pub fn new(id: impl Into<String>, mode: ResourceMode) -> Self {
        Self {
            id: id.into(),
            mode,
            holders: HashSet::new(),
        }
    }

    /// Current number of held leases.
    pub fn current_usage(&self) -> u32 {
        self.holders.len() as u32
    }

    /// Whether one more lease fits (or is already held by `task_id`).
    pub fn admits(&self, task_id: Uuid) -> bool {
        self.holders.contains(&task_id) || self.current_usage() < self.mode.capacity()
    }
}
