//! Resource arbiter: named leases with exclusive or bounded-parallel modes.
//!
//! Acquisition is all-or-nothing across every requested resource, so a task
//! can never hold a partial set of leases and deadlock another holder.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{ResourceDescriptor, ResourceMode};

/// Lease ledger for one engine instance.
#[derive(Debug, Default)]
pub struct ResourceArbiter {
    resources: HashMap<String, ResourceDescriptor>,
}

impl ResourceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Re-registering an id keeps the existing ledger.
    pub fn register(&mut self, id: impl Into<String>, mode: ResourceMode) {
        let id = id.into();
        self.resources
            .entry(id.clone())
            .or_insert_with(|| ResourceDescriptor::new(id, mode));
    }

    pub fn get(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }

    /// Acquire every requested lease for `task_id`, or none of them.
    ///
    /// Resources named in requirements but never registered are created on
    /// first use with the requested mode.
    pub fn try_acquire(
        &mut self,
        task_id: Uuid,
        requirements: &HashMap<String, ResourceMode>,
    ) -> bool {
        if requirements.is_empty() {
            return true;
        }

        for (id, mode) in requirements {
            self.register(id.clone(), *mode);
        }

        let admitted = requirements.keys().all(|id| {
            self.resources
                .get(id)
                .is_some_and(|r| r.admits(task_id))
        });
        if !admitted {
            return false;
        }

        for id in requirements.keys() {
            if let Some(resource) = self.resources.get_mut(id) {
                resource.holders.insert(task_id);
            }
        }
        debug!(task_id = %task_id, resources = ?requirements.keys().collect::<Vec<_>>(), "Leases acquired");
        true
    }

    /// Release every lease held by `task_id`.
    pub fn release(&mut self, task_id: Uuid) {
        for resource in self.resources.values_mut() {
            resource.holders.remove(&task_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclusive(id: &str) -> HashMap<String, ResourceMode> {
        [(id.to_string(), ResourceMode::Exclusive)].into_iter().collect()
    }

    #[test]
    fn test_exclusive_admits_one_holder() {
        let mut arbiter = ResourceArbiter::new();
        arbiter.register("db", ResourceMode::Exclusive);

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(arbiter.try_acquire(a, &exclusive("db")));
        assert!(!arbiter.try_acquire(b, &exclusive("db")));

        arbiter.release(a);
        assert!(arbiter.try_acquire(b, &exclusive("db")));
    }

    #[test]
    fn test_parallel_capacity_bound() {
        let mut arbiter = ResourceArbiter::new();
        arbiter.register("pool", ResourceMode::Parallel { capacity: 2 });
        let req: HashMap<String, ResourceMode> =
            [("pool".to_string(), ResourceMode::Parallel { capacity: 2 })]
                .into_iter()
                .collect();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(arbiter.try_acquire(a, &req));
        assert!(arbiter.try_acquire(b, &req));
        assert!(!arbiter.try_acquire(c, &req));
        assert_eq!(arbiter.get("pool").unwrap().current_usage(), 2);
    }

    #[test]
    fn test_all_or_nothing_acquisition() {
        let mut arbiter = ResourceArbiter::new();
        arbiter.register("a", ResourceMode::Exclusive);
        arbiter.register("b", ResourceMode::Exclusive);

        let holder = Uuid::new_v4();
        assert!(arbiter.try_acquire(holder, &exclusive("b")));

        // Requesting {a, b} must not leave a held on failure
        let both: HashMap<String, ResourceMode> = [
            ("a".to_string(), ResourceMode::Exclusive),
            ("b".to_string(), ResourceMode::Exclusive),
        ]
        .into_iter()
        .collect();
        let contender = Uuid::new_v4();
        assert!(!arbiter.try_acquire(contender, &both));
        assert_eq!(arbiter.get("a").unwrap().current_usage(), 0);
    }

    #[test]
    fn test_unregistered_resource_created_on_demand() {
        let mut arbiter = ResourceArbiter::new();
        let task = Uuid::new_v4();
        assert!(arbiter.try_acquire(task, &exclusive("fresh")));
        assert_eq!(arbiter.get("fresh").unwrap().mode, ResourceMode::Exclusive);
    }

    #[test]
    fn test_empty_requirements_always_succeed() {
        let mut arbiter = ResourceArbiter::new();
        assert!(arbiter.try_acquire(Uuid::new_v4(), &HashMap::new()));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut arbiter = ResourceArbiter::new();
        let task = Uuid::new_v4();
        assert!(arbiter.try_acquire(task, &exclusive("db")));
        arbiter.release(task);
        arbiter.release(task);
        assert_eq!(arbiter.get("db").unwrap().current_usage(), 0);
    }
}
