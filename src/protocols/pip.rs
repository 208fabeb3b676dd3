//! Priority Inheritance Protocol (PIP)

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use crate::scheduler::PriorityDomain;

use super::{
    reason, ReleaseResult, RequestResult, ResourceProtocol, ResourceRuntimeSpec, WaiterQueue,
    PRIORITY_EPSILON,
};

/// Mutex plus priority inheritance driven by waiting segments.
///
/// The owner of a contended resource inherits the maximum waiter priority
/// across all resources it holds; inheritance decays as waiters leave.
pub struct PipProtocol {
    bound_cores: BTreeMap<String, String>,
    owners: BTreeMap<String, Option<String>>,
    waiters: BTreeMap<String, WaiterQueue>,
    held_by_segment: BTreeMap<String, BTreeSet<String>>,
    base_priority: BTreeMap<String, f64>,
    effective_priority: BTreeMap<String, f64>,
    next_order: u64,
    domain: Option<PriorityDomain>,
}

impl PipProtocol {
    pub fn new() -> Self {
        Self {
            bound_cores: BTreeMap::new(),
            owners: BTreeMap::new(),
            waiters: BTreeMap::new(),
            held_by_segment: BTreeMap::new(),
            base_priority: BTreeMap::new(),
            effective_priority: BTreeMap::new(),
            next_order: 0,
            domain: None,
        }
    }

    fn register_segment_priority(&mut self, segment_key: &str, priority: f64) {
        if !self.base_priority.contains_key(segment_key) {
            self.base_priority.insert(segment_key.to_string(), priority);
            self.effective_priority
                .insert(segment_key.to_string(), priority);
        }
    }

    /// Recompute inherited priority; returns an update only on real change
    fn recompute_segment_priority(&mut self, segment_key: &str) -> BTreeMap<String, f64> {
        let base = match self.base_priority.get(segment_key) {
            Some(base) => *base,
            None => return BTreeMap::new(),
        };
        let mut inherited = base;
        if let Some(held) = self.held_by_segment.get(segment_key) {
            for resource_id in held {
                if let Some(max) = self.waiters.get(resource_id).and_then(WaiterQueue::max_priority)
                {
                    inherited = inherited.max(max);
                }
            }
        }
        let prev = self
            .effective_priority
            .get(segment_key)
            .copied()
            .unwrap_or(base);
        self.effective_priority
            .insert(segment_key.to_string(), inherited);
        if (prev - inherited).abs() <= PRIORITY_EPSILON {
            BTreeMap::new()
        } else {
            BTreeMap::from([(segment_key.to_string(), inherited)])
        }
    }

    fn annotate(&self, result: &mut RequestResult) {
        if let Some(domain) = self.domain {
            result
                .metadata
                .insert("priority_domain".to_string(), json!(domain.as_str()));
        }
    }
}

impl Default for PipProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProtocol for PipProtocol {
    fn configure(&mut self, resources: BTreeMap<String, ResourceRuntimeSpec>) {
        self.bound_cores = resources
            .iter()
            .map(|(id, spec)| (id.clone(), spec.bound_core_id.clone()))
            .collect();
        self.owners = resources.keys().map(|id| (id.clone(), None)).collect();
        self.waiters = BTreeMap::new();
        self.held_by_segment = BTreeMap::new();
        self.base_priority = BTreeMap::new();
        self.effective_priority = BTreeMap::new();
        self.next_order = 0;
    }

    fn request(
        &mut self,
        segment_key: &str,
        resource_id: &str,
        core_id: &str,
        priority: f64,
    ) -> RequestResult {
        match self.bound_cores.get(resource_id) {
            Some(bound_core) if bound_core == core_id => {}
            _ => return RequestResult::denied(reason::BOUND_CORE_VIOLATION),
        }

        self.register_segment_priority(segment_key, priority);

        let owner = self
            .owners
            .get(resource_id)
            .cloned()
            .unwrap_or(None);
        match owner {
            None => {
                self.owners
                    .insert(resource_id.to_string(), Some(segment_key.to_string()));
                self.held_by_segment
                    .entry(segment_key.to_string())
                    .or_default()
                    .insert(resource_id.to_string());
                let mut result = RequestResult::granted();
                result.priority_updates = self.recompute_segment_priority(segment_key);
                self.annotate(&mut result);
                result
            }
            Some(current) if current == segment_key => {
                let mut result = RequestResult::granted();
                result.priority_updates = self.recompute_segment_priority(segment_key);
                self.annotate(&mut result);
                result
            }
            Some(current) => {
                self.waiters
                    .entry(resource_id.to_string())
                    .or_default()
                    .enqueue(segment_key, priority, &mut self.next_order);
                let mut result = RequestResult::denied(reason::RESOURCE_BUSY);
                result.priority_updates = self.recompute_segment_priority(&current);
                result
                    .metadata
                    .insert("owner_segment".to_string(), json!(current));
                self.annotate(&mut result);
                result
            }
        }
    }

    fn release(&mut self, segment_key: &str, resource_id: &str) -> ReleaseResult {
        match self.owners.get(resource_id) {
            Some(Some(owner)) if owner == segment_key => {}
            _ => return ReleaseResult::default(),
        }
        self.owners.insert(resource_id.to_string(), None);
        if let Some(held) = self.held_by_segment.get_mut(segment_key) {
            held.remove(resource_id);
        }

        let mut result = ReleaseResult::default();
        let next_waiter = self
            .waiters
            .get_mut(resource_id)
            .and_then(WaiterQueue::pop_best);
        if let Some(next_waiter) = next_waiter {
            self.owners
                .insert(resource_id.to_string(), Some(next_waiter.clone()));
            self.held_by_segment
                .entry(next_waiter.clone())
                .or_default()
                .insert(resource_id.to_string());
            result
                .priority_updates
                .extend(self.recompute_segment_priority(&next_waiter));
            result.woken.push(next_waiter);
        }
        result
            .priority_updates
            .extend(self.recompute_segment_priority(segment_key));
        result
    }

    fn cancel_segment(&mut self, segment_key: &str) -> ReleaseResult {
        let mut result = ReleaseResult::default();

        // Leave every wait queue; owners of those resources may lose inheritance.
        let mut affected_owners: BTreeSet<String> = BTreeSet::new();
        let resource_ids: Vec<String> = self.waiters.keys().cloned().collect();
        for resource_id in resource_ids {
            let removed = self
                .waiters
                .get_mut(&resource_id)
                .map(|queue| queue.remove(segment_key))
                .unwrap_or(false);
            if removed {
                if let Some(Some(owner)) = self.owners.get(&resource_id) {
                    if owner != segment_key {
                        affected_owners.insert(owner.clone());
                    }
                }
            }
        }

        // Release everything it owns through the normal release path.
        let owned: Vec<String> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_deref() == Some(segment_key))
            .map(|(resource_id, _)| resource_id.clone())
            .collect();
        for resource_id in owned {
            let released = self.release(segment_key, &resource_id);
            for woken in released.woken {
                if !result.woken.contains(&woken) {
                    result.woken.push(woken);
                }
            }
            result.priority_updates.extend(released.priority_updates);
        }

        for owner in affected_owners {
            result
                .priority_updates
                .extend(self.recompute_segment_priority(&owner));
        }

        self.held_by_segment.remove(segment_key);
        self.base_priority.remove(segment_key);
        self.effective_priority.remove(segment_key);
        result
    }

    fn set_priority_domain(&mut self, domain: PriorityDomain) {
        self.domain = Some(domain);
    }
}
