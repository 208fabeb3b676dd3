//! FIFO mutex protocol

use std::collections::{BTreeMap, VecDeque};

use super::{reason, ReleaseResult, RequestResult, ResourceProtocol, ResourceRuntimeSpec};

/// FIFO mutex with the bound-core rule
pub struct MutexProtocol {
    bound_cores: BTreeMap<String, String>,
    owners: BTreeMap<String, Option<String>>,
    waiters: BTreeMap<String, VecDeque<String>>,
}

impl MutexProtocol {
    pub fn new() -> Self {
        Self {
            bound_cores: BTreeMap::new(),
            owners: BTreeMap::new(),
            waiters: BTreeMap::new(),
        }
    }
}

impl Default for MutexProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProtocol for MutexProtocol {
    fn configure(&mut self, resources: BTreeMap<String, ResourceRuntimeSpec>) {
        self.bound_cores = resources
            .iter()
            .map(|(id, spec)| (id.clone(), spec.bound_core_id.clone()))
            .collect();
        self.owners = resources.keys().map(|id| (id.clone(), None)).collect();
        self.waiters = BTreeMap::new();
    }

    fn request(
        &mut self,
        segment_key: &str,
        resource_id: &str,
        core_id: &str,
        _priority: f64,
    ) -> RequestResult {
        match self.bound_cores.get(resource_id) {
            Some(bound_core) if bound_core == core_id => {}
            _ => return RequestResult::denied(reason::BOUND_CORE_VIOLATION),
        }

        let owner = self.owners.entry(resource_id.to_string()).or_insert(None);
        match owner {
            None => {
                *owner = Some(segment_key.to_string());
                RequestResult::granted()
            }
            Some(current) if current == segment_key => RequestResult::granted(),
            Some(current) => {
                let current = current.clone();
                let queue = self.waiters.entry(resource_id.to_string()).or_default();
                if !queue.iter().any(|waiter| waiter == segment_key) {
                    queue.push_back(segment_key.to_string());
                }
                let mut result = RequestResult::denied(reason::RESOURCE_BUSY);
                result
                    .metadata
                    .insert("owner_segment".to_string(), serde_json::json!(current));
                result
            }
        }
    }

    fn release(&mut self, segment_key: &str, resource_id: &str) -> ReleaseResult {
        match self.owners.get_mut(resource_id) {
            Some(owner) if owner.as_deref() == Some(segment_key) => *owner = None,
            _ => return ReleaseResult::default(),
        }
        let mut result = ReleaseResult::default();
        if let Some(queue) = self.waiters.get_mut(resource_id) {
            if let Some(next_segment) = queue.pop_front() {
                self.owners
                    .insert(resource_id.to_string(), Some(next_segment.clone()));
                result.woken.push(next_segment);
            }
        }
        result
    }

    fn cancel_segment(&mut self, segment_key: &str) -> ReleaseResult {
        for queue in self.waiters.values_mut() {
            queue.retain(|waiter| waiter != segment_key);
        }
        let owned: Vec<String> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_deref() == Some(segment_key))
            .map(|(resource_id, _)| resource_id.clone())
            .collect();
        let mut result = ReleaseResult::default();
        for resource_id in owned {
            let released = self.release(segment_key, &resource_id);
            for woken in released.woken {
                if !result.woken.contains(&woken) {
                    result.woken.push(woken);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> MutexProtocol {
        let mut protocol = MutexProtocol::new();
        protocol.configure(
            [(
                "r0".to_string(),
                ResourceRuntimeSpec {
                    bound_core_id: "c0".to_string(),
                    ceiling_priority: 0.0,
                },
            )]
            .into(),
        );
        protocol
    }

    #[test]
    fn free_resource_is_granted() {
        let mut protocol = configured();
        assert!(protocol.request("segA", "r0", "c0", 0.0).granted);
    }

    #[test]
    fn reentrant_request_stays_granted() {
        let mut protocol = configured();
        assert!(protocol.request("segA", "r0", "c0", 0.0).granted);
        assert!(protocol.request("segA", "r0", "c0", 0.0).granted);
    }

    #[test]
    fn wrong_core_is_a_bound_core_violation() {
        let mut protocol = configured();
        let result = protocol.request("segA", "r0", "c1", 0.0);
        assert!(!result.granted);
        assert_eq!(result.reason.as_deref(), Some(reason::BOUND_CORE_VIOLATION));
    }

    #[test]
    fn waiters_are_woken_fifo_without_requeue() {
        let mut protocol = configured();
        assert!(protocol.request("owner", "r0", "c0", 0.0).granted);
        assert!(!protocol.request("w1", "r0", "c0", 0.0).granted);
        assert!(!protocol.request("w2", "r0", "c0", 0.0).granted);
        // Duplicate request must not enqueue twice.
        assert!(!protocol.request("w1", "r0", "c0", 0.0).granted);

        let first = protocol.release("owner", "r0");
        assert_eq!(first.woken, vec!["w1".to_string()]);
        let second = protocol.release("w1", "r0");
        assert_eq!(second.woken, vec!["w2".to_string()]);
        assert!(protocol.release("w2", "r0").woken.is_empty());
    }

    #[test]
    fn release_by_non_owner_is_a_noop() {
        let mut protocol = configured();
        assert!(protocol.request("owner", "r0", "c0", 0.0).granted);
        assert!(protocol.release("stranger", "r0").woken.is_empty());
        // Owner still holds the lock.
        assert!(!protocol.request("other", "r0", "c0", 0.0).granted);
    }

    #[test]
    fn cancel_releases_ownership_and_purges_queues() {
        let mut protocol = configured();
        assert!(protocol.request("owner", "r0", "c0", 0.0).granted);
        assert!(!protocol.request("w1", "r0", "c0", 0.0).granted);
        let cancel = protocol.cancel_segment("owner");
        assert_eq!(cancel.woken, vec!["w1".to_string()]);
        assert!(protocol.cancel_segment("ghost").woken.is_empty());
    }
}
