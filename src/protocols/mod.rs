//! Resource-sharing protocols: plain mutex, priority inheritance, priority ceiling
//!
//! Protocols keep their own tables keyed by runtime segment key and resource
//! id. They never touch engine state directly; every call returns structured
//! effects (grants, wake-ups, priority updates) for the engine to apply.

pub mod mutex;
pub mod pcp;
pub mod pip;

pub use mutex::MutexProtocol;
pub use pcp::PcpProtocol;
pub use pip::PipProtocol;

use std::collections::BTreeMap;

use crate::events::Payload;
use crate::registry::PluginRegistry;
use crate::scheduler::PriorityDomain;

/// Effective-priority changes are only reported beyond this tolerance
pub const PRIORITY_EPSILON: f64 = 1e-12;

/// Recoverable protocol signals carried in event payloads
pub mod reason {
    pub const RESOURCE_BUSY: &str = "resource_busy";
    pub const BOUND_CORE_VIOLATION: &str = "bound_core_violation";
    pub const SYSTEM_CEILING_BLOCK: &str = "system_ceiling_block";
    pub const ACQUIRE_ROLLBACK: &str = "acquire_rollback";
    pub const CANCEL_SEGMENT: &str = "cancel_segment";
}

/// Per-resource runtime attributes handed to `configure`
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRuntimeSpec {
    pub bound_core_id: String,
    pub ceiling_priority: f64,
}

/// Outcome of a resource request
#[derive(Debug, Clone, Default)]
pub struct RequestResult {
    pub granted: bool,
    pub reason: Option<String>,
    pub priority_updates: BTreeMap<String, f64>,
    pub metadata: Payload,
}

impl RequestResult {
    /// Successful grant
    pub fn granted() -> Self {
        Self {
            granted: true,
            ..Self::default()
        }
    }

    /// Denial with a recoverable reason
    pub fn denied(reason: &str) -> Self {
        Self {
            granted: false,
            reason: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// Outcome of a release or cancel: woken segments plus priority updates
#[derive(Debug, Clone, Default)]
pub struct ReleaseResult {
    pub woken: Vec<String>,
    pub priority_updates: BTreeMap<String, f64>,
    pub metadata: Payload,
}

/// Resource protocol interface for mutual exclusion and priority rules
pub trait ResourceProtocol: Send + Sync {
    /// Initialize protocol tables with per-resource runtime attributes
    fn configure(&mut self, resources: BTreeMap<String, ResourceRuntimeSpec>);

    /// Try to acquire a resource for a segment running on `core_id`
    fn request(
        &mut self,
        segment_key: &str,
        resource_id: &str,
        core_id: &str,
        priority: f64,
    ) -> RequestResult;

    /// Release a resource; returns wake-up and priority-update effects
    fn release(&mut self, segment_key: &str, resource_id: &str) -> ReleaseResult;

    /// Best-effort cleanup when a segment is aborted
    fn cancel_segment(&mut self, _segment_key: &str) -> ReleaseResult {
        ReleaseResult::default()
    }

    /// Annotate metadata with the scheduler's priority domain
    fn set_priority_domain(&mut self, _domain: PriorityDomain) {}

    /// Replace runtime ceiling values (PCP only)
    fn update_resource_ceilings(&mut self, _ceilings: &BTreeMap<String, f64>) {}
}

/// One waiter in a priority-ordered queue
#[derive(Debug, Clone)]
struct WaiterEntry {
    order: u64,
    segment_key: String,
    priority: f64,
}

/// Wait queue with in-place priority raise and best-waiter pop.
///
/// Best = highest priority; ties break on first-enqueue order.
#[derive(Debug, Clone, Default)]
pub(crate) struct WaiterQueue {
    entries: Vec<WaiterEntry>,
}

impl WaiterQueue {
    /// Enqueue or raise the recorded priority of an existing waiter
    pub(crate) fn enqueue(&mut self, segment_key: &str, priority: f64, next_order: &mut u64) {
        for entry in &mut self.entries {
            if entry.segment_key == segment_key {
                entry.priority = entry.priority.max(priority);
                return;
            }
        }
        self.entries.push(WaiterEntry {
            order: *next_order,
            segment_key: segment_key.to_string(),
            priority,
        });
        *next_order += 1;
    }

    /// Pop the highest-priority waiter (FIFO on ties)
    pub(crate) fn pop_best(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let mut best_idx = 0;
        for idx in 1..self.entries.len() {
            let best = &self.entries[best_idx];
            let cur = &self.entries[idx];
            let better = match cur.priority.total_cmp(&best.priority) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => cur.order < best.order,
                std::cmp::Ordering::Less => false,
            };
            if better {
                best_idx = idx;
            }
        }
        Some(self.entries.remove(best_idx).segment_key)
    }

    /// Drop a waiter; returns true when it was queued
    pub(crate) fn remove(&mut self, segment_key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.segment_key != segment_key);
        self.entries.len() != before
    }

    /// Highest recorded waiter priority, if any waiter is queued
    pub(crate) fn max_priority(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|entry| entry.priority)
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
    }
}

/// Registry with the built-in protocols registered
pub fn protocol_registry() -> PluginRegistry<dyn ResourceProtocol> {
    let mut registry: PluginRegistry<dyn ResourceProtocol> = PluginRegistry::new("protocol");
    registry.register("mutex", |_params| Ok(Box::new(MutexProtocol::new())));
    registry.register("pip", |_params| Ok(Box::new(PipProtocol::new())));
    registry.register("pcp", |_params| Ok(Box::new(PcpProtocol::new())));
    registry
}
