//! Scheduling interfaces and the shared priority-dispatch base

pub mod edf;
pub mod registry;
pub mod rm;

pub use edf::EdfPolicy;
pub use registry::scheduler_registry;
pub use rm::RmPolicy;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::model::{Decision, DecisionAction, ReadySegment, ScheduleSnapshot};

/// Sentinel priority value below every real task priority
pub const LOWEST_PRIORITY: f64 = -1e18;

/// Numeric interpretation of priority values used by the active scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityDomain {
    /// EDF: priority is the negated absolute deadline
    AbsoluteDeadline,
    /// RM/fixed-priority: priority is the negated period
    Period,
}

impl PriorityDomain {
    /// Metadata label for this domain
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityDomain::AbsoluteDeadline => "absolute_deadline",
            PriorityDomain::Period => "period",
        }
    }
}

/// Immutable platform context handed to a scheduler at build time
#[derive(Debug, Clone)]
pub struct ScheduleContext {
    pub core_ids: Vec<String>,
}

/// Scheduling interface used by the simulation core
pub trait Scheduler: Send + Sync {
    /// Initialize with immutable platform context
    fn init(&mut self, context: &ScheduleContext);

    /// Hook called when a job is released
    fn on_release(&mut self, _job_id: &str) {}

    /// Hook called when a job completes
    fn on_complete(&mut self, _job_id: &str) {}

    /// Hook called when a segment enters the ready set
    fn on_segment_ready(&mut self, _segment_key: &str) {}

    /// Produce decisions from the snapshot; must not mutate observable state
    fn schedule(&self, now: f64, snapshot: &ScheduleSnapshot) -> Vec<Decision>;

    /// Numeric priority domain of this policy
    fn priority_domain(&self) -> PriorityDomain;

    /// Map task timing attributes into this policy's priority domain
    fn task_priority_value(&self, deadline: Option<f64>, period: Option<f64>) -> f64;
}

/// Sortable priority key; lower key means higher priority.
///
/// Ends in the stable segment key so multi-core assignment never reorders
/// between runs.
#[derive(Debug, Clone)]
pub struct PriorityKey {
    numeric: Vec<f64>,
    tie_break: String,
}

impl PriorityKey {
    /// Build a key from numeric fields plus the segment-key tie-break
    pub fn new(numeric: Vec<f64>, tie_break: String) -> Self {
        Self { numeric, tie_break }
    }
}

impl PartialEq for PriorityKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityKey {}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.numeric.iter().zip(other.numeric.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        match self.numeric.len().cmp(&other.numeric.len()) {
            Ordering::Equal => self.tie_break.cmp(&other.tie_break),
            unequal => unequal,
        }
    }
}

/// Priority policy plugged into the shared dispatch base
pub trait PriorityPolicy: Send + Sync {
    /// Sortable key for one candidate; lower key means higher priority
    fn priority_key(&self, segment: &ReadySegment, now: f64) -> PriorityKey;

    /// Numeric priority domain of this policy
    fn priority_domain(&self) -> PriorityDomain;

    /// Map task timing attributes into this policy's priority domain
    fn task_priority_value(&self, deadline: Option<f64>, period: Option<f64>) -> f64;
}

/// Priority-based multi-core scheduler with side-effect-free decisions
pub struct PriorityScheduler<P: PriorityPolicy> {
    policy: P,
    core_ids: Vec<String>,
    allow_preempt: bool,
}

impl<P: PriorityPolicy> PriorityScheduler<P> {
    /// Wrap a policy; `allow_preempt=false` pins running segments to their core
    pub fn new(policy: P, allow_preempt: bool) -> Self {
        Self {
            policy,
            core_ids: Vec::new(),
            allow_preempt,
        }
    }
}

impl<P: PriorityPolicy> Scheduler for PriorityScheduler<P> {
    fn init(&mut self, context: &ScheduleContext) {
        self.core_ids = context.core_ids.clone();
    }

    fn schedule(&self, now: f64, snapshot: &ScheduleSnapshot) -> Vec<Decision> {
        let core_states: HashMap<&str, &crate::model::CoreState> = snapshot
            .core_states
            .iter()
            .map(|core| (core.core_id.as_str(), core))
            .collect();
        let running_segment_to_core: HashMap<String, &str> = snapshot
            .core_states
            .iter()
            .filter_map(|core| {
                core.running_segment
                    .as_ref()
                    .map(|seg| (seg.key(), core.core_id.as_str()))
            })
            .collect();

        let mut assignments: HashMap<&str, Option<&ReadySegment>> = HashMap::new();
        let mut used_segment_keys: HashSet<String> = HashSet::new();

        for core_id in &self.core_ids {
            let current_segment = core_states
                .get(core_id.as_str())
                .and_then(|state| state.running_segment.as_ref());

            if !self.allow_preempt {
                if let Some(current) = current_segment {
                    if !used_segment_keys.contains(&current.key()) {
                        used_segment_keys.insert(current.key());
                        assignments.insert(core_id.as_str(), Some(current));
                        continue;
                    }
                }
            }

            let mut candidates: Vec<&ReadySegment> = snapshot
                .ready_segments
                .iter()
                .filter(|segment| {
                    !used_segment_keys.contains(&segment.key())
                        && segment
                            .mapping_hint
                            .as_ref()
                            .map_or(true, |hint| hint == core_id)
                })
                .collect();
            if let Some(current) = current_segment {
                if !used_segment_keys.contains(&current.key()) {
                    candidates.push(current);
                }
            }
            if candidates.is_empty() {
                assignments.insert(core_id.as_str(), None);
                continue;
            }
            candidates.sort_by(|a, b| {
                self.policy
                    .priority_key(a, now)
                    .cmp(&self.policy.priority_key(b, now))
            });
            let chosen = candidates[0];
            used_segment_keys.insert(chosen.key());
            assignments.insert(core_id.as_str(), Some(chosen));
        }

        let mut decisions: Vec<Decision> = Vec::new();
        let mut preempted_cores: HashSet<&str> = HashSet::new();

        for core_id in &self.core_ids {
            let state = core_states.get(core_id.as_str());
            let current_key = state.and_then(|s| s.running_segment_key.clone());
            let chosen = assignments.get(core_id.as_str()).copied().flatten();
            let chosen_key = chosen.map(|seg| seg.key());

            if current_key == chosen_key {
                continue;
            }

            if let (Some(current_key), Some(_)) = (&current_key, &chosen_key) {
                decisions.push(Decision {
                    action: DecisionAction::Preempt,
                    job_id: current_key.split(':').next().map(str::to_string),
                    segment_id: Some(current_key.clone()),
                    from_core: Some(core_id.clone()),
                    to_core: None,
                    reason: Some("higher-priority segment selected".to_string()),
                });
                preempted_cores.insert(core_id.as_str());
            }

            let chosen = match chosen {
                Some(chosen) => chosen,
                None => {
                    if current_key.is_none() {
                        decisions.push(Decision {
                            action: DecisionAction::Idle,
                            job_id: None,
                            segment_id: None,
                            from_core: Some(core_id.clone()),
                            to_core: Some(core_id.clone()),
                            reason: Some("no ready segment".to_string()),
                        });
                    }
                    continue;
                }
            };

            let chosen_key = chosen.key();
            if let Some(source_core) = running_segment_to_core.get(&chosen_key) {
                if *source_core != core_id.as_str() && !preempted_cores.contains(source_core) {
                    decisions.push(Decision {
                        action: DecisionAction::Migrate,
                        job_id: Some(chosen.job_id.clone()),
                        segment_id: Some(chosen_key.clone()),
                        from_core: Some((*source_core).to_string()),
                        to_core: Some(core_id.clone()),
                        reason: Some("rebalance to target core".to_string()),
                    });
                }
            }

            decisions.push(Decision {
                action: DecisionAction::Dispatch,
                job_id: Some(chosen.job_id.clone()),
                segment_id: Some(chosen_key),
                from_core: None,
                to_core: Some(core_id.clone()),
                reason: Some("priority dispatch".to_string()),
            });
        }

        decisions
    }

    fn priority_domain(&self) -> PriorityDomain {
        self.policy.priority_domain()
    }

    fn task_priority_value(&self, deadline: Option<f64>, period: Option<f64>) -> f64 {
        self.policy.task_priority_value(deadline, period)
    }
}
