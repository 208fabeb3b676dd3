//! Runtime types shared between the engine and its plugins

use serde::{Deserialize, Serialize};

/// Kind of a scheduling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Dispatch,
    Preempt,
    Migrate,
    Idle,
}

/// One side-effect-free scheduling decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub job_id: Option<String>,
    pub segment_id: Option<String>,
    pub from_core: Option<String>,
    pub to_core: Option<String>,
    pub reason: Option<String>,
}

/// Scheduler-facing description of a ready (or running) segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadySegment {
    pub job_id: String,
    pub task_id: String,
    pub subtask_id: String,
    pub segment_id: String,
    pub remaining_time: f64,
    pub absolute_deadline: Option<f64>,
    pub task_period: Option<f64>,
    pub mapping_hint: Option<String>,
    pub required_resources: Vec<String>,
    pub preemptible: bool,
    pub release_time: f64,
    pub priority_value: f64,
}

impl ReadySegment {
    /// Stable runtime key: `"{job_id}:{subtask_id}:{segment_id}"`
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.job_id, self.subtask_id, self.segment_id)
    }
}

/// Scheduler-facing view of one core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreState {
    pub core_id: String,
    pub core_speed: f64,
    pub running_segment_key: Option<String>,
    pub running_since: Option<f64>,
    pub running_segment: Option<ReadySegment>,
}

/// Immutable input to one scheduling round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub now: f64,
    pub ready_segments: Vec<ReadySegment>,
    pub core_states: Vec<CoreState>,
}

/// Engine-internal mutable state for one segment of one job
#[derive(Debug, Clone)]
pub struct RuntimeSegment {
    pub task_id: String,
    pub job_id: String,
    pub subtask_id: String,
    pub segment_id: String,
    pub wcet: f64,
    pub remaining_time: f64,
    pub required_resources: Vec<String>,
    pub mapping_hint: Option<String>,
    pub preemptible: bool,
    pub absolute_deadline: Option<f64>,
    pub task_period: Option<f64>,
    pub release_time: f64,
    pub segment_index: u32,
    pub base_priority: f64,
    pub effective_priority: f64,

    pub started_at: Option<f64>,
    pub running_on: Option<String>,
    pub finished: bool,
    pub blocked: bool,
    pub waiting_resource: Option<String>,
}

impl RuntimeSegment {
    /// Stable runtime key: `"{job_id}:{subtask_id}:{segment_id}"`
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.job_id, self.subtask_id, self.segment_id)
    }

    /// Snapshot view handed to the scheduler
    pub fn as_ready_segment(&self) -> ReadySegment {
        ReadySegment {
            job_id: self.job_id.clone(),
            task_id: self.task_id.clone(),
            subtask_id: self.subtask_id.clone(),
            segment_id: self.segment_id.clone(),
            remaining_time: self.remaining_time,
            absolute_deadline: self.absolute_deadline,
            task_period: self.task_period,
            mapping_hint: self.mapping_hint.clone(),
            required_resources: self.required_resources.clone(),
            preemptible: self.preemptible,
            release_time: self.release_time,
            priority_value: self.effective_priority,
        }
    }
}

/// Terminal-flag state of one job release
#[derive(Debug, Clone)]
pub struct JobState {
    pub task_id: String,
    pub job_id: String,
    pub release_time: f64,
    pub absolute_deadline: Option<f64>,
    pub completed: bool,
    pub missed_deadline: bool,
}
