//! Event types, the append-only ledger and the pub/sub bus
//!
//! Every run produces a totally ordered event stream; for identical inputs the
//! stream, including `event_id` values, is bit-identical across runs. Ids are
//! derived from `(seed, seq, type, time, correlation_id)`, never wall clock.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{SimError, SimResult};

/// Event payload object (JSON map with deterministic key order)
pub type Payload = Map<String, Value>;

/// Simulation event kinds, serialized verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    JobReleased,
    SegmentReady,
    SegmentStart,
    SegmentEnd,
    ResourceAcquire,
    ResourceRelease,
    SegmentBlocked,
    SegmentUnblocked,
    Preempt,
    Migrate,
    DeadlineMiss,
    JobComplete,
    Error,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobReleased => "JobReleased",
            EventType::SegmentReady => "SegmentReady",
            EventType::SegmentStart => "SegmentStart",
            EventType::SegmentEnd => "SegmentEnd",
            EventType::ResourceAcquire => "ResourceAcquire",
            EventType::ResourceRelease => "ResourceRelease",
            EventType::SegmentBlocked => "SegmentBlocked",
            EventType::SegmentUnblocked => "SegmentUnblocked",
            EventType::Preempt => "Preempt",
            EventType::Migrate => "Migrate",
            EventType::DeadlineMiss => "DeadlineMiss",
            EventType::JobComplete => "JobComplete",
            EventType::Error => "Error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event envelope for tracing and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub event_id: String,
    pub seq: u64,
    pub correlation_id: String,
    pub time: f64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub payload: Payload,
}

impl SimEvent {
    /// JSON line representation of the envelope
    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string(self).map_err(|e| SimError::Format(e.to_string()))
    }
}

/// Event id derivation scheme; both variants are seed-stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventIdMode {
    /// SHA-256 over `(seed, seq, type, time, correlation_id)`
    #[default]
    Deterministic,
    /// Plain `evt-{seq:08}` counter
    Sequential,
}

impl EventIdMode {
    /// Parse a configuration label
    pub fn parse(value: &str) -> SimResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deterministic" => Ok(EventIdMode::Deterministic),
            "sequential" => Ok(EventIdMode::Sequential),
            _ => Err(SimError::config(
                "scheduler.params.event_id_mode",
                "must be deterministic|sequential",
            )),
        }
    }
}

/// Fields of an event before sequence and id assignment
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub event_type: EventType,
    pub time: f64,
    pub correlation_id: String,
    pub job_id: Option<String>,
    pub segment_id: Option<String>,
    pub core_id: Option<String>,
    pub resource_id: Option<String>,
    pub payload: Payload,
}

impl EventDraft {
    /// Start a draft with the mandatory fields
    pub fn new(event_type: EventType, time: f64, correlation_id: impl Into<String>) -> Self {
        Self {
            event_type,
            time,
            correlation_id: correlation_id.into(),
            job_id: None,
            segment_id: None,
            core_id: None,
            resource_id: None,
            payload: Payload::new(),
        }
    }

    /// Attach a job id
    pub fn job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Attach a segment id
    pub fn segment(mut self, segment_id: impl Into<String>) -> Self {
        self.segment_id = Some(segment_id.into());
        self
    }

    /// Attach a core id
    pub fn core(mut self, core_id: impl Into<String>) -> Self {
        self.core_id = Some(core_id.into());
        self
    }

    /// Attach a resource id
    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Replace the payload object
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// Append-only event ledger with sequence assignment and pub/sub fan-out
pub struct EventBus {
    id_mode: EventIdMode,
    seed: u64,
    seq: u64,
    events: Vec<SimEvent>,
}

impl EventBus {
    /// Create a bus deriving ids from the given seed
    pub fn new(id_mode: EventIdMode, seed: u64) -> Self {
        Self {
            id_mode,
            seed,
            seq: 0,
            events: Vec::new(),
        }
    }

    /// Stamp `(seq, event_id)` onto a draft and append it to the ledger.
    ///
    /// Returns a clone of the recorded envelope so the caller can fan it out.
    pub fn publish(&mut self, draft: EventDraft) -> SimEvent {
        let seq = self.seq;
        self.seq += 1;
        let event_id = self.derive_event_id(seq, &draft);
        let event = SimEvent {
            event_id,
            seq,
            correlation_id: draft.correlation_id,
            time: draft.time,
            event_type: draft.event_type,
            job_id: draft.job_id,
            segment_id: draft.segment_id,
            core_id: draft.core_id,
            resource_id: draft.resource_id,
            payload: draft.payload,
        };
        self.events.push(event.clone());
        event
    }

    /// All events published so far, in publish order
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Number of events published so far
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no event has been published
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn derive_event_id(&self, seq: u64, draft: &EventDraft) -> String {
        match self.id_mode {
            EventIdMode::Sequential => format!("evt-{seq:08}"),
            EventIdMode::Deterministic => {
                let mut hasher = Sha256::new();
                hasher.update(self.seed.to_le_bytes());
                hasher.update(seq.to_le_bytes());
                hasher.update(draft.event_type.as_str().as_bytes());
                hasher.update(draft.time.to_bits().to_le_bytes());
                hasher.update(draft.correlation_id.as_bytes());
                let digest = hasher.finalize();
                hex::encode(&digest[..8])
            }
        }
    }
}
