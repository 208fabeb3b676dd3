//! Shared fixtures for integration tests
//!
//! Payload builders mirror the on-disk config shape so tests read like the
//! scenarios they encode.

#![allow(dead_code)]

use serde_json::{json, Value};

use taskset_sim::events::SimEvent;
use taskset_sim::{ConfigLoader, MetricsReport, ModelSpec, SimEngine};

/// One core `c0`, no resources, EDF, duration 20, seed 7
pub fn single_core_payload() -> Value {
    json!({
        "version": "0.2",
        "platform": {
            "processor_types": [
                {"id": "CPU", "name": "cpu", "core_count": 1, "speed_factor": 1.0}
            ],
            "cores": [{"id": "c0", "type_id": "CPU", "speed_factor": 1.0}]
        },
        "resources": [],
        "tasks": [],
        "scheduler": {"name": "edf", "params": {}},
        "sim": {"duration": 20.0, "seed": 7}
    })
}

/// Two cores `c0`/`c1`, no resources, EDF, duration 20, seed 7
pub fn dual_core_payload() -> Value {
    json!({
        "version": "0.2",
        "platform": {
            "processor_types": [
                {"id": "CPU", "name": "cpu", "core_count": 2, "speed_factor": 1.0}
            ],
            "cores": [
                {"id": "c0", "type_id": "CPU", "speed_factor": 1.0},
                {"id": "c1", "type_id": "CPU", "speed_factor": 1.0}
            ]
        },
        "resources": [],
        "tasks": [],
        "scheduler": {"name": "edf", "params": {}},
        "sim": {"duration": 20.0, "seed": 7}
    })
}

/// A resource entry bound to a core under a protocol
pub fn resource(id: &str, bound_core: &str, protocol: &str) -> Value {
    json!({"id": id, "name": id, "bound_core_id": bound_core, "protocol": protocol})
}

/// A dynamic_rt task with one subtask and one segment
pub fn simple_task(id: &str, deadline: f64, arrival: f64, wcet: f64, resources: &[&str]) -> Value {
    json!({
        "id": id,
        "name": id,
        "task_type": "dynamic_rt",
        "deadline": deadline,
        "arrival": arrival,
        "subtasks": [{
            "id": "s0",
            "predecessors": [],
            "successors": [],
            "segments": [{
                "id": "seg0",
                "index": 1,
                "wcet": wcet,
                "required_resources": resources
            }]
        }]
    })
}

/// Validate a payload into a model
pub fn load(payload: Value) -> ModelSpec {
    ConfigLoader::new()
        .load_value(payload)
        .expect("payload should validate")
}

/// Run a payload to completion
pub struct RunResult {
    pub events: Vec<SimEvent>,
    pub report: MetricsReport,
    pub final_time: f64,
    pub failed: bool,
}

pub fn run_payload(payload: Value) -> RunResult {
    let mut engine = SimEngine::new();
    engine.build(load(payload)).expect("build should succeed");
    engine.run(None).expect("run should succeed");
    RunResult {
        events: engine.events().to_vec(),
        report: engine.metrics_report(),
        final_time: engine.now(),
        failed: engine.failed(),
    }
}

/// Events of one type, in publish order
pub fn of_type<'a>(events: &'a [SimEvent], type_name: &str) -> Vec<&'a SimEvent> {
    events
        .iter()
        .filter(|event| event.event_type.as_str() == type_name)
        .collect()
}

/// First event of a type whose job id starts with the prefix
pub fn first_for_job<'a>(
    events: &'a [SimEvent],
    type_name: &str,
    job_prefix: &str,
) -> Option<&'a SimEvent> {
    events.iter().find(|event| {
        event.event_type.as_str() == type_name
            && event
                .job_id
                .as_deref()
                .map_or(false, |job| job.starts_with(job_prefix))
    })
}

/// Assert the universal event-stream invariants: monotone time, strictly
/// increasing seq, acquire/release pairing for terminated jobs, and no
/// overlapping starts on one core.
pub fn assert_stream_invariants(events: &[SimEvent]) {
    use std::collections::{BTreeMap, BTreeSet};

    let mut last_time = f64::NEG_INFINITY;
    for (idx, event) in events.iter().enumerate() {
        assert_eq!(event.seq, idx as u64, "seq must be dense and increasing");
        assert!(
            event.time >= last_time,
            "time must be non-decreasing at seq {}",
            event.seq
        );
        last_time = event.time;
    }

    // A core may never see a second SegmentStart before the first segment
    // ended or was preempted away.
    let mut core_running: BTreeMap<String, String> = BTreeMap::new();
    for event in events {
        let core_id = match &event.core_id {
            Some(core_id) => core_id.clone(),
            None => continue,
        };
        let segment_key = event
            .payload
            .get("segment_key")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        match event.event_type.as_str() {
            "SegmentStart" => {
                assert!(
                    !core_running.contains_key(&core_id),
                    "core {core_id} started {segment_key} while busy at seq {}",
                    event.seq
                );
                core_running.insert(core_id, segment_key);
            }
            "SegmentEnd" | "Preempt" => {
                core_running.remove(&core_id);
            }
            _ => {}
        }
    }

    // Terminated jobs (completed or aborted) must have released everything
    // they acquired; jobs cut off by the horizon may still hold resources.
    let mut terminated: BTreeSet<String> = BTreeSet::new();
    let mut balance: BTreeMap<(String, String), i64> = BTreeMap::new();
    for event in events {
        match event.event_type.as_str() {
            "JobComplete" => {
                if let Some(job) = &event.job_id {
                    terminated.insert(job.clone());
                }
            }
            "DeadlineMiss" => {
                if event.payload.get("abort_on_miss") == Some(&serde_json::json!(true)) {
                    if let Some(job) = &event.job_id {
                        terminated.insert(job.clone());
                    }
                }
            }
            "ResourceAcquire" | "ResourceRelease" => {
                if let (Some(job), Some(resource)) = (&event.job_id, &event.resource_id) {
                    let entry = balance
                        .entry((job.clone(), resource.clone()))
                        .or_insert(0);
                    if event.event_type.as_str() == "ResourceAcquire" {
                        *entry += 1;
                    } else {
                        *entry -= 1;
                    }
                    assert!(
                        *entry >= 0,
                        "release without acquire for job {job} resource {resource}"
                    );
                }
            }
            _ => {}
        }
    }
    for ((job, resource), count) in balance {
        if terminated.contains(&job) {
            assert_eq!(
                count, 0,
                "unbalanced acquire/release for job {job} resource {resource}"
            );
        }
    }
}
