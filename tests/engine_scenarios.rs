//! End-to-end scenario tests for the discrete-event engine

mod common;

use common::*;
use serde_json::json;

mod single_segment {
    use super::*;

    #[test]
    fn one_task_one_core_runs_to_completion() {
        let mut payload = single_core_payload();
        payload["sim"]["duration"] = json!(10.0);
        payload["tasks"] = json!([simple_task("t0", 10.0, 0.0, 1.0, &[])]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let types: Vec<&str> = result
            .events
            .iter()
            .map(|event| event.event_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "JobReleased",
                "SegmentReady",
                "SegmentStart",
                "SegmentEnd",
                "JobComplete"
            ]
        );
        assert!((result.events[2].time - 0.0).abs() < 1e-9);
        assert!((result.events[3].time - 1.0).abs() < 1e-9);
        assert!((result.events[4].time - 1.0).abs() < 1e-9);

        assert_eq!(result.report.jobs_completed, 1);
        assert_eq!(result.report.deadline_miss_count, 0);
        assert!((result.report.max_time - 10.0).abs() < 1e-9);
        assert!((result.report.core_utilization["c0"] - 0.1).abs() < 1e-9);
    }
}

mod mutex_blocking {
    use super::*;

    fn payload() -> serde_json::Value {
        let mut payload = single_core_payload();
        payload["resources"] = json!([resource("r0", "c0", "mutex")]);
        payload["tasks"] = json!([
            simple_task("low", 50.0, 0.0, 4.0, &["r0"]),
            simple_task("high", 5.0, 1.0, 1.0, &["r0"]),
        ]);
        payload
    }

    #[test]
    fn contender_blocks_until_owner_releases() {
        let result = run_payload(payload());
        assert_stream_invariants(&result.events);

        let blocked = first_for_job(&result.events, "SegmentBlocked", "high@")
            .expect("high should block on r0");
        assert_eq!(blocked.payload["reason"], "resource_busy");
        assert_eq!(blocked.payload["owner_segment"], "low@0:s0:seg0");
        assert!((blocked.time - 1.0).abs() < 1e-9);

        let release = first_for_job(&result.events, "ResourceRelease", "low@")
            .expect("low should release r0");
        assert!((release.time - 4.0).abs() < 1e-9);

        let unblocked = first_for_job(&result.events, "SegmentUnblocked", "high@")
            .expect("high should wake");
        assert!((unblocked.time - 4.0).abs() < 1e-9);
        let start = first_for_job(&result.events, "SegmentStart", "high@")
            .expect("high should start");
        assert!((start.time - 4.0).abs() < 1e-9);
        let complete = first_for_job(&result.events, "JobComplete", "high@")
            .expect("high should complete");
        assert!((complete.time - 5.0).abs() < 1e-9);
    }

    #[test]
    fn owner_keeps_the_core_after_contender_blocks() {
        let result = run_payload(payload());
        let blocked_seq = first_for_job(&result.events, "SegmentBlocked", "high@")
            .expect("high should block")
            .seq;
        let next_start = result
            .events
            .iter()
            .find(|event| event.seq > blocked_seq && event.event_type.as_str() == "SegmentStart")
            .expect("someone should start after the block");
        assert!(next_start
            .job_id
            .as_deref()
            .map_or(false, |job| job.starts_with("low@")));
    }
}

mod priority_inheritance {
    use super::*;

    #[test]
    fn blocked_high_task_boosts_the_lock_holder_over_medium() {
        let mut payload = single_core_payload();
        payload["resources"] = json!([resource("r0", "c0", "pip")]);
        payload["tasks"] = json!([
            simple_task("low", 50.0, 0.0, 4.0, &["r0"]),
            simple_task("med", 20.0, 0.5, 2.0, &[]),
            simple_task("high", 5.0, 1.0, 1.0, &["r0"]),
        ]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let blocked_seq = first_for_job(&result.events, "SegmentBlocked", "high@")
            .expect("high should block on r0")
            .seq;
        let next_start = result
            .events
            .iter()
            .find(|event| event.seq > blocked_seq && event.event_type.as_str() == "SegmentStart")
            .expect("a segment should start after the block");
        assert!(
            next_start
                .job_id
                .as_deref()
                .map_or(false, |job| job.starts_with("low@")),
            "inherited priority must let low run before med, got {:?}",
            next_start.job_id
        );

        // Everyone still completes inside the horizon.
        assert_eq!(result.report.jobs_completed, 3);
        assert_eq!(result.report.deadline_miss_count, 0);
    }
}

mod priority_ceiling {
    use super::*;

    #[test]
    fn system_ceiling_defers_low_priority_acquisition() {
        let mut payload = dual_core_payload();
        payload["resources"] = json!([
            resource("r0", "c0", "pcp"),
            resource("r1", "c1", "pcp"),
        ]);
        payload["tasks"] = json!([
            simple_task("low", 50.0, 0.0, 4.0, &["r0"]),
            simple_task("med", 20.0, 0.5, 2.0, &["r1"]),
            simple_task("high", 5.0, 2.0, 1.0, &["r0"]),
        ]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let blocked = first_for_job(&result.events, "SegmentBlocked", "med@")
            .expect("med should be ceiling-blocked");
        assert_eq!(blocked.payload["reason"], "system_ceiling_block");
        assert_eq!(blocked.payload["priority_domain"], "absolute_deadline");
        let ceiling = blocked.payload["system_ceiling"]
            .as_f64()
            .expect("system_ceiling should be numeric");
        assert!(ceiling <= 0.0, "EDF ceilings are non-positive, got {ceiling}");

        let low_release = first_for_job(&result.events, "ResourceRelease", "low@")
            .expect("low should release r0");
        let med_start = first_for_job(&result.events, "SegmentStart", "med@")
            .expect("med should eventually start");
        assert!(
            med_start.time >= low_release.time - 1e-9,
            "med must not start before low releases r0"
        );
        assert_eq!(result.report.jobs_completed, 3);
    }
}

mod abort_on_miss {
    use super::*;

    #[test]
    fn missed_deadline_tears_the_job_down() {
        let mut payload = single_core_payload();
        payload["sim"]["duration"] = json!(10.0);
        payload["resources"] = json!([resource("r0", "c0", "mutex")]);
        let mut doomed = simple_task("doom", 2.0, 0.0, 5.0, &["r0"]);
        doomed["abort_on_miss"] = json!(true);
        payload["tasks"] = json!([doomed]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let miss = first_for_job(&result.events, "DeadlineMiss", "doom@")
            .expect("doom should miss its deadline");
        assert!((miss.time - 2.0).abs() < 1e-6);
        assert_eq!(miss.payload["absolute_deadline"], 2.0);
        assert_eq!(miss.payload["abort_on_miss"], true);

        let preempt = first_for_job(&result.events, "Preempt", "doom@")
            .expect("the running segment should be force-preempted");
        assert_eq!(preempt.payload["reason"], "abort_on_miss");
        assert!(preempt.seq > miss.seq);

        let release = first_for_job(&result.events, "ResourceRelease", "doom@")
            .expect("held resource must be released by the cascade");
        assert_eq!(release.payload["reason"], "cancel_segment");

        assert!(first_for_job(&result.events, "JobComplete", "doom@").is_none());
        assert_eq!(result.report.jobs_aborted, 1);
        assert_eq!(result.report.jobs_completed, 0);
    }
}

mod atomic_rollback {
    use super::*;

    #[test]
    fn partial_holds_are_released_before_blocking() {
        let mut payload = single_core_payload();
        payload["resources"] = json!([
            resource("r0", "c0", "mutex"),
            resource("r1", "c0", "mutex"),
        ]);
        payload["scheduler"]["params"] =
            json!({"resource_acquire_policy": "atomic_rollback"});
        payload["tasks"] = json!([
            simple_task("blocker", 50.0, 0.0, 4.0, &["r1"]),
            simple_task("multi", 20.0, 1.0, 1.0, &["r0", "r1"]),
        ]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let multi_events: Vec<_> = result
            .events
            .iter()
            .filter(|event| {
                event
                    .job_id
                    .as_deref()
                    .map_or(false, |job| job.starts_with("multi@"))
            })
            .collect();

        let acquire_r0 = multi_events
            .iter()
            .find(|event| {
                event.event_type.as_str() == "ResourceAcquire"
                    && event.resource_id.as_deref() == Some("r0")
            })
            .expect("multi should first acquire the free r0");
        let rollback = multi_events
            .iter()
            .find(|event| {
                event.event_type.as_str() == "ResourceRelease"
                    && event.payload.get("reason").and_then(|v| v.as_str())
                        == Some("acquire_rollback")
            })
            .expect("r0 should be rolled back");
        assert_eq!(rollback.resource_id.as_deref(), Some("r0"));
        let blocked = multi_events
            .iter()
            .find(|event| event.event_type.as_str() == "SegmentBlocked")
            .expect("multi should block on r1");
        assert_eq!(blocked.payload["reason"], "resource_busy");
        assert_eq!(blocked.payload["resource_acquire_policy"], "atomic_rollback");

        assert!(acquire_r0.seq < rollback.seq);
        assert!(rollback.seq < blocked.seq);
        assert!((rollback.time - blocked.time).abs() < 1e-12);

        // After the blocker finishes, multi acquires both and completes.
        let complete = first_for_job(&result.events, "JobComplete", "multi@")
            .expect("multi should complete");
        assert!((complete.time - 5.0).abs() < 1e-9);
    }
}

mod task_graphs {
    use super::*;

    #[test]
    fn segments_and_successor_subtasks_run_in_dag_order() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([{
            "id": "pipeline",
            "name": "pipeline",
            "task_type": "dynamic_rt",
            "deadline": 10.0,
            "arrival": 0.0,
            "subtasks": [
                {
                    "id": "stage_a",
                    "predecessors": [],
                    "successors": ["stage_b"],
                    "segments": [
                        {"id": "seg1", "index": 1, "wcet": 1.0},
                        {"id": "seg2", "index": 2, "wcet": 1.0}
                    ]
                },
                {
                    "id": "stage_b",
                    "predecessors": ["stage_a"],
                    "successors": [],
                    "segments": [{"id": "seg1", "index": 1, "wcet": 1.0}]
                }
            ]
        }]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);

        let ends: Vec<String> = of_type(&result.events, "SegmentEnd")
            .iter()
            .map(|event| {
                event.payload["segment_key"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(
            ends,
            vec![
                "pipeline@0:stage_a:seg1",
                "pipeline@0:stage_a:seg2",
                "pipeline@0:stage_b:seg1",
            ]
        );
        let complete = first_for_job(&result.events, "JobComplete", "pipeline@")
            .expect("pipeline should complete");
        assert!((complete.time - 3.0).abs() < 1e-9);
    }
}

mod fixed_priority {
    use super::*;

    #[test]
    fn shorter_period_preempts_under_rm() {
        let mut payload = single_core_payload();
        payload["sim"]["duration"] = json!(12.0);
        payload["scheduler"] = json!({"name": "rate_monotonic", "params": {}});
        payload["tasks"] = json!([
            {
                "id": "fast",
                "name": "fast",
                "task_type": "time_deterministic",
                "period": 4.0,
                "deadline": 4.0,
                "arrival": 0.0,
                "subtasks": [{
                    "id": "s0",
                    "segments": [{"id": "seg0", "index": 1, "wcet": 1.0}]
                }]
            },
            {
                "id": "slow",
                "name": "slow",
                "task_type": "time_deterministic",
                "period": 10.0,
                "deadline": 10.0,
                "arrival": 0.0,
                "subtasks": [{
                    "id": "s0",
                    "segments": [{"id": "seg0", "index": 1, "wcet": 5.0}]
                }]
            }
        ]);

        let result = run_payload(payload);
        assert_stream_invariants(&result.events);
        assert!(result.report.preempt_count >= 1);
        assert_eq!(result.report.deadline_miss_count, 0);

        // fast wins the tie at t=0 and again at each release.
        let first_start = of_type(&result.events, "SegmentStart")[0];
        assert!(first_start
            .job_id
            .as_deref()
            .map_or(false, |job| job.starts_with("fast@")));
    }

    #[test]
    fn allow_preempt_false_pins_the_running_segment() {
        let mut payload = single_core_payload();
        payload["scheduler"]["params"] = json!({"allow_preempt": false});
        payload["tasks"] = json!([
            simple_task("slow", 50.0, 0.0, 4.0, &[]),
            simple_task("urgent", 6.0, 1.0, 1.0, &[]),
        ]);

        let result = run_payload(payload);
        assert_eq!(result.report.preempt_count, 0);
        assert_eq!(result.report.jobs_completed, 2);
        let urgent_start = first_for_job(&result.events, "SegmentStart", "urgent@")
            .expect("urgent should run after slow");
        assert!((urgent_start.time - 4.0).abs() < 1e-9);
    }
}

mod arrivals {
    use super::*;

    #[test]
    fn periodic_tasks_release_until_the_horizon() {
        let mut payload = single_core_payload();
        payload["sim"]["duration"] = json!(10.0);
        payload["tasks"] = json!([{
            "id": "beat",
            "name": "beat",
            "task_type": "time_deterministic",
            "period": 4.0,
            "deadline": 4.0,
            "arrival": 0.0,
            "subtasks": [{
                "id": "s0",
                "segments": [{"id": "seg0", "index": 1, "wcet": 1.0}]
            }]
        }]);

        let result = run_payload(payload);
        assert_eq!(result.report.jobs_released, 3);
        assert_eq!(result.report.jobs_completed, 3);
        let releases: Vec<f64> = of_type(&result.events, "JobReleased")
            .iter()
            .map(|event| event.time)
            .collect();
        assert_eq!(releases, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn sequence_generator_drives_aperiodic_releases() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([{
            "id": "pulse",
            "name": "pulse",
            "task_type": "dynamic_rt",
            "deadline": 1.0,
            "arrival": 0.0,
            "arrival_generator": "sequence",
            "arrival_params": {"sequence": "2"},
            "subtasks": [{
                "id": "s0",
                "segments": [{"id": "seg0", "index": 1, "wcet": 0.5}]
            }]
        }]);

        let result = run_payload(payload);
        assert_eq!(result.report.jobs_released, 10);
        assert_eq!(result.report.jobs_completed, 10);
        assert_eq!(result.report.deadline_miss_count, 0);
    }

    #[test]
    fn generator_parameter_errors_surface_as_error_events() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([{
            "id": "broken",
            "name": "broken",
            "task_type": "dynamic_rt",
            "deadline": 5.0,
            "arrival": 0.0,
            "arrival_generator": "constant_interval",
            "subtasks": [{
                "id": "s0",
                "segments": [{"id": "seg0", "index": 1, "wcet": 1.0}]
            }]
        }]);

        let result = run_payload(payload);
        assert!(result.failed, "missing params must mark the run failed");
        let last = result.events.last().expect("events should exist");
        assert_eq!(last.event_type.as_str(), "Error");
        assert!(last.payload["cause"]
            .as_str()
            .unwrap_or_default()
            .contains("constant_interval"));
    }
}

mod lifecycle {
    use super::*;
    use taskset_sim::SimEngine;

    #[test]
    fn pause_blocks_progress_until_resume() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([simple_task("t0", 10.0, 0.0, 1.0, &[])]);
        let mut engine = SimEngine::new();
        engine.build(load(payload)).expect("build");

        engine.pause();
        engine.run(None).expect("paused run");
        assert!(engine.events().is_empty());

        engine.resume();
        engine.run(None).expect("resumed run");
        assert_eq!(engine.metrics_report().jobs_completed, 1);
    }

    #[test]
    fn step_advances_bounded_virtual_time() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([simple_task("t0", 50.0, 0.0, 4.0, &[])]);
        let mut engine = SimEngine::new();
        engine.build(load(payload)).expect("build");

        engine.step(Some(1.0)).expect("step");
        assert!((engine.now() - 1.0).abs() < 1e-9);
        assert_eq!(engine.metrics_report().jobs_completed, 0);

        engine.step(Some(10.0)).expect("step");
        assert_eq!(engine.metrics_report().jobs_completed, 1);
    }

    #[test]
    fn stop_preserves_partial_state() {
        let mut payload = single_core_payload();
        payload["tasks"] = json!([simple_task("t0", 50.0, 0.0, 4.0, &[])]);
        let mut engine = SimEngine::new();
        engine.build(load(payload)).expect("build");

        engine.step(Some(1.0)).expect("step");
        engine.stop();
        engine.run(None).expect("stopped run");
        assert!(engine.metrics_report().jobs_completed == 0);
        assert!(!engine.events().is_empty());
    }

    #[test]
    fn subscribers_see_the_full_stream_in_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut payload = single_core_payload();
        payload["tasks"] = json!([simple_task("t0", 10.0, 0.0, 1.0, &[])]);

        let seen: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut engine = SimEngine::new();
        engine.subscribe(move |event| sink.borrow_mut().push(event.seq));
        engine.build(load(payload)).expect("build");
        engine.run(None).expect("run");

        let seen = seen.borrow();
        assert_eq!(seen.len(), engine.events().len());
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
