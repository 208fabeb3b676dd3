//! Event-stream metrics aggregation

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::events::{EventType, SimEvent};

/// Aggregate report over one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub jobs_released: usize,
    pub jobs_completed: usize,
    pub jobs_aborted: usize,
    pub deadline_miss_count: usize,
    pub deadline_miss_ratio: f64,
    pub avg_response_time: f64,
    pub avg_lateness: f64,
    pub preempt_count: u64,
    pub migrate_count: u64,
    pub core_utilization: BTreeMap<String, f64>,
    pub event_count: u64,
    pub max_time: f64,
}

/// Stateless-by-contract event consumer rolling up counters and utilisations.
///
/// Feeding the same event stream to a fresh aggregator (seeded with the same
/// core ids) reproduces the report exactly.
pub struct MetricsAggregator {
    job_release: BTreeMap<String, f64>,
    job_deadline: BTreeMap<String, f64>,
    job_complete: BTreeMap<String, f64>,
    deadline_miss_jobs: BTreeSet<String>,
    aborted_jobs: BTreeSet<String>,
    running: BTreeMap<String, (f64, String)>,
    core_busy: BTreeMap<String, f64>,
    preempt_count: u64,
    migrate_count: u64,
    event_count: u64,
    max_time: f64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            job_release: BTreeMap::new(),
            job_deadline: BTreeMap::new(),
            job_complete: BTreeMap::new(),
            deadline_miss_jobs: BTreeSet::new(),
            aborted_jobs: BTreeSet::new(),
            running: BTreeMap::new(),
            core_busy: BTreeMap::new(),
            preempt_count: 0,
            migrate_count: 0,
            event_count: 0,
            max_time: 0.0,
        }
    }

    /// Pre-register a core so it reports utilization 0 even if it never runs
    pub fn register_core(&mut self, core_id: &str) {
        self.core_busy.entry(core_id.to_string()).or_insert(0.0);
    }

    /// Extend the observed horizon past the last event (idle tail of a run).
    ///
    /// Utilisation denominators cover the whole virtual-time span, not just
    /// the instant of the final event.
    pub fn observe_time(&mut self, time: f64) {
        self.max_time = self.max_time.max(time);
    }

    /// Clear all accumulated state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consume one event in publish order
    pub fn consume(&mut self, event: &SimEvent) {
        self.event_count += 1;
        self.max_time = self.max_time.max(event.time);

        match event.event_type {
            EventType::JobReleased => {
                if let Some(job_id) = &event.job_id {
                    self.job_release.insert(job_id.clone(), event.time);
                    if let Some(deadline) =
                        event.payload.get("absolute_deadline").and_then(|v| v.as_f64())
                    {
                        self.job_deadline.insert(job_id.clone(), deadline);
                    }
                }
            }
            EventType::SegmentStart => {
                if let (Some(segment_key), Some(core_id)) =
                    (self.segment_runtime_key(event), &event.core_id)
                {
                    self.running
                        .insert(segment_key, (event.time, core_id.clone()));
                }
            }
            EventType::SegmentEnd => {
                if let Some(segment_key) = self.segment_runtime_key(event) {
                    if let Some((start, core)) = self.running.remove(&segment_key) {
                        *self.core_busy.entry(core).or_insert(0.0) +=
                            (event.time - start).max(0.0);
                    }
                }
            }
            EventType::Preempt => {
                if let Some(segment_key) = self.segment_runtime_key(event) {
                    if let Some((start, core)) = self.running.remove(&segment_key) {
                        *self.core_busy.entry(core).or_insert(0.0) +=
                            (event.time - start).max(0.0);
                    }
                }
                self.preempt_count += 1;
            }
            EventType::Migrate => {
                self.migrate_count += 1;
            }
            EventType::DeadlineMiss => {
                if let Some(job_id) = &event.job_id {
                    self.deadline_miss_jobs.insert(job_id.clone());
                    if event
                        .payload
                        .get("abort_on_miss")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                    {
                        self.aborted_jobs.insert(job_id.clone());
                    }
                }
            }
            EventType::JobComplete => {
                if let Some(job_id) = &event.job_id {
                    self.job_complete.insert(job_id.clone(), event.time);
                }
            }
            _ => {}
        }
    }

    fn segment_runtime_key(&self, event: &SimEvent) -> Option<String> {
        if let Some(segment_key) = event.payload.get("segment_key").and_then(|v| v.as_str()) {
            if !segment_key.is_empty() {
                return Some(segment_key.to_string());
            }
        }
        event.segment_id.clone()
    }

    /// Roll up the current counters into a report
    pub fn report(&self) -> MetricsReport {
        let mut response_times: Vec<f64> = Vec::new();
        let mut lateness_values: Vec<f64> = Vec::new();
        for (job_id, complete_time) in &self.job_complete {
            if let Some(release_time) = self.job_release.get(job_id) {
                response_times.push(complete_time - release_time);
            }
            if let Some(deadline) = self.job_deadline.get(job_id) {
                lateness_values.push((complete_time - deadline).max(0.0));
            }
        }

        let total_jobs = self.job_release.len().max(1);
        let avg = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        let core_utilization = self
            .core_busy
            .iter()
            .map(|(core_id, busy_time)| {
                let utilization = if self.max_time > 0.0 {
                    busy_time / self.max_time
                } else {
                    0.0
                };
                (core_id.clone(), utilization)
            })
            .collect();

        MetricsReport {
            jobs_released: self.job_release.len(),
            jobs_completed: self.job_complete.len(),
            jobs_aborted: self.aborted_jobs.len(),
            deadline_miss_count: self.deadline_miss_jobs.len(),
            deadline_miss_ratio: self.deadline_miss_jobs.len() as f64 / total_jobs as f64,
            avg_response_time: avg(&response_times),
            avg_lateness: avg(&lateness_values),
            preempt_count: self.preempt_count,
            migrate_count: self.migrate_count,
            core_utilization,
            event_count: self.event_count,
            max_time: self.max_time,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, EventDraft, EventIdMode, Payload};
    use serde_json::json;

    fn payload(entries: &[(&str, serde_json::Value)]) -> Payload {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn feed(aggregator: &mut MetricsAggregator, drafts: Vec<EventDraft>) {
        let mut bus = EventBus::new(EventIdMode::Sequential, 0);
        for draft in drafts {
            let event = bus.publish(draft);
            aggregator.consume(&event);
        }
    }

    #[test]
    fn busy_time_spans_start_to_end() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.register_core("c0");
        feed(
            &mut aggregator,
            vec![
                EventDraft::new(EventType::JobReleased, 0.0, "t0@0").job("t0@0"),
                EventDraft::new(EventType::SegmentStart, 0.0, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
                EventDraft::new(EventType::SegmentEnd, 4.0, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
                EventDraft::new(EventType::JobComplete, 4.0, "t0@0").job("t0@0"),
            ],
        );
        let report = aggregator.report();
        assert_eq!(report.jobs_released, 1);
        assert_eq!(report.jobs_completed, 1);
        assert_eq!(report.core_utilization["c0"], 1.0);
        assert_eq!(report.avg_response_time, 4.0);
    }

    #[test]
    fn preempt_closes_the_busy_interval() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.register_core("c0");
        feed(
            &mut aggregator,
            vec![
                EventDraft::new(EventType::SegmentStart, 0.0, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
                EventDraft::new(EventType::Preempt, 1.5, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
            ],
        );
        let report = aggregator.report();
        assert_eq!(report.preempt_count, 1);
        assert_eq!(report.core_utilization["c0"], 1.0);
        assert_eq!(report.max_time, 1.5);
    }

    #[test]
    fn abort_on_miss_counts_as_aborted() {
        let mut aggregator = MetricsAggregator::new();
        feed(
            &mut aggregator,
            vec![
                EventDraft::new(EventType::JobReleased, 0.0, "t0@0").job("t0@0"),
                EventDraft::new(EventType::DeadlineMiss, 2.0, "t0@0")
                    .job("t0@0")
                    .payload(payload(&[
                        ("absolute_deadline", json!(2.0)),
                        ("abort_on_miss", json!(true)),
                    ])),
            ],
        );
        let report = aggregator.report();
        assert_eq!(report.deadline_miss_count, 1);
        assert_eq!(report.jobs_aborted, 1);
        assert_eq!(report.deadline_miss_ratio, 1.0);
    }

    #[test]
    fn silent_cores_report_zero_utilization() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.register_core("c0");
        aggregator.register_core("c1");
        feed(
            &mut aggregator,
            vec![
                EventDraft::new(EventType::SegmentStart, 0.0, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
                EventDraft::new(EventType::SegmentEnd, 2.0, "t0@0")
                    .core("c0")
                    .payload(payload(&[("segment_key", json!("t0@0:s0:seg0"))])),
            ],
        );
        let report = aggregator.report();
        assert_eq!(report.core_utilization["c1"], 0.0);
    }

    #[test]
    fn empty_run_reports_zeroes() {
        let aggregator = MetricsAggregator::new();
        let report = aggregator.report();
        assert_eq!(report.event_count, 0);
        assert_eq!(report.max_time, 0.0);
        assert_eq!(report.deadline_miss_ratio, 0.0);
    }
}
