//! Discrete-event simulation core
//!
//! The engine exclusively owns all runtime state (jobs, segments, cores,
//! held-resource sets) as id-keyed tables. Schedulers see read-only snapshots;
//! protocols return structured effects that the engine applies. All time is
//! virtual and every run with identical inputs replays bit-identically.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde_json::json;
use tracing::{debug, warn};

use crate::arrival::{arrival_registry, ArrivalContext, ArrivalGenerator};
use crate::error::{SimError, SimResult};
use crate::etm::{etm_registry, EstimateContext, ExecutionTimeModel};
use crate::events::{EventBus, EventDraft, EventIdMode, EventType, Payload, SimEvent};
use crate::metrics::{MetricsAggregator, MetricsReport};
use crate::model::runtime::CoreState;
use crate::model::{
    Decision, DecisionAction, JobState, ModelSpec, Params, ProtocolKind, ResourceAcquirePolicy,
    RuntimeSegment, ScheduleSnapshot, TaskGraphSpec,
};
use crate::overhead::{overhead_registry, OverheadModel};
use crate::protocols::{
    protocol_registry, reason, RequestResult, ResourceProtocol, ResourceRuntimeSpec,
};
use crate::registry::PluginRegistry;
use crate::scheduler::{scheduler_registry, ScheduleContext, Scheduler, LOWEST_PRIORITY};

/// Tolerance for "due now" comparisons on the virtual clock
const TIME_EPSILON: f64 = 1e-12;

/// Offset past an absolute deadline at which the miss check fires
const DEADLINE_EPSILON: f64 = 1e-9;

/// Tolerance for projected finish times
const COMPLETION_EPSILON: f64 = 1e-9;

/// Pending release keyed for the min-heap
#[derive(Debug, Clone, PartialEq)]
struct ReleaseEntry {
    time: f64,
    release_index: u64,
    task_id: String,
}

impl Eq for ReleaseEntry {}

impl PartialOrd for ReleaseEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.release_index.cmp(&other.release_index))
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

/// Mutable per-core run state
#[derive(Debug, Clone)]
struct CoreRuntime {
    core_id: String,
    speed: f64,
    running_segment_key: Option<String>,
    running_since: Option<f64>,
    finish_time: Option<f64>,
}

impl CoreRuntime {
    fn clear(&mut self) {
        self.running_segment_key = None;
        self.running_since = None;
        self.finish_time = None;
    }
}

/// Per-subtask progress within one job
#[derive(Debug, Clone)]
struct SubtaskRuntime {
    predecessors: Vec<String>,
    successors: Vec<String>,
    segment_keys: Vec<String>,
    next_index: usize,
    completed: bool,
}

/// One release of a task
#[derive(Debug, Clone)]
struct JobRuntime {
    state: JobState,
    abort_on_miss: bool,
    subtasks: BTreeMap<String, SubtaskRuntime>,
    subtask_completion: BTreeMap<String, bool>,
}

/// Outcome of applying one dispatch decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOutcome {
    Started,
    Blocked,
    Skipped,
}

/// Deterministic discrete-event engine over a validated model
pub struct SimEngine {
    schedulers: PluginRegistry<dyn Scheduler>,
    protocol_factories: PluginRegistry<dyn ResourceProtocol>,
    etms: PluginRegistry<dyn ExecutionTimeModel>,
    overhead_models: PluginRegistry<dyn OverheadModel>,
    arrivals: PluginRegistry<dyn ArrivalGenerator>,

    spec: Option<ModelSpec>,
    scheduler: Option<Box<dyn Scheduler>>,
    scheduler_name: String,
    protocols: Vec<Box<dyn ResourceProtocol>>,
    resource_protocols: BTreeMap<String, usize>,
    resource_bound_cores: BTreeMap<String, String>,
    etm: Option<Box<dyn ExecutionTimeModel>>,
    overheads: Option<Box<dyn OverheadModel>>,
    acquire_policy: ResourceAcquirePolicy,
    arrival_generators: BTreeMap<String, (Box<dyn ArrivalGenerator>, Params)>,

    now: f64,
    event_id_mode: EventIdMode,
    event_seed: u64,
    bus: EventBus,
    metrics: MetricsAggregator,
    subscribers: Vec<Box<dyn FnMut(&SimEvent)>>,
    rng: fastrand::Rng,

    cores: BTreeMap<String, CoreRuntime>,
    segments: BTreeMap<String, RuntimeSegment>,
    jobs: BTreeMap<String, JobRuntime>,
    ready: BTreeSet<String>,
    held_resources: BTreeMap<String, BTreeSet<String>>,
    release_heap: BinaryHeap<Reverse<ReleaseEntry>>,
    aborted_jobs: BTreeSet<String>,

    paused: bool,
    stopped: bool,
    failed: bool,
}

fn not_built() -> SimError {
    SimError::EngineState("build() must be called first".to_string())
}

impl SimEngine {
    /// Engine with the built-in plugin registries
    pub fn new() -> Self {
        Self {
            schedulers: scheduler_registry(),
            protocol_factories: protocol_registry(),
            etms: etm_registry(),
            overhead_models: overhead_registry(),
            arrivals: arrival_registry(),

            spec: None,
            scheduler: None,
            scheduler_name: String::new(),
            protocols: Vec::new(),
            resource_protocols: BTreeMap::new(),
            resource_bound_cores: BTreeMap::new(),
            etm: None,
            overheads: None,
            acquire_policy: ResourceAcquirePolicy::LegacySequential,
            arrival_generators: BTreeMap::new(),

            now: 0.0,
            event_id_mode: EventIdMode::default(),
            event_seed: 0,
            bus: EventBus::new(EventIdMode::default(), 0),
            metrics: MetricsAggregator::new(),
            subscribers: Vec::new(),
            rng: fastrand::Rng::with_seed(0),

            cores: BTreeMap::new(),
            segments: BTreeMap::new(),
            jobs: BTreeMap::new(),
            ready: BTreeSet::new(),
            held_resources: BTreeMap::new(),
            release_heap: BinaryHeap::new(),
            aborted_jobs: BTreeSet::new(),

            paused: false,
            stopped: false,
            failed: false,
        }
    }

    /// Registry for custom scheduling policies
    pub fn schedulers_mut(&mut self) -> &mut PluginRegistry<dyn Scheduler> {
        &mut self.schedulers
    }

    /// Registry for custom resource protocols
    pub fn protocols_mut(&mut self) -> &mut PluginRegistry<dyn ResourceProtocol> {
        &mut self.protocol_factories
    }

    /// Registry for custom execution-time models
    pub fn etms_mut(&mut self) -> &mut PluginRegistry<dyn ExecutionTimeModel> {
        &mut self.etms
    }

    /// Registry for custom overhead models
    pub fn overheads_mut(&mut self) -> &mut PluginRegistry<dyn OverheadModel> {
        &mut self.overhead_models
    }

    /// Registry for custom arrival generators
    pub fn arrivals_mut(&mut self) -> &mut PluginRegistry<dyn ArrivalGenerator> {
        &mut self.arrivals
    }

    /// Observe events as they are published, in publish order.
    ///
    /// Subscribers survive `reset()` and `build()`.
    pub fn subscribe(&mut self, handler: impl FnMut(&SimEvent) + 'static) {
        self.subscribers.push(Box::new(handler));
    }

    /// Events published so far, in total order
    pub fn events(&self) -> &[SimEvent] {
        self.bus.events()
    }

    /// Current virtual time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// True when a plugin failure aborted the run
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Aggregated metrics for the run so far
    pub fn metrics_report(&self) -> MetricsReport {
        self.metrics.report()
    }

    /// Clear all runtime state; registries and subscribers survive
    pub fn reset(&mut self) {
        self.spec = None;
        self.scheduler = None;
        self.scheduler_name = String::new();
        self.protocols = Vec::new();
        self.resource_protocols = BTreeMap::new();
        self.resource_bound_cores = BTreeMap::new();
        self.etm = None;
        self.overheads = None;
        self.acquire_policy = ResourceAcquirePolicy::LegacySequential;
        self.arrival_generators = BTreeMap::new();

        self.now = 0.0;
        self.bus = EventBus::new(self.event_id_mode, self.event_seed);
        self.metrics.reset();
        self.rng = fastrand::Rng::with_seed(self.event_seed);

        self.cores = BTreeMap::new();
        self.segments = BTreeMap::new();
        self.jobs = BTreeMap::new();
        self.ready = BTreeSet::new();
        self.held_resources = BTreeMap::new();
        self.release_heap = BinaryHeap::new();
        self.aborted_jobs = BTreeSet::new();

        self.paused = false;
        self.stopped = false;
        self.failed = false;
    }

    /// Instantiate all runtime state from a validated model
    pub fn build(&mut self, mut spec: ModelSpec) -> SimResult<()> {
        spec.validate()?;
        self.reset();

        self.event_id_mode =
            match spec.scheduler.params.get("event_id_mode").and_then(|v| v.as_str()) {
                Some(raw) if !raw.trim().is_empty() => EventIdMode::parse(raw)?,
                _ => EventIdMode::default(),
            };
        self.event_seed = spec.sim.seed;
        self.bus = EventBus::new(self.event_id_mode, self.event_seed);
        self.rng = fastrand::Rng::with_seed(self.event_seed);

        let mut scheduler = self
            .schedulers
            .create(&spec.scheduler.name, &spec.scheduler.params)?;
        scheduler.init(&ScheduleContext {
            core_ids: spec.platform.cores.iter().map(|c| c.id.clone()).collect(),
        });
        self.scheduler_name = spec.scheduler.name.clone();
        self.acquire_policy = spec.scheduler.resource_acquire_policy()?;

        self.setup_protocols(&spec, scheduler.as_ref())?;

        let etm_name = spec
            .scheduler
            .params
            .get("etm")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string();
        let etm_params: Params = spec
            .scheduler
            .params
            .get("etm_params")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        self.etm = Some(self.etms.create(&etm_name, &etm_params)?);

        let overhead_name = spec
            .scheduler
            .params
            .get("overhead_model")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string();
        let overhead_params: Params = spec
            .scheduler
            .params
            .get("overhead")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        self.overheads = Some(self.overhead_models.create(&overhead_name, &overhead_params)?);

        for core in &spec.platform.cores {
            self.cores.insert(
                core.id.clone(),
                CoreRuntime {
                    core_id: core.id.clone(),
                    speed: core.speed_factor,
                    running_segment_key: None,
                    running_since: None,
                    finish_time: None,
                },
            );
            self.metrics.register_core(&core.id);
        }

        for task in &spec.tasks {
            if let Some(name) = &task.arrival_generator {
                let generator = self.arrivals.create(name, &task.arrival_params)?;
                self.arrival_generators
                    .insert(task.id.clone(), (generator, task.arrival_params.clone()));
            } else if task.period.is_none() {
                // A sporadic window implies a uniform draw between min and max.
                if let (Some(min), Some(max)) = (task.min_inter_arrival, task.max_inter_arrival) {
                    let mut params = Params::new();
                    params.insert("min_interval".to_string(), json!(min));
                    params.insert("max_interval".to_string(), json!(max));
                    let generator = self.arrivals.create("uniform_interval", &params)?;
                    self.arrival_generators
                        .insert(task.id.clone(), (generator, params));
                }
            }
            self.release_heap.push(Reverse(ReleaseEntry {
                time: task.arrival,
                release_index: 0,
                task_id: task.id.clone(),
            }));
        }

        debug!(
            scheduler = %self.scheduler_name,
            cores = self.cores.len(),
            tasks = spec.tasks.len(),
            "engine built"
        );
        self.scheduler = Some(scheduler);
        self.spec = Some(spec);
        Ok(())
    }

    /// Run until the horizon (or `until`), the stop flag, or quiescence
    pub fn run(&mut self, until: Option<f64>) -> SimResult<()> {
        let horizon = match &self.spec {
            Some(spec) => until.unwrap_or(spec.sim.duration),
            None => return Err(not_built()),
        };

        let mut exhausted = false;
        while self.now < horizon && !self.stopped {
            if self.paused {
                break;
            }
            match self.advance_once(horizon) {
                Ok(true) => {}
                Ok(false) => {
                    exhausted = true;
                    break;
                }
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
        }

        // With no further events the platform idles out the horizon, so
        // utilisation denominators cover the whole run.
        if exhausted && !self.stopped && !self.paused && horizon > self.now {
            self.now = horizon;
        }
        self.metrics.observe_time(self.now);
        self.check_deadline_miss(self.now);
        Ok(())
    }

    /// Advance by `delta` virtual time, or one tick when `delta` is `None`
    pub fn step(&mut self, delta: Option<f64>) -> SimResult<()> {
        let duration = match &self.spec {
            Some(spec) => spec.sim.duration,
            None => return Err(not_built()),
        };
        match delta {
            None => {
                if let Err(err) = self.advance_once(duration) {
                    self.fail(err);
                }
            }
            Some(delta) => {
                let target = self.now + delta;
                while self.now < target && !self.stopped {
                    match self.advance_once(target) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => {
                            self.fail(err);
                            break;
                        }
                    }
                }
            }
        }
        self.metrics.observe_time(self.now);
        Ok(())
    }

    /// Pause at the next tick boundary
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clear the pause flag
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Stop the run; partial state stays inspectable
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    fn fail(&mut self, err: SimError) {
        warn!(error = %err, "simulation failed");
        let mut payload = Payload::new();
        payload.insert("cause".to_string(), json!(err.to_string()));
        self.publish(EventDraft::new(EventType::Error, self.now, "engine").payload(payload));
        self.failed = true;
        self.stopped = true;
    }

    fn publish(&mut self, draft: EventDraft) {
        let event = self.bus.publish(draft);
        self.metrics.consume(&event);
        for handler in &mut self.subscribers {
            handler(&event);
        }
    }

    fn setup_protocols(&mut self, spec: &ModelSpec, scheduler: &dyn Scheduler) -> SimResult<()> {
        // Ceilings: the maximum task priority (in the scheduler's domain)
        // among tasks that reach a segment requiring the resource.
        let mut ceilings: BTreeMap<String, f64> = spec
            .resources
            .iter()
            .map(|r| (r.id.clone(), LOWEST_PRIORITY))
            .collect();
        for task in &spec.tasks {
            let task_priority = scheduler.task_priority_value(task.deadline, task.period);
            for sub in &task.subtasks {
                for seg in &sub.segments {
                    for resource_id in &seg.required_resources {
                        if let Some(ceiling) = ceilings.get_mut(resource_id) {
                            *ceiling = ceiling.max(task_priority);
                        }
                    }
                }
            }
        }

        let mut grouped: BTreeMap<ProtocolKind, BTreeMap<String, ResourceRuntimeSpec>> =
            BTreeMap::new();
        for resource in &spec.resources {
            let mut ceiling = ceilings.get(&resource.id).copied().unwrap_or(LOWEST_PRIORITY);
            if ceiling <= LOWEST_PRIORITY + 1e-6 {
                ceiling = 0.0;
            }
            grouped.entry(resource.protocol).or_default().insert(
                resource.id.clone(),
                ResourceRuntimeSpec {
                    bound_core_id: resource.bound_core_id.clone(),
                    ceiling_priority: ceiling,
                },
            );
            self.resource_bound_cores
                .insert(resource.id.clone(), resource.bound_core_id.clone());
        }

        for (kind, resources) in grouped {
            let mut protocol = self
                .protocol_factories
                .create(kind.as_str(), &Params::new())?;
            protocol.configure(resources.clone());
            protocol.set_priority_domain(scheduler.priority_domain());
            let idx = self.protocols.len();
            for resource_id in resources.keys() {
                self.resource_protocols.insert(resource_id.clone(), idx);
            }
            self.protocols.push(protocol);
        }
        Ok(())
    }

    /// One tick: releases, deadline checks, scheduling, clock advance, completion
    fn advance_once(&mut self, horizon: f64) -> SimResult<bool> {
        let now = self.now;
        self.process_releases(now)?;
        self.check_deadline_miss(now);
        self.schedule_tick(now)?;

        let mut next_times: Vec<f64> = Vec::new();
        self.collect_next_times(&mut next_times);

        if next_times.is_empty() {
            // A dispatch may have blocked and left a core idle while ready
            // segments remain; one more scheduling round covers that.
            if !self.ready.is_empty() {
                self.schedule_tick(self.now)?;
                for core in self.cores.values() {
                    if let Some(finish) = core.finish_time {
                        next_times.push(finish);
                    }
                }
            }
            if next_times.is_empty() {
                return Ok(false);
            }
        }

        let mut next_time = next_times.iter().fold(f64::INFINITY, |a, b| a.min(*b));
        let now = self.now;
        if next_time <= now + TIME_EPSILON {
            next_time = now + 1e-9;
        }
        next_time = next_time.min(horizon);
        if next_time > self.now {
            self.now = next_time;
            self.metrics.observe_time(self.now);
        }

        self.check_deadline_miss(self.now);
        self.complete_finished_segments(self.now)?;
        Ok(true)
    }

    fn collect_next_times(&self, next_times: &mut Vec<f64>) {
        if let Some(Reverse(entry)) = self.release_heap.peek() {
            next_times.push(entry.time);
        }
        for core in self.cores.values() {
            if let Some(finish) = core.finish_time {
                next_times.push(finish);
            }
        }
        for job in self.jobs.values() {
            let state = &job.state;
            if state.completed || state.missed_deadline {
                continue;
            }
            if let Some(deadline) = state.absolute_deadline {
                if deadline > self.now + TIME_EPSILON {
                    next_times.push(deadline + DEADLINE_EPSILON);
                }
            }
        }
    }

    fn process_releases(&mut self, now: f64) -> SimResult<()> {
        loop {
            let entry = match self.release_heap.peek() {
                Some(Reverse(entry)) if entry.time <= now + TIME_EPSILON => entry.clone(),
                _ => break,
            };
            self.release_heap.pop();
            let task = self
                .spec
                .as_ref()
                .ok_or_else(not_built)?
                .tasks
                .iter()
                .find(|t| t.id == entry.task_id)
                .cloned();
            if let Some(task) = task {
                self.release_job(&task, entry.time, entry.release_index, now)?;
            }
        }
        Ok(())
    }

    fn release_job(
        &mut self,
        task: &TaskGraphSpec,
        release_time: f64,
        release_index: u64,
        now: f64,
    ) -> SimResult<()> {
        let job_id = format!("{}@{}", task.id, release_index);
        let absolute_deadline = task.deadline.map(|d| release_time + d);
        let base_priority = self
            .scheduler
            .as_ref()
            .ok_or_else(not_built)?
            .task_priority_value(absolute_deadline, task.period);

        let mut subtasks: BTreeMap<String, SubtaskRuntime> = BTreeMap::new();
        let mut roots: Vec<String> = Vec::new();
        for sub in &task.subtasks {
            let mut ordered = sub.segments.clone();
            ordered.sort_by_key(|s| s.index);
            let mut segment_keys: Vec<String> = Vec::with_capacity(ordered.len());
            for seg in &ordered {
                let segment_key = format!("{job_id}:{}:{}", sub.id, seg.id);
                self.segments.insert(
                    segment_key.clone(),
                    RuntimeSegment {
                        task_id: task.id.clone(),
                        job_id: job_id.clone(),
                        subtask_id: sub.id.clone(),
                        segment_id: seg.id.clone(),
                        wcet: seg.wcet,
                        remaining_time: seg.wcet,
                        required_resources: seg.required_resources.clone(),
                        mapping_hint: seg.mapping_hint.clone(),
                        preemptible: seg.preemptible,
                        absolute_deadline,
                        task_period: task.period,
                        release_time,
                        segment_index: seg.index,
                        base_priority,
                        effective_priority: base_priority,
                        started_at: None,
                        running_on: None,
                        finished: false,
                        blocked: false,
                        waiting_resource: None,
                    },
                );
                self.held_resources
                    .insert(segment_key.clone(), BTreeSet::new());
                segment_keys.push(segment_key);
            }
            if sub.predecessors.is_empty() {
                roots.push(segment_keys[0].clone());
            }
            subtasks.insert(
                sub.id.clone(),
                SubtaskRuntime {
                    predecessors: sub.predecessors.clone(),
                    successors: sub.successors.clone(),
                    segment_keys,
                    next_index: 0,
                    completed: false,
                },
            );
        }

        let subtask_completion = subtasks.keys().map(|id| (id.clone(), false)).collect();
        self.jobs.insert(
            job_id.clone(),
            JobRuntime {
                state: JobState {
                    task_id: task.id.clone(),
                    job_id: job_id.clone(),
                    release_time,
                    absolute_deadline,
                    completed: false,
                    missed_deadline: false,
                },
                abort_on_miss: task.abort_on_miss,
                subtasks,
                subtask_completion,
            },
        );

        let mut payload = Payload::new();
        payload.insert("task_id".to_string(), json!(task.id));
        payload.insert("release_index".to_string(), json!(release_index));
        if let Some(deadline) = absolute_deadline {
            payload.insert("absolute_deadline".to_string(), json!(deadline));
        }
        self.publish(
            EventDraft::new(EventType::JobReleased, now, &job_id)
                .job(&job_id)
                .payload(payload),
        );
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.on_release(&job_id);
        }

        for segment_key in roots {
            self.mark_segment_ready(&segment_key, now);
        }

        self.schedule_next_release(task, release_time, release_index, now)?;
        Ok(())
    }

    fn schedule_next_release(
        &mut self,
        task: &TaskGraphSpec,
        release_time: f64,
        release_index: u64,
        now: f64,
    ) -> SimResult<()> {
        let duration = self.spec.as_ref().ok_or_else(not_built)?.sim.duration;
        let next_index = release_index + 1;

        let next_release = if let Some(period) = task.period {
            Some(task.arrival + period * next_index as f64)
        } else if let Some((generator, params)) = self.arrival_generators.get(&task.id) {
            let ctx = ArrivalContext {
                task,
                now,
                current_release: release_time,
                release_index: next_index,
                params,
            };
            let interval = generator.next_interval(&ctx, &mut self.rng)?;
            Some(release_time + interval)
        } else {
            None
        };

        if let Some(next_release) = next_release {
            if next_release <= duration + TIME_EPSILON {
                self.release_heap.push(Reverse(ReleaseEntry {
                    time: next_release,
                    release_index: next_index,
                    task_id: task.id.clone(),
                }));
            }
        }
        Ok(())
    }

    fn mark_segment_ready(&mut self, segment_key: &str, now: f64) {
        let (job_id, subtask_id, segment_id) = match self.segments.get(segment_key) {
            Some(seg) if !seg.finished => (
                seg.job_id.clone(),
                seg.subtask_id.clone(),
                seg.segment_id.clone(),
            ),
            _ => return,
        };
        if self.aborted_jobs.contains(&job_id) {
            return;
        }
        if let Some(seg) = self.segments.get_mut(segment_key) {
            seg.blocked = false;
            seg.waiting_resource = None;
        }
        self.ready.insert(segment_key.to_string());
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.on_segment_ready(segment_key);
        }
        let mut payload = Payload::new();
        payload.insert("segment_key".to_string(), json!(segment_key));
        payload.insert("subtask_id".to_string(), json!(subtask_id));
        self.publish(
            EventDraft::new(EventType::SegmentReady, now, &job_id)
                .job(&job_id)
                .segment(&segment_id)
                .payload(payload),
        );
    }

    fn build_snapshot(&self, now: f64) -> ScheduleSnapshot {
        let mut ready_segments = Vec::with_capacity(self.ready.len());
        for segment_key in &self.ready {
            if let Some(seg) = self.segments.get(segment_key) {
                if seg.finished || self.aborted_jobs.contains(&seg.job_id) {
                    continue;
                }
                ready_segments.push(seg.as_ready_segment());
            }
        }

        let mut core_states = Vec::with_capacity(self.cores.len());
        for core in self.cores.values() {
            let mut running_segment_key = core.running_segment_key.clone();
            let mut running_segment = None;
            if let Some(key) = &running_segment_key {
                match self.segments.get(key) {
                    Some(seg) if !seg.finished && !self.aborted_jobs.contains(&seg.job_id) => {
                        running_segment = Some(seg.as_ready_segment());
                    }
                    _ => running_segment_key = None,
                }
            }
            let running = running_segment_key.is_some();
            core_states.push(CoreState {
                core_id: core.core_id.clone(),
                core_speed: core.speed,
                running_segment_key,
                running_since: if running { core.running_since } else { None },
                running_segment,
            });
        }
        ScheduleSnapshot {
            now,
            ready_segments,
            core_states,
        }
    }

    fn schedule_tick(&mut self, now: f64) -> SimResult<()> {
        let stale: Vec<String> = self
            .ready
            .iter()
            .filter(|key| match self.segments.get(*key) {
                Some(seg) => seg.finished || self.aborted_jobs.contains(&seg.job_id),
                None => true,
            })
            .cloned()
            .collect();
        for key in stale {
            self.ready.remove(&key);
        }

        let any_running = self
            .cores
            .values()
            .any(|core| core.running_segment_key.is_some());
        if self.ready.is_empty() && !any_running {
            return Ok(());
        }

        let decisions = {
            let scheduler = self.scheduler.as_ref().ok_or_else(not_built)?;
            let snapshot = self.build_snapshot(now);
            scheduler.schedule(now, &snapshot)
        };
        let schedule_cost = self
            .overheads
            .as_ref()
            .ok_or_else(not_built)?
            .schedule(&self.scheduler_name);
        if schedule_cost > 0.0 {
            self.now += schedule_cost;
            self.metrics.observe_time(self.now);
        }
        let now = self.now;

        let blocked_any = self.apply_decisions(&decisions, now)?;

        // Safety net: when a dispatch blocked on a resource, the core sits
        // idle while ready segments remain; one retry keeps it busy.
        if blocked_any && !self.ready.is_empty() {
            let retry = {
                let scheduler = self.scheduler.as_ref().ok_or_else(not_built)?;
                let snapshot = self.build_snapshot(now);
                scheduler.schedule(now, &snapshot)
            };
            self.apply_decisions(&retry, now)?;
        }
        Ok(())
    }

    fn apply_decisions(&mut self, decisions: &[Decision], now: f64) -> SimResult<bool> {
        for decision in decisions {
            if decision.action == DecisionAction::Preempt {
                if let Some(from_core) = decision.from_core.clone() {
                    self.apply_preempt(&from_core, now, false, true, None);
                }
            }
        }

        for decision in decisions {
            if decision.action != DecisionAction::Migrate {
                continue;
            }
            if let (Some(from_core), Some(to_core)) = (&decision.from_core, &decision.to_core) {
                let mut payload = Payload::new();
                payload.insert("from_core".to_string(), json!(from_core));
                payload.insert("to_core".to_string(), json!(to_core));
                if let Some(migrate_reason) = &decision.reason {
                    payload.insert("reason".to_string(), json!(migrate_reason));
                }
                let correlation = decision.job_id.clone().unwrap_or_default();
                let mut draft = EventDraft::new(EventType::Migrate, now, correlation)
                    .core(to_core)
                    .payload(payload);
                if let Some(job_id) = &decision.job_id {
                    draft = draft.job(job_id);
                }
                if let Some(segment_id) = &decision.segment_id {
                    draft = draft.segment(segment_id);
                }
                self.publish(draft);
            }
        }

        let mut blocked_any = false;
        for decision in decisions {
            if decision.action != DecisionAction::Dispatch {
                continue;
            }
            if let (Some(job_id), Some(to_core)) =
                (decision.job_id.clone(), decision.to_core.clone())
            {
                let outcome =
                    self.apply_dispatch(&job_id, decision.segment_id.as_deref(), &to_core, now)?;
                if outcome == DispatchOutcome::Blocked {
                    blocked_any = true;
                }
            }
        }
        Ok(blocked_any)
    }

    fn apply_preempt(
        &mut self,
        core_id: &str,
        now: f64,
        force: bool,
        requeue: bool,
        preempt_reason: Option<&str>,
    ) -> bool {
        let (segment_key, running_since, speed) = {
            let core = match self.cores.get(core_id) {
                Some(core) => core,
                None => return false,
            };
            match &core.running_segment_key {
                Some(key) => (key.clone(), core.running_since, core.speed),
                None => return false,
            }
        };

        let (job_id, segment_id, alive) = {
            let seg = match self.segments.get_mut(&segment_key) {
                Some(seg) => seg,
                None => return false,
            };
            if !seg.preemptible && !force {
                return false;
            }
            if let Some(since) = running_since {
                let executed = (now - since).max(0.0) * speed;
                seg.remaining_time = (seg.remaining_time - executed).max(0.0);
            }
            seg.running_on = None;
            (seg.job_id.clone(), seg.segment_id.clone(), !seg.finished)
        };

        if requeue && alive && !self.aborted_jobs.contains(&job_id) {
            self.ready.insert(segment_key.clone());
        }

        let mut payload = Payload::new();
        payload.insert("segment_key".to_string(), json!(segment_key));
        if let Some(preempt_reason) = preempt_reason {
            payload.insert("reason".to_string(), json!(preempt_reason));
        }
        self.publish(
            EventDraft::new(EventType::Preempt, now, &job_id)
                .job(&job_id)
                .segment(&segment_id)
                .core(core_id)
                .payload(payload),
        );

        if let Some(core) = self.cores.get_mut(core_id) {
            core.clear();
        }
        true
    }

    fn apply_dispatch(
        &mut self,
        job_id: &str,
        decision_segment_id: Option<&str>,
        core_id: &str,
        now: f64,
    ) -> SimResult<DispatchOutcome> {
        if self.aborted_jobs.contains(job_id) {
            return Ok(DispatchOutcome::Skipped);
        }
        {
            let core = self
                .cores
                .get(core_id)
                .ok_or_else(|| SimError::EngineState(format!("unknown core '{core_id}'")))?;
            if core.running_segment_key.is_some() {
                return Ok(DispatchOutcome::Skipped);
            }
        }

        let prefix = format!("{job_id}:");
        let segment_key = self
            .ready
            .iter()
            .find(|key| {
                key.starts_with(&prefix)
                    && match decision_segment_id {
                        None => true,
                        Some(wanted) => {
                            wanted == key.as_str()
                                || self
                                    .segments
                                    .get(*key)
                                    .map_or(false, |seg| seg.segment_id == wanted)
                        }
                    }
            })
            .cloned();
        let segment_key = match segment_key {
            Some(key) => key,
            None => return Ok(DispatchOutcome::Skipped),
        };

        let (seg_job_id, task_id, subtask_id, segment_id, finished) =
            match self.segments.get(&segment_key) {
                Some(seg) => (
                    seg.job_id.clone(),
                    seg.task_id.clone(),
                    seg.subtask_id.clone(),
                    seg.segment_id.clone(),
                    seg.finished,
                ),
                None => return Ok(DispatchOutcome::Skipped),
            };
        if finished || self.aborted_jobs.contains(&seg_job_id) {
            self.ready.remove(&segment_key);
            return Ok(DispatchOutcome::Skipped);
        }

        let mut required: Vec<String> = self
            .segments
            .get(&segment_key)
            .map(|seg| seg.required_resources.clone())
            .unwrap_or_default();
        required.sort();
        for resource_id in &required {
            if self
                .held_resources
                .get(&segment_key)
                .map_or(false, |held| held.contains(resource_id))
            {
                continue;
            }
            let request_priority = self
                .segments
                .get(&segment_key)
                .map(|seg| seg.effective_priority)
                .unwrap_or(0.0);
            let idx = *self.resource_protocols.get(resource_id).ok_or_else(|| {
                SimError::EngineState(format!(
                    "no protocol configured for resource '{resource_id}'"
                ))
            })?;
            let result =
                self.protocols[idx].request(&segment_key, resource_id, core_id, request_priority);
            self.apply_priority_updates(&result.priority_updates);
            if !result.granted {
                self.block_dispatch(
                    &segment_key,
                    resource_id,
                    core_id,
                    now,
                    request_priority,
                    result,
                )?;
                return Ok(DispatchOutcome::Blocked);
            }
            if let Some(held) = self.held_resources.get_mut(&segment_key) {
                held.insert(resource_id.clone());
            }
            let mut payload = Payload::new();
            payload.insert("segment_key".to_string(), json!(segment_key));
            payload.insert("request_priority".to_string(), json!(request_priority));
            for (key, value) in result.metadata {
                payload.insert(key, value);
            }
            self.publish(
                EventDraft::new(EventType::ResourceAcquire, now, &seg_job_id)
                    .job(&seg_job_id)
                    .segment(&segment_id)
                    .core(core_id)
                    .resource(resource_id)
                    .payload(payload),
            );
        }

        let (remaining, previous_core) = match self.segments.get(&segment_key) {
            Some(seg) => (seg.remaining_time, seg.running_on.clone()),
            None => return Ok(DispatchOutcome::Skipped),
        };
        let speed = self.cores.get(core_id).map(|core| core.speed).unwrap_or(1.0);

        let overheads = self.overheads.as_ref().ok_or_else(not_built)?;
        let migration_cost = match &previous_core {
            Some(previous) if previous != core_id => {
                overheads.migration(&seg_job_id, previous, core_id)
            }
            _ => 0.0,
        };
        let context_cost = overheads.context_switch(&seg_job_id, core_id);
        let execution_time = self.etm.as_ref().ok_or_else(not_built)?.estimate(
            remaining,
            speed,
            now,
            &EstimateContext {
                task_id: Some(&task_id),
                subtask_id: Some(&subtask_id),
                segment_id: Some(&segment_id),
                core_id: Some(core_id),
            },
        );
        let total_runtime = migration_cost + context_cost + execution_time;
        let finish_time = now + total_runtime;

        if let Some(seg) = self.segments.get_mut(&segment_key) {
            seg.running_on = Some(core_id.to_string());
            if seg.started_at.is_none() {
                seg.started_at = Some(now);
            }
            seg.blocked = false;
        }
        self.ready.remove(&segment_key);
        if let Some(core) = self.cores.get_mut(core_id) {
            core.running_segment_key = Some(segment_key.clone());
            core.running_since = Some(now);
            core.finish_time = Some(finish_time);
        }

        let mut payload = Payload::new();
        payload.insert("segment_key".to_string(), json!(segment_key));
        payload.insert("estimated_finish".to_string(), json!(finish_time));
        payload.insert("execution_time".to_string(), json!(execution_time));
        payload.insert("context_overhead".to_string(), json!(context_cost));
        payload.insert("migration_overhead".to_string(), json!(migration_cost));
        self.publish(
            EventDraft::new(EventType::SegmentStart, now, &seg_job_id)
                .job(&seg_job_id)
                .segment(&segment_id)
                .core(core_id)
                .payload(payload),
        );
        Ok(DispatchOutcome::Started)
    }

    fn block_dispatch(
        &mut self,
        segment_key: &str,
        resource_id: &str,
        core_id: &str,
        now: f64,
        request_priority: f64,
        result: RequestResult,
    ) -> SimResult<()> {
        let (job_id, segment_id) = match self.segments.get_mut(segment_key) {
            Some(seg) => {
                seg.blocked = true;
                seg.waiting_resource = Some(resource_id.to_string());
                (seg.job_id.clone(), seg.segment_id.clone())
            }
            None => return Ok(()),
        };
        self.ready.remove(segment_key);

        let held: Vec<String> = self
            .held_resources
            .get(segment_key)
            .map(|held| held.iter().cloned().collect())
            .unwrap_or_default();
        let had_partial = !held.is_empty();

        if self.acquire_policy == ResourceAcquirePolicy::AtomicRollback && had_partial {
            for held_id in &held {
                self.release_resource(
                    segment_key,
                    held_id,
                    core_id,
                    now,
                    Some(reason::ACQUIRE_ROLLBACK),
                )?;
            }
        }

        let mut payload = Payload::new();
        payload.insert(
            "reason".to_string(),
            json!(result.reason.as_deref().unwrap_or(reason::RESOURCE_BUSY)),
        );
        payload.insert("segment_key".to_string(), json!(segment_key));
        payload.insert("request_priority".to_string(), json!(request_priority));
        for (key, value) in result.metadata {
            payload.insert(key, value);
        }
        if had_partial {
            payload.insert(
                "resource_acquire_policy".to_string(),
                json!(self.acquire_policy.as_str()),
            );
        }
        self.publish(
            EventDraft::new(EventType::SegmentBlocked, now, &job_id)
                .job(&job_id)
                .segment(&segment_id)
                .core(core_id)
                .resource(resource_id)
                .payload(payload),
        );
        Ok(())
    }

    fn release_resource(
        &mut self,
        segment_key: &str,
        resource_id: &str,
        core_id: &str,
        now: f64,
        release_reason: Option<&str>,
    ) -> SimResult<()> {
        let idx = *self.resource_protocols.get(resource_id).ok_or_else(|| {
            SimError::EngineState(format!("no protocol configured for resource '{resource_id}'"))
        })?;
        let result = self.protocols[idx].release(segment_key, resource_id);
        self.apply_priority_updates(&result.priority_updates);
        if let Some(held) = self.held_resources.get_mut(segment_key) {
            held.remove(resource_id);
        }

        let (job_id, segment_id) = match self.segments.get(segment_key) {
            Some(seg) => (seg.job_id.clone(), seg.segment_id.clone()),
            None => return Ok(()),
        };
        let mut payload = Payload::new();
        payload.insert("segment_key".to_string(), json!(segment_key));
        for (key, value) in result.metadata {
            payload.insert(key, value);
        }
        if let Some(release_reason) = release_reason {
            payload.insert("reason".to_string(), json!(release_reason));
        }
        self.publish(
            EventDraft::new(EventType::ResourceRelease, now, &job_id)
                .job(&job_id)
                .segment(&segment_id)
                .core(core_id)
                .resource(resource_id)
                .payload(payload),
        );

        for woken in result.woken {
            self.wake_segment(&woken, resource_id, core_id, now);
        }
        Ok(())
    }

    fn wake_segment(&mut self, segment_key: &str, resource_id: &str, core_id: &str, now: f64) {
        let (job_id, segment_id) = match self.segments.get(segment_key) {
            Some(seg) if !seg.finished => (seg.job_id.clone(), seg.segment_id.clone()),
            _ => return,
        };
        if self.aborted_jobs.contains(&job_id) {
            return;
        }
        if let Some(seg) = self.segments.get_mut(segment_key) {
            seg.blocked = false;
            seg.waiting_resource = None;
        }
        self.ready.insert(segment_key.to_string());
        let mut payload = Payload::new();
        payload.insert("segment_key".to_string(), json!(segment_key));
        self.publish(
            EventDraft::new(EventType::SegmentUnblocked, now, &job_id)
                .job(&job_id)
                .segment(&segment_id)
                .core(core_id)
                .resource(resource_id)
                .payload(payload),
        );
    }

    fn complete_finished_segments(&mut self, now: f64) -> SimResult<()> {
        let finished_cores: Vec<String> = self
            .cores
            .values()
            .filter(|core| {
                core.running_segment_key.is_some()
                    && core
                        .finish_time
                        .map_or(false, |finish| finish <= now + COMPLETION_EPSILON)
            })
            .map(|core| core.core_id.clone())
            .collect();

        for core_id in finished_cores {
            let (segment_key, running_since, speed) = match self.cores.get(&core_id) {
                Some(core) => match &core.running_segment_key {
                    Some(key) => (key.clone(), core.running_since, core.speed),
                    None => continue,
                },
                None => continue,
            };

            if let Some(since) = running_since {
                let elapsed = (now - since).max(0.0);
                if let Some(seg) = self.segments.get_mut(&segment_key) {
                    seg.remaining_time = (seg.remaining_time - elapsed * speed).max(0.0);
                }
                if let Some(etm) = self.etm.as_mut() {
                    etm.on_exec(&segment_key, &core_id, elapsed);
                }
            }
            let (job_id, segment_id) = match self.segments.get_mut(&segment_key) {
                Some(seg) => {
                    seg.finished = true;
                    seg.running_on = None;
                    (seg.job_id.clone(), seg.segment_id.clone())
                }
                None => continue,
            };

            let mut payload = Payload::new();
            payload.insert("segment_key".to_string(), json!(segment_key));
            self.publish(
                EventDraft::new(EventType::SegmentEnd, now, &job_id)
                    .job(&job_id)
                    .segment(&segment_id)
                    .core(&core_id)
                    .payload(payload),
            );

            let held: Vec<String> = self
                .held_resources
                .get(&segment_key)
                .map(|held| held.iter().cloned().collect())
                .unwrap_or_default();
            for resource_id in &held {
                self.release_resource(&segment_key, resource_id, &core_id, now, None)?;
            }
            self.held_resources
                .insert(segment_key.clone(), BTreeSet::new());

            self.on_segment_finish(&segment_key, now)?;

            if let Some(core) = self.cores.get_mut(&core_id) {
                core.clear();
            }
        }
        Ok(())
    }

    fn on_segment_finish(&mut self, segment_key: &str, now: f64) -> SimResult<()> {
        let (job_id, subtask_id, task_id) = match self.segments.get(segment_key) {
            Some(seg) => (
                seg.job_id.clone(),
                seg.subtask_id.clone(),
                seg.task_id.clone(),
            ),
            None => return Ok(()),
        };
        if self.aborted_jobs.contains(&job_id) {
            return Ok(());
        }

        let next_segment = {
            let job = match self.jobs.get_mut(&job_id) {
                Some(job) => job,
                None => return Ok(()),
            };
            let subtask = match job.subtasks.get_mut(&subtask_id) {
                Some(subtask) => subtask,
                None => return Ok(()),
            };
            subtask.next_index += 1;
            if subtask.next_index < subtask.segment_keys.len() {
                Some(subtask.segment_keys[subtask.next_index].clone())
            } else {
                subtask.completed = true;
                job.subtask_completion.insert(subtask_id.clone(), true);
                None
            }
        };

        if let Some(next_key) = next_segment {
            self.mark_segment_ready(&next_key, now);
            return Ok(());
        }

        // Cascade readiness to successors whose predecessors are all complete.
        let newly_ready: Vec<String> = {
            let job = match self.jobs.get(&job_id) {
                Some(job) => job,
                None => return Ok(()),
            };
            let successors = job
                .subtasks
                .get(&subtask_id)
                .map(|subtask| subtask.successors.clone())
                .unwrap_or_default();
            successors
                .iter()
                .filter_map(|successor_id| {
                    let successor = job.subtasks.get(successor_id)?;
                    if successor.completed {
                        return None;
                    }
                    let all_done = successor
                        .predecessors
                        .iter()
                        .all(|pred| job.subtask_completion.get(pred).copied().unwrap_or(false));
                    if all_done {
                        Some(successor.segment_keys[0].clone())
                    } else {
                        None
                    }
                })
                .collect()
        };
        for ready_key in newly_ready {
            self.mark_segment_ready(&ready_key, now);
        }

        let all_complete = self
            .jobs
            .get(&job_id)
            .map(|job| job.subtask_completion.values().all(|done| *done))
            .unwrap_or(false);
        if all_complete {
            if let Some(job) = self.jobs.get_mut(&job_id) {
                job.state.completed = true;
            }
            if let Some(scheduler) = self.scheduler.as_mut() {
                scheduler.on_complete(&job_id);
            }
            let mut payload = Payload::new();
            payload.insert("task_id".to_string(), json!(task_id));
            self.publish(
                EventDraft::new(EventType::JobComplete, now, &job_id)
                    .job(&job_id)
                    .payload(payload),
            );
        }
        Ok(())
    }

    fn check_deadline_miss(&mut self, now: f64) {
        let missed: Vec<(String, f64, bool)> = self
            .jobs
            .iter()
            .filter_map(|(job_id, job)| {
                let state = &job.state;
                if state.completed || state.missed_deadline {
                    return None;
                }
                let deadline = state.absolute_deadline?;
                if now <= deadline + TIME_EPSILON {
                    return None;
                }
                Some((job_id.clone(), deadline, job.abort_on_miss))
            })
            .collect();

        for (job_id, deadline, abort) in missed {
            if let Some(job) = self.jobs.get_mut(&job_id) {
                job.state.missed_deadline = true;
            }
            warn!(job = %job_id, deadline, "deadline miss");
            let mut payload = Payload::new();
            payload.insert("absolute_deadline".to_string(), json!(deadline));
            payload.insert("abort_on_miss".to_string(), json!(abort));
            self.publish(
                EventDraft::new(EventType::DeadlineMiss, now, &job_id)
                    .job(&job_id)
                    .payload(payload),
            );
            if abort {
                self.abort_job(&job_id, now);
            }
        }
    }

    /// Tear down every runtime trace of a job that missed with abort_on_miss
    fn abort_job(&mut self, job_id: &str, now: f64) {
        if !self.aborted_jobs.insert(job_id.to_string()) {
            return;
        }
        debug!(job = %job_id, "abort cascade");
        let prefix = format!("{job_id}:");
        let segment_keys: Vec<String> = self
            .segments
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();

        let running_cores: Vec<String> = self
            .cores
            .values()
            .filter(|core| {
                core.running_segment_key
                    .as_deref()
                    .map_or(false, |key| key.starts_with(&prefix))
            })
            .map(|core| core.core_id.clone())
            .collect();
        for core_id in running_cores {
            self.apply_preempt(&core_id, now, true, false, Some("abort_on_miss"));
        }

        for segment_key in &segment_keys {
            if let Some(seg) = self.segments.get_mut(segment_key) {
                seg.blocked = false;
                seg.waiting_resource = None;
                seg.running_on = None;
            }
            self.ready.remove(segment_key);
        }

        for segment_key in &segment_keys {
            let held: Vec<String> = self
                .held_resources
                .get(segment_key)
                .map(|held| held.iter().cloned().collect())
                .unwrap_or_default();
            let segment_id = self
                .segments
                .get(segment_key)
                .map(|seg| seg.segment_id.clone())
                .unwrap_or_default();
            for resource_id in &held {
                let bound_core = self
                    .resource_bound_cores
                    .get(resource_id)
                    .cloned()
                    .unwrap_or_default();
                let mut payload = Payload::new();
                payload.insert("segment_key".to_string(), json!(segment_key));
                payload.insert("reason".to_string(), json!(reason::CANCEL_SEGMENT));
                self.publish(
                    EventDraft::new(EventType::ResourceRelease, now, job_id)
                        .job(job_id)
                        .segment(&segment_id)
                        .core(&bound_core)
                        .resource(resource_id)
                        .payload(payload),
                );
            }

            let mut required: Vec<String> = self
                .segments
                .get(segment_key)
                .map(|seg| seg.required_resources.clone())
                .unwrap_or_default();
            required.sort();
            let mut protocol_idxs: Vec<usize> = Vec::new();
            for resource_id in &required {
                if let Some(idx) = self.resource_protocols.get(resource_id) {
                    if !protocol_idxs.contains(idx) {
                        protocol_idxs.push(*idx);
                    }
                }
            }
            for idx in protocol_idxs {
                let result = self.protocols[idx].cancel_segment(segment_key);
                self.apply_priority_updates(&result.priority_updates);
                for woken in result.woken {
                    let alive = self
                        .segments
                        .get(&woken)
                        .map(|seg| !seg.finished)
                        .unwrap_or(false);
                    if !alive {
                        continue;
                    }
                    let woken_job = self
                        .segments
                        .get(&woken)
                        .map(|seg| seg.job_id.clone())
                        .unwrap_or_default();
                    if self.aborted_jobs.contains(&woken_job) {
                        continue;
                    }
                    if let Some(seg) = self.segments.get_mut(&woken) {
                        seg.blocked = false;
                        seg.waiting_resource = None;
                    }
                    self.ready.insert(woken);
                }
            }
        }

        for segment_key in &segment_keys {
            if let Some(seg) = self.segments.get_mut(segment_key) {
                seg.finished = true;
            }
            self.held_resources
                .insert(segment_key.clone(), BTreeSet::new());
        }
    }

    fn apply_priority_updates(&mut self, updates: &BTreeMap<String, f64>) {
        for (segment_key, effective_priority) in updates {
            if let Some(seg) = self.segments.get_mut(segment_key) {
                if !seg.finished {
                    seg.effective_priority = *effective_priority;
                }
            }
        }
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}
