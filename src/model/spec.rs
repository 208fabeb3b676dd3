//! Configuration domain model and semantic validation

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SimError, SimResult};

/// Plugin parameter object (JSON map)
pub type Params = Map<String, Value>;

/// Configuration version accepted without migration
pub const SUPPORTED_VERSION: &str = "0.2";

/// Task timing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Strictly periodic with fixed release windows
    TimeDeterministic,
    /// Real-time with dynamic (sporadic) releases
    DynamicRt,
    /// Best-effort, no deadline
    NonRt,
}

/// Resource-sharing protocol tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Mutex,
    Pip,
    Pcp,
}

impl ProtocolKind {
    /// Registry name for this protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Mutex => "mutex",
            ProtocolKind::Pip => "pip",
            ProtocolKind::Pcp => "pcp",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-resource acquisition policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAcquirePolicy {
    /// Hold partial acquisitions across a denial (historical behavior)
    LegacySequential,
    /// Release partial acquisitions before blocking
    AtomicRollback,
}

impl ResourceAcquirePolicy {
    /// Configuration label for this policy
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAcquirePolicy::LegacySequential => "legacy_sequential",
            ResourceAcquirePolicy::AtomicRollback => "atomic_rollback",
        }
    }

    /// Parse a configuration label
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "legacy_sequential" => Some(ResourceAcquirePolicy::LegacySequential),
            "atomic_rollback" => Some(ResourceAcquirePolicy::AtomicRollback),
            _ => None,
        }
    }
}

/// Processor type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorTypeSpec {
    pub id: String,
    pub name: String,
    pub core_count: u32,
    pub speed_factor: f64,
}

/// One physical core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreSpec {
    pub id: String,
    pub type_id: String,
    pub speed_factor: f64,
}

/// Shared resource with a bound core and a protocol tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub id: String,
    pub name: String,
    pub bound_core_id: String,
    #[serde(default = "default_protocol")]
    pub protocol: ProtocolKind,
}

fn default_protocol() -> ProtocolKind {
    ProtocolKind::Mutex
}

/// Smallest schedulable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentSpec {
    pub id: String,
    pub index: u32,
    pub wcet: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acet: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_hint: Option<String>,
    #[serde(default = "default_preemptible")]
    pub preemptible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_offsets: Option<Vec<f64>>,
}

fn default_preemptible() -> bool {
    true
}

/// DAG node within a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubtaskSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<String>,
    pub segments: Vec<SegmentSpec>,
}

/// Task graph: a DAG of subtasks with timing attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskGraphSpec {
    pub id: String,
    pub name: String,
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<f64>,
    #[serde(default)]
    pub arrival: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_inter_arrival: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inter_arrival: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_generator: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arrival_params: Params,
    #[serde(default)]
    pub abort_on_miss: bool,
    pub subtasks: Vec<SubtaskSpec>,
}

/// Scheduling policy selection with free-form parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSpec {
    pub name: String,
    #[serde(default)]
    pub params: Params,
}

/// Simulation horizon and seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimSpec {
    pub duration: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    42
}

/// Multi-core platform declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSpec {
    pub processor_types: Vec<ProcessorTypeSpec>,
    pub cores: Vec<CoreSpec>,
}

/// Root model: platform, resources, tasks, scheduler and sim configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub version: String,
    pub platform: PlatformSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceSpec>,
    pub tasks: Vec<TaskGraphSpec>,
    pub scheduler: SchedulerSpec,
    pub sim: SimSpec,
}

impl SchedulerSpec {
    /// Resolved multi-resource acquisition policy (default `legacy_sequential`)
    pub fn resource_acquire_policy(&self) -> SimResult<ResourceAcquirePolicy> {
        match self.params.get("resource_acquire_policy") {
            None => Ok(ResourceAcquirePolicy::LegacySequential),
            Some(Value::String(raw)) => ResourceAcquirePolicy::parse(raw).ok_or_else(|| {
                SimError::config(
                    "scheduler.params.resource_acquire_policy",
                    "must be legacy_sequential|atomic_rollback",
                )
            }),
            Some(_) => Err(SimError::config(
                "scheduler.params.resource_acquire_policy",
                "must be string",
            )),
        }
    }

    fn validate(&self) -> SimResult<()> {
        self.resource_acquire_policy()?;

        if let Some(mode) = self.params.get("event_id_mode") {
            match mode.as_str() {
                Some("deterministic") | Some("sequential") => {}
                Some(_) => {
                    return Err(SimError::config(
                        "scheduler.params.event_id_mode",
                        "must be deterministic|sequential",
                    ))
                }
                None => {
                    return Err(SimError::config(
                        "scheduler.params.event_id_mode",
                        "must be string",
                    ))
                }
            }
        }

        if let Some(tie) = self.params.get("tie_breaker") {
            match tie.as_str() {
                Some("segment_key") => {}
                _ => {
                    return Err(SimError::config(
                        "scheduler.params.tie_breaker",
                        "must be segment_key",
                    ))
                }
            }
        }

        if let Some(allow) = self.params.get("allow_preempt") {
            if !allow.is_boolean() {
                return Err(SimError::config(
                    "scheduler.params.allow_preempt",
                    "must be boolean",
                ));
            }
        }

        for key in ["etm", "overhead_model"] {
            if let Some(value) = self.params.get(key) {
                if !value.is_string() {
                    return Err(SimError::config(
                        format!("scheduler.params.{key}"),
                        "must be string",
                    ));
                }
            }
        }
        for key in ["etm_params", "overhead"] {
            if let Some(value) = self.params.get(key) {
                if !value.is_object() {
                    return Err(SimError::config(
                        format!("scheduler.params.{key}"),
                        "must be object",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ModelSpec {
    /// Run all semantic checks and fill derived defaults in place.
    ///
    /// Safe to call repeatedly; a validated model revalidates cleanly.
    pub fn validate(&mut self) -> SimResult<()> {
        if self.version != SUPPORTED_VERSION {
            return Err(SimError::validation(
                "version",
                format!("unsupported config version '{}'", self.version),
            ));
        }
        if self.sim.duration <= 0.0 {
            return Err(SimError::validation("sim.duration", "must be > 0"));
        }
        self.validate_platform()?;
        let core_ids: BTreeSet<String> =
            self.platform.cores.iter().map(|c| c.id.clone()).collect();
        let multi_core = core_ids.len() > 1;
        let resource_bound_cores = self.validate_resources(&core_ids)?;
        let resource_ids: BTreeSet<String> = resource_bound_cores.keys().cloned().collect();

        let mut task_ids: BTreeSet<&str> = BTreeSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(SimError::validation("tasks", "duplicate tasks.id"));
            }
        }
        if self.tasks.is_empty() {
            return Err(SimError::validation("tasks", "at least one task required"));
        }

        for task in &mut self.tasks {
            validate_task_graph(task, &resource_ids, &core_ids, &resource_bound_cores, multi_core)?;
        }
        self.scheduler.validate()?;
        Ok(())
    }

    fn validate_platform(&self) -> SimResult<()> {
        if self.platform.processor_types.is_empty() {
            return Err(SimError::validation(
                "platform.processor_types",
                "at least one processor type required",
            ));
        }
        if self.platform.cores.is_empty() {
            return Err(SimError::validation(
                "platform.cores",
                "at least one core required",
            ));
        }

        let mut processor_ids: BTreeSet<&str> = BTreeSet::new();
        for processor in &self.platform.processor_types {
            if processor.core_count < 1 {
                return Err(SimError::validation(
                    format!("platform.processor_types.{}.core_count", processor.id),
                    "must be >= 1",
                ));
            }
            if processor.speed_factor <= 0.0 {
                return Err(SimError::validation(
                    format!("platform.processor_types.{}.speed_factor", processor.id),
                    "must be > 0",
                ));
            }
            if !processor_ids.insert(processor.id.as_str()) {
                return Err(SimError::validation(
                    "platform.processor_types",
                    "duplicate processor_types.id",
                ));
            }
        }

        let mut core_ids: BTreeSet<&str> = BTreeSet::new();
        let mut cores_by_type: HashMap<&str, u32> = HashMap::new();
        for core in &self.platform.cores {
            if core.speed_factor <= 0.0 {
                return Err(SimError::validation(
                    format!("platform.cores.{}.speed_factor", core.id),
                    "must be > 0",
                ));
            }
            if !core_ids.insert(core.id.as_str()) {
                return Err(SimError::validation("platform.cores", "duplicate cores.id"));
            }
            if !processor_ids.contains(core.type_id.as_str()) {
                return Err(SimError::validation(
                    format!("platform.cores.{}", core.id),
                    format!("references unknown processor type '{}'", core.type_id),
                ));
            }
            *cores_by_type.entry(core.type_id.as_str()).or_insert(0) += 1;
        }

        for processor in &self.platform.processor_types {
            let actual = cores_by_type.get(processor.id.as_str()).copied().unwrap_or(0);
            if actual != processor.core_count {
                return Err(SimError::validation(
                    format!("platform.processor_types.{}", processor.id),
                    format!(
                        "declares core_count={} but has {} cores in platform.cores",
                        processor.core_count, actual
                    ),
                ));
            }
        }
        Ok(())
    }

    fn validate_resources(
        &self,
        core_ids: &BTreeSet<String>,
    ) -> SimResult<BTreeMap<String, String>> {
        let mut bound_cores: BTreeMap<String, String> = BTreeMap::new();
        for resource in &self.resources {
            if bound_cores.contains_key(&resource.id) {
                return Err(SimError::validation("resources", "duplicate resources.id"));
            }
            if !core_ids.contains(&resource.bound_core_id) {
                return Err(SimError::validation(
                    format!("resources.{}", resource.id),
                    format!("bound_core_id '{}' does not exist", resource.bound_core_id),
                ));
            }
            bound_cores.insert(resource.id.clone(), resource.bound_core_id.clone());
        }
        Ok(bound_cores)
    }
}

fn validate_task_graph(
    task: &mut TaskGraphSpec,
    resource_ids: &BTreeSet<String>,
    core_ids: &BTreeSet<String>,
    resource_bound_cores: &BTreeMap<String, String>,
    multi_core: bool,
) -> SimResult<()> {
    validate_task_timing(task)?;

    let task_path = format!("tasks.{}", task.id);
    if task.subtasks.is_empty() {
        return Err(SimError::validation(
            format!("{task_path}.subtasks"),
            "at least one subtask required",
        ));
    }

    let mut subtask_ids: BTreeSet<&str> = BTreeSet::new();
    for sub in &task.subtasks {
        if !subtask_ids.insert(sub.id.as_str()) {
            return Err(SimError::validation(
                format!("{task_path}.subtasks"),
                "duplicate subtask ids",
            ));
        }
    }

    // Collect edges from both directions; predecessor and successor sets
    // must agree and reference subtasks of this task only.
    let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
    for sub in &task.subtasks {
        for pred in &sub.predecessors {
            if !subtask_ids.contains(pred.as_str()) {
                return Err(SimError::validation(
                    format!("{task_path}.subtasks.{}", sub.id),
                    format!("references unknown predecessor '{pred}'"),
                ));
            }
            edges.insert((pred.clone(), sub.id.clone()));
        }
        for succ in &sub.successors {
            if !subtask_ids.contains(succ.as_str()) {
                return Err(SimError::validation(
                    format!("{task_path}.subtasks.{}", sub.id),
                    format!("references unknown successor '{succ}'"),
                ));
            }
            edges.insert((sub.id.clone(), succ.clone()));
        }
    }

    let task_type = task.task_type;
    let period = task.period;
    for sub in &mut task.subtasks {
        let sub_path = format!("{task_path}.subtasks.{}", sub.id);
        validate_segments(
            sub,
            &sub_path,
            task_type,
            period,
            resource_ids,
            core_ids,
            resource_bound_cores,
            multi_core,
        )?;
    }

    // Kahn's algorithm over the merged edge set: any unvisited node means a cycle.
    let mut indegree: BTreeMap<&str, usize> =
        task.subtasks.iter().map(|s| (s.id.as_str(), 0)).collect();
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (src, dst) in &edges {
        if adjacency
            .entry(src.as_str())
            .or_default()
            .insert(dst.as_str())
        {
            *indegree.entry(dst.as_str()).or_insert(0) += 1;
        }
    }
    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut visited = 0usize;
    while let Some(current) = queue.pop_front() {
        visited += 1;
        if let Some(nexts) = adjacency.get(current) {
            for next in nexts {
                let deg = indegree.entry(*next).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }
    if visited != indegree.len() {
        return Err(SimError::validation(task_path, "DAG contains cycle"));
    }
    Ok(())
}

fn validate_task_timing(task: &mut TaskGraphSpec) -> SimResult<()> {
    let path = format!("tasks.{}", task.id);
    if task.arrival < 0.0 {
        return Err(SimError::validation(format!("{path}.arrival"), "must be >= 0"));
    }
    if let Some(period) = task.period {
        if period <= 0.0 {
            return Err(SimError::validation(format!("{path}.period"), "must be > 0"));
        }
    }
    if let Some(deadline) = task.deadline {
        if deadline <= 0.0 {
            return Err(SimError::validation(format!("{path}.deadline"), "must be > 0"));
        }
    }
    if task.task_type == TaskType::TimeDeterministic && task.period.is_none() {
        return Err(SimError::validation(
            path,
            "time_deterministic task must define period",
        ));
    }
    if task.task_type == TaskType::TimeDeterministic && task.phase_offset.is_none() {
        task.phase_offset = Some(0.0);
    }
    if task.task_type != TaskType::TimeDeterministic
        && !matches!(task.phase_offset, None | Some(0.0))
    {
        return Err(SimError::validation(
            format!("{path}.phase_offset"),
            "only valid for time_deterministic task",
        ));
    }
    if let Some(offset) = task.phase_offset {
        if offset < 0.0 {
            return Err(SimError::validation(
                format!("{path}.phase_offset"),
                "must be >= 0",
            ));
        }
    }
    if task.task_type != TaskType::NonRt && task.deadline.is_none() {
        return Err(SimError::validation(path, "real-time task must define deadline"));
    }
    if task.period.is_some() && task.min_inter_arrival.is_none() {
        task.min_inter_arrival = task.period;
    }
    if task.task_type != TaskType::DynamicRt && task.max_inter_arrival.is_some() {
        return Err(SimError::validation(
            format!("{path}.max_inter_arrival"),
            "only valid for dynamic_rt task",
        ));
    }
    if task.max_inter_arrival.is_some() && task.min_inter_arrival.is_none() {
        return Err(SimError::validation(
            format!("{path}.max_inter_arrival"),
            "requires min_inter_arrival or period",
        ));
    }
    for (field, value) in [
        ("min_inter_arrival", task.min_inter_arrival),
        ("max_inter_arrival", task.max_inter_arrival),
    ] {
        if let Some(value) = value {
            if value <= 0.0 {
                return Err(SimError::validation(format!("{path}.{field}"), "must be > 0"));
            }
        }
    }
    if let (Some(min), Some(max)) = (task.min_inter_arrival, task.max_inter_arrival) {
        if max < min - 1e-12 {
            return Err(SimError::validation(
                format!("{path}.max_inter_arrival"),
                "must be >= min_inter_arrival",
            ));
        }
    }
    if task.arrival_generator.is_some() && task.period.is_some() {
        return Err(SimError::validation(
            format!("{path}.arrival_generator"),
            "conflicts with period (periodic tasks release arithmetically)",
        ));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_segments(
    sub: &mut SubtaskSpec,
    sub_path: &str,
    task_type: TaskType,
    period: Option<f64>,
    resource_ids: &BTreeSet<String>,
    core_ids: &BTreeSet<String>,
    resource_bound_cores: &BTreeMap<String, String>,
    multi_core: bool,
) -> SimResult<()> {
    if sub.segments.is_empty() {
        return Err(SimError::validation(
            format!("{sub_path}.segments"),
            "at least one segment required",
        ));
    }

    let mut segment_ids: BTreeSet<&str> = BTreeSet::new();
    for seg in &sub.segments {
        if !segment_ids.insert(seg.id.as_str()) {
            return Err(SimError::validation(
                format!("{sub_path}.segments"),
                "duplicate segment ids",
            ));
        }
    }

    let mut indexes: Vec<u32> = sub.segments.iter().map(|s| s.index).collect();
    indexes.sort_unstable();
    let expected: Vec<u32> = (1..=indexes.len() as u32).collect();
    if indexes != expected {
        return Err(SimError::validation(
            format!("{sub_path}.segments"),
            "segment index must start at 1 and be continuous",
        ));
    }

    for seg in &mut sub.segments {
        let seg_path = format!("{sub_path}.segments.{}", seg.id);
        if seg.wcet <= 0.0 {
            return Err(SimError::validation(format!("{seg_path}.wcet"), "must be > 0"));
        }
        if let Some(acet) = seg.acet {
            if acet <= 0.0 {
                return Err(SimError::validation(format!("{seg_path}.acet"), "must be > 0"));
            }
        }
        for resource_id in &seg.required_resources {
            if !resource_ids.contains(resource_id) {
                return Err(SimError::validation(
                    seg_path.clone(),
                    format!("references unknown resource '{resource_id}'"),
                ));
            }
        }
        if let Some(hint) = &seg.mapping_hint {
            if !core_ids.contains(hint) {
                return Err(SimError::validation(
                    seg_path.clone(),
                    format!("mapping_hint '{hint}' does not exist"),
                ));
            }
        }

        match &seg.release_offsets {
            Some(offsets) => {
                if task_type != TaskType::TimeDeterministic {
                    return Err(SimError::validation(
                        format!("{seg_path}.release_offsets"),
                        "requires time_deterministic task",
                    ));
                }
                if offsets.is_empty() {
                    return Err(SimError::validation(
                        format!("{seg_path}.release_offsets"),
                        "must not be empty",
                    ));
                }
                for offset in offsets {
                    if *offset < 0.0 {
                        return Err(SimError::validation(
                            format!("{seg_path}.release_offsets"),
                            "must be >= 0",
                        ));
                    }
                    if let Some(period) = period {
                        if *offset >= period - 1e-12 {
                            return Err(SimError::validation(
                                format!("{seg_path}.release_offsets"),
                                format!("offset {offset} must be < period"),
                            ));
                        }
                    }
                }
            }
            None if task_type == TaskType::TimeDeterministic => {
                seg.release_offsets = Some(vec![0.0]);
            }
            None => {}
        }

        // All required resources must share one bound core; that core becomes
        // the effective mapping hint.
        let required_bound_cores: BTreeSet<&String> = seg
            .required_resources
            .iter()
            .filter_map(|resource_id| resource_bound_cores.get(resource_id))
            .collect();
        if required_bound_cores.len() > 1 {
            let ordered: Vec<&str> = required_bound_cores.iter().map(|c| c.as_str()).collect();
            return Err(SimError::validation(
                seg_path.clone(),
                format!(
                    "requires resources bound to multiple cores: {}",
                    ordered.join(", ")
                ),
            ));
        }
        if let Some(bound_core_id) = required_bound_cores.into_iter().next() {
            match &seg.mapping_hint {
                None => seg.mapping_hint = Some(bound_core_id.clone()),
                Some(hint) if hint != bound_core_id => {
                    return Err(SimError::validation(
                        seg_path.clone(),
                        format!(
                            "mapping_hint '{hint}' conflicts with required resource core '{bound_core_id}'"
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        if task_type == TaskType::TimeDeterministic && seg.mapping_hint.is_none() {
            if multi_core {
                return Err(SimError::validation(
                    seg_path,
                    "requires mapping_hint for time_deterministic task on multi-core platform",
                ));
            }
            seg.mapping_hint = core_ids.iter().next().cloned();
        }
    }
    Ok(())
}
