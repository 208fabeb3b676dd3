//! Data model: validated configuration spec and runtime views

pub mod runtime;
pub mod spec;

pub use runtime::{
    CoreState, Decision, DecisionAction, JobState, ReadySegment, RuntimeSegment, ScheduleSnapshot,
};
pub use spec::{
    CoreSpec, ModelSpec, Params, PlatformSpec, ProcessorTypeSpec, ProtocolKind,
    ResourceAcquirePolicy, ResourceSpec, SchedulerSpec, SegmentSpec, SimSpec, SubtaskSpec,
    TaskGraphSpec, TaskType,
};
